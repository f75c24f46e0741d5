use super::ResolveError;
use std::fmt;

/// A response format with exactly one substitution slot.
///
/// Both `%v` and `%s` mark the slot, `%%` is a literal percent sign and any
/// other `%` sequence is kept as written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    prefix: String,
    suffix: String,
    source: String,
}

impl Template {
    pub fn parse(source: &str) -> Result<Self, ResolveError> {
        let mut prefix = String::new();
        let mut suffix = String::new();
        let mut slots = 0;
        let mut chars = source.chars().peekable();

        while let Some(c) = chars.next() {
            let current = if slots == 0 { &mut prefix } else { &mut suffix };
            if c != '%' {
                current.push(c);
                continue;
            }

            match chars.peek() {
                Some('%') => {
                    chars.next();
                    current.push('%');
                }
                Some('v' | 's') => {
                    chars.next();
                    slots += 1;
                }
                _ => current.push('%'),
            }
        }

        if slots != 1 {
            return Err(ResolveError::TemplateMismatch {
                template: source.to_string(),
                slots,
            });
        }

        Ok(Self {
            prefix,
            suffix,
            source: source.to_string(),
        })
    }

    /// Substitutes `subject` into the slot.
    pub fn render(&self, subject: &str) -> String {
        let mut out = String::with_capacity(self.prefix.len() + subject.len() + self.suffix.len());
        out.push_str(&self.prefix);
        out.push_str(subject);
        out.push_str(&self.suffix);
        out
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_single_slot() {
        let template = Template::parse("hello %v").unwrap();
        assert_eq!(template.render("world"), "hello world");

        let template = Template::parse("%s, see you soon").unwrap();
        assert_eq!(template.render("Ann"), "Ann, see you soon");
    }

    #[test]
    fn subject_is_not_reinterpreted() {
        let template = Template::parse("hello %v").unwrap();
        assert_eq!(template.render("%v"), "hello %v");
    }

    #[test]
    fn escaped_percent_is_literal() {
        let template = Template::parse("%v is 100%% done, 5%d").unwrap();
        assert_eq!(template.render("upload"), "upload is 100% done, 5%d");
    }

    #[test]
    fn trailing_percent_and_empty_subject() {
        let template = Template::parse("%v%").unwrap();
        assert_eq!(template.render("x"), "x%");

        let template = Template::parse("hello %v").unwrap();
        assert_eq!(template.render(""), "hello ");
    }

    #[test]
    fn rejects_zero_or_many_slots() {
        assert!(matches!(
            Template::parse(""),
            Err(ResolveError::TemplateMismatch { slots: 0, .. })
        ));
        assert!(matches!(
            Template::parse("hello"),
            Err(ResolveError::TemplateMismatch { slots: 0, .. })
        ));
        assert!(matches!(
            Template::parse("%v and %s"),
            Err(ResolveError::TemplateMismatch { slots: 2, .. })
        ));
        assert!(matches!(
            Template::parse("100%%v"),
            Err(ResolveError::TemplateMismatch { slots: 0, .. })
        ));
    }
}
