//! # Response Resolver
//!
//! The business logic of the dynamic server: every method is answered by a format
//! [`Template`] with a single slot, filled with one field extracted from the request.
//!
//! [`ResponseRules`] is built once at startup and never mutated afterwards, so it can be shared
//! between concurrent calls without any locking. [`Resolver`] plugs it into the dispatcher as
//! a [`CallHandler`].
mod template;

pub use template::Template;

use crate::{
    config::RulesConfig,
    dispatch::{CallHandler, CallInfo},
    message::{self, MessageError},
};
use prost_reflect::{DynamicMessage, ReflectMessage, Value};
use std::{collections::HashMap, sync::Arc};
use tonic::Status;

#[derive(thiserror::Error, Debug)]
pub enum ResolveError {
    #[error("No response rule for method '{0}'")]
    UnknownMethod(String),
    #[error("Message '{message}' has no field '{field}'")]
    MissingField { message: String, field: String },
    #[error("Field '{field}' of '{message}' cannot be rendered as text")]
    UnsupportedField { message: String, field: String },
    #[error("Template '{template}' must have exactly one slot, found {slots}")]
    TemplateMismatch { template: String, slots: usize },
    #[error(transparent)]
    Message(#[from] MessageError),
}

impl From<ResolveError> for Status {
    fn from(err: ResolveError) -> Self {
        match &err {
            ResolveError::UnknownMethod(_) => Status::unimplemented(err.to_string()),
            ResolveError::MissingField { .. } | ResolveError::UnsupportedField { .. } => {
                Status::failed_precondition(err.to_string())
            }
            ResolveError::TemplateMismatch { .. } => Status::internal(err.to_string()),
            ResolveError::Message(_) => Status::invalid_argument(err.to_string()),
        }
    }
}

/// Method name to response template mapping.
#[derive(Debug, Clone, Default)]
pub struct ResponseRules {
    templates: HashMap<String, Template>,
}

impl ResponseRules {
    /// Parses every template up-front; a single invalid one rejects the whole set.
    pub fn new<I, K, V>(rules: I) -> Result<Self, ResolveError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: AsRef<str>,
    {
        let templates = rules
            .into_iter()
            .map(|(method, template)| Ok((method.into(), Template::parse(template.as_ref())?)))
            .collect::<Result<_, ResolveError>>()?;

        Ok(Self { templates })
    }

    pub fn from_config(config: &RulesConfig) -> Result<Self, ResolveError> {
        Self::new(&config.rules)
    }

    pub fn lookup(&self, method: &str) -> Option<&Template> {
        self.templates.get(method)
    }

    /// Formats the response text of `method` around `subject`.
    pub fn resolve(&self, method: &str, subject: &str) -> Result<String, ResolveError> {
        self.lookup(method)
            .map(|template| template.render(subject))
            .ok_or_else(|| ResolveError::UnknownMethod(method.to_string()))
    }

    /// Finds the template of a dispatched call: by fully-qualified name first,
    /// then by `Service.Method`.
    pub fn template_for(&self, info: &CallInfo) -> Result<&Template, ResolveError> {
        self.lookup(info.full_name())
            .or_else(|| self.lookup(info.short_name()))
            .ok_or_else(|| ResolveError::UnknownMethod(info.full_name().to_string()))
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

/// Answers calls by rendering the method's template with one request field
/// and writing the result into one response field.
#[derive(Debug, Clone)]
pub struct Resolver {
    rules: Arc<ResponseRules>,
    request_field: String,
    response_field: String,
}

impl Resolver {
    pub fn new(
        rules: Arc<ResponseRules>,
        request_field: impl Into<String>,
        response_field: impl Into<String>,
    ) -> Self {
        Self {
            rules,
            request_field: request_field.into(),
            response_field: response_field.into(),
        }
    }

    pub fn from_config(config: &RulesConfig) -> Result<Self, ResolveError> {
        let rules = ResponseRules::from_config(config)?;
        Ok(Self::new(
            Arc::new(rules),
            &config.request_field,
            &config.response_field,
        ))
    }

    pub fn rules(&self) -> &ResponseRules {
        &self.rules
    }

    /// Builds the response of a call. Nothing is produced unless every step succeeds.
    pub fn resolve(
        &self,
        info: &CallInfo,
        request: &DynamicMessage,
    ) -> Result<DynamicMessage, ResolveError> {
        let template = self.rules.template_for(info)?;

        let subject = message::get_field(request, &self.request_field).map_err(|err| {
            match err {
                MessageError::UnknownField { message, field } => {
                    ResolveError::MissingField { message, field }
                }
                other => ResolveError::Message(other),
            }
        })?;

        let subject =
            message::display_value(&subject).ok_or_else(|| ResolveError::UnsupportedField {
                message: request.descriptor().full_name().to_string(),
                field: self.request_field.clone(),
            })?;

        let mut response = message::new_message(info.method().output());
        let text = Value::String(template.render(&subject));

        message::set_field(&mut response, &self.response_field, text).map_err(|err| match err {
            MessageError::UnknownField { message, field } => {
                ResolveError::MissingField { message, field }
            }
            other => ResolveError::Message(other),
        })?;

        Ok(response)
    }
}

impl CallHandler for Resolver {
    fn call(&self, info: &CallInfo, request: DynamicMessage) -> Result<DynamicMessage, Status> {
        Ok(self.resolve(info, &request)?)
    }
}
