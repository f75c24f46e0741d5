use super::{CallHandler, CallInfo};
use prost_reflect::DynamicMessage;
use std::{sync::Arc, time::Instant};
use tonic::Status;

/// A step wrapped around every dispatched call.
///
/// Implementations either answer the call themselves or forward it with [`Next::run`].
pub trait Middleware: Send + Sync + 'static {
    fn call(
        &self,
        info: &CallInfo,
        request: DynamicMessage,
        next: Next<'_>,
    ) -> Result<DynamicMessage, Status>;
}

/// The remainder of the chain, ending with the handler.
pub struct Next<'a> {
    middlewares: &'a [Arc<dyn Middleware>],
    handler: &'a dyn CallHandler,
}

impl<'a> Next<'a> {
    pub(crate) fn new(middlewares: &'a [Arc<dyn Middleware>], handler: &'a dyn CallHandler) -> Self {
        Self {
            middlewares,
            handler,
        }
    }

    pub fn run(self, info: &CallInfo, request: DynamicMessage) -> Result<DynamicMessage, Status> {
        match self.middlewares.split_first() {
            Some((first, rest)) => first.call(info, request, Next::new(rest, self.handler)),
            None => self.handler.call(info, request),
        }
    }
}

/// Logs every call with its outcome and latency.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingMiddleware;

impl Middleware for LoggingMiddleware {
    fn call(
        &self,
        info: &CallInfo,
        request: DynamicMessage,
        next: Next<'_>,
    ) -> Result<DynamicMessage, Status> {
        let started = Instant::now();
        tracing::debug!(method = %info.full_name(), "call started");

        let result = next.run(info, request);
        let elapsed = started.elapsed();

        match &result {
            Ok(_) => tracing::info!(method = %info.full_name(), ?elapsed, "call succeeded"),
            Err(status) => tracing::warn!(
                method = %info.full_name(),
                ?elapsed,
                code = ?status.code(),
                message = status.message(),
                "call failed"
            ),
        }

        result
    }
}
