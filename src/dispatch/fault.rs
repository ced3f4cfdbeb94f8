//! Fault reporting for failed handlers.

use tracing::warn;

use crate::error::DispatchError;

/// Receives every handler failure. Shared by all chains in the process.
pub trait FaultSink: Send + Sync {
    fn report(&self, error: &DispatchError);
}

impl<F> FaultSink for F
where
    F: Fn(&DispatchError) + Send + Sync,
{
    fn report(&self, error: &DispatchError) {
        self(error)
    }
}

/// Default sink: one `warn` record per fault.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingFaultSink;

impl FaultSink for TracingFaultSink {
    fn report(&self, error: &DispatchError) {
        warn!(
            handler = error.handler,
            stage = %error.stage,
            code = error.source.error_code(),
            error = %error.source,
            "Handler failed"
        );
    }
}
