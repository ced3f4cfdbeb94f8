//! Raw numeric to SASL reply translation.

use super::handler::{DispatchContext, Flow, Handler};
use crate::error::HandlerResult;
use crate::event::{Event, EventKind, SaslReply};

/// Substitutes numerics 900-908 with [`EventKind::Sasl`] events.
///
/// Register it ahead of anything that consumes SASL replies. The substitute
/// keeps the source prefix and raw line of the numeric it replaces.
#[derive(Debug, Default, Clone, Copy)]
pub struct NumericTranslator;

impl Handler for NumericTranslator {
    fn name(&self) -> &'static str {
        "numeric-translator"
    }

    fn on_numeric(&self, event: Event, ctx: &mut DispatchContext<'_>) -> HandlerResult {
        let EventKind::Numeric { code, params } = event.kind() else {
            return Ok(Flow::Forward(event));
        };
        let Some(reply) = SaslReply::from_numeric(*code, params) else {
            return Ok(Flow::Forward(event));
        };

        let text = if params.len() > 1 {
            params.last().cloned()
        } else {
            None
        };
        let mut builder = ctx.factory().inbound(EventKind::Sasl { reply, text });
        if let Some(source) = event.source() {
            builder = builder.source(source);
        }
        if let Some(raw) = event.raw() {
            builder = builder.raw(raw);
        }
        Ok(Flow::Forward(builder.finish()?))
    }
}
