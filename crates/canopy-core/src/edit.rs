//! Generate-then-apply for one edit request.

use crate::change::{ChangeGenerationContext, ChangeSet, EditRequest, GenerationError, generate};
use crate::config::ChangeConfig;
use crate::document::{AppliedChangeSet, DocumentSink, SinkError};
use crate::error::ErrorCode;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EditError {
    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    Rejected(#[from] SinkError),
}

impl EditError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Generation(err) => err.code(),
            Self::Rejected(err) => err.code(),
        }
    }
}

/// A change set together with the sink's record of applying it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submitted {
    pub changes: ChangeSet,
    pub applied: AppliedChangeSet,
}

/// Snapshot `sink`, generate the change set for `request`, and apply it.
///
/// # Errors
///
/// [`EditError::Generation`] if no change set could be produced, in which
/// case the sink is never touched; [`EditError::Rejected`] if the sink
/// refused the set.
pub fn submit<S: DocumentSink>(
    request: &EditRequest,
    sink: &mut S,
    config: &ChangeConfig,
) -> Result<Submitted, EditError> {
    let snapshot = sink.snapshot();
    let changes = generate(request, ChangeGenerationContext::from_config(&snapshot, config))
        .inspect_err(|err| tracing::warn!(code = %err.code(), "generation failed: {err}"))?;
    let applied = sink.apply(&changes)?;
    tracing::info!(
        revision = applied.revision,
        events = applied.events.len(),
        "submitted edit"
    );
    Ok(Submitted { changes, applied })
}
