//! Multi-aggregate workflows.
//!
//! Every step is a separate dispatch with its own optimistic concurrency
//! check; there is no cross-stream transaction. Steps are ordered so that the
//! stream most likely to reject (stock, years) goes first, and a failure after
//! an earlier step committed is either compensated or reported as
//! [`WorkflowError::Incomplete`].
//!
//! Committed events are applied to the in-process projections right away so a
//! caller reads its own writes. The projection worker delivers the same
//! envelopes again later; cursors make that a no-op.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::debug;

use templeerp_core::{AggregateId, DomainError, TenantId};
use templeerp_events::{Event, EventBus, EventEnvelope};

use crate::command_dispatcher::{CommandDispatcher, DispatchError};
use crate::event_store::{EventStore, StoredEvent};
use crate::projections::ProjectionSet;
use crate::streams::StreamAggregate;

pub mod accounting;
pub mod manufacturing;
pub mod purchasing;
pub mod sales;
pub mod stock;

pub use accounting::CloseYear;
pub use manufacturing::NewManufacturingOrder;

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    /// A later step failed after earlier steps were committed.
    #[error("step `{step}` failed after earlier steps were committed: {source}")]
    Incomplete {
        step: &'static str,
        #[source]
        source: DispatchError,
    },
}

impl WorkflowError {
    /// Relabel a dispatch failure of a step that ran after earlier commits.
    pub(crate) fn after_commit(step: &'static str, err: WorkflowError) -> Self {
        match err {
            WorkflowError::Dispatch(source) => WorkflowError::Incomplete { step, source },
            other => other,
        }
    }
}

impl From<DomainError> for WorkflowError {
    fn from(err: DomainError) -> Self {
        WorkflowError::Dispatch(DispatchError::from(err))
    }
}

/// Command side of the application: dispatcher plus the read models workflows
/// consult.
#[derive(Debug)]
pub struct Workflows<S, B> {
    dispatcher: CommandDispatcher<S, B>,
    projections: Arc<ProjectionSet>,
}

impl<S, B> Workflows<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    pub fn new(dispatcher: CommandDispatcher<S, B>, projections: Arc<ProjectionSet>) -> Self {
        Self {
            dispatcher,
            projections,
        }
    }

    pub fn dispatcher(&self) -> &CommandDispatcher<S, B> {
        &self.dispatcher
    }

    pub fn projections(&self) -> &Arc<ProjectionSet> {
        &self.projections
    }

    /// Dispatch one command and fold the committed events into the read models.
    pub fn execute<A>(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        command: A::Command,
    ) -> Result<Vec<StoredEvent>, WorkflowError>
    where
        A: StreamAggregate,
        A::Event: Event + Serialize + DeserializeOwned,
    {
        let committed = self.dispatcher.execute::<A>(tenant_id, aggregate_id, command)?;
        self.observe(&committed);
        Ok(committed)
    }

    /// Current state straight from the event store; `what` names it in errors.
    pub fn fetch<A>(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        what: &'static str,
    ) -> Result<A, WorkflowError>
    where
        A: StreamAggregate,
        A::Event: DeserializeOwned,
    {
        match self.dispatcher.fetch::<A>(tenant_id, aggregate_id) {
            Ok(aggregate) => Ok(aggregate),
            Err(DispatchError::NotFound) => Err(WorkflowError::NotFound(what)),
            Err(err) => Err(err.into()),
        }
    }

    fn observe(&self, committed: &[StoredEvent]) {
        for stored in committed {
            if let Err(err) = self.projections.apply_envelope(&stored.to_envelope()) {
                // The worker retries on its own delivery of the same envelope.
                debug!(error = %err, sequence = stored.sequence_number, "deferred projection update");
            }
        }
    }
}
