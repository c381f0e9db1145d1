//! Infrastructure layer: event store, dispatch, projections and workflows.

pub mod command_dispatcher;
pub mod event_store;
pub mod projections;
pub mod read_model;
pub mod streams;
pub mod workers;
pub mod workflows;

pub use command_dispatcher::{CommandDispatcher, DispatchError};
pub use event_store::{
    EventStore, EventStoreError, InMemoryEventStore, PostgresEventStore, StoredEvent,
    UncommittedEvent,
};
pub use projections::{ProjectionError, ProjectionSet};
pub use streams::{StreamAggregate, StreamEvent};
pub use workers::{ProjectionWorker, WorkerHandle, WorkerStats};
pub use workflows::{WorkflowError, Workflows};
