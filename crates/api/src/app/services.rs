//! Infrastructure wiring: event store, bus, projections, worker, workflows.

use std::sync::Arc;

use anyhow::Context;
use serde_json::Value as JsonValue;
use sqlx::postgres::PgPoolOptions;

use templeerp_events::{EventEnvelope, InMemoryEventBus};
use templeerp_infra::{
    CommandDispatcher, EventStore, InMemoryEventStore, PostgresEventStore, ProjectionSet,
    ProjectionWorker, WorkerHandle, Workflows,
};

pub type SharedStore = Arc<dyn EventStore>;
pub type SharedBus = Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>;
pub type AppWorkflows = Workflows<SharedStore, SharedBus>;

/// Everything handlers need, shared behind an `Arc`.
pub struct AppServices {
    workflows: AppWorkflows,
    _worker: WorkerHandle,
}

impl AppServices {
    /// In-memory store (dev/test).
    pub fn in_memory() -> anyhow::Result<Self> {
        Self::wire(Arc::new(InMemoryEventStore::new()))
    }

    /// Postgres event store; read models are rebuilt by replaying every event.
    pub async fn persistent(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .context("failed to connect to DATABASE_URL")?;
        let store = PostgresEventStore::new(pool);
        store.ensure_schema().await?;
        Self::wire(Arc::new(store))
    }

    fn wire(store: SharedStore) -> anyhow::Result<Self> {
        let bus: SharedBus = Arc::new(InMemoryEventBus::new());
        let projections = Arc::new(ProjectionSet::new());

        let history = store.load_all()?;
        if !history.is_empty() {
            let replayed = projections.rebuild(history.iter().map(|e| e.to_envelope()))?;
            tracing::info!(events = replayed, "read models rebuilt from event store");
        }

        let worker = ProjectionWorker::spawn_projections(bus.clone(), projections.clone())
            .context("failed to spawn projection worker")?;
        let dispatcher = CommandDispatcher::new(store, bus);

        Ok(Self {
            workflows: Workflows::new(dispatcher, projections),
            _worker: worker,
        })
    }

    pub fn workflows(&self) -> &AppWorkflows {
        &self.workflows
    }

    pub fn projections(&self) -> &ProjectionSet {
        self.workflows.projections()
    }
}
