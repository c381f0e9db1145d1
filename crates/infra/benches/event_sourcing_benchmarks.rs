use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use templeerp_core::{ExpectedVersion, TenantId};
use templeerp_events::{EventEnvelope, InMemoryEventBus};
use templeerp_infra::command_dispatcher::CommandDispatcher;
use templeerp_infra::event_store::{EventStore, InMemoryEventStore, UncommittedEvent};
use templeerp_infra::projections::ProjectionSet;
use templeerp_infra::streams;
use templeerp_inventory::{
    CreateWarehouse, IssueStock, MovementType, ReceiveStock, StockReceived, Warehouse,
    WarehouseCommand, WarehouseCreated, WarehouseEvent, WarehouseId,
};
use templeerp_products::ProductId;

type Dispatcher =
    CommandDispatcher<InMemoryEventStore, Arc<InMemoryEventBus<EventEnvelope<serde_json::Value>>>>;

/// Naive CRUD simulation: a stock map updated in place (no events, no history).
#[derive(Debug, Clone)]
struct NaiveStockTable {
    inner: Arc<RwLock<HashMap<(TenantId, WarehouseId, ProductId), Decimal>>>,
}

impl NaiveStockTable {
    fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    fn receive(&self, tenant_id: TenantId, warehouse_id: WarehouseId, product_id: ProductId, quantity: Decimal) {
        let mut map = self.inner.write().unwrap();
        *map.entry((tenant_id, warehouse_id, product_id)).or_default() += quantity;
    }

    fn issue(&self, tenant_id: TenantId, warehouse_id: WarehouseId, product_id: ProductId, quantity: Decimal) -> Result<(), ()> {
        let mut map = self.inner.write().unwrap();
        match map.get_mut(&(tenant_id, warehouse_id, product_id)) {
            Some(on_hand) if *on_hand >= quantity => {
                *on_hand -= quantity;
                Ok(())
            }
            _ => Err(()),
        }
    }
}

fn setup() -> (Dispatcher, TenantId, WarehouseId) {
    let store = InMemoryEventStore::new();
    let bus = Arc::new(InMemoryEventBus::new());
    let dispatcher = CommandDispatcher::new(store, bus);
    let tenant_id = TenantId::new();
    let warehouse_id = WarehouseId::generate();
    create_warehouse(&dispatcher, tenant_id, warehouse_id);
    (dispatcher, tenant_id, warehouse_id)
}

fn create_warehouse(dispatcher: &Dispatcher, tenant_id: TenantId, warehouse_id: WarehouseId) {
    dispatcher
        .execute::<Warehouse>(
            tenant_id,
            warehouse_id.aggregate_id(),
            WarehouseCommand::CreateWarehouse(CreateWarehouse {
                tenant_id,
                warehouse_id,
                code: "MAIN".to_string(),
                name: "Main store".to_string(),
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();
}

fn receive(tenant_id: TenantId, warehouse_id: WarehouseId, product_id: ProductId, quantity: i64) -> WarehouseCommand {
    WarehouseCommand::ReceiveStock(ReceiveStock {
        tenant_id,
        warehouse_id,
        product_id,
        quantity: Decimal::from(quantity),
        unit_cost: 500,
        batch: None,
        serials: vec![],
        reference: "GRN-1".to_string(),
        movement_type: MovementType::PurchaseReceipt,
        occurred_at: Utc::now(),
    })
}

fn received_event(tenant_id: TenantId, warehouse_id: WarehouseId, product_id: ProductId, i: i64) -> WarehouseEvent {
    WarehouseEvent::StockReceived(StockReceived {
        tenant_id,
        warehouse_id,
        product_id,
        quantity: Decimal::from(i % 10 + 1),
        unit_cost: 100 + i,
        batch: None,
        serials: vec![],
        reference: format!("GRN-{i}"),
        movement_type: MovementType::Receipt,
        occurred_at: Utc::now(),
    })
}

fn bench_command_execution_latency(c: &mut Criterion) {
    let mut group = c.benchmark_group("command_execution_latency");
    group.sample_size(1000);

    group.bench_function("create_warehouse_fresh", |b| {
        let (dispatcher, tenant_id, _) = setup();
        b.iter(|| create_warehouse(&dispatcher, tenant_id, black_box(WarehouseId::generate())));
    });

    group.bench_function("receive_stock_with_history", |b| {
        let (dispatcher, tenant_id, warehouse_id) = setup();
        let product_id = ProductId::generate();
        b.iter(|| {
            dispatcher
                .execute::<Warehouse>(
                    tenant_id,
                    warehouse_id.aggregate_id(),
                    receive(tenant_id, warehouse_id, product_id, black_box(5)),
                )
                .unwrap();
        });
    });

    group.finish();
}

fn bench_event_append_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("event_append_throughput");

    for batch_size in [1, 10, 100, 1000].iter() {
        group.throughput(Throughput::Elements(*batch_size as u64));
        group.bench_with_input(
            BenchmarkId::new("batch_append", batch_size),
            batch_size,
            |b, &size| {
                let store = InMemoryEventStore::new();
                let tenant_id = TenantId::new();
                let warehouse_id = WarehouseId::generate();
                let product_id = ProductId::generate();

                b.iter(|| {
                    let events: Vec<UncommittedEvent> = (0..size)
                        .map(|i| {
                            UncommittedEvent::from_typed(
                                tenant_id,
                                warehouse_id.aggregate_id(),
                                streams::WAREHOUSE,
                                uuid::Uuid::now_v7(),
                                &received_event(tenant_id, warehouse_id, product_id, i),
                            )
                            .unwrap()
                        })
                        .collect();

                    black_box(store.append(events, ExpectedVersion::Any).unwrap());
                });
            },
        );
    }

    group.finish();
}

fn bench_projection_rebuild_speed(c: &mut Criterion) {
    let mut group = c.benchmark_group("projection_rebuild_speed");

    for event_count in [10, 100, 1000, 10000].iter() {
        group.bench_with_input(
            BenchmarkId::new("rebuild_from_events", event_count),
            event_count,
            |b, &count| {
                let store = InMemoryEventStore::new();
                let tenant_id = TenantId::new();
                let warehouse_id = WarehouseId::generate();
                let product_id = ProductId::generate();

                let mut events = vec![WarehouseEvent::WarehouseCreated(WarehouseCreated {
                    tenant_id,
                    warehouse_id,
                    code: "MAIN".to_string(),
                    name: "Main store".to_string(),
                    occurred_at: Utc::now(),
                })];
                events.extend((1..count).map(|i| received_event(tenant_id, warehouse_id, product_id, i)));

                let uncommitted: Vec<UncommittedEvent> = events
                    .iter()
                    .map(|event| {
                        UncommittedEvent::from_typed(
                            tenant_id,
                            warehouse_id.aggregate_id(),
                            streams::WAREHOUSE,
                            uuid::Uuid::now_v7(),
                            event,
                        )
                        .unwrap()
                    })
                    .collect();
                let envelopes: Vec<_> = store
                    .append(uncommitted, ExpectedVersion::Exact(0))
                    .unwrap()
                    .iter()
                    .map(|stored| stored.to_envelope())
                    .collect();

                let projections = ProjectionSet::new();
                b.iter(|| {
                    projections.rebuild(black_box(envelopes.clone())).unwrap();
                });
            },
        );
    }

    group.finish();
}

fn bench_event_sourcing_vs_naive_crud(c: &mut Criterion) {
    let mut group = c.benchmark_group("event_sourcing_vs_naive_crud");
    group.sample_size(1000);

    group.bench_function("event_sourcing_receive_and_issue", |b| {
        let (dispatcher, tenant_id, warehouse_id) = setup();
        let id = warehouse_id.aggregate_id();

        b.iter(|| {
            let product_id = ProductId::generate();
            dispatcher
                .execute::<Warehouse>(tenant_id, id, receive(tenant_id, warehouse_id, product_id, 10))
                .unwrap();
            dispatcher
                .execute::<Warehouse>(
                    tenant_id,
                    id,
                    WarehouseCommand::IssueStock(IssueStock {
                        tenant_id,
                        warehouse_id,
                        product_id,
                        quantity: Decimal::from(4),
                        serials: vec![],
                        reference: "SO-1".to_string(),
                        movement_type: MovementType::SalesIssue,
                        occurred_at: Utc::now(),
                    }),
                )
                .unwrap();
        });
    });

    group.bench_function("naive_crud_receive_and_issue", |b| {
        let table = NaiveStockTable::new();
        let tenant_id = TenantId::new();
        let warehouse_id = WarehouseId::generate();

        b.iter(|| {
            let product_id = ProductId::generate();
            table.receive(tenant_id, warehouse_id, product_id, Decimal::from(10));
            table.issue(tenant_id, warehouse_id, product_id, Decimal::from(4)).unwrap();
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_command_execution_latency,
    bench_event_append_throughput,
    bench_projection_rebuild_speed,
    bench_event_sourcing_vs_naive_crud
);
criterion_main!(benches);
