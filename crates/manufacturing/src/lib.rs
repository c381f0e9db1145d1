//! Manufacturing domain module (event-sourced).
//!
//! Bills of materials and manufacturing orders. Stock effects of an order
//! (reservation, consumption, finished-goods receipt) are carried out on the
//! warehouse aggregate by the workflows in `templeerp-infra`.

pub mod bom;
pub mod order;

pub use bom::{
    AddComponent, BomCommand, BomComponent, BomCreated, BomEvent, BomId, BomMaster,
    BomStatus, BomStatusChanged, ChangeBomStatus, ComponentAdded, ComponentRemoved, CreateBom,
    RemoveComponent, RequirementLine,
};
pub use order::{
    CancelOrder, CompleteOrder, CreateOrder, ManufacturingOrder, ManufacturingOrderId,
    OrderCancelled, OrderCommand, OrderCompleted, OrderCreated, OrderEvent, OrderStarted,
    OrderStatus, OrderValidated, StartOrder, ValidateOrder, production_unit_cost,
};
