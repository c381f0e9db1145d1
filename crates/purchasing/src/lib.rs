//! Purchasing domain module (Purchase Orders and goods receipts, event-sourced).
//!
//! This crate contains business rules for purchase orders, implemented purely as
//! deterministic domain logic (no IO, no HTTP, no storage).

pub mod order;

pub use order::{
    AddLine, Approve, CancelPurchaseOrder, CreatePurchaseOrder, GoodsReceived, GrnLine, LineItem,
    PurchaseOrder, PurchaseOrderApproved, PurchaseOrderCancelled, PurchaseOrderCommand,
    PurchaseOrderCreated, PurchaseOrderEvent, PurchaseOrderId, PurchaseOrderLineAdded,
    PurchaseOrderStatus, ReceiveGoods, ReceivedLine,
};
