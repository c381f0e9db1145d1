//! Sales Orders domain module (event-sourced).
//!
//! This crate contains business rules for counter and prasadam sales orders,
//! implemented purely as deterministic domain logic (no IO, no HTTP, no storage).

pub mod order;

pub use order::{
    AddLine, CancelSalesOrder, ConfirmOrder, CreateSalesOrder, LineAdded, LineAmounts,
    MarkDelivered, OrderConfirmed, OrderDelivered, OrderLine, OrderTotals, SalesOrder,
    SalesOrderCancelled, SalesOrderCommand, SalesOrderCreated, SalesOrderEvent, SalesOrderId,
    SalesOrderStatus,
};
