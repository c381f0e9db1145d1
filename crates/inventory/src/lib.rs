//! Inventory domain module (event-sourced).
//!
//! A warehouse owns the stock of every product it holds: on-hand quantity,
//! reservations, expiry-ordered batches and serial numbers. Pure domain logic only.

pub mod warehouse;

pub use warehouse::{
    AdjustStock, BatchDraw, BatchLot, BatchReceipt, ConsumeReservation, CreateWarehouse,
    IssueStock, MovementType, ProductStock, ProductionOutput, ReceiveStock, ReleaseReservation,
    ReservationConsumed, ReservationLine, ReservationReleased, ReserveStock, StockAdjusted,
    StockDraw, StockIssued, StockReceived, StockReserved, Warehouse, WarehouseCommand,
    WarehouseCreated, WarehouseEvent, WarehouseId,
};
