//! Product catalog: raw materials, finished goods, consumables and services,
//! with their unit of measure and stock-tracking mode.

pub mod product;

pub use product::{
    ActivateProduct, ArchiveProduct, CreateProduct, Product, ProductActivated, ProductArchived,
    ProductCommand, ProductCreated, ProductEvent, ProductId, ProductKind, ProductStatus,
    TrackingMode,
};
