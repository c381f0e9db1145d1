//! `templeerp-core` provides domain building blocks shared by every bounded context.
//!
//! Pure domain primitives only: identifiers, the aggregate contract, the domain
//! error model and money/quantity helpers. No IO lives here.

pub mod aggregate;
pub mod error;
pub mod id;
pub mod money;

pub use aggregate::{Aggregate, AggregateRoot, ExpectedVersion};
pub use error::{DomainError, DomainResult};
pub use id::{AggregateId, TenantId, UserId};
pub use money::{extend, format_amount, percent_of, round_quantity};

pub use rust_decimal::Decimal;
