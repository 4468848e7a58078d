//! `kontor-core` — domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! identifiers, fixed-point money, the domain error taxonomy and
//! optimistic-versioning helpers. Time is never read ambiently; operations
//! take explicit `DateTime<Utc>` arguments.

pub mod aggregate;
pub mod error;
pub mod id;
pub mod money;

pub use aggregate::{Aggregate, AggregateRoot, ExpectedVersion};
pub use error::{DomainError, DomainResult};
pub use id::{AggregateId, OrganizationId};
pub use money::{Money, Rounding, RoundingMode};
