//! Document numbering: policies, period keys and deterministic formatting.
//!
//! Everything in this crate is pure. Reserving counter values (the only
//! side-effecting step of allocation) lives behind the `SequenceStore` trait
//! in `kontor-infra`.

pub mod number;
pub mod period;
pub mod policy;

pub use number::GeneratedNumber;
pub use period::PeriodKey;
pub use policy::{DocumentType, NumberingPolicy, ResetCadence};
