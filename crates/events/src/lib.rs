//! Domain events and their distribution mechanics.
//!
//! The payment poster (and invoice creation) publish envelopes here after a
//! successful commit; consumers (reporting, notification glue) subscribe.

pub mod bus;
pub mod envelope;
pub mod event;
pub mod in_memory_bus;

pub use bus::{EventBus, Subscription};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use in_memory_bus::InMemoryEventBus;
