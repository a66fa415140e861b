//! # Argus Core — shared platform infrastructure
//!
//! Everything the assessment crates link against: the error taxonomy, the
//! per-document store that gives each root aggregate serialized
//! read-modify-write semantics, the platform event bus, LZ4 helpers for
//! audit/cold data, and the frozen STRIDE classification tables.

pub mod compression;
pub mod error;
pub mod event_bus;
pub mod store;
pub mod stride;

pub use error::{ArgusError, ArgusResult};
pub use event_bus::{EventBus, EventCategory, EventSeverity, PlatformEvent};
pub use store::DocumentStore;
