//! Data types for the event archiver
//!
//! Archived records are kept opaque; see [`Event`] for the few fields
//! the archiver reads.

mod event;

pub use event::{Event, IDENTITY_FIELD};
