//! Retrieval orchestration

pub mod content;
pub mod events;
pub mod sources;

pub use content::{ConnectionState, ContentService};
pub use events::ChangeEvent;
pub use sources::{ByteSource, ClientSource};
