//! Change notifications
//!
//! The service broadcasts an event after each state change commits so a
//! UI layer can re-render without polling. Subscribers that fall behind
//! simply miss events (broadcast semantics); the registry remains the
//! source of truth.

/// A state change observable by subscribers
#[derive(Debug, Clone)]
pub enum ChangeEvent {
    /// A new record was added to the registry
    FileAdded { cid: String },
    /// Pin state changed after remote confirmation
    PinChanged { cid: String, pinned: bool },
    /// The local cache was purged
    CacheCleared,
}
