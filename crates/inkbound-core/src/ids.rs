//! Unique-id service abstraction.
//!
//! Narrations and choices receive opaque ids when the caller supplies none.
//! Generation sits behind a trait so tests can inject a deterministic source.

use uuid::Uuid;

/// Abstraction over unique-id generation.
pub trait IdSource {
    /// Returns a fresh opaque id.
    fn generate(&self) -> String;
}

/// Production id source backed by random UUIDs.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidIdSource;

impl IdSource for UuidIdSource {
    fn generate(&self) -> String {
        Uuid::new_v4().to_string()
    }
}
