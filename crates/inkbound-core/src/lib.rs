//! Inkbound Core — shared abstractions.
//!
//! This crate defines the types that every other inkbound crate depends on:
//! the persistent map/set primitives backing all slice state, the dynamic
//! [`value::Value`] type exchanged with the narrative engine, the
//! [`engine::StoryEngine`] port behind which the external engine lives, and
//! the injected [`ids::IdSource`] service. It contains no engine-specific or
//! store-specific logic.

pub mod engine;
pub mod error;
pub mod ids;
pub mod map;
pub mod set;
pub mod value;
