//! Inkbound Runtime — engine ownership and command dispatch.
//!
//! [`bridge::EngineBridge`] is the sole owner of the live narrative engine;
//! [`dispatch::StoryStore`] interprets commands, mediating between the bridge
//! and the pure reducers in `inkbound-store`. Dispatch is single-threaded and
//! synchronous: every command, including commands a handler dispatches while
//! running, completes before control returns.

pub mod bridge;
pub mod dispatch;

pub use bridge::{BridgeError, EngineBridge, StorySnapshot, VariableChange};
pub use dispatch::{DispatchError, StoryStore};
