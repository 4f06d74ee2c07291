//! Shared test doubles for the inkbound crates.

mod engine;
mod ids;

pub use engine::{EngineProbe, ScriptedCompiler, ScriptedEngine, ScriptedStep};
pub use ids::SequenceIds;
