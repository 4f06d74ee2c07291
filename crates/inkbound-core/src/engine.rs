//! The narrative-engine port.
//!
//! The engine itself (script compilation, flow evaluation, variable storage)
//! is an external collaborator. This module defines the surface inkbound
//! consumes: a mutable instance behind [`StoryEngine`] and a compiler behind
//! [`StoryCompiler`]. Dispatch is single-threaded and synchronous, so shared
//! callables use [`Rc`] and no method suspends.

use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::value::Value;

/// Callback invoked by the engine when an observed variable changes.
/// Fires synchronously from within `advance`/`choose_choice_index`.
pub type VariableObserver = Rc<dyn Fn(&str, &Value)>;

/// A host function callable from story scripts. Receives the evaluated
/// arguments and may return a value to the script.
pub type ExternalFunction = Rc<dyn Fn(&[Value]) -> Option<Value>>;

/// One selectable choice as the engine reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineChoice {
    /// The engine-native choice index.
    pub index: usize,
    /// The choice's display text.
    pub text: String,
    /// Whether the engine marks this as an invisible default choice.
    pub is_invisible_default: bool,
}

/// A live narrative-engine instance.
///
/// The readable surface (`can_continue`, `current_*`) reflects the state
/// after the most recent `advance`/`choose_choice_index` call.
pub trait StoryEngine {
    /// Whether the story has more content on the current branch.
    fn can_continue(&self) -> bool;

    /// The text emitted by the most recent advance, if any.
    fn current_text(&self) -> Option<String>;

    /// Tags attached to the most recent emitted text.
    fn current_tags(&self) -> Option<Vec<String>>;

    /// Errors the engine accumulated while evaluating, if any.
    fn current_errors(&self) -> Option<Vec<String>>;

    /// The currently selectable choices.
    fn current_choices(&self) -> Vec<EngineChoice>;

    /// Advances the story one step, emitting the next block of text.
    ///
    /// # Errors
    ///
    /// Returns an error when the engine cannot evaluate further.
    fn advance(&mut self) -> Result<(), EngineError>;

    /// Selects the choice with the given engine-native index.
    ///
    /// # Errors
    ///
    /// Returns an error when the index does not name a current choice.
    fn choose_choice_index(&mut self, index: usize) -> Result<(), EngineError>;

    /// Registers `observer` for engine-side writes to `name`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UndeclaredVariable`] when the story does not
    /// declare `name`.
    fn observe_variable(
        &mut self,
        name: &str,
        observer: VariableObserver,
    ) -> Result<(), EngineError>;

    /// Removes observers for `name`, or all observers when `name` is `None`.
    ///
    /// # Errors
    ///
    /// Returns an error when removal fails inside the engine.
    fn remove_variable_observer(&mut self, name: Option<&str>) -> Result<(), EngineError>;

    /// Makes `function` callable from scripts under `name`. A lookahead-safe
    /// function may be speculatively invoked while the engine evaluates
    /// ahead of the visible story position.
    ///
    /// # Errors
    ///
    /// Returns an error when the engine rejects the binding.
    fn bind_external_function(
        &mut self,
        name: &str,
        function: ExternalFunction,
        lookahead_safe: bool,
    ) -> Result<(), EngineError>;

    /// Removes the script binding for `name`.
    ///
    /// # Errors
    ///
    /// Returns an error when `name` is not bound in the engine.
    fn unbind_external_function(&mut self, name: &str) -> Result<(), EngineError>;

    /// Reads the current value of the named variable.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UndeclaredVariable`] for unknown names.
    fn variable(&self, name: &str) -> Result<Value, EngineError>;

    /// Writes the named variable.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UndeclaredVariable`] for unknown names and
    /// [`EngineError::InvalidValue`] for values the variable's declared type
    /// rejects.
    fn set_variable(&mut self, name: &str, value: Value) -> Result<(), EngineError>;
}

/// Compiles serialized script text into a live engine instance.
pub trait StoryCompiler {
    /// Compiles `source`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidScript`] for malformed input.
    fn compile(&self, source: &str) -> Result<Box<dyn StoryEngine>, EngineError>;
}
