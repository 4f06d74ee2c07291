//! The engine bridge: exclusive owner of the live narrative engine.
//!
//! At most one engine is live at a time, enforced by clearing before setting.
//! Nothing outside this module touches the engine; slice state is projected
//! from it by the dispatcher through [`EngineBridge::snapshot`] and the
//! variable-change queue.
//!
//! The engine invokes variable observers synchronously from inside
//! `advance`/`choose_choice_index`. The bridge registers one queue-writing
//! observer per observed name; the dispatcher drains the queue with
//! [`EngineBridge::drain_variable_changes`] right after each engine call, so
//! observations re-enter dispatch before the triggering handler proceeds.

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use inkbound_core::engine::{EngineChoice, ExternalFunction, StoryEngine, VariableObserver};
use inkbound_core::error::EngineError;
use inkbound_core::value::Value;
use thiserror::Error;
use tracing::warn;

/// A failed bridge operation. Logged and absorbed at the dispatch boundary;
/// never allowed to corrupt store state.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The operation requires a live engine and none is loaded.
    #[error("no story is loaded (operation: {0})")]
    NoStory(&'static str),

    /// A bind was attempted for a name that is already bound.
    #[error("external function '{0}' is already bound")]
    AlreadyBound(String),

    /// The engine itself reported an error.
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// An engine-side variable write observed since the last drain.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableChange {
    /// The variable name.
    pub name: String,
    /// The value the engine wrote.
    pub value: Value,
}

/// A one-pass plain-value read of the engine's current state.
#[derive(Debug, Clone, PartialEq)]
pub struct StorySnapshot {
    /// Whether the story can continue.
    pub can_continue: bool,
    /// The most recently emitted text, empty when none.
    pub text: String,
    /// Tags attached to the emitted text.
    pub tags: Vec<String>,
    /// Errors the engine accumulated.
    pub errors: Vec<String>,
    /// The currently selectable choices.
    pub choices: Vec<EngineChoice>,
}

/// Owns the live engine instance (or none) and guards every operation on it.
#[derive(Default)]
pub struct EngineBridge {
    engine: Option<Box<dyn StoryEngine>>,
    bound_functions: HashSet<String>,
    pending_changes: Rc<RefCell<Vec<VariableChange>>>,
}

impl EngineBridge {
    /// A bridge with no engine loaded.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether an engine is currently loaded.
    #[must_use]
    pub fn has_engine(&self) -> bool {
        self.engine.is_some()
    }

    /// Whether `name` is a currently bound external function.
    #[must_use]
    pub fn is_bound(&self, name: &str) -> bool {
        self.bound_functions.contains(name)
    }

    /// Adopts `engine`, clearing any previously live engine first.
    pub fn set_engine(&mut self, engine: Box<dyn StoryEngine>) {
        self.clear_engine();
        self.engine = Some(engine);
    }

    /// Unbinds every bound external function, removes the variable observer,
    /// and drops the engine along with any undrained changes. Idempotent.
    pub fn clear_engine(&mut self) {
        if let Some(engine) = self.engine.as_deref_mut() {
            for name in &self.bound_functions {
                if let Err(error) = engine.unbind_external_function(name) {
                    warn!(function = %name, %error, "failed to unbind while clearing engine");
                }
            }
            if let Err(error) = engine.remove_variable_observer(None) {
                warn!(%error, "failed to remove variable observer while clearing engine");
            }
        }
        self.engine = None;
        self.bound_functions.clear();
        self.pending_changes.borrow_mut().clear();
    }

    /// Registers interest in engine-side writes to `name`; they surface via
    /// [`EngineBridge::drain_variable_changes`].
    ///
    /// # Errors
    ///
    /// Fails when no engine is loaded or the engine rejects the name.
    pub fn observe_variable(&mut self, name: &str) -> Result<(), BridgeError> {
        let sink = Rc::clone(&self.pending_changes);
        let observer: VariableObserver = Rc::new(move |name, value| {
            sink.borrow_mut().push(VariableChange {
                name: name.to_owned(),
                value: value.clone(),
            });
        });
        self.engine_mut("observe_variable")?
            .observe_variable(name, observer)?;
        Ok(())
    }

    /// Removes interest in engine-side writes to `name`.
    ///
    /// # Errors
    ///
    /// Fails when no engine is loaded or the engine rejects the removal.
    pub fn stop_observing_variable(&mut self, name: &str) -> Result<(), BridgeError> {
        self.engine_mut("stop_observing_variable")?
            .remove_variable_observer(Some(name))?;
        Ok(())
    }

    /// Reads the current value of the named engine variable.
    ///
    /// # Errors
    ///
    /// Fails when no engine is loaded or the name is undeclared.
    pub fn variable(&self, name: &str) -> Result<Value, BridgeError> {
        Ok(self.engine_ref("get_variable")?.variable(name)?)
    }

    /// Writes the named engine variable.
    ///
    /// # Errors
    ///
    /// Fails when no engine is loaded, the name is undeclared, or the value
    /// is incompatible with the variable's declared type.
    pub fn set_variable(&mut self, name: &str, value: Value) -> Result<(), BridgeError> {
        self.engine_mut("set_variable")?.set_variable(name, value)?;
        Ok(())
    }

    /// Binds `function` under `name`. A name must be unbound before it can
    /// be bound again; an engine-side binding failure leaves the name
    /// unregistered.
    ///
    /// # Errors
    ///
    /// Fails when no engine is loaded, the name is already bound, or the
    /// engine rejects the binding.
    pub fn bind_external_function(
        &mut self,
        name: &str,
        function: ExternalFunction,
        lookahead_safe: bool,
    ) -> Result<(), BridgeError> {
        if self.bound_functions.contains(name) {
            return Err(BridgeError::AlreadyBound(name.to_owned()));
        }
        self.engine_mut("bind_external_function")?
            .bind_external_function(name, function, lookahead_safe)?;
        self.bound_functions.insert(name.to_owned());
        Ok(())
    }

    /// Unbinds `name`. Unbinding a name that is not bound is a silent no-op;
    /// an engine-side failure is logged but the registry entry is dropped
    /// regardless.
    ///
    /// # Errors
    ///
    /// Fails when no engine is loaded.
    pub fn unbind_external_function(&mut self, name: &str) -> Result<(), BridgeError> {
        if !self.bound_functions.contains(name) {
            return Ok(());
        }
        let engine = self.engine_mut("unbind_external_function")?;
        if let Err(error) = engine.unbind_external_function(name) {
            warn!(function = %name, %error, "engine failed to unbind");
        }
        self.bound_functions.remove(name);
        Ok(())
    }

    /// Advances the engine one step. Warns — but still forwards the call —
    /// when the engine reports it cannot continue.
    ///
    /// # Errors
    ///
    /// Fails when no engine is loaded or the engine cannot evaluate.
    pub fn advance(&mut self) -> Result<(), BridgeError> {
        let engine = self.engine_mut("continue_story")?;
        if !engine.can_continue() {
            warn!("advancing a story that reports it cannot continue");
        }
        engine.advance()?;
        Ok(())
    }

    /// Selects a choice by its engine-native index. No bounds validation
    /// here — the dispatcher resolves logical references beforehand.
    ///
    /// # Errors
    ///
    /// Fails when no engine is loaded or the engine rejects the index.
    pub fn choose_choice_index(&mut self, index: usize) -> Result<(), BridgeError> {
        self.engine_mut("choose_choice_index")?
            .choose_choice_index(index)?;
        Ok(())
    }

    /// Reads continuability, text, tags, errors, and choices in one pass.
    ///
    /// # Errors
    ///
    /// Fails when no engine is loaded.
    pub fn snapshot(&self) -> Result<StorySnapshot, BridgeError> {
        let engine = self.engine_ref("snapshot")?;
        Ok(StorySnapshot {
            can_continue: engine.can_continue(),
            text: engine.current_text().unwrap_or_default(),
            tags: engine.current_tags().unwrap_or_default(),
            errors: engine.current_errors().unwrap_or_default(),
            choices: engine.current_choices(),
        })
    }

    /// Returns and clears the variable writes observed since the last drain.
    pub fn drain_variable_changes(&mut self) -> Vec<VariableChange> {
        std::mem::take(&mut *self.pending_changes.borrow_mut())
    }

    fn engine_ref(&self, operation: &'static str) -> Result<&dyn StoryEngine, BridgeError> {
        self.engine.as_deref().ok_or(BridgeError::NoStory(operation))
    }

    fn engine_mut(
        &mut self,
        operation: &'static str,
    ) -> Result<&mut dyn StoryEngine, BridgeError> {
        self.engine
            .as_deref_mut()
            .ok_or(BridgeError::NoStory(operation))
    }
}
