//! Test engine — a scripted `StoryEngine` implementation for tests.
//!
//! The engine walks a predefined list of steps. Each `advance` consumes one
//! step: it applies the step's variable writes (firing any observers), emits
//! the step's text/tags/errors, and — when the step carries choices — blocks
//! further continuation until one is chosen. A shared [`EngineProbe`] records
//! every call so tests can assert on what reached the engine.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use inkbound_core::engine::{
    EngineChoice, ExternalFunction, StoryCompiler, StoryEngine, VariableObserver,
};
use inkbound_core::error::EngineError;
use inkbound_core::value::Value;

/// One unit of scripted story content.
#[derive(Clone, Default)]
pub struct ScriptedStep {
    /// Text emitted when this step is reached.
    pub text: String,
    /// Tags attached to the text.
    pub tags: Vec<String>,
    /// Errors the engine reports alongside this step.
    pub errors: Vec<String>,
    /// Choices presented after this step; non-empty blocks continuation.
    pub choices: Vec<EngineChoice>,
    /// Variable writes applied while evaluating this step.
    pub writes: Vec<(String, Value)>,
    /// External functions invoked while evaluating this step.
    pub calls: Vec<(String, Vec<Value>)>,
}

impl ScriptedStep {
    /// A step that only emits `text`.
    #[must_use]
    pub fn text(text: &str) -> Self {
        Self {
            text: text.to_owned(),
            ..Self::default()
        }
    }

    /// Attaches a tag.
    #[must_use]
    pub fn with_tag(mut self, tag: &str) -> Self {
        self.tags.push(tag.to_owned());
        self
    }

    /// Attaches an engine-reported error.
    #[must_use]
    pub fn with_error(mut self, error: &str) -> Self {
        self.errors.push(error.to_owned());
        self
    }

    /// Presents a choice after this step.
    #[must_use]
    pub fn with_choice(mut self, index: usize, text: &str) -> Self {
        self.choices.push(EngineChoice {
            index,
            text: text.to_owned(),
            is_invisible_default: false,
        });
        self
    }

    /// Writes a variable while evaluating this step.
    #[must_use]
    pub fn with_write(mut self, name: &str, value: Value) -> Self {
        self.writes.push((name.to_owned(), value));
        self
    }

    /// Invokes a bound external function while evaluating this step.
    #[must_use]
    pub fn with_call(mut self, name: &str, args: Vec<Value>) -> Self {
        self.calls.push((name.to_owned(), args));
        self
    }
}

#[derive(Default)]
struct ProbeState {
    advances: usize,
    chosen_indices: Vec<usize>,
    bound: Vec<(String, bool)>,
    unbound: Vec<String>,
    observed: Vec<String>,
}

/// A shared recording handle onto a [`ScriptedEngine`]. Stays valid after
/// the engine is boxed and moved into the system under test.
#[derive(Clone, Default)]
pub struct EngineProbe {
    state: Rc<RefCell<ProbeState>>,
}

impl EngineProbe {
    /// How many `advance` calls reached the engine.
    #[must_use]
    pub fn advance_count(&self) -> usize {
        self.state.borrow().advances
    }

    /// Engine-native indices passed to `choose_choice_index`, in order.
    #[must_use]
    pub fn chosen_indices(&self) -> Vec<usize> {
        self.state.borrow().chosen_indices.clone()
    }

    /// `(name, lookahead_safe)` pairs passed to `bind_external_function`.
    #[must_use]
    pub fn bound_functions(&self) -> Vec<(String, bool)> {
        self.state.borrow().bound.clone()
    }

    /// Names passed to `unbind_external_function`, in order.
    #[must_use]
    pub fn unbound_functions(&self) -> Vec<String> {
        self.state.borrow().unbound.clone()
    }

    /// Names passed to `observe_variable`, in order.
    #[must_use]
    pub fn observed_variables(&self) -> Vec<String> {
        self.state.borrow().observed.clone()
    }
}

/// A `StoryEngine` driven by a predefined step list.
pub struct ScriptedEngine {
    steps: Vec<ScriptedStep>,
    cursor: usize,
    awaiting_choice: bool,
    variables: HashMap<String, Value>,
    observers: HashMap<String, Vec<VariableObserver>>,
    functions: HashMap<String, (ExternalFunction, bool)>,
    rejected_bindings: Vec<String>,
    probe: EngineProbe,
}

impl ScriptedEngine {
    /// Builds an engine that will play `steps` in order.
    #[must_use]
    pub fn new(steps: Vec<ScriptedStep>) -> Self {
        Self {
            steps,
            cursor: 0,
            awaiting_choice: false,
            variables: HashMap::new(),
            observers: HashMap::new(),
            functions: HashMap::new(),
            rejected_bindings: Vec::new(),
            probe: EngineProbe::default(),
        }
    }

    /// Declares a variable with an initial value. Writes that change the
    /// value's type are rejected with `InvalidValue`, like a typed story
    /// variable would.
    #[must_use]
    pub fn with_variable(mut self, name: &str, value: Value) -> Self {
        self.variables.insert(name.to_owned(), value);
        self
    }

    /// Makes `bind_external_function` fail for `name`, for testing the
    /// binding error path.
    #[must_use]
    pub fn rejecting_binding(mut self, name: &str) -> Self {
        self.rejected_bindings.push(name.to_owned());
        self
    }

    /// Returns the recording handle. Clone it before boxing the engine.
    #[must_use]
    pub fn probe(&self) -> EngineProbe {
        self.probe.clone()
    }

    fn last_step(&self) -> Option<&ScriptedStep> {
        self.cursor.checked_sub(1).map(|i| &self.steps[i])
    }

    fn notify(&self, name: &str, value: &Value) {
        if let Some(observers) = self.observers.get(name) {
            for observer in observers {
                observer(name, value);
            }
        }
    }

    fn write_variable(&mut self, name: &str, value: Value) {
        self.variables.insert(name.to_owned(), value.clone());
        self.notify(name, &value);
    }

    fn same_kind(a: &Value, b: &Value) -> bool {
        matches!(
            (a, b),
            (Value::Bool(_), Value::Bool(_))
                | (Value::Int(_), Value::Int(_))
                | (Value::Float(_), Value::Float(_))
                | (Value::Str(_), Value::Str(_))
        )
    }
}

impl StoryEngine for ScriptedEngine {
    fn can_continue(&self) -> bool {
        self.cursor < self.steps.len() && !self.awaiting_choice
    }

    fn current_text(&self) -> Option<String> {
        self.last_step().map(|step| step.text.clone())
    }

    fn current_tags(&self) -> Option<Vec<String>> {
        self.last_step().map(|step| step.tags.clone())
    }

    fn current_errors(&self) -> Option<Vec<String>> {
        self.last_step().map(|step| step.errors.clone())
    }

    fn current_choices(&self) -> Vec<EngineChoice> {
        if self.awaiting_choice {
            self.last_step()
                .map(|step| step.choices.clone())
                .unwrap_or_default()
        } else {
            Vec::new()
        }
    }

    fn advance(&mut self) -> Result<(), EngineError> {
        self.probe.state.borrow_mut().advances += 1;
        if !self.can_continue() {
            return Err(EngineError::Internal("cannot continue".to_owned()));
        }

        let step = self.steps[self.cursor].clone();
        for (name, value) in &step.writes {
            self.write_variable(name, value.clone());
        }
        for (name, args) in &step.calls {
            if let Some((function, _)) = self.functions.get(name) {
                function(args);
            }
        }
        self.awaiting_choice = !step.choices.is_empty();
        self.cursor += 1;
        Ok(())
    }

    fn choose_choice_index(&mut self, index: usize) -> Result<(), EngineError> {
        self.probe.state.borrow_mut().chosen_indices.push(index);
        if !self.awaiting_choice {
            return Err(EngineError::Internal("no choices to choose from".to_owned()));
        }
        let known = self
            .last_step()
            .is_some_and(|step| step.choices.iter().any(|choice| choice.index == index));
        if !known {
            return Err(EngineError::Internal(format!(
                "no choice with index {index}"
            )));
        }
        self.awaiting_choice = false;
        Ok(())
    }

    fn observe_variable(
        &mut self,
        name: &str,
        observer: VariableObserver,
    ) -> Result<(), EngineError> {
        if !self.variables.contains_key(name) {
            return Err(EngineError::UndeclaredVariable(name.to_owned()));
        }
        self.probe.state.borrow_mut().observed.push(name.to_owned());
        self.observers.entry(name.to_owned()).or_default().push(observer);
        Ok(())
    }

    fn remove_variable_observer(&mut self, name: Option<&str>) -> Result<(), EngineError> {
        match name {
            Some(name) => {
                self.observers.remove(name);
            }
            None => self.observers.clear(),
        }
        Ok(())
    }

    fn bind_external_function(
        &mut self,
        name: &str,
        function: ExternalFunction,
        lookahead_safe: bool,
    ) -> Result<(), EngineError> {
        if self.rejected_bindings.iter().any(|n| n == name) {
            return Err(EngineError::Internal(format!(
                "binding of '{name}' rejected"
            )));
        }
        self.probe
            .state
            .borrow_mut()
            .bound
            .push((name.to_owned(), lookahead_safe));
        self.functions.insert(name.to_owned(), (function, lookahead_safe));
        Ok(())
    }

    fn unbind_external_function(&mut self, name: &str) -> Result<(), EngineError> {
        if self.functions.remove(name).is_none() {
            return Err(EngineError::Internal(format!("'{name}' is not bound")));
        }
        self.probe.state.borrow_mut().unbound.push(name.to_owned());
        Ok(())
    }

    fn variable(&self, name: &str) -> Result<Value, EngineError> {
        self.variables
            .get(name)
            .cloned()
            .ok_or_else(|| EngineError::UndeclaredVariable(name.to_owned()))
    }

    fn set_variable(&mut self, name: &str, value: Value) -> Result<(), EngineError> {
        let Some(current) = self.variables.get(name) else {
            return Err(EngineError::UndeclaredVariable(name.to_owned()));
        };
        if !Self::same_kind(current, &value) {
            return Err(EngineError::InvalidValue {
                name: name.to_owned(),
                value,
            });
        }
        self.write_variable(name, value);
        Ok(())
    }
}

/// A `StoryCompiler` that yields one prepared engine, then fails. Use
/// [`ScriptedCompiler::failing`] for the always-malformed case.
pub struct ScriptedCompiler {
    engine: RefCell<Option<ScriptedEngine>>,
}

impl ScriptedCompiler {
    /// A compiler whose next `compile` call returns `engine`.
    #[must_use]
    pub fn new(engine: ScriptedEngine) -> Self {
        Self {
            engine: RefCell::new(Some(engine)),
        }
    }

    /// A compiler that always reports a malformed script.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            engine: RefCell::new(None),
        }
    }
}

impl StoryCompiler for ScriptedCompiler {
    fn compile(&self, source: &str) -> Result<Box<dyn StoryEngine>, EngineError> {
        match self.engine.borrow_mut().take() {
            Some(engine) => Ok(Box::new(engine)),
            None => Err(EngineError::InvalidScript(format!(
                "unparseable script ({} bytes)",
                source.len()
            ))),
        }
    }
}
