//! Tracked engine variables and their coerced values.
//!
//! A name belongs to at most one kind's tracking set at a time. Observed
//! engine-side writes are coerced per the tracked kind before they land in
//! the value store; untracked names never produce an update.

use inkbound_core::map::PersistentMap;
use inkbound_core::set::PersistentSet;
use inkbound_core::value::Value;
use serde::{Deserialize, Serialize};

use crate::command::{Command, VariableKind};

/// The variable slice.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VariableState {
    /// Names tracked as booleans.
    pub tracked_bools: PersistentSet,
    /// Names tracked as integers.
    pub tracked_ints: PersistentSet,
    /// Names tracked as floats.
    pub tracked_floats: PersistentSet,
    /// Names tracked as strings.
    pub tracked_strings: PersistentSet,
    /// Coerced values for currently tracked names only.
    pub values: PersistentMap<Value>,
}

/// Applies `command` to the variable slice.
#[must_use]
pub fn reduce(state: &VariableState, command: &Command) -> VariableState {
    match command {
        Command::VariableObserved { name, value } => observe(state, name, value),
        Command::StartTrackingVariable { name, kind } => match kind {
            VariableKind::Bool => VariableState {
                tracked_bools: state.tracked_bools.add([name.clone()]),
                ..state.clone()
            },
            VariableKind::Int => VariableState {
                tracked_ints: state.tracked_ints.add([name.clone()]),
                ..state.clone()
            },
            VariableKind::Float => VariableState {
                tracked_floats: state.tracked_floats.add([name.clone()]),
                ..state.clone()
            },
            VariableKind::String => VariableState {
                tracked_strings: state.tracked_strings.add([name.clone()]),
                ..state.clone()
            },
        },
        Command::StopTrackingVariable { name } => VariableState {
            tracked_bools: state.tracked_bools.remove([name.as_str()]),
            tracked_ints: state.tracked_ints.remove([name.as_str()]),
            tracked_floats: state.tracked_floats.remove([name.as_str()]),
            tracked_strings: state.tracked_strings.remove([name.as_str()]),
            values: state.values.remove([name.as_str()]),
        },
        Command::ClearStory => VariableState::default(),
        _ => state.clone(),
    }
}

fn observe(state: &VariableState, name: &str, value: &Value) -> VariableState {
    if state.tracked_bools.contains(name) {
        return VariableState {
            values: state.values.insert(name, Value::Bool(value.truthy())),
            ..state.clone()
        };
    }
    if state.tracked_floats.contains(name) {
        return match value.as_number() {
            Some(number) => VariableState {
                values: state.values.insert(name, Value::Float(number)),
                ..state.clone()
            },
            // Numerically incoercible input leaves the stored value alone.
            None => state.clone(),
        };
    }
    if state.tracked_ints.contains(name) {
        return match value.as_number() {
            #[allow(clippy::cast_possible_truncation)]
            Some(number) => VariableState {
                values: state
                    .values
                    .insert(name, Value::Int(number.round() as i64)),
                ..state.clone()
            },
            None => state.clone(),
        };
    }
    if state.tracked_strings.contains(name) {
        return VariableState {
            values: state.values.insert(name, Value::Str(value.to_string())),
            ..state.clone()
        };
    }
    state.clone()
}

/// Read-only views over the variable slice.
pub struct VariableSelectors<S> {
    slice: Box<dyn Fn(&S) -> &VariableState>,
}

impl<S> VariableSelectors<S> {
    /// Builds selectors over the slice that `slice` projects out of `S`.
    pub fn new(slice: impl for<'a> Fn(&'a S) -> &'a VariableState + 'static) -> Self {
        Self {
            slice: Box::new(slice),
        }
    }

    /// Whether `name` is tracked under any kind.
    pub fn is_tracked(&self, root: &S, name: &str) -> bool {
        self.is_tracked_bool(root, name)
            || self.is_tracked_int(root, name)
            || self.is_tracked_float(root, name)
            || self.is_tracked_string(root, name)
    }

    /// Whether `name` is tracked as a boolean.
    pub fn is_tracked_bool(&self, root: &S, name: &str) -> bool {
        (self.slice)(root).tracked_bools.contains(name)
    }

    /// Whether `name` is tracked as an integer.
    pub fn is_tracked_int(&self, root: &S, name: &str) -> bool {
        (self.slice)(root).tracked_ints.contains(name)
    }

    /// Whether `name` is tracked as a float.
    pub fn is_tracked_float(&self, root: &S, name: &str) -> bool {
        (self.slice)(root).tracked_floats.contains(name)
    }

    /// Whether `name` is tracked as a string.
    pub fn is_tracked_string(&self, root: &S, name: &str) -> bool {
        (self.slice)(root).tracked_strings.contains(name)
    }

    /// The stored coerced value for `name`, if tracked and observed.
    pub fn value<'a>(&self, root: &'a S, name: &str) -> Option<&'a Value> {
        (self.slice)(root).values.get(name)
    }

    /// The stored value, when it is a boolean.
    pub fn bool_value(&self, root: &S, name: &str) -> Option<bool> {
        match self.value(root, name) {
            Some(Value::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    /// The stored value, when it is numeric.
    #[allow(clippy::cast_precision_loss)]
    pub fn number_value(&self, root: &S, name: &str) -> Option<f64> {
        match self.value(root, name) {
            Some(Value::Int(i)) => Some(*i as f64),
            Some(Value::Float(f)) => Some(*f),
            _ => None,
        }
    }

    /// The stored value, when it is a string.
    pub fn string_value<'a>(&self, root: &'a S, name: &str) -> Option<&'a str> {
        match self.value(root, name) {
            Some(Value::Str(s)) => Some(s),
            _ => None,
        }
    }
}
