//! The current choice set.
//!
//! Choices are replaced atomically on every engine snapshot — nothing
//! carries over from a previous advance.

use inkbound_core::map::PersistentMap;
use serde::{Deserialize, Serialize};

use crate::command::Command;

/// One selectable choice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    /// Opaque id, unique within the current choice set.
    pub id: String,
    /// The engine-native choice index, used when selecting.
    pub index: usize,
    /// The choice's display text.
    pub text: String,
    /// Whether the engine marks this as an invisible default choice.
    pub is_invisible_default: bool,
}

/// A choice as supplied to [`Command::set_choices`], before id assignment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewChoice {
    /// Caller-supplied id; generated when `None`.
    pub id: Option<String>,
    /// The engine-native choice index.
    pub index: usize,
    /// The choice's display text.
    pub text: String,
    /// Whether the engine marks this as an invisible default choice.
    pub is_invisible_default: bool,
}

impl From<inkbound_core::engine::EngineChoice> for NewChoice {
    fn from(choice: inkbound_core::engine::EngineChoice) -> Self {
        Self {
            id: None,
            index: choice.index,
            text: choice.text,
            is_invisible_default: choice.is_invisible_default,
        }
    }
}

/// The choice slice: the current set ordered by engine index, plus an
/// id → ordered-position map for resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoiceState {
    /// Choices ordered by engine-native index.
    pub ordered_choices: Vec<Choice>,
    /// Ids in the same order as `ordered_choices`.
    pub ordered_choice_ids: Vec<String>,
    /// Maps a choice id to its position in `ordered_choices`.
    pub choice_positions: PersistentMap<usize>,
}

/// Applies `command` to the choice slice.
#[must_use]
pub fn reduce(state: &ChoiceState, command: &Command) -> ChoiceState {
    match command {
        Command::SetChoices { choices } => {
            let mut ordered = choices.clone();
            ordered.sort_by_key(|choice| choice.index);
            ChoiceState {
                choice_positions: ordered
                    .iter()
                    .enumerate()
                    .map(|(position, choice)| (choice.id.clone(), position))
                    .collect(),
                ordered_choice_ids: ordered.iter().map(|choice| choice.id.clone()).collect(),
                ordered_choices: ordered,
            }
        }
        Command::ClearStory => ChoiceState::default(),
        _ => state.clone(),
    }
}

/// Read-only views over the choice slice.
pub struct ChoiceSelectors<S> {
    slice: Box<dyn Fn(&S) -> &ChoiceState>,
}

impl<S> ChoiceSelectors<S> {
    /// Builds selectors over the slice that `slice` projects out of `S`.
    pub fn new(slice: impl for<'a> Fn(&'a S) -> &'a ChoiceState + 'static) -> Self {
        Self {
            slice: Box::new(slice),
        }
    }

    /// All current choices, ordered by engine index.
    pub fn all_choices<'a>(&self, root: &'a S) -> &'a [Choice] {
        &(self.slice)(root).ordered_choices
    }

    /// The ids of all current choices, in order.
    pub fn all_choice_ids<'a>(&self, root: &'a S) -> &'a [String] {
        &(self.slice)(root).ordered_choice_ids
    }

    /// How many choices are currently selectable.
    pub fn choice_count(&self, root: &S) -> usize {
        (self.slice)(root).ordered_choices.len()
    }

    /// Resolves a choice by its opaque id.
    pub fn choice_by_id<'a>(&self, root: &'a S, id: &str) -> Option<&'a Choice> {
        let state = (self.slice)(root);
        let position = state.choice_positions.get(id)?;
        state.ordered_choices.get(*position)
    }

    /// Resolves a choice by its position in the ordered list.
    pub fn choice_by_position<'a>(&self, root: &'a S, position: usize) -> Option<&'a Choice> {
        (self.slice)(root).ordered_choices.get(position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn choice(id: &str, index: usize, text: &str) -> Choice {
        Choice {
            id: id.to_owned(),
            index,
            text: text.to_owned(),
            is_invisible_default: false,
        }
    }

    #[test]
    fn test_set_choices_orders_by_engine_index() {
        // Arrange
        let state = ChoiceState::default();

        // Act
        let state = reduce(
            &state,
            &Command::SetChoices {
                choices: vec![choice("b", 1, "Wait"), choice("a", 0, "Run")],
            },
        );

        // Assert
        assert_eq!(state.ordered_choice_ids, vec!["a", "b"]);
        assert_eq!(state.choice_positions.get("a"), Some(&0));
        assert_eq!(state.choice_positions.get("b"), Some(&1));
    }

    #[test]
    fn test_set_choices_replaces_the_previous_set_atomically() {
        let state = reduce(
            &ChoiceState::default(),
            &Command::SetChoices {
                choices: vec![choice("a", 0, "Run")],
            },
        );

        let state = reduce(
            &state,
            &Command::SetChoices {
                choices: vec![choice("c", 0, "Hide")],
            },
        );

        assert_eq!(state.ordered_choice_ids, vec!["c"]);
        assert!(!state.choice_positions.contains("a"));
    }

    #[test]
    fn test_clear_story_resets_to_initial_state() {
        let state = reduce(
            &ChoiceState::default(),
            &Command::SetChoices {
                choices: vec![choice("a", 0, "Run")],
            },
        );
        let state = reduce(&state, &Command::ClearStory);
        assert_eq!(state, ChoiceState::default());
    }

    #[test]
    fn test_selectors_resolve_by_id_and_position() {
        let state = reduce(
            &ChoiceState::default(),
            &Command::SetChoices {
                choices: vec![choice("b", 3, "Wait"), choice("a", 1, "Run")],
            },
        );
        let selectors = ChoiceSelectors::new(|s: &ChoiceState| s);

        assert_eq!(selectors.choice_count(&state), 2);
        assert_eq!(selectors.choice_by_id(&state, "b").unwrap().text, "Wait");
        // Position is the place in the ordered list, not the engine index.
        assert_eq!(selectors.choice_by_position(&state, 0).unwrap().id, "a");
        assert!(selectors.choice_by_id(&state, "zzz").is_none());
        assert!(selectors.choice_by_position(&state, 2).is_none());
    }
}
