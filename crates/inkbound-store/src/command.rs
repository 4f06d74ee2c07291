//! The typed command catalog.
//!
//! Every state transition and every engine-facing request is a variant of
//! [`Command`]. The catalog is closed, so the dispatcher's first-match-wins
//! handler table is an exhaustive match — no runtime type inspection. Each
//! variant carries a stable [`Command::command_type`] tag for logging and
//! routing.

use std::fmt;

use inkbound_core::engine::{ExternalFunction, StoryEngine};
use inkbound_core::ids::IdSource;
use inkbound_core::map::PersistentMap;
use inkbound_core::set::PersistentSet;
use inkbound_core::value::Value;
use serde::{Deserialize, Serialize};

use crate::choice::{Choice, NewChoice};
use crate::config::StoryConfig;
use crate::narrative::{NarrationParams, NewNarration};

/// The story payload of a set-story command: either an already-constructed
/// engine instance or serialized script text to compile.
pub enum StorySource {
    /// A live engine instance to adopt directly.
    Instance(Box<dyn StoryEngine>),
    /// Serialized script text for the injected compiler.
    Source(String),
}

impl fmt::Debug for StorySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Instance(_) => f.write_str("StorySource::Instance"),
            Self::Source(text) => write!(f, "StorySource::Source({} bytes)", text.len()),
        }
    }
}

/// What to do after a choice has been selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContinueAfterChoice {
    /// Stop after the choice; the host will continue explicitly.
    DontContinue,
    /// Continue a single step.
    Continue,
    /// Continue until the story can no longer continue.
    ContinueMaximally,
}

/// A logical reference to a known choice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChoiceTarget {
    /// Position in the ordered choice list.
    Index(usize),
    /// The choice's opaque id.
    Id(String),
}

/// The kind a tracked variable's values are coerced to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableKind {
    /// Truthiness coercion.
    Bool,
    /// Numeric coercion, rounded to the nearest integer.
    Int,
    /// Plain numeric coercion.
    Float,
    /// Display-string coercion.
    String,
}

/// A typed command. Story commands are intercepted by the dispatcher; slice
/// commands pass straight through to the reducers.
pub enum Command {
    /// Select a choice, then optionally continue.
    ChooseChoice {
        /// Which choice, by position or id.
        target: ChoiceTarget,
        /// Post-choice continuation; `None` defers to the configured default.
        continue_after: Option<ContinueAfterChoice>,
    },
    /// Advance the story; `None` defers to the configured default.
    ContinueStory {
        /// Advance until the story stops, instead of one step.
        maximally: Option<bool>,
    },
    /// Begin mirroring an engine variable into the value store.
    StartTrackingVariable {
        /// The engine-side variable name.
        name: String,
        /// The kind its values are coerced to.
        kind: VariableKind,
    },
    /// Stop mirroring an engine variable and drop its stored value.
    StopTrackingVariable {
        /// The engine-side variable name.
        name: String,
    },
    /// Make a host function callable from story scripts. Rebinding an
    /// already-bound name replaces the previous binding.
    BindExternalFunction {
        /// The script-visible function name.
        name: String,
        /// The host function.
        function: ExternalFunction,
        /// Whether the engine may call it during lookahead evaluation.
        lookahead_safe: bool,
    },
    /// Write an engine variable through the bridge.
    SetVariable {
        /// The engine-side variable name.
        name: String,
        /// The value to write.
        value: Value,
    },
    /// Unload the live story and reset every slice to its initial state.
    ClearStory,
    /// Load a story, replacing any live one, and apply `config`.
    SetStory {
        /// The story instance or its serialized script.
        source: StorySource,
        /// Load-time configuration.
        config: Box<StoryConfig>,
    },
    /// An engine-side write to an observed variable surfaced into the store.
    VariableObserved {
        /// The variable name.
        name: String,
        /// The raw engine value, coerced by the reducer per tracked kind.
        value: Value,
    },
    /// Append one narration to the narrative slice.
    AddNarration {
        /// The normalized narration payload.
        narration: NewNarration,
    },
    /// Merge metadata entries into an existing narration.
    SetNarrationMeta {
        /// The narration id.
        id: String,
        /// Entries to merge into the narration's metadata.
        entries: Vec<(String, Value)>,
    },
    /// Replace both grouping tag reference sets.
    SetTagReference {
        /// Tags that start a new group.
        group_tags: Vec<String>,
        /// Tags that keep a narration out of any group.
        ungroup_tags: Vec<String>,
    },
    /// Atomically replace the current choice set.
    SetChoices {
        /// The new choices, ids already assigned.
        choices: Vec<Choice>,
    },
    /// Record whether the story can continue.
    SetCanContinue(bool),
    /// Replace the engine-reported error list.
    SetStoryErrors(Vec<String>),
    /// Record whether a story is loaded.
    SetStoryIsLoaded(bool),
    /// Change the continue-maximally default.
    SetDefaultContinueMax(bool),
    /// Change the continue-after-choice default.
    SetDefaultContinueAfterChoice(bool),
}

impl Command {
    /// Builds an add-narration command, generating an id when the caller
    /// supplies none and dropping empty tag/meta collections.
    pub fn add_narration(params: NarrationParams, ids: &dyn IdSource) -> Self {
        let NarrationParams { id, text, tags, meta } = params;
        let tags = if tags.is_empty() {
            None
        } else {
            Some(PersistentSet::from_values(tags))
        };
        Self::AddNarration {
            narration: NewNarration {
                id: id.unwrap_or_else(|| ids.generate()),
                text,
                tags,
                meta: meta.filter(|m: &PersistentMap<Value>| !m.is_empty()),
            },
        }
    }

    /// Builds a set-choices command, generating prefixed ids for choices the
    /// caller (typically the engine) left anonymous.
    pub fn set_choices(choices: Vec<NewChoice>, ids: &dyn IdSource) -> Self {
        let choices = choices
            .into_iter()
            .map(|choice| Choice {
                id: choice
                    .id
                    .unwrap_or_else(|| format!("choice/{}", ids.generate())),
                index: choice.index,
                text: choice.text,
                is_invisible_default: choice.is_invisible_default,
            })
            .collect();
        Self::SetChoices { choices }
    }

    /// A stable `context.operation` tag for logging and routing.
    #[must_use]
    pub fn command_type(&self) -> &'static str {
        match self {
            Self::ChooseChoice { .. } => "story.choose_choice",
            Self::ContinueStory { .. } => "story.continue_story",
            Self::StartTrackingVariable { .. } => "variable.start_tracking",
            Self::StopTrackingVariable { .. } => "variable.stop_tracking",
            Self::BindExternalFunction { .. } => "story.bind_external_function",
            Self::SetVariable { .. } => "variable.set_variable",
            Self::ClearStory => "story.clear_story",
            Self::SetStory { .. } => "story.set_story",
            Self::VariableObserved { .. } => "variable.observed_change",
            Self::AddNarration { .. } => "narrative.add_narration",
            Self::SetNarrationMeta { .. } => "narrative.set_narration_meta",
            Self::SetTagReference { .. } => "narrative.set_tag_reference",
            Self::SetChoices { .. } => "choice.set_choices",
            Self::SetCanContinue(_) => "misc.set_can_continue",
            Self::SetStoryErrors(_) => "misc.set_story_errors",
            Self::SetStoryIsLoaded(_) => "misc.set_story_is_loaded",
            Self::SetDefaultContinueMax(_) => "misc.set_default_continue_max",
            Self::SetDefaultContinueAfterChoice(_) => "misc.set_default_continue_after_choice",
        }
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ChooseChoice {
                target,
                continue_after,
            } => f
                .debug_struct("ChooseChoice")
                .field("target", target)
                .field("continue_after", continue_after)
                .finish(),
            Self::ContinueStory { maximally } => f
                .debug_struct("ContinueStory")
                .field("maximally", maximally)
                .finish(),
            Self::StartTrackingVariable { name, kind } => f
                .debug_struct("StartTrackingVariable")
                .field("name", name)
                .field("kind", kind)
                .finish(),
            Self::StopTrackingVariable { name } => f
                .debug_struct("StopTrackingVariable")
                .field("name", name)
                .finish(),
            Self::BindExternalFunction {
                name,
                lookahead_safe,
                ..
            } => f
                .debug_struct("BindExternalFunction")
                .field("name", name)
                .field("lookahead_safe", lookahead_safe)
                .finish_non_exhaustive(),
            Self::SetVariable { name, value } => f
                .debug_struct("SetVariable")
                .field("name", name)
                .field("value", value)
                .finish(),
            Self::ClearStory => f.write_str("ClearStory"),
            Self::SetStory { source, config } => f
                .debug_struct("SetStory")
                .field("source", source)
                .field("config", config)
                .finish(),
            Self::VariableObserved { name, value } => f
                .debug_struct("VariableObserved")
                .field("name", name)
                .field("value", value)
                .finish(),
            Self::AddNarration { narration } => f
                .debug_struct("AddNarration")
                .field("narration", narration)
                .finish(),
            Self::SetNarrationMeta { id, entries } => f
                .debug_struct("SetNarrationMeta")
                .field("id", id)
                .field("entries", entries)
                .finish(),
            Self::SetTagReference {
                group_tags,
                ungroup_tags,
            } => f
                .debug_struct("SetTagReference")
                .field("group_tags", group_tags)
                .field("ungroup_tags", ungroup_tags)
                .finish(),
            Self::SetChoices { choices } => f
                .debug_struct("SetChoices")
                .field("choices", choices)
                .finish(),
            Self::SetCanContinue(v) => f.debug_tuple("SetCanContinue").field(v).finish(),
            Self::SetStoryErrors(v) => f.debug_tuple("SetStoryErrors").field(v).finish(),
            Self::SetStoryIsLoaded(v) => f.debug_tuple("SetStoryIsLoaded").field(v).finish(),
            Self::SetDefaultContinueMax(v) => {
                f.debug_tuple("SetDefaultContinueMax").field(v).finish()
            }
            Self::SetDefaultContinueAfterChoice(v) => f
                .debug_tuple("SetDefaultContinueAfterChoice")
                .field(v)
                .finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use inkbound_test_support::SequenceIds;

    #[test]
    fn test_add_narration_generates_missing_id_and_drops_empty_tags() {
        // Arrange
        let ids = SequenceIds::new("n");

        // Act
        let command = Command::add_narration(
            NarrationParams {
                text: "Hello.".to_owned(),
                ..NarrationParams::default()
            },
            &ids,
        );

        // Assert
        let Command::AddNarration { narration } = command else {
            panic!("expected AddNarration");
        };
        assert_eq!(narration.id, "n1");
        assert_eq!(narration.text, "Hello.");
        assert!(narration.tags.is_none());
        assert!(narration.meta.is_none());
    }

    #[test]
    fn test_add_narration_keeps_caller_supplied_id_and_tags() {
        let ids = SequenceIds::new("n");

        let command = Command::add_narration(
            NarrationParams {
                id: Some("intro".to_owned()),
                text: "Hello.".to_owned(),
                tags: vec!["chapter".to_owned()],
                meta: None,
            },
            &ids,
        );

        let Command::AddNarration { narration } = command else {
            panic!("expected AddNarration");
        };
        assert_eq!(narration.id, "intro");
        assert!(narration.tags.is_some_and(|tags| tags.contains("chapter")));
    }

    #[test]
    fn test_set_choices_prefixes_generated_ids() {
        let ids = SequenceIds::new("c");

        let command = Command::set_choices(
            vec![
                NewChoice {
                    id: Some("torch".to_owned()),
                    index: 0,
                    text: "Light the torch".to_owned(),
                    is_invisible_default: false,
                },
                NewChoice {
                    index: 1,
                    text: "Wait".to_owned(),
                    ..NewChoice::default()
                },
            ],
            &ids,
        );

        let Command::SetChoices { choices } = command else {
            panic!("expected SetChoices");
        };
        assert_eq!(choices[0].id, "torch");
        assert_eq!(choices[1].id, "choice/c1");
    }

    #[test]
    fn test_command_type_tags_are_stable() {
        assert_eq!(Command::ClearStory.command_type(), "story.clear_story");
        assert_eq!(
            Command::ContinueStory { maximally: None }.command_type(),
            "story.continue_story"
        );
        assert_eq!(
            Command::SetCanContinue(true).command_type(),
            "misc.set_can_continue"
        );
    }
}
