//! The combined story state and its selector bundle.

use serde::{Deserialize, Serialize};

use crate::choice::{self, ChoiceSelectors, ChoiceState};
use crate::command::Command;
use crate::misc::{self, MiscSelectors, MiscState};
use crate::narrative::{self, NarrativeSelectors, NarrativeState};
use crate::variable::{self, VariableSelectors, VariableState};

/// The root of all inkbound-owned state: one field per slice.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoryState {
    /// Story-global flags and defaults.
    pub misc: MiscState,
    /// The current choice set.
    pub choices: ChoiceState,
    /// Emitted text and its grouping.
    pub narrative: NarrativeState,
    /// Tracked variables and values.
    pub variables: VariableState,
}

/// Applies `command` to every slice, producing the next state.
///
/// Pure: a host with its own store machinery can call this directly, with
/// `StoryState` embedded wherever its state tree wants it.
#[must_use]
pub fn reduce(state: &StoryState, command: &Command) -> StoryState {
    StoryState {
        misc: misc::reduce(&state.misc, command),
        choices: choice::reduce(&state.choices, command),
        narrative: narrative::reduce(&state.narrative, command),
        variables: variable::reduce(&state.variables, command),
    }
}

/// All slice selectors, built from one projection out of the host's root
/// state so the core stays agnostic to where its slices live.
pub struct Selectors<S> {
    /// Misc slice views.
    pub misc: MiscSelectors<S>,
    /// Choice slice views.
    pub choices: ChoiceSelectors<S>,
    /// Narrative slice views.
    pub narrative: NarrativeSelectors<S>,
    /// Variable slice views.
    pub variables: VariableSelectors<S>,
}

impl<S: 'static> Selectors<S> {
    /// Builds the full selector bundle from a projection to [`StoryState`].
    #[must_use]
    pub fn new(get_slice: fn(&S) -> &StoryState) -> Self {
        Self {
            misc: MiscSelectors::new(move |s: &S| &get_slice(s).misc),
            choices: ChoiceSelectors::new(move |s: &S| &get_slice(s).choices),
            narrative: NarrativeSelectors::new(move |s: &S| &get_slice(s).narrative),
            variables: VariableSelectors::new(move |s: &S| &get_slice(s).variables),
        }
    }
}

impl Selectors<StoryState> {
    /// Selectors for a host whose root state *is* the story state.
    #[must_use]
    pub fn for_root() -> Self {
        Self::new(|state| state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reduce_routes_commands_to_every_slice() {
        let state = StoryState::default();

        let state = reduce(&state, &Command::SetCanContinue(true));
        let state = reduce(
            &state,
            &Command::SetTagReference {
                group_tags: vec!["chapter".to_owned()],
                ungroup_tags: vec![],
            },
        );

        assert!(state.misc.can_continue);
        assert!(state.narrative.group_tags.contains("chapter"));
    }

    #[test]
    fn test_clear_story_resets_every_slice() {
        let state = reduce(&StoryState::default(), &Command::SetCanContinue(true));
        let state = reduce(&state, &Command::SetStoryIsLoaded(true));

        let state = reduce(&state, &Command::ClearStory);

        assert_eq!(state, StoryState::default());
    }

    #[test]
    fn test_selectors_work_against_an_embedding_root_state() {
        struct HostState {
            story: StoryState,
        }

        let host = HostState {
            story: reduce(&StoryState::default(), &Command::SetCanContinue(true)),
        };
        let selectors: Selectors<HostState> = Selectors::new(|host| &host.story);

        assert!(selectors.misc.can_continue(&host));
        assert_eq!(selectors.choices.choice_count(&host), 0);
    }
}
