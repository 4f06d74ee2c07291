//! Story-global flags: continuability, errors, loaded state, and the
//! continuation defaults.

use serde::{Deserialize, Serialize};

use crate::command::Command;

/// Fallback behaviors used when a command leaves its continuation choice
/// unspecified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContinuationDefaults {
    /// Whether a bare continue advances maximally.
    pub continue_max: bool,
    /// Whether choosing a choice implicitly continues afterwards.
    pub continue_after_choice: bool,
}

impl Default for ContinuationDefaults {
    fn default() -> Self {
        Self {
            continue_max: false,
            continue_after_choice: true,
        }
    }
}

/// Global state for the currently loaded story. Reset whenever the story is
/// cleared.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MiscState {
    /// Whether the story reported it can continue.
    pub can_continue: bool,
    /// Errors the engine reported on the most recent snapshot.
    pub story_errors: Vec<String>,
    /// Whether a story is currently loaded.
    pub story_is_loaded: bool,
    /// Continuation fallbacks.
    pub defaults: ContinuationDefaults,
}

/// Applies `command` to the misc slice.
#[must_use]
pub fn reduce(state: &MiscState, command: &Command) -> MiscState {
    match command {
        Command::SetCanContinue(can_continue) => MiscState {
            can_continue: *can_continue,
            ..state.clone()
        },
        Command::SetStoryErrors(errors) => MiscState {
            story_errors: errors.clone(),
            ..state.clone()
        },
        Command::SetStoryIsLoaded(loaded) => MiscState {
            story_is_loaded: *loaded,
            ..state.clone()
        },
        Command::SetDefaultContinueMax(continue_max) => MiscState {
            defaults: ContinuationDefaults {
                continue_max: *continue_max,
                ..state.defaults
            },
            ..state.clone()
        },
        Command::SetDefaultContinueAfterChoice(continue_after_choice) => MiscState {
            defaults: ContinuationDefaults {
                continue_after_choice: *continue_after_choice,
                ..state.defaults
            },
            ..state.clone()
        },
        Command::ClearStory => MiscState::default(),
        _ => state.clone(),
    }
}

/// Read-only views over the misc slice, keyed by a projection from the
/// host's root state.
pub struct MiscSelectors<S> {
    slice: Box<dyn Fn(&S) -> &MiscState>,
}

impl<S> MiscSelectors<S> {
    /// Builds selectors over the slice that `slice` projects out of `S`.
    pub fn new(slice: impl for<'a> Fn(&'a S) -> &'a MiscState + 'static) -> Self {
        Self {
            slice: Box::new(slice),
        }
    }

    /// Whether the story reported it can continue.
    pub fn can_continue(&self, root: &S) -> bool {
        (self.slice)(root).can_continue
    }

    /// The continue-maximally default.
    pub fn default_continue_max(&self, root: &S) -> bool {
        (self.slice)(root).defaults.continue_max
    }

    /// The continue-after-choice default.
    pub fn default_continue_after_choice(&self, root: &S) -> bool {
        (self.slice)(root).defaults.continue_after_choice
    }

    /// Errors the engine reported on the most recent snapshot.
    pub fn story_errors<'a>(&self, root: &'a S) -> &'a [String] {
        &(self.slice)(root).story_errors
    }

    /// Whether a story is currently loaded.
    pub fn story_is_loaded(&self, root: &S) -> bool {
        (self.slice)(root).story_is_loaded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_defaults_continue_after_choice_but_not_maximally() {
        let state = MiscState::default();
        assert!(!state.defaults.continue_max);
        assert!(state.defaults.continue_after_choice);
    }

    #[test]
    fn test_setters_replace_only_their_field() {
        let state = MiscState::default();

        let state = reduce(&state, &Command::SetCanContinue(true));
        let state = reduce(&state, &Command::SetStoryErrors(vec!["oops".to_owned()]));
        let state = reduce(&state, &Command::SetStoryIsLoaded(true));

        assert!(state.can_continue);
        assert_eq!(state.story_errors, vec!["oops"]);
        assert!(state.story_is_loaded);
        assert_eq!(state.defaults, ContinuationDefaults::default());
    }

    #[test]
    fn test_default_setters_touch_only_the_defaults() {
        let state = reduce(&MiscState::default(), &Command::SetCanContinue(true));

        let state = reduce(&state, &Command::SetDefaultContinueMax(true));
        let state = reduce(&state, &Command::SetDefaultContinueAfterChoice(false));

        assert!(state.defaults.continue_max);
        assert!(!state.defaults.continue_after_choice);
        assert!(state.can_continue);
    }

    #[test]
    fn test_clear_story_resets_to_initial_state() {
        let state = reduce(&MiscState::default(), &Command::SetStoryIsLoaded(true));
        let state = reduce(&state, &Command::ClearStory);
        assert_eq!(state, MiscState::default());
    }

    #[test]
    fn test_unrelated_commands_leave_state_unchanged() {
        let state = reduce(&MiscState::default(), &Command::SetCanContinue(true));
        let next = reduce(
            &state,
            &Command::SetTagReference {
                group_tags: vec![],
                ungroup_tags: vec![],
            },
        );
        assert_eq!(next, state);
    }

    #[test]
    fn test_selectors_read_through_a_projection() {
        let state = reduce(&MiscState::default(), &Command::SetCanContinue(true));
        let selectors = MiscSelectors::new(|s: &MiscState| s);

        assert!(selectors.can_continue(&state));
        assert!(!selectors.default_continue_max(&state));
        assert!(selectors.default_continue_after_choice(&state));
    }
}
