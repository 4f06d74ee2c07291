//! The command dispatcher.
//!
//! [`StoryStore`] ties the pure reducers, the selector bundle, and the engine
//! bridge together. Incoming commands are matched against the closed handler
//! table (the exhaustive match in [`StoryStore::try_dispatch`]); at most one
//! handler runs, and unmatched commands pass through to the reducers
//! untouched. Handlers re-enter `dispatch` for derived commands — set-story
//! issues clear-story, choose-choice issues continue-story, the advance loop
//! issues a snapshot per step — and every nested command completes before the
//! outer handler's next statement runs.

use std::rc::Rc;

use inkbound_core::engine::{ExternalFunction, StoryCompiler};
use inkbound_core::ids::{IdSource, UuidIdSource};
use inkbound_core::value::Value;
use inkbound_store::choice::NewChoice;
use inkbound_store::command::{
    ChoiceTarget, Command, ContinueAfterChoice, StorySource, VariableKind,
};
use inkbound_store::config::{CONFIG_VERSION, StoryConfig};
use inkbound_store::narrative::NarrationParams;
use inkbound_store::state::{Selectors, StoryState, reduce};
use thiserror::Error;
use tracing::{instrument, warn};

use crate::bridge::{BridgeError, EngineBridge, StorySnapshot};

/// Why a command was aborted. Every failure is logged with context at the
/// [`StoryStore::dispatch`] boundary and leaves store state untouched by the
/// failing step; [`StoryStore::try_dispatch`] exposes the reason directly so
/// callers and tests need not depend on log output.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The set-story configuration carries an unsupported schema version.
    #[error("unsupported configuration version {0}")]
    UnsupportedConfigVersion(u32),

    /// Script text was supplied but no compiler was injected.
    #[error("no story compiler is configured; cannot compile script text")]
    MissingCompiler,

    /// A continue was requested while the story cannot continue.
    #[error("the story cannot currently continue")]
    NotContinuable,

    /// A choice was requested while no choices are known.
    #[error("there are no choices to choose from")]
    NoChoices,

    /// No choice at the given position in the ordered choice list.
    #[error("no choice at position {0}")]
    UnknownChoiceIndex(usize),

    /// No choice with the given id in the current choice set.
    #[error("no choice with id '{0}'")]
    UnknownChoiceId(String),

    /// Stop-tracking was requested for a variable that is not tracked.
    #[error("variable '{0}' is not tracked")]
    NotTracked(String),

    /// The bridge refused or the engine failed.
    #[error(transparent)]
    Bridge(#[from] BridgeError),
}

/// The store façade: state, selectors, bridge, and dispatch in one place.
///
/// Single-threaded by design — commands are processed to completion, in
/// order, with no suspension points.
pub struct StoryStore {
    state: StoryState,
    bridge: EngineBridge,
    compiler: Option<Box<dyn StoryCompiler>>,
    ids: Rc<dyn IdSource>,
    selectors: Selectors<StoryState>,
}

impl Default for StoryStore {
    fn default() -> Self {
        Self::new(None, Rc::new(UuidIdSource))
    }
}

impl StoryStore {
    /// Builds a store with the injected services. `compiler` may be `None`
    /// when the host only ever supplies pre-built engine instances.
    #[must_use]
    pub fn new(compiler: Option<Box<dyn StoryCompiler>>, ids: Rc<dyn IdSource>) -> Self {
        Self {
            state: StoryState::default(),
            bridge: EngineBridge::new(),
            compiler,
            ids,
            selectors: Selectors::for_root(),
        }
    }

    /// The current state.
    #[must_use]
    pub fn state(&self) -> &StoryState {
        &self.state
    }

    /// The selector bundle over this store's own state.
    #[must_use]
    pub fn selectors(&self) -> &Selectors<StoryState> {
        &self.selectors
    }

    /// Dispatches `command`, logging and absorbing any failure. The logged
    /// boundary is here and only here.
    pub fn dispatch(&mut self, command: Command) {
        let command_type = command.command_type();
        if let Err(error) = self.try_dispatch(command) {
            warn!(command = command_type, %error, "command aborted");
        }
    }

    /// Dispatches `command`, returning why it was aborted, if it was.
    ///
    /// # Errors
    ///
    /// Returns a [`DispatchError`] naming the failure; the command is a
    /// no-op in that case.
    #[instrument(level = "debug", skip_all, fields(command = command.command_type()))]
    pub fn try_dispatch(&mut self, command: Command) -> Result<(), DispatchError> {
        match command {
            Command::ChooseChoice {
                target,
                continue_after,
            } => self.handle_choose_choice(&target, continue_after),
            Command::ContinueStory { maximally } => self.handle_continue_story(maximally),
            Command::StartTrackingVariable { name, kind } => {
                self.handle_start_tracking_variable(&name, kind)
            }
            Command::StopTrackingVariable { name } => self.handle_stop_tracking_variable(&name),
            Command::BindExternalFunction {
                name,
                function,
                lookahead_safe,
            } => self.handle_bind_external_function(&name, function, lookahead_safe),
            Command::SetVariable { name, value } => self.handle_set_variable(&name, value),
            Command::ClearStory => self.handle_clear_story(),
            Command::SetStory { source, config } => self.handle_set_story(source, *config),
            slice_command => {
                self.forward(&slice_command);
                Ok(())
            }
        }
    }

    /// Applies `command` to the reducers verbatim.
    fn forward(&mut self, command: &Command) {
        self.state = reduce(&self.state, command);
    }

    fn handle_clear_story(&mut self) -> Result<(), DispatchError> {
        self.bridge.clear_engine();
        self.forward(&Command::ClearStory);
        Ok(())
    }

    fn handle_set_story(
        &mut self,
        source: StorySource,
        config: StoryConfig,
    ) -> Result<(), DispatchError> {
        // Both the bridge and the slices reset first: at most one live
        // engine, and no stale state if the load fails midway.
        self.try_dispatch(Command::ClearStory)?;

        if config.version != CONFIG_VERSION {
            return Err(DispatchError::UnsupportedConfigVersion(config.version));
        }

        let engine = match source {
            StorySource::Instance(engine) => engine,
            StorySource::Source(text) => {
                let compiler = self.compiler.as_ref().ok_or(DispatchError::MissingCompiler)?;
                compiler.compile(&text).map_err(BridgeError::Engine)?
            }
        };

        self.bridge.set_engine(engine);
        self.dispatch(Command::SetStoryIsLoaded(true));

        if let Some(continue_max) = config.default_continue_maximally {
            self.dispatch(Command::SetDefaultContinueMax(continue_max));
        }
        if let Some(continue_after) = config.default_continue_after_choice {
            self.dispatch(Command::SetDefaultContinueAfterChoice(continue_after));
        }

        self.dispatch(Command::SetTagReference {
            group_tags: config.line_grouping.group_tags,
            ungroup_tags: config.line_grouping.groupless_tags,
        });

        for (names, kind) in [
            (config.tracked_variables.bools, VariableKind::Bool),
            (config.tracked_variables.ints, VariableKind::Int),
            (config.tracked_variables.floats, VariableKind::Float),
            (config.tracked_variables.strings, VariableKind::String),
        ] {
            for name in names {
                self.dispatch(Command::StartTrackingVariable { name, kind });
            }
        }

        for (name, function) in config.external_functions {
            self.dispatch(Command::BindExternalFunction {
                name,
                function,
                lookahead_safe: false,
            });
        }
        for (name, function) in config.lookahead_safe_external_functions {
            self.dispatch(Command::BindExternalFunction {
                name,
                function,
                lookahead_safe: true,
            });
        }

        self.sync_engine_changes();
        let snapshot = self.push_snapshot()?;
        if snapshot.can_continue && self.selectors.misc.default_continue_max(&self.state) {
            self.dispatch(Command::ContinueStory { maximally: None });
        }
        Ok(())
    }

    fn handle_continue_story(&mut self, maximally: Option<bool>) -> Result<(), DispatchError> {
        if !self.bridge.has_engine() {
            return Err(BridgeError::NoStory("continue_story").into());
        }
        let maximally =
            maximally.unwrap_or_else(|| self.selectors.misc.default_continue_max(&self.state));
        if !self.selectors.misc.can_continue(&self.state) {
            return Err(DispatchError::NotContinuable);
        }

        // One engine step per iteration; the engine's continuability signal
        // is the only terminator in maximal mode.
        loop {
            self.bridge.advance()?;
            self.sync_engine_changes();
            let snapshot = self.push_snapshot()?;
            if !maximally || !snapshot.can_continue {
                break;
            }
        }
        Ok(())
    }

    fn handle_choose_choice(
        &mut self,
        target: &ChoiceTarget,
        continue_after: Option<ContinueAfterChoice>,
    ) -> Result<(), DispatchError> {
        if !self.bridge.has_engine() {
            return Err(BridgeError::NoStory("choose_choice").into());
        }
        if self.selectors.choices.choice_count(&self.state) == 0 {
            return Err(DispatchError::NoChoices);
        }

        // Resolve against slice state before touching the engine; a failed
        // resolution must leave the engine untouched.
        let engine_index = match target {
            ChoiceTarget::Index(position) => {
                self.selectors
                    .choices
                    .choice_by_position(&self.state, *position)
                    .ok_or(DispatchError::UnknownChoiceIndex(*position))?
                    .index
            }
            ChoiceTarget::Id(id) => {
                self.selectors
                    .choices
                    .choice_by_id(&self.state, id)
                    .ok_or_else(|| DispatchError::UnknownChoiceId(id.clone()))?
                    .index
            }
        };

        self.bridge.choose_choice_index(engine_index)?;
        self.sync_engine_changes();
        self.push_snapshot()?;

        match continue_after {
            Some(ContinueAfterChoice::DontContinue) => {}
            Some(ContinueAfterChoice::Continue) => self.dispatch(Command::ContinueStory {
                maximally: Some(false),
            }),
            Some(ContinueAfterChoice::ContinueMaximally) => {
                self.dispatch(Command::ContinueStory {
                    maximally: Some(true),
                });
            }
            None => {
                if self
                    .selectors
                    .misc
                    .default_continue_after_choice(&self.state)
                {
                    self.dispatch(Command::ContinueStory { maximally: None });
                }
            }
        }
        Ok(())
    }

    fn handle_start_tracking_variable(
        &mut self,
        name: &str,
        kind: VariableKind,
    ) -> Result<(), DispatchError> {
        if !self.bridge.has_engine() {
            return Err(BridgeError::NoStory("start_tracking_variable").into());
        }

        // Re-tracking under a possibly different kind: untrack first so the
        // name lands in exactly one kind's set.
        if self.selectors.variables.is_tracked(&self.state, name) {
            self.dispatch(Command::StopTrackingVariable {
                name: name.to_owned(),
            });
        }

        // The tracking sets must update before the value read lands, so the
        // coercion below sees the new kind.
        self.forward(&Command::StartTrackingVariable {
            name: name.to_owned(),
            kind,
        });

        match self.bridge.variable(name) {
            Ok(value) => self.dispatch(Command::VariableObserved {
                name: name.to_owned(),
                value,
            }),
            Err(error) => {
                warn!(variable = name, %error, "initial value read failed; store left unchanged");
            }
        }

        self.bridge.observe_variable(name)?;
        Ok(())
    }

    fn handle_stop_tracking_variable(&mut self, name: &str) -> Result<(), DispatchError> {
        if !self.bridge.has_engine() {
            return Err(BridgeError::NoStory("stop_tracking_variable").into());
        }
        if !self.selectors.variables.is_tracked(&self.state, name) {
            return Err(DispatchError::NotTracked(name.to_owned()));
        }
        self.forward(&Command::StopTrackingVariable {
            name: name.to_owned(),
        });
        self.bridge.stop_observing_variable(name)?;
        Ok(())
    }

    fn handle_bind_external_function(
        &mut self,
        name: &str,
        function: ExternalFunction,
        lookahead_safe: bool,
    ) -> Result<(), DispatchError> {
        // Last writer wins: replace any existing binding.
        if self.bridge.is_bound(name) {
            self.bridge.unbind_external_function(name)?;
        }
        self.bridge
            .bind_external_function(name, function, lookahead_safe)?;
        Ok(())
    }

    fn handle_set_variable(&mut self, name: &str, value: Value) -> Result<(), DispatchError> {
        self.bridge.set_variable(name, value)?;
        // A successful write echoes back through the observer queue when the
        // variable is tracked.
        self.sync_engine_changes();
        Ok(())
    }

    /// Re-dispatches queued engine-side variable writes for tracked names.
    fn sync_engine_changes(&mut self) {
        for change in self.bridge.drain_variable_changes() {
            if self
                .selectors
                .variables
                .is_tracked(&self.state, &change.name)
            {
                self.dispatch(Command::VariableObserved {
                    name: change.name,
                    value: change.value,
                });
            }
        }
    }

    /// Reads the engine in one pass and pushes the result into the store:
    /// narration, continuability, errors, choices, in that order.
    fn push_snapshot(&mut self) -> Result<StorySnapshot, DispatchError> {
        let snapshot = self.bridge.snapshot()?;

        let narration = Command::add_narration(
            NarrationParams {
                id: None,
                text: snapshot.text.clone(),
                tags: snapshot.tags.clone(),
                meta: None,
            },
            self.ids.as_ref(),
        );
        self.dispatch(narration);

        self.dispatch(Command::SetCanContinue(snapshot.can_continue));
        self.dispatch(Command::SetStoryErrors(snapshot.errors.clone()));

        let choices = Command::set_choices(
            snapshot
                .choices
                .iter()
                .cloned()
                .map(NewChoice::from)
                .collect(),
            self.ids.as_ref(),
        );
        self.dispatch(choices);

        Ok(snapshot)
    }
}
