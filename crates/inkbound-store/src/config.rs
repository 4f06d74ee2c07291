//! Story configuration schema.
//!
//! The configuration travels with the set-story command. Its data portions
//! are serde types so hosts can load them from JSON; the callable tables are
//! attached programmatically.

use std::fmt;

use inkbound_core::engine::ExternalFunction;
use serde::{Deserialize, Serialize};

/// The configuration schema version this build understands. A set-story
/// command with any other version is rejected.
pub const CONFIG_VERSION: u32 = 1;

/// Variable names to start tracking when a story loads, partitioned by the
/// kind each will be coerced to. JSON field names are the kind names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackedVariables {
    /// Names tracked as booleans.
    #[serde(rename = "bool")]
    pub bools: Vec<String>,
    /// Names tracked as integers.
    #[serde(rename = "int")]
    pub ints: Vec<String>,
    /// Names tracked as floats.
    #[serde(rename = "float")]
    pub floats: Vec<String>,
    /// Names tracked as strings.
    #[serde(rename = "string")]
    pub strings: Vec<String>,
}

/// Tag configuration for the narration grouping algorithm.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LineGrouping {
    /// Tags that force a narration to start a new group.
    pub group_tags: Vec<String>,
    /// Tags that force a narration to stand alone, outside any group.
    pub groupless_tags: Vec<String>,
}

/// Everything a set-story command needs beyond the story itself.
///
/// Callable tables are ordered lists so binding order is deterministic.
#[derive(Clone, Default)]
pub struct StoryConfig {
    /// Must equal [`CONFIG_VERSION`].
    pub version: u32,
    /// Variables to track from load.
    pub tracked_variables: TrackedVariables,
    /// Narration grouping tags.
    pub line_grouping: LineGrouping,
    /// Initial value for the continue-maximally default; `None` keeps the
    /// slice's initial value.
    pub default_continue_maximally: Option<bool>,
    /// Initial value for the continue-after-choice default; `None` keeps the
    /// slice's initial value.
    pub default_continue_after_choice: Option<bool>,
    /// Host functions to bind, not safe for lookahead evaluation.
    pub external_functions: Vec<(String, ExternalFunction)>,
    /// Host functions to bind as lookahead-safe.
    pub lookahead_safe_external_functions: Vec<(String, ExternalFunction)>,
}

impl StoryConfig {
    /// A configuration carrying the supported version and no other settings.
    #[must_use]
    pub fn current_version() -> Self {
        Self {
            version: CONFIG_VERSION,
            ..Self::default()
        }
    }
}

impl fmt::Debug for StoryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Callables have no useful Debug form; show their names only.
        f.debug_struct("StoryConfig")
            .field("version", &self.version)
            .field("tracked_variables", &self.tracked_variables)
            .field("line_grouping", &self.line_grouping)
            .field("default_continue_maximally", &self.default_continue_maximally)
            .field(
                "default_continue_after_choice",
                &self.default_continue_after_choice,
            )
            .field(
                "external_functions",
                &self
                    .external_functions
                    .iter()
                    .map(|(name, _)| name)
                    .collect::<Vec<_>>(),
            )
            .field(
                "lookahead_safe_external_functions",
                &self
                    .lookahead_safe_external_functions
                    .iter()
                    .map(|(name, _)| name)
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracked_variables_deserialize_from_kind_keyed_json() {
        let parsed: TrackedVariables = serde_json::from_value(serde_json::json!({
            "bool": ["hasKey"],
            "int": ["hp"],
        }))
        .unwrap();

        assert_eq!(parsed.bools, vec!["hasKey"]);
        assert_eq!(parsed.ints, vec!["hp"]);
        assert!(parsed.floats.is_empty());
        assert!(parsed.strings.is_empty());
    }

    #[test]
    fn test_line_grouping_deserializes_from_camel_case_json() {
        let parsed: LineGrouping = serde_json::from_value(serde_json::json!({
            "groupTags": ["chapter"],
            "grouplessTags": ["aside"],
        }))
        .unwrap();

        assert_eq!(parsed.group_tags, vec!["chapter"]);
        assert_eq!(parsed.groupless_tags, vec!["aside"]);
    }

    #[test]
    fn test_unknown_fields_are_ignored() {
        let parsed: LineGrouping = serde_json::from_value(serde_json::json!({
            "groupTags": ["chapter"],
            "someFutureKnob": true,
        }))
        .unwrap();

        assert_eq!(parsed.group_tags, vec!["chapter"]);
    }

    #[test]
    fn test_current_version_matches_the_supported_schema() {
        assert_eq!(StoryConfig::current_version().version, CONFIG_VERSION);
    }
}
