//! Emitted story text and its presentation grouping.
//!
//! Narrations accumulate in emission order; the grouping algorithm folds each
//! new narration into `grouped_order` as it arrives. The partition is
//! streaming and append-only — a narration never changes the membership of an
//! earlier group.

use inkbound_core::map::PersistentMap;
use inkbound_core::set::PersistentSet;
use inkbound_core::value::Value;
use serde::{Deserialize, Serialize};

use crate::command::Command;

/// Opaque narration identifier.
pub type NarrationId = String;

/// One unit of emitted story text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Narration {
    /// Unique id. Has no meaning to the engine itself.
    pub id: NarrationId,
    /// Position within the overall emission order, assigned at insertion.
    pub index: usize,
    /// The emitted text. May contain newlines.
    pub text: String,
    /// Tags the engine attached to the text, when any.
    pub tags: Option<PersistentSet>,
    /// Host-attached metadata, when any. Merge-only after insertion.
    pub meta: Option<PersistentMap<Value>>,
}

/// A normalized add-narration payload: id assigned, empty collections
/// dropped. The reducer supplies the index.
#[derive(Debug, Clone, PartialEq)]
pub struct NewNarration {
    /// Unique id.
    pub id: NarrationId,
    /// The emitted text.
    pub text: String,
    /// Tags, `None` when the engine attached none.
    pub tags: Option<PersistentSet>,
    /// Metadata, `None` when the host attached none.
    pub meta: Option<PersistentMap<Value>>,
}

/// Caller-facing input to [`Command::add_narration`].
#[derive(Debug, Clone, Default)]
pub struct NarrationParams {
    /// Caller-supplied id; generated when `None`.
    pub id: Option<String>,
    /// The emitted text.
    pub text: String,
    /// Tags attached to the text.
    pub tags: Vec<String>,
    /// Host metadata to attach from the start.
    pub meta: Option<PersistentMap<Value>>,
}

/// One entry of the grouped presentation order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NarrationGrouping {
    /// A narration standing alone, outside any group.
    Ungrouped(NarrationId),
    /// A non-empty visual group of narrations.
    Group(Vec<NarrationId>),
}

/// The narrative slice.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NarrativeState {
    /// Narration ids in emission order. Append-only.
    pub flat_order: Vec<NarrationId>,
    /// The lazily-built partition of `flat_order` into standalone entries
    /// and visual groups.
    pub grouped_order: Vec<NarrationGrouping>,
    /// Tags that start a new group.
    pub group_tags: PersistentSet,
    /// All narrations by id.
    pub narrations: PersistentMap<Narration>,
    /// Tags that keep a narration out of any group.
    pub ungroup_tags: PersistentSet,
}

/// Applies `command` to the narrative slice.
#[must_use]
pub fn reduce(state: &NarrativeState, command: &Command) -> NarrativeState {
    match command {
        Command::AddNarration { narration } => {
            let record = Narration {
                id: narration.id.clone(),
                index: state.flat_order.len(),
                text: narration.text.clone(),
                tags: narration.tags.clone(),
                meta: narration.meta.clone(),
            };
            let mut flat_order = state.flat_order.clone();
            flat_order.push(narration.id.clone());
            NarrativeState {
                flat_order,
                grouped_order: incorporate_into_groups(
                    &state.grouped_order,
                    narration,
                    &state.group_tags,
                    &state.ungroup_tags,
                ),
                narrations: state.narrations.insert(&narration.id, record),
                ..state.clone()
            }
        }
        Command::SetNarrationMeta { id, entries } => {
            if !state.narrations.contains(id) {
                return state.clone();
            }
            NarrativeState {
                narrations: state.narrations.replace(id, |narration| {
                    narration.map(|narration| {
                        let meta = narration.meta.clone().unwrap_or_default().set_many(
                            entries
                                .iter()
                                .map(|(key, value)| (key.clone(), Some(value.clone()))),
                        );
                        Narration {
                            meta: Some(meta),
                            ..narration.clone()
                        }
                    })
                }),
                ..state.clone()
            }
        }
        Command::SetTagReference {
            group_tags,
            ungroup_tags,
        } => NarrativeState {
            group_tags: PersistentSet::from_values(group_tags.iter().cloned()),
            ungroup_tags: PersistentSet::from_values(ungroup_tags.iter().cloned()),
            ..state.clone()
        },
        Command::ClearStory => NarrativeState::default(),
        _ => state.clone(),
    }
}

fn incorporate_into_groups(
    groups: &[NarrationGrouping],
    narration: &NewNarration,
    group_tags: &PersistentSet,
    ungroup_tags: &PersistentSet,
) -> Vec<NarrationGrouping> {
    let id = narration.id.clone();

    // The first narration always begins a new group.
    if groups.is_empty() {
        return vec![NarrationGrouping::Group(vec![id])];
    }

    let empty = PersistentSet::new();
    let tags = narration.tags.as_ref().unwrap_or(&empty);
    let mut next = groups.to_vec();

    // An ungroup-tagged narration stands alone, whatever its neighbors are.
    if tags.overlaps(ungroup_tags) {
        next.push(NarrationGrouping::Ungrouped(id));
        return next;
    }

    // A group-tagged narration starts a fresh group.
    if tags.overlaps(group_tags) {
        next.push(NarrationGrouping::Group(vec![id]));
        return next;
    }

    // Continue the most recent group, unless the previous entry stands
    // alone — grouping never reaches back across an ungroup boundary.
    match next.last_mut() {
        Some(NarrationGrouping::Group(members)) => members.push(id),
        _ => next.push(NarrationGrouping::Group(vec![id])),
    }
    next
}

/// Read-only views over the narrative slice.
pub struct NarrativeSelectors<S> {
    slice: Box<dyn Fn(&S) -> &NarrativeState>,
}

impl<S> NarrativeSelectors<S> {
    /// Builds selectors over the slice that `slice` projects out of `S`.
    pub fn new(slice: impl for<'a> Fn(&'a S) -> &'a NarrativeState + 'static) -> Self {
        Self {
            slice: Box::new(slice),
        }
    }

    /// Narration ids in emission order.
    pub fn flat_order<'a>(&self, root: &'a S) -> &'a [NarrationId] {
        &(self.slice)(root).flat_order
    }

    /// The grouped presentation order.
    pub fn grouped_order<'a>(&self, root: &'a S) -> &'a [NarrationGrouping] {
        &(self.slice)(root).grouped_order
    }

    /// Whether `tag` starts a new group.
    pub fn is_group_tag(&self, root: &S, tag: &str) -> bool {
        (self.slice)(root).group_tags.contains(tag)
    }

    /// Whether `tag` keeps a narration out of any group.
    pub fn is_ungroup_tag(&self, root: &S, tag: &str) -> bool {
        (self.slice)(root).ungroup_tags.contains(tag)
    }

    /// Resolves a narration by id.
    pub fn narration_by_id<'a>(&self, root: &'a S, id: &str) -> Option<&'a Narration> {
        (self.slice)(root).narrations.get(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn add(state: &NarrativeState, id: &str, tags: &[&str]) -> NarrativeState {
        let tags = if tags.is_empty() {
            None
        } else {
            Some(PersistentSet::from_values(tags.iter().copied()))
        };
        reduce(
            state,
            &Command::AddNarration {
                narration: NewNarration {
                    id: id.to_owned(),
                    text: format!("text for {id}"),
                    tags,
                    meta: None,
                },
            },
        )
    }

    fn with_tag_references(group_tags: &[&str], ungroup_tags: &[&str]) -> NarrativeState {
        reduce(
            &NarrativeState::default(),
            &Command::SetTagReference {
                group_tags: group_tags.iter().map(|&t| t.to_owned()).collect(),
                ungroup_tags: ungroup_tags.iter().map(|&t| t.to_owned()).collect(),
            },
        )
    }

    fn group(ids: &[&str]) -> NarrationGrouping {
        NarrationGrouping::Group(ids.iter().map(|&id| id.to_owned()).collect())
    }

    fn ungrouped(id: &str) -> NarrationGrouping {
        NarrationGrouping::Ungrouped(id.to_owned())
    }

    #[test]
    fn test_add_narration_assigns_emission_index() {
        let state = add(&NarrativeState::default(), "a", &[]);
        let state = add(&state, "b", &[]);

        assert_eq!(state.flat_order, vec!["a", "b"]);
        assert_eq!(state.narrations.get("a").unwrap().index, 0);
        assert_eq!(state.narrations.get("b").unwrap().index, 1);
    }

    #[test]
    fn test_first_narration_always_begins_a_group() {
        // Even when tagged as an ungroup tag.
        let state = with_tag_references(&[], &["aside"]);
        let state = add(&state, "a", &["aside"]);
        assert_eq!(state.grouped_order, vec![group(&["a"])]);
    }

    #[test]
    fn test_consecutive_untagged_narrations_share_a_group() {
        let state = add(&NarrativeState::default(), "a", &[]);
        let state = add(&state, "b", &[]);
        assert_eq!(state.grouped_order, vec![group(&["a", "b"])]);
    }

    #[test]
    fn test_ungroup_tagged_narration_stands_alone() {
        let state = with_tag_references(&[], &["aside"]);
        let state = add(&state, "a", &[]);
        let state = add(&state, "b", &["aside"]);
        let state = add(&state, "c", &["aside"]);

        // Ungrouped entries never merge, not even with each other.
        assert_eq!(
            state.grouped_order,
            vec![group(&["a"]), ungrouped("b"), ungrouped("c")]
        );
    }

    #[test]
    fn test_group_tagged_narration_starts_a_new_group() {
        let state = with_tag_references(&["chapter"], &[]);
        let state = add(&state, "a", &[]);
        let state = add(&state, "b", &["chapter"]);
        let state = add(&state, "c", &[]);

        assert_eq!(
            state.grouped_order,
            vec![group(&["a"]), group(&["b", "c"])]
        );
    }

    #[test]
    fn test_grouping_does_not_reach_back_across_an_ungroup_boundary() {
        let state = with_tag_references(&[], &["aside"]);
        let state = add(&state, "a", &[]);
        let state = add(&state, "b", &["aside"]);
        let state = add(&state, "c", &[]);
        let state = add(&state, "d", &[]);

        assert_eq!(
            state.grouped_order,
            vec![group(&["a"]), ungrouped("b"), group(&["c", "d"])]
        );
    }

    #[test]
    fn test_ungroup_tag_wins_when_a_narration_carries_both_tags() {
        let state = with_tag_references(&["chapter"], &["aside"]);
        let state = add(&state, "a", &[]);
        let state = add(&state, "b", &["chapter", "aside"]);

        assert_eq!(state.grouped_order, vec![group(&["a"]), ungrouped("b")]);
    }

    #[test]
    fn test_set_narration_meta_merges_entries() {
        let state = add(&NarrativeState::default(), "a", &[]);

        let state = reduce(
            &state,
            &Command::SetNarrationMeta {
                id: "a".to_owned(),
                entries: vec![("read".to_owned(), Value::Bool(true))],
            },
        );
        let state = reduce(
            &state,
            &Command::SetNarrationMeta {
                id: "a".to_owned(),
                entries: vec![("voice".to_owned(), Value::from("narrator"))],
            },
        );

        let meta = state.narrations.get("a").unwrap().meta.as_ref().unwrap();
        assert_eq!(meta.get("read"), Some(&Value::Bool(true)));
        assert_eq!(meta.get("voice"), Some(&Value::from("narrator")));
    }

    #[test]
    fn test_set_narration_meta_for_unknown_id_is_a_no_op() {
        let state = add(&NarrativeState::default(), "a", &[]);
        let next = reduce(
            &state,
            &Command::SetNarrationMeta {
                id: "missing".to_owned(),
                entries: vec![("read".to_owned(), Value::Bool(true))],
            },
        );
        assert_eq!(next, state);
    }

    #[test]
    fn test_clear_story_resets_to_initial_state() {
        let state = with_tag_references(&["chapter"], &[]);
        let state = add(&state, "a", &[]);
        let state = reduce(&state, &Command::ClearStory);
        assert_eq!(state, NarrativeState::default());
    }

    #[test]
    fn test_selectors_expose_ordering_and_tag_membership() {
        let state = with_tag_references(&["chapter"], &["aside"]);
        let state = add(&state, "a", &[]);
        let selectors = NarrativeSelectors::new(|s: &NarrativeState| s);

        assert_eq!(selectors.flat_order(&state), ["a".to_owned()]);
        assert_eq!(selectors.grouped_order(&state).len(), 1);
        assert!(selectors.is_group_tag(&state, "chapter"));
        assert!(selectors.is_ungroup_tag(&state, "aside"));
        assert!(!selectors.is_group_tag(&state, "aside"));
        assert_eq!(
            selectors.narration_by_id(&state, "a").unwrap().text,
            "text for a"
        );
    }
}
