//! Property-based test generators using proptest.
//!
//! Provides strategies for generating random write scripts over a small
//! set of identities, plus a runner that replays a script through a
//! [`VersioningHarness`] while keeping a model of the live entities.

use crate::fixtures::VersioningHarness;
use historia_core::CoreResult;
use proptest::prelude::*;
use std::collections::BTreeMap;

/// A single scripted step against the `article` entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptOp {
    /// Insert an article.
    Insert {
        /// Article id.
        id: i64,
        /// Article name.
        name: String,
    },
    /// Update an article's name.
    Update {
        /// Article id.
        id: i64,
        /// New name.
        name: String,
    },
    /// Delete an article.
    Delete {
        /// Article id.
        id: i64,
    },
    /// Flush and commit the current unit of work.
    Commit,
}

/// Strategy for article ids, kept small so scripts revisit identities.
pub fn id_strategy() -> impl Strategy<Value = i64> {
    1..=4i64
}

/// Strategy for article names.
pub fn name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z]{1,8}").expect("valid regex")
}

/// Strategy for a single script step.
pub fn script_op_strategy() -> impl Strategy<Value = ScriptOp> {
    prop_oneof![
        (id_strategy(), name_strategy()).prop_map(|(id, name)| ScriptOp::Insert { id, name }),
        (id_strategy(), name_strategy()).prop_map(|(id, name)| ScriptOp::Update { id, name }),
        id_strategy().prop_map(|id| ScriptOp::Delete { id }),
        Just(ScriptOp::Commit),
    ]
}

/// Strategy for a full write script.
pub fn script_strategy(max_len: usize) -> impl Strategy<Value = Vec<ScriptOp>> {
    prop::collection::vec(script_op_strategy(), 0..max_len)
}

/// Replays a script through a harness, committing on every `Commit`
/// step and once more at the end.
///
/// Steps that make no sense against the current state (inserting an
/// existing id, updating or deleting a missing one) are skipped, so any
/// generated script is valid. Returns the final live entities as
/// id -> name.
pub fn run_script(
    harness: &mut VersioningHarness,
    script: &[ScriptOp],
) -> CoreResult<BTreeMap<i64, String>> {
    let mut live: BTreeMap<i64, String> = BTreeMap::new();
    for op in script {
        match op {
            ScriptOp::Insert { id, name } => {
                if live.contains_key(id) {
                    continue;
                }
                harness.insert_article(*id, name);
                live.insert(*id, name.clone());
            }
            ScriptOp::Update { id, name } => {
                let Some(old) = live.get(id).cloned() else {
                    continue;
                };
                harness.update_article(*id, &old, name);
                live.insert(*id, name.clone());
            }
            ScriptOp::Delete { id } => {
                let Some(old) = live.remove(id) else {
                    continue;
                };
                harness.delete_article(*id, &old);
            }
            ScriptOp::Commit => {
                harness.commit()?;
            }
        }
    }
    harness.commit()?;
    Ok(live)
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn scripts_replay_without_errors(script in script_strategy(24)) {
            let mut harness = VersioningHarness::new();
            run_script(&mut harness, &script).unwrap();
        }

        #[test]
        fn generated_names_are_lowercase(name in name_strategy()) {
            prop_assert!(name.chars().all(|c| c.is_ascii_lowercase()));
            prop_assert!(!name.is_empty());
        }
    }
}
