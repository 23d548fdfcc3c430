//! Archetypes: named bundles of asset names assignable to management groups.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A named bundle of asset names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Archetype {
    pub name: String,
    #[serde(default)]
    pub policy_definitions: BTreeSet<String>,
    #[serde(default)]
    pub policy_set_definitions: BTreeSet<String>,
    #[serde(default)]
    pub policy_assignments: BTreeSet<String>,
    #[serde(default)]
    pub role_definitions: BTreeSet<String>,
}

impl Archetype {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Fold another archetype's asset names into this one.
    pub fn merge(&mut self, other: &Archetype) {
        self.policy_definitions
            .extend(other.policy_definitions.iter().cloned());
        self.policy_set_definitions
            .extend(other.policy_set_definitions.iter().cloned());
        self.policy_assignments
            .extend(other.policy_assignments.iter().cloned());
        self.role_definitions
            .extend(other.role_definitions.iter().cloned());
    }
}

/// An archetype derived from a base archetype by adding and removing names.
///
/// Removals apply before additions, so a name present in both lists is kept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchetypeOverride {
    pub name: String,
    pub base_archetype: String,
    #[serde(default)]
    pub policy_definitions_to_add: BTreeSet<String>,
    #[serde(default)]
    pub policy_definitions_to_remove: BTreeSet<String>,
    #[serde(default)]
    pub policy_set_definitions_to_add: BTreeSet<String>,
    #[serde(default)]
    pub policy_set_definitions_to_remove: BTreeSet<String>,
    #[serde(default)]
    pub policy_assignments_to_add: BTreeSet<String>,
    #[serde(default)]
    pub policy_assignments_to_remove: BTreeSet<String>,
    #[serde(default)]
    pub role_definitions_to_add: BTreeSet<String>,
    #[serde(default)]
    pub role_definitions_to_remove: BTreeSet<String>,
}

fn adjust(
    base: &BTreeSet<String>,
    add: &BTreeSet<String>,
    remove: &BTreeSet<String>,
) -> BTreeSet<String> {
    base.difference(remove).chain(add.iter()).cloned().collect()
}

impl ArchetypeOverride {
    /// Resolve this override against its base archetype.
    pub fn apply(&self, base: &Archetype) -> Archetype {
        Archetype {
            name: self.name.clone(),
            policy_definitions: adjust(
                &base.policy_definitions,
                &self.policy_definitions_to_add,
                &self.policy_definitions_to_remove,
            ),
            policy_set_definitions: adjust(
                &base.policy_set_definitions,
                &self.policy_set_definitions_to_add,
                &self.policy_set_definitions_to_remove,
            ),
            policy_assignments: adjust(
                &base.policy_assignments,
                &self.policy_assignments_to_add,
                &self.policy_assignments_to_remove,
            ),
            role_definitions: adjust(
                &base.role_definitions,
                &self.role_definitions_to_add,
                &self.role_definitions_to_remove,
            ),
        }
    }
}
