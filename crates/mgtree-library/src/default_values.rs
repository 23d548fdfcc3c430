//! Default-value mappings: which assignment parameters receive a named
//! default (for example a shared log analytics workspace id).

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// The on-disk shape: a file may declare several defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultValueFile {
    pub defaults: Vec<DefaultValueEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultValueEntry {
    pub default_name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub policy_assignments: Vec<DefaultValueTarget>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultValueTarget {
    pub policy_assignment_name: String,
    pub parameter_names: BTreeSet<String>,
}

/// A named default folded into `assignment name -> {parameter names}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultValueMapping {
    pub name: String,
    pub description: Option<String>,
    pub assignments: BTreeMap<String, BTreeSet<String>>,
}

impl From<&DefaultValueEntry> for DefaultValueMapping {
    fn from(entry: &DefaultValueEntry) -> Self {
        let mut assignments: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for target in &entry.policy_assignments {
            assignments
                .entry(target.policy_assignment_name.clone())
                .or_default()
                .extend(target.parameter_names.iter().cloned());
        }
        Self {
            name: entry.default_name.clone(),
            description: entry.description.clone(),
            assignments,
        }
    }
}

impl DefaultValueFile {
    pub fn mappings(&self) -> Vec<DefaultValueMapping> {
        self.defaults.iter().map(DefaultValueMapping::from).collect()
    }
}
