//! Architectures: reusable tree shapes tagged with archetype names.
//!
//! Library files describe an architecture as a flat list of rows, each
//! naming its parent (or `null` for a root). `Architecture::from_definition`
//! validates the rows and folds them into a tree of `ArchitectureNode`s.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// The on-disk shape of an architecture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchitectureDefinition {
    pub name: String,
    pub management_groups: Vec<ArchitectureManagementGroup>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchitectureManagementGroup {
    pub id: String,
    pub display_name: String,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub exists: bool,
    #[serde(default)]
    pub archetypes: BTreeSet<String>,
}

/// One position in an architecture tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchitectureNode {
    pub id: String,
    pub display_name: String,
    pub exists: bool,
    pub archetypes: BTreeSet<String>,
    pub children: Vec<ArchitectureNode>,
}

/// A validated architecture tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Architecture {
    pub name: String,
    pub roots: Vec<ArchitectureNode>,
}

/// Errors raised while folding architecture rows into a tree.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ArchitectureError {
    #[error("architecture `{architecture}` declares `{id}` more than once")]
    DuplicateManagementGroup { architecture: String, id: String },

    #[error("architecture `{architecture}`: `{id}` names unknown parent `{parent_id}`")]
    UnknownParent {
        architecture: String,
        id: String,
        parent_id: String,
    },

    #[error("architecture `{architecture}` has no root management group")]
    NoRoot { architecture: String },

    #[error("architecture `{architecture}`: `{id}` is part of a parent cycle")]
    Cycle { architecture: String, id: String },
}

impl Architecture {
    /// Validate flat rows and build the tree.
    ///
    /// Children keep the order in which their rows appear.
    pub fn from_definition(definition: &ArchitectureDefinition) -> Result<Self, ArchitectureError> {
        let architecture = definition.name.clone();
        let mut rows: BTreeMap<&str, &ArchitectureManagementGroup> = BTreeMap::new();
        for row in &definition.management_groups {
            if rows.insert(row.id.as_str(), row).is_some() {
                return Err(ArchitectureError::DuplicateManagementGroup {
                    architecture,
                    id: row.id.clone(),
                });
            }
        }

        let mut children: BTreeMap<&str, Vec<&ArchitectureManagementGroup>> = BTreeMap::new();
        let mut roots = Vec::new();
        for row in &definition.management_groups {
            match row.parent_id.as_deref() {
                None => roots.push(row),
                Some(parent_id) => {
                    if !rows.contains_key(parent_id) {
                        return Err(ArchitectureError::UnknownParent {
                            architecture,
                            id: row.id.clone(),
                            parent_id: parent_id.to_string(),
                        });
                    }
                    children.entry(parent_id).or_default().push(row);
                }
            }
        }

        if roots.is_empty() {
            return Err(ArchitectureError::NoRoot { architecture });
        }

        let mut visited = BTreeSet::new();
        let roots: Vec<ArchitectureNode> = roots
            .into_iter()
            .map(|row| build_node(row, &children, &mut visited))
            .collect();

        // Rows never reached from a root sit on a parent cycle.
        if let Some(row) = definition
            .management_groups
            .iter()
            .find(|row| !visited.contains(row.id.as_str()))
        {
            return Err(ArchitectureError::Cycle {
                architecture,
                id: row.id.clone(),
            });
        }

        Ok(Self {
            name: definition.name.clone(),
            roots,
        })
    }

    /// Total number of positions in the tree.
    pub fn len(&self) -> usize {
        fn count(node: &ArchitectureNode) -> usize {
            1 + node.children.iter().map(count).sum::<usize>()
        }
        self.roots.iter().map(count).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }
}

fn build_node<'a>(
    row: &'a ArchitectureManagementGroup,
    children: &BTreeMap<&str, Vec<&'a ArchitectureManagementGroup>>,
    visited: &mut BTreeSet<&'a str>,
) -> ArchitectureNode {
    visited.insert(row.id.as_str());
    let kids = children
        .get(row.id.as_str())
        .map(|rows| {
            rows.iter()
                .map(|child| build_node(*child, children, visited))
                .collect()
        })
        .unwrap_or_default();
    ArchitectureNode {
        id: row.id.clone(),
        display_name: row.display_name.clone(),
        exists: row.exists,
        archetypes: row.archetypes.clone(),
        children: kids,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: &str, parent: Option<&str>) -> ArchitectureManagementGroup {
        ArchitectureManagementGroup {
            id: id.to_string(),
            display_name: id.to_uppercase(),
            parent_id: parent.map(str::to_string),
            exists: false,
            archetypes: BTreeSet::from([format!("{id}-archetype")]),
        }
    }

    fn definition(rows: Vec<ArchitectureManagementGroup>) -> ArchitectureDefinition {
        ArchitectureDefinition {
            name: "test".to_string(),
            management_groups: rows,
        }
    }

    #[test]
    fn folds_rows_into_tree() {
        let arch = Architecture::from_definition(&definition(vec![
            row("root", None),
            row("platform", Some("root")),
            row("landing-zones", Some("root")),
            row("corp", Some("landing-zones")),
        ]))
        .expect("architecture should build");

        assert_eq!(arch.roots.len(), 1);
        assert_eq!(arch.len(), 4);
        let root = &arch.roots[0];
        assert_eq!(root.display_name, "ROOT");
        let child_ids: Vec<&str> = root.children.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(child_ids, vec!["platform", "landing-zones"]);
        assert_eq!(root.children[1].children[0].id, "corp");
    }

    #[test]
    fn parent_may_be_declared_after_child() {
        let arch = Architecture::from_definition(&definition(vec![
            row("child", Some("root")),
            row("root", None),
        ]))
        .expect("order of rows must not matter");
        assert_eq!(arch.roots[0].children[0].id, "child");
    }

    #[test]
    fn rejects_duplicates_unknown_parents_and_cycles() {
        let err = Architecture::from_definition(&definition(vec![
            row("root", None),
            row("root", None),
        ]))
        .expect_err("duplicate must fail");
        assert!(matches!(err, ArchitectureError::DuplicateManagementGroup { id, .. } if id == "root"));

        let err = Architecture::from_definition(&definition(vec![
            row("root", None),
            row("orphan", Some("missing")),
        ]))
        .expect_err("unknown parent must fail");
        assert!(matches!(err, ArchitectureError::UnknownParent { parent_id, .. } if parent_id == "missing"));

        let err = Architecture::from_definition(&definition(vec![
            row("root", None),
            row("a", Some("b")),
            row("b", Some("a")),
        ]))
        .expect_err("cycle must fail");
        assert!(matches!(err, ArchitectureError::Cycle { .. }));

        let err = Architecture::from_definition(&definition(vec![row("a", Some("a"))]))
            .expect_err("self-parent without root must fail");
        assert!(matches!(err, ArchitectureError::NoRoot { .. }));
    }
}
