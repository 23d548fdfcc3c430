//! JSON-shaped projection of nodes for external consumers.

use crate::hierarchy::Hierarchy;
use crate::management_group::ManagementGroup;
use crate::role_assignment::PolicyRoleAssignment;
use mgtree_library::{PolicyAssignment, PolicyDefinition, PolicySetDefinition, RoleDefinition};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Serialized form of one management group.
///
/// `parent` is the in-tree parent id, or the external parent id for the
/// root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManagementGroupView {
    pub children: Vec<String>,
    pub display_name: String,
    pub exists: bool,
    pub id: String,
    pub level: u32,
    pub location: String,
    pub parent: Option<String>,
    pub policy_assignments: BTreeMap<String, PolicyAssignment>,
    pub policy_definitions: BTreeMap<String, PolicyDefinition>,
    pub policy_role_assignments: Vec<PolicyRoleAssignment>,
    pub policy_set_definitions: BTreeMap<String, PolicySetDefinition>,
    pub role_definitions: BTreeMap<String, RoleDefinition>,
}

impl From<&ManagementGroup> for ManagementGroupView {
    fn from(node: &ManagementGroup) -> Self {
        Self {
            children: node.children.iter().cloned().collect(),
            display_name: node.display_name.clone(),
            exists: node.exists,
            id: node.id.clone(),
            level: node.level,
            location: node.location.clone(),
            parent: node
                .parent
                .clone()
                .or_else(|| node.parent_external_id.clone()),
            policy_assignments: node.policy_assignments.clone(),
            policy_definitions: node.policy_definitions.clone(),
            policy_role_assignments: node.policy_role_assignments.iter().cloned().collect(),
            policy_set_definitions: node.policy_set_definitions.clone(),
            role_definitions: node.role_definitions.clone(),
        }
    }
}

/// Serialized form of a whole hierarchy, keyed by node id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HierarchyView {
    pub management_groups: BTreeMap<String, ManagementGroupView>,
}

impl ManagementGroup {
    pub fn view(&self) -> ManagementGroupView {
        ManagementGroupView::from(self)
    }
}

impl Hierarchy {
    pub fn view(&self) -> HierarchyView {
        HierarchyView {
            management_groups: self
                .read()
                .iter()
                .map(|(id, node)| (id.clone(), node.view()))
                .collect(),
        }
    }

    pub fn management_group_view(&self, id: &str) -> Option<ManagementGroupView> {
        self.read().get(id).map(ManagementGroup::view)
    }
}
