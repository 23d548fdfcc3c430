//! Management groups: one node of the hierarchy and its asset copies.
//!
//! A node owns independent copies of every asset it carries. The rewrite
//! pass (`update`) stamps those copies with identifiers scoped to the node
//! and repoints cross-references at the node that actually deploys the
//! referenced definition. Tree links are plain ids resolved through the
//! owning `Hierarchy`.

use crate::error::{AssetKind, HierarchyError};
use crate::role_assignment::PolicyRoleAssignment;
use mgtree_library::resource_id::{
    self, POLICY_DEFINITION_TYPE, POLICY_SET_DEFINITION_TYPE, ResourceId,
};
use mgtree_library::{
    PolicyAssignment, PolicyDefinition, PolicySetDefinition, ReferenceError, RoleDefinition,
};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

/// Asset name -> ids of the management groups holding a copy of it.
pub type OwnerIndex = BTreeMap<String, BTreeSet<String>>;

/// One management group in a hierarchy.
#[derive(Debug, Clone, PartialEq)]
pub struct ManagementGroup {
    pub(crate) id: String,
    pub(crate) display_name: String,
    pub(crate) exists: bool,
    pub(crate) level: u32,
    pub(crate) location: String,
    pub(crate) parent: Option<String>,
    pub(crate) parent_external_id: Option<String>,
    pub(crate) children: BTreeSet<String>,
    pub(crate) policy_definitions: BTreeMap<String, PolicyDefinition>,
    pub(crate) policy_set_definitions: BTreeMap<String, PolicySetDefinition>,
    pub(crate) policy_assignments: BTreeMap<String, PolicyAssignment>,
    pub(crate) role_definitions: BTreeMap<String, RoleDefinition>,
    pub(crate) policy_role_assignments: BTreeSet<PolicyRoleAssignment>,
}

/// Snapshot of the hierarchy a node needs while rewriting itself.
#[derive(Debug, Clone, Default)]
pub(crate) struct RewriteContext {
    /// Ancestor ids, nearest first. External parents are not included.
    pub ancestors: Vec<String>,
    pub definition_owners: OwnerIndex,
    pub set_definition_owners: OwnerIndex,
    pub unique_role_definitions: bool,
}

impl ManagementGroup {
    pub(crate) fn new(
        id: String,
        display_name: String,
        exists: bool,
        level: u32,
        location: String,
    ) -> Self {
        Self {
            id,
            display_name,
            exists,
            level,
            location,
            parent: None,
            parent_external_id: None,
            children: BTreeSet::new(),
            policy_definitions: BTreeMap::new(),
            policy_set_definitions: BTreeMap::new(),
            policy_assignments: BTreeMap::new(),
            role_definitions: BTreeMap::new(),
            policy_role_assignments: BTreeSet::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// `/providers/Microsoft.Management/managementGroups/{id}`
    pub fn resource_id(&self) -> String {
        resource_id::management_group_id(&self.id)
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Whether the group already exists and must not be created.
    pub fn exists(&self) -> bool {
        self.exists
    }

    /// Depth in the tree; the root is level 0.
    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    /// Parent inside the hierarchy, if any.
    pub fn parent_id(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    /// Parent outside the hierarchy (only ever set on the root).
    pub fn parent_external_id(&self) -> Option<&str> {
        self.parent_external_id.as_deref()
    }

    pub fn children(&self) -> &BTreeSet<String> {
        &self.children
    }

    pub fn policy_definitions(&self) -> &BTreeMap<String, PolicyDefinition> {
        &self.policy_definitions
    }

    pub fn policy_set_definitions(&self) -> &BTreeMap<String, PolicySetDefinition> {
        &self.policy_set_definitions
    }

    pub fn policy_assignments(&self) -> &BTreeMap<String, PolicyAssignment> {
        &self.policy_assignments
    }

    pub fn role_definitions(&self) -> &BTreeMap<String, RoleDefinition> {
        &self.role_definitions
    }

    /// Role assignments from the last derivation pass.
    pub fn policy_role_assignments(&self) -> &BTreeSet<PolicyRoleAssignment> {
        &self.policy_role_assignments
    }

    /// Rewrite identifiers and references of every asset copy.
    ///
    /// Recomputes everything from the asset map keys and the current
    /// context, so running it again yields the same result.
    pub(crate) fn update(&mut self, ctx: &RewriteContext) -> Result<(), HierarchyError> {
        self.rewrite_policy_definitions();
        self.rewrite_policy_set_definitions(ctx)?;
        self.rewrite_role_definitions(ctx.unique_role_definitions);
        self.rewrite_policy_assignments(ctx)?;
        tracing::debug!(
            management_group = %self.id,
            policy_definitions = self.policy_definitions.len(),
            policy_set_definitions = self.policy_set_definitions.len(),
            policy_assignments = self.policy_assignments.len(),
            role_definitions = self.role_definitions.len(),
            "rewrote management group assets"
        );
        Ok(())
    }

    fn rewrite_policy_definitions(&mut self) {
        for (name, definition) in &mut self.policy_definitions {
            definition.id = Some(resource_id::policy_definition_id(&self.id, name));
        }
    }

    fn rewrite_policy_set_definitions(&mut self, ctx: &RewriteContext) -> Result<(), HierarchyError> {
        let mg = self.id.clone();
        for (name, set) in &mut self.policy_set_definitions {
            set.id = Some(resource_id::policy_set_definition_id(&mg, name));
            for reference in &mut set.properties.policy_definitions {
                let definition = reference.definition_name().map_err(|source| {
                    HierarchyError::InvalidReference {
                        management_group: mg.clone(),
                        kind: AssetKind::PolicySetDefinition,
                        asset: name.clone(),
                        source,
                    }
                })?;
                let Some(owners) = ctx.definition_owners.get(&definition) else {
                    // Not deployed anywhere in the hierarchy: a built-in.
                    continue;
                };
                let owner = resolve_owner(&mg, &ctx.ancestors, owners).ok_or_else(|| {
                    HierarchyError::UnreachableDefinition {
                        management_group: mg.clone(),
                        kind: AssetKind::PolicySetDefinition,
                        asset: name.clone(),
                        reference: reference.label().to_string(),
                        definition: definition.clone(),
                        owners: owners.iter().cloned().collect(),
                    }
                })?;
                reference.policy_definition_id =
                    resource_id::policy_definition_id(owner, &definition);
            }
        }
        Ok(())
    }

    fn rewrite_role_definitions(&mut self, unique: bool) {
        let scope = self.resource_id();
        for (name, role) in &mut self.role_definitions {
            if unique {
                role.name = unique_role_name(&self.id, name).to_string();
                let suffix = format!(" ({})", self.id);
                if !role.properties.role_name.ends_with(&suffix) {
                    role.properties.role_name.push_str(&suffix);
                }
            }
            role.id = Some(resource_id::role_definition_id(&self.id, &role.name));
            role.properties.assignable_scopes = vec![scope.clone()];
        }
    }

    fn rewrite_policy_assignments(&mut self, ctx: &RewriteContext) -> Result<(), HierarchyError> {
        let mg = self.id.clone();
        let scope = self.resource_id();
        for (name, assignment) in &mut self.policy_assignments {
            assignment.id = Some(resource_id::policy_assignment_id(&mg, name));
            assignment.properties.scope = Some(scope.clone());
            if assignment.location.is_some() {
                assignment.location = Some(self.location.clone());
            }

            let invalid = |source: ReferenceError| HierarchyError::InvalidReference {
                management_group: mg.clone(),
                kind: AssetKind::PolicyAssignment,
                asset: name.clone(),
                source,
            };
            let reference = ResourceId::parse(&assignment.properties.policy_definition_id)
                .map_err(|e| invalid(e.into()))?;
            let (owners, is_set) = if reference.is_type(POLICY_DEFINITION_TYPE) {
                (&ctx.definition_owners, false)
            } else if reference.is_type(POLICY_SET_DEFINITION_TYPE) {
                (&ctx.set_definition_owners, true)
            } else {
                return Err(invalid(ReferenceError::UnexpectedType {
                    id: reference.to_string(),
                    resource_type: reference.resource_type().to_string(),
                }));
            };

            let definition = reference.name();
            let Some(owners) = owners.get(definition) else {
                continue;
            };
            let owner = resolve_owner(&mg, &ctx.ancestors, owners).ok_or_else(|| {
                HierarchyError::UnreachableDefinition {
                    management_group: mg.clone(),
                    kind: AssetKind::PolicyAssignment,
                    asset: name.clone(),
                    reference: reference.to_string(),
                    definition: definition.to_string(),
                    owners: owners.iter().cloned().collect(),
                }
            })?;
            assignment.properties.policy_definition_id = if is_set {
                resource_id::policy_set_definition_id(owner, definition)
            } else {
                resource_id::policy_definition_id(owner, definition)
            };
        }
        Ok(())
    }
}

/// Pick the node whose copy a reference should use: this node if it owns
/// one, otherwise the nearest ancestor that does.
fn resolve_owner<'a>(
    mg: &'a str,
    ancestors: &'a [String],
    owners: &BTreeSet<String>,
) -> Option<&'a str> {
    if owners.contains(mg) {
        return Some(mg);
    }
    ancestors
        .iter()
        .find(|ancestor| owners.contains(ancestor.as_str()))
        .map(String::as_str)
}

/// Deterministic role name for `asset` deployed at `mg`.
pub fn unique_role_name(mg: &str, asset: &str) -> Uuid {
    Uuid::new_v5(&Uuid::NAMESPACE_URL, format!("{mg}{asset}").as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mgtree_library::{
        PolicyAssignmentProperties, PolicyDefinitionProperties, PolicyDefinitionReference,
        PolicySetDefinitionProperties, RoleDefinitionProperties,
    };

    fn node(id: &str) -> ManagementGroup {
        ManagementGroup::new(
            id.to_string(),
            id.to_string(),
            false,
            0,
            "westeurope".to_string(),
        )
    }

    fn definition(name: &str) -> PolicyDefinition {
        PolicyDefinition {
            name: name.to_string(),
            id: None,
            resource_type: POLICY_DEFINITION_TYPE.to_string(),
            properties: PolicyDefinitionProperties::default(),
        }
    }

    fn set_referencing(name: &str, definition_id: &str) -> PolicySetDefinition {
        PolicySetDefinition {
            name: name.to_string(),
            id: None,
            resource_type: POLICY_SET_DEFINITION_TYPE.to_string(),
            properties: PolicySetDefinitionProperties {
                policy_definitions: vec![PolicyDefinitionReference {
                    policy_definition_id: definition_id.to_string(),
                    policy_definition_reference_id: Some("member".to_string()),
                    definition_version: None,
                    parameters: BTreeMap::new(),
                    group_names: None,
                }],
                ..PolicySetDefinitionProperties::default()
            },
        }
    }

    fn assignment(name: &str, definition_id: &str, location: Option<&str>) -> PolicyAssignment {
        PolicyAssignment {
            name: name.to_string(),
            id: None,
            resource_type: mgtree_library::resource_id::POLICY_ASSIGNMENT_TYPE.to_string(),
            location: location.map(str::to_string),
            identity: None,
            properties: PolicyAssignmentProperties {
                policy_definition_id: definition_id.to_string(),
                ..PolicyAssignmentProperties::default()
            },
        }
    }

    fn role(name: &str) -> RoleDefinition {
        RoleDefinition {
            name: name.to_string(),
            id: None,
            resource_type: mgtree_library::resource_id::ROLE_DEFINITION_TYPE.to_string(),
            properties: RoleDefinitionProperties {
                role_name: "Network Ops".to_string(),
                assignable_scopes: vec!["/".to_string()],
                ..RoleDefinitionProperties::default()
            },
        }
    }

    fn owners(pairs: &[(&str, &[&str])]) -> OwnerIndex {
        pairs
            .iter()
            .map(|(name, mgs)| {
                (
                    name.to_string(),
                    mgs.iter().map(|mg| mg.to_string()).collect(),
                )
            })
            .collect()
    }

    #[test]
    fn stamps_identifiers_for_every_asset_kind() {
        let mut mg = node("corp");
        mg.policy_definitions.insert("d".to_string(), definition("d"));
        mg.role_definitions.insert("r".to_string(), role("r"));
        mg.policy_assignments.insert(
            "a".to_string(),
            assignment(
                "a",
                "/providers/Microsoft.Authorization/policyDefinitions/builtin",
                Some("eastus"),
            ),
        );

        mg.update(&RewriteContext::default()).expect("update should succeed");

        assert_eq!(
            mg.policy_definitions["d"].id.as_deref(),
            Some(resource_id::policy_definition_id("corp", "d").as_str())
        );
        let role = &mg.role_definitions["r"];
        assert_eq!(role.id, Some(resource_id::role_definition_id("corp", "r")));
        assert_eq!(role.properties.assignable_scopes, vec![mg.resource_id()]);
        let assignment = &mg.policy_assignments["a"];
        assert_eq!(assignment.id, Some(resource_id::policy_assignment_id("corp", "a")));
        assert_eq!(assignment.properties.scope, Some(mg.resource_id()));
        assert_eq!(assignment.location.as_deref(), Some("westeurope"));
        // Built-in reference is left alone.
        assert_eq!(
            assignment.properties.policy_definition_id,
            "/providers/Microsoft.Authorization/policyDefinitions/builtin"
        );
    }

    #[test]
    fn assignment_without_location_stays_without() {
        let mut mg = node("corp");
        mg.policy_assignments.insert(
            "a".to_string(),
            assignment("a", "/providers/Microsoft.Authorization/policyDefinitions/x", None),
        );
        mg.update(&RewriteContext::default()).unwrap();
        assert!(mg.policy_assignments["a"].location.is_none());
    }

    #[test]
    fn set_reference_resolves_to_nearest_owner() {
        let mut mg = node("leaf");
        mg.policy_set_definitions.insert(
            "s".to_string(),
            set_referencing(
                "s",
                "/providers/Microsoft.Authorization/policyDefinitions/x",
            ),
        );
        let ctx = RewriteContext {
            ancestors: vec!["mid".to_string(), "root".to_string()],
            definition_owners: owners(&[("x", &["root", "mid"])]),
            ..RewriteContext::default()
        };
        mg.update(&ctx).unwrap();
        assert_eq!(
            mg.policy_set_definitions["s"].properties.policy_definitions[0].policy_definition_id,
            resource_id::policy_definition_id("mid", "x")
        );
    }

    #[test]
    fn sideways_owner_is_a_topology_error() {
        let mut mg = node("leaf");
        mg.policy_assignments.insert(
            "a".to_string(),
            assignment(
                "a",
                "/providers/Microsoft.Authorization/policySetDefinitions/s",
                None,
            ),
        );
        let ctx = RewriteContext {
            ancestors: vec!["root".to_string()],
            set_definition_owners: owners(&[("s", &["sibling"])]),
            ..RewriteContext::default()
        };
        let err = mg.update(&ctx).expect_err("sibling owner must not be visible");
        assert!(matches!(
            err,
            HierarchyError::UnreachableDefinition { ref owners, ref definition, .. }
                if owners == &vec!["sibling".to_string()] && definition == "s"
        ));
    }

    #[test]
    fn role_reference_on_assignment_is_invalid() {
        let mut mg = node("corp");
        mg.policy_assignments.insert(
            "a".to_string(),
            assignment("a", "/providers/Microsoft.Authorization/roleDefinitions/r", None),
        );
        let err = mg.update(&RewriteContext::default()).expect_err("must fail");
        assert!(matches!(
            err,
            HierarchyError::InvalidReference {
                kind: AssetKind::PolicyAssignment,
                ..
            }
        ));
    }

    #[test]
    fn unique_role_names_are_stable_across_reruns() {
        let mut mg = node("corp");
        mg.role_definitions.insert("r".to_string(), role("r"));
        let ctx = RewriteContext {
            unique_role_definitions: true,
            ..RewriteContext::default()
        };
        mg.update(&ctx).unwrap();
        let first = mg.role_definitions["r"].clone();
        mg.update(&ctx).unwrap();
        assert_eq!(mg.role_definitions["r"], first);
        assert_eq!(first.name, unique_role_name("corp", "r").to_string());
        assert_eq!(first.properties.role_name, "Network Ops (corp)");
        assert_eq!(
            first.id,
            Some(resource_id::role_definition_id("corp", &first.name))
        );
    }
}
