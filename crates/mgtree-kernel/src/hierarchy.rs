//! The hierarchy: an id-keyed registry of management groups bound to an
//! asset catalog.
//!
//! Nodes are added parent-first. Each add resolves the node's archetypes
//! against the catalog, copies every named asset into the node, registers
//! it, then runs the node's rewrite pass against a snapshot of the
//! registry. One `RwLock` guards the whole registry: builders and
//! derivation passes take it for writing, queries for reading.

use crate::cancel::CancelToken;
use crate::error::{AssetKind, HierarchyError};
use crate::management_group::{ManagementGroup, OwnerIndex, RewriteContext};
use mgtree_library::{
    Archetype, ArchitectureNode, AssetCatalog, ParameterDefinition, PolicyAssignment,
    ReferencedDefinition,
};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

pub(crate) type NodeMap = BTreeMap<String, ManagementGroup>;

/// Hierarchy-wide switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HierarchyOptions {
    /// Give every role definition copy a node-unique name and display name.
    pub unique_role_definitions: bool,
}

/// Input to [`Hierarchy::add_management_group`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddManagementGroupRequest {
    pub id: String,
    pub display_name: String,
    /// Parent node id, or the external anchor id when `parent_is_external`.
    pub parent_id: String,
    pub parent_is_external: bool,
    pub location: String,
    pub exists: bool,
    pub archetypes: Vec<String>,
}

/// Asset names gathered from a node's archetypes, each mapped to the first
/// archetype that named it (for error context).
#[derive(Debug, Default)]
struct NamedAssets {
    policy_definitions: BTreeMap<String, String>,
    policy_set_definitions: BTreeMap<String, String>,
    policy_assignments: BTreeMap<String, String>,
    role_definitions: BTreeMap<String, String>,
}

impl NamedAssets {
    fn absorb(&mut self, archetype: &Archetype) {
        let pairs = [
            (&archetype.policy_definitions, &mut self.policy_definitions),
            (&archetype.policy_set_definitions, &mut self.policy_set_definitions),
            (&archetype.policy_assignments, &mut self.policy_assignments),
            (&archetype.role_definitions, &mut self.role_definitions),
        ];
        for (names, into) in pairs {
            for name in names {
                into.entry(name.clone())
                    .or_insert_with(|| archetype.name.clone());
            }
        }
    }
}

/// A management-group hierarchy under construction or fully built.
pub struct Hierarchy {
    catalog: Arc<dyn AssetCatalog>,
    options: HierarchyOptions,
    nodes: RwLock<NodeMap>,
}

impl std::fmt::Debug for Hierarchy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hierarchy")
            .field("options", &self.options)
            .field("management_groups", &self.management_group_names())
            .finish_non_exhaustive()
    }
}

impl Hierarchy {
    pub fn new(catalog: Arc<dyn AssetCatalog>) -> Self {
        Self::with_options(catalog, HierarchyOptions::default())
    }

    pub fn with_options(catalog: Arc<dyn AssetCatalog>, options: HierarchyOptions) -> Self {
        Self {
            catalog,
            options,
            nodes: RwLock::new(NodeMap::new()),
        }
    }

    pub fn options(&self) -> HierarchyOptions {
        self.options
    }

    pub(crate) fn catalog(&self) -> &dyn AssetCatalog {
        self.catalog.as_ref()
    }

    pub(crate) fn read(&self) -> RwLockReadGuard<'_, NodeMap> {
        self.nodes.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, NodeMap> {
        self.nodes.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add one management group and run its rewrite pass.
    ///
    /// Validation failures leave the registry untouched. A failure in the
    /// rewrite pass is returned with the node already registered.
    pub fn add_management_group(
        &self,
        request: AddManagementGroupRequest,
    ) -> Result<ManagementGroup, HierarchyError> {
        let mut nodes = self.write();
        self.add_locked(&mut nodes, request)
    }

    fn add_locked(
        &self,
        nodes: &mut NodeMap,
        request: AddManagementGroupRequest,
    ) -> Result<ManagementGroup, HierarchyError> {
        let id = request.id;
        if nodes.contains_key(&id) {
            return Err(HierarchyError::DuplicateManagementGroup(id));
        }

        let level = if request.parent_is_external {
            if nodes.contains_key(&request.parent_id) {
                return Err(HierarchyError::ExternalParentIsManagementGroup {
                    id,
                    parent_id: request.parent_id,
                });
            }
            if let Some(existing) = nodes.values().find(|n| n.parent_external_id.is_some()) {
                return Err(HierarchyError::MultipleRoots {
                    id,
                    existing: existing.id.clone(),
                });
            }
            0
        } else {
            let parent = nodes.get(&request.parent_id).ok_or_else(|| {
                HierarchyError::ParentNotFound {
                    id: id.clone(),
                    parent_id: request.parent_id.clone(),
                }
            })?;
            parent.level + 1
        };

        let mut named = NamedAssets::default();
        for archetype_name in &request.archetypes {
            let archetype = self.catalog.archetype(archetype_name)?.ok_or_else(|| {
                HierarchyError::ArchetypeNotFound {
                    management_group: id.clone(),
                    archetype: archetype_name.clone(),
                }
            })?;
            named.absorb(&archetype);
        }

        let mut node = ManagementGroup::new(
            id.clone(),
            request.display_name,
            request.exists,
            level,
            request.location,
        );
        self.copy_assets(&mut node, &named)?;

        if request.parent_is_external {
            node.parent_external_id = Some(request.parent_id);
        } else {
            if let Some(parent) = nodes.get_mut(&request.parent_id) {
                parent.children.insert(id.clone());
            }
            node.parent = Some(request.parent_id);
        }
        nodes.insert(id.clone(), node);

        let ctx = RewriteContext {
            ancestors: ancestors(nodes, &id),
            definition_owners: owner_index(nodes, |n| n.policy_definitions.keys()),
            set_definition_owners: owner_index(nodes, |n| n.policy_set_definitions.keys()),
            unique_role_definitions: self.options.unique_role_definitions,
        };
        let node = nodes
            .get_mut(&id)
            .ok_or_else(|| HierarchyError::ManagementGroupNotFound(id.clone()))?;
        node.update(&ctx)?;

        tracing::debug!(
            management_group = %id,
            level,
            parent = node.parent.as_deref().or(node.parent_external_id.as_deref()),
            "added management group"
        );
        Ok(node.clone())
    }

    /// Look up and deep-copy every asset the archetypes name.
    fn copy_assets(&self, node: &mut ManagementGroup, named: &NamedAssets) -> Result<(), HierarchyError> {
        let missing = |kind: AssetKind, name: &str, archetype: &str| HierarchyError::AssetNotFound {
            management_group: node.id.clone(),
            kind,
            name: name.to_string(),
            archetype: Some(archetype.to_string()),
        };

        let mut assignments = BTreeMap::new();
        for (name, archetype) in &named.policy_assignments {
            let assignment = self
                .catalog
                .policy_assignment(name)?
                .ok_or_else(|| missing(AssetKind::PolicyAssignment, name, archetype))?;
            self.check_set_parameters(&node.id, &assignment, archetype)?;
            assignments.insert(name.clone(), assignment);
        }

        let mut definitions = BTreeMap::new();
        for (name, archetype) in &named.policy_definitions {
            let definition = self
                .catalog
                .policy_definition(name, None)?
                .ok_or_else(|| missing(AssetKind::PolicyDefinition, name, archetype))?;
            definitions.insert(name.clone(), definition);
        }

        let mut sets = BTreeMap::new();
        for (name, archetype) in &named.policy_set_definitions {
            let set = self
                .catalog
                .policy_set_definition(name, None)?
                .ok_or_else(|| missing(AssetKind::PolicySetDefinition, name, archetype))?;
            sets.insert(name.clone(), set);
        }

        let mut roles = BTreeMap::new();
        for (name, archetype) in &named.role_definitions {
            let role = self
                .catalog
                .role_definition(name)?
                .ok_or_else(|| missing(AssetKind::RoleDefinition, name, archetype))?;
            roles.insert(name.clone(), role);
        }

        node.policy_assignments = assignments;
        node.policy_definitions = definitions;
        node.policy_set_definitions = sets;
        node.role_definitions = roles;
        Ok(())
    }

    /// Every parameter a set member reference passes must be declared by
    /// the member definition.
    fn check_set_parameters(
        &self,
        mg: &str,
        assignment: &PolicyAssignment,
        archetype: &str,
    ) -> Result<(), HierarchyError> {
        let referenced = assignment.referenced_definition().map_err(|source| {
            HierarchyError::InvalidReference {
                management_group: mg.to_string(),
                kind: AssetKind::PolicyAssignment,
                asset: assignment.name.clone(),
                source,
            }
        })?;
        let ReferencedDefinition::SetDefinition(set_name) = referenced else {
            return Ok(());
        };
        let set = self
            .catalog
            .policy_set_definition(&set_name, assignment.properties.definition_version.as_deref())?
            .ok_or_else(|| HierarchyError::AssetNotFound {
                management_group: mg.to_string(),
                kind: AssetKind::PolicySetDefinition,
                name: set_name.clone(),
                archetype: Some(archetype.to_string()),
            })?;

        for reference in &set.properties.policy_definitions {
            let definition_name = reference.definition_name().map_err(|source| {
                HierarchyError::InvalidReference {
                    management_group: mg.to_string(),
                    kind: AssetKind::PolicySetDefinition,
                    asset: set_name.clone(),
                    source,
                }
            })?;
            let definition = self
                .catalog
                .policy_definition(&definition_name, reference.definition_version.as_deref())?
                .ok_or_else(|| HierarchyError::AssetNotFound {
                    management_group: mg.to_string(),
                    kind: AssetKind::PolicyDefinition,
                    name: definition_name.clone(),
                    archetype: Some(archetype.to_string()),
                })?;
            if let Some(parameter) = reference
                .parameters
                .keys()
                .find(|parameter| definition.parameter(parameter).is_none())
            {
                return Err(HierarchyError::ParameterMismatch {
                    management_group: mg.to_string(),
                    assignment: assignment.name.clone(),
                    set_definition: set_name,
                    reference: reference.label().to_string(),
                    parameter: parameter.clone(),
                    definition: definition_name,
                });
            }
        }
        Ok(())
    }

    /// Materialize a named architecture beneath an external parent.
    ///
    /// Roots are added with `external_parent_id` as their external parent,
    /// descendants depth-first beneath them. Stops at the first node that
    /// cannot be added; nodes added before it stay registered.
    pub fn from_architecture(
        &self,
        name: &str,
        external_parent_id: &str,
        location: &str,
        cancel: &CancelToken,
    ) -> Result<(), HierarchyError> {
        let architecture = self
            .catalog
            .architecture(name)?
            .ok_or_else(|| HierarchyError::ArchitectureNotFound(name.to_string()))?;
        tracing::info!(
            architecture = %name,
            management_groups = architecture.len(),
            parent = %external_parent_id,
            "materializing architecture"
        );

        let mut nodes = self.write();
        for root in &architecture.roots {
            self.add_subtree(&mut nodes, name, root, external_parent_id, true, location, cancel)?;
        }

        tracing::info!(
            architecture = %name,
            management_groups = nodes.len(),
            "architecture materialized"
        );
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn add_subtree(
        &self,
        nodes: &mut NodeMap,
        architecture: &str,
        node: &ArchitectureNode,
        parent_id: &str,
        parent_is_external: bool,
        location: &str,
        cancel: &CancelToken,
    ) -> Result<(), HierarchyError> {
        if cancel.is_cancelled() {
            return Err(HierarchyError::Cancelled);
        }
        let request = AddManagementGroupRequest {
            id: node.id.clone(),
            display_name: node.display_name.clone(),
            parent_id: parent_id.to_string(),
            parent_is_external,
            location: location.to_string(),
            exists: node.exists,
            archetypes: node.archetypes.iter().cloned().collect(),
        };
        self.add_locked(nodes, request)
            .map_err(|source| HierarchyError::Architecture {
                architecture: architecture.to_string(),
                management_group: node.id.clone(),
                source: Box::new(source),
            })?;
        for child in &node.children {
            self.add_subtree(nodes, architecture, child, &node.id, false, location, cancel)?;
        }
        Ok(())
    }

    // ── Queries ──

    /// Copy of one node.
    pub fn management_group(&self, id: &str) -> Option<ManagementGroup> {
        self.read().get(id).cloned()
    }

    /// All node ids, sorted.
    pub fn management_group_names(&self) -> Vec<String> {
        self.read().keys().cloned().collect()
    }

    /// Ids of the nodes at `level`, sorted.
    pub fn management_groups_at_level(&self, level: u32) -> Vec<String> {
        self.read()
            .values()
            .filter(|node| node.level == level)
            .map(|node| node.id.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Whether `candidate` is on the parent chain of `id`.
    ///
    /// External parents never count, and a node is not its own parent.
    pub fn has_parent(&self, id: &str, candidate: &str) -> bool {
        ancestors(&self.read(), id).iter().any(|a| a == candidate)
    }

    /// Policy definition name -> ids of the nodes holding a copy.
    pub fn policy_definition_to_mg(&self) -> OwnerIndex {
        owner_index(&self.read(), |n| n.policy_definitions.keys())
    }

    /// Policy set definition name -> ids of the nodes holding a copy.
    pub fn policy_set_definition_to_mg(&self) -> OwnerIndex {
        owner_index(&self.read(), |n| n.policy_set_definitions.keys())
    }
}

/// Ancestor ids of `id`, nearest first.
pub(crate) fn ancestors(nodes: &NodeMap, id: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let mut current = nodes.get(id).and_then(|n| n.parent.as_deref());
    while let Some(parent) = current {
        if out.iter().any(|seen| seen == parent) {
            break;
        }
        out.push(parent.to_string());
        current = nodes.get(parent).and_then(|n| n.parent.as_deref());
    }
    out
}

fn owner_index<'a, F, I>(nodes: &'a NodeMap, names: F) -> OwnerIndex
where
    F: Fn(&'a ManagementGroup) -> I,
    I: Iterator<Item = &'a String>,
{
    let mut index = OwnerIndex::new();
    for node in nodes.values() {
        for name in names(node) {
            index
                .entry(name.clone())
                .or_insert_with(BTreeSet::new)
                .insert(node.id.clone());
        }
    }
    index
}

/// Parameters declared by the definition or set an assignment references,
/// with the referenced name.
pub(crate) fn referenced_parameters(
    catalog: &dyn AssetCatalog,
    mg: &str,
    assignment: &PolicyAssignment,
) -> Result<(String, BTreeMap<String, ParameterDefinition>), HierarchyError> {
    let referenced = assignment.referenced_definition().map_err(|source| {
        HierarchyError::InvalidReference {
            management_group: mg.to_string(),
            kind: AssetKind::PolicyAssignment,
            asset: assignment.name.clone(),
            source,
        }
    })?;
    let version = assignment.properties.definition_version.as_deref();
    let missing = |kind: AssetKind, name: &str| HierarchyError::AssetNotFound {
        management_group: mg.to_string(),
        kind,
        name: name.to_string(),
        archetype: None,
    };
    let parameters = match &referenced {
        ReferencedDefinition::Definition(name) => {
            catalog
                .policy_definition(name, version)?
                .ok_or_else(|| missing(AssetKind::PolicyDefinition, name))?
                .properties
                .parameters
        }
        ReferencedDefinition::SetDefinition(name) => {
            catalog
                .policy_set_definition(name, version)?
                .ok_or_else(|| missing(AssetKind::PolicySetDefinition, name))?
                .properties
                .parameters
        }
    };
    Ok((referenced.name().to_string(), parameters))
}
