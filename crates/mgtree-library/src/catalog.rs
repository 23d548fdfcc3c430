//! Asset catalog: name-keyed lookups for assets and building blocks.
//!
//! The hierarchy builder only ever talks to `AssetCatalog`. Lookups hand
//! back owned values, so nothing a caller mutates can alias catalog state.

use crate::archetype::{Archetype, ArchetypeOverride};
use crate::architecture::{Architecture, ArchitectureError};
use crate::default_values::DefaultValueMapping;
use crate::policy::{PolicyAssignment, PolicyDefinition, PolicySetDefinition};
use crate::role::RoleDefinition;
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Errors raised by catalog lookups or catalog population.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("{kind} `{name}` already exists in the catalog")]
    Duplicate { kind: &'static str, name: String },

    #[error("archetype override `{name}` names unknown base archetype `{base}`")]
    UnknownBaseArchetype { name: String, base: String },

    #[error(transparent)]
    Architecture(#[from] ArchitectureError),

    /// A backing store could not answer (network, permissions, ...).
    #[error("catalog unavailable: {0}")]
    Unavailable(String),
}

/// Read-only lookups consumed by the hierarchy builder.
///
/// `None` means the catalog does not know the name. Versioned lookups
/// with `version = None` return the highest available version.
pub trait AssetCatalog: Send + Sync {
    fn policy_definition(
        &self,
        name: &str,
        version: Option<&str>,
    ) -> Result<Option<PolicyDefinition>, CatalogError>;

    fn policy_set_definition(
        &self,
        name: &str,
        version: Option<&str>,
    ) -> Result<Option<PolicySetDefinition>, CatalogError>;

    fn policy_assignment(&self, name: &str) -> Result<Option<PolicyAssignment>, CatalogError>;

    fn role_definition(&self, name: &str) -> Result<Option<RoleDefinition>, CatalogError>;

    fn archetype(&self, name: &str) -> Result<Option<Archetype>, CatalogError>;

    fn architecture(&self, name: &str) -> Result<Option<Architecture>, CatalogError>;

    fn default_value_mapping(
        &self,
        name: &str,
    ) -> Result<Option<DefaultValueMapping>, CatalogError>;
}

/// Compare dotted versions numerically where both parts are numeric.
///
/// `None` (unversioned) sorts below every version.
pub fn compare_versions(a: Option<&str>, b: Option<&str>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => {
            let mut left = a.split('.');
            let mut right = b.split('.');
            loop {
                match (left.next(), right.next()) {
                    (None, None) => return Ordering::Equal,
                    (None, Some(_)) => return Ordering::Less,
                    (Some(_), None) => return Ordering::Greater,
                    (Some(l), Some(r)) => {
                        let ord = match (l.parse::<u64>(), r.parse::<u64>()) {
                            (Ok(l), Ok(r)) => l.cmp(&r),
                            _ => l.cmp(r),
                        };
                        if ord != Ordering::Equal {
                            return ord;
                        }
                    }
                }
            }
        }
    }
}

/// Versioned entries of one asset name.
#[derive(Debug, Clone)]
struct Versions<T> {
    entries: Vec<(Option<String>, T)>,
}

impl<T> Default for Versions<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<T: Clone> Versions<T> {
    fn contains(&self, version: Option<&str>) -> bool {
        self.entries.iter().any(|(v, _)| v.as_deref() == version)
    }

    fn insert(&mut self, version: Option<String>, value: T) {
        self.entries.push((version, value));
        self.entries
            .sort_by(|(a, _), (b, _)| compare_versions(a.as_deref(), b.as_deref()));
    }

    fn get(&self, version: Option<&str>) -> Option<T> {
        match version {
            Some(version) => self
                .entries
                .iter()
                .find(|(v, _)| v.as_deref() == Some(version))
                .map(|(_, value)| value.clone()),
            None => self.entries.last().map(|(_, value)| value.clone()),
        }
    }
}

/// Canonical in-memory catalog.
#[derive(Debug, Clone, Default)]
pub struct MemoryCatalog {
    policy_definitions: BTreeMap<String, Versions<PolicyDefinition>>,
    policy_set_definitions: BTreeMap<String, Versions<PolicySetDefinition>>,
    policy_assignments: BTreeMap<String, PolicyAssignment>,
    role_definitions: BTreeMap<String, RoleDefinition>,
    archetypes: BTreeMap<String, Archetype>,
    archetype_overrides: BTreeMap<String, ArchetypeOverride>,
    architectures: BTreeMap<String, Architecture>,
    default_values: BTreeMap<String, DefaultValueMapping>,
}

fn insert_unique<T>(
    map: &mut BTreeMap<String, T>,
    kind: &'static str,
    name: String,
    value: T,
) -> Result<(), CatalogError> {
    if map.contains_key(&name) {
        return Err(CatalogError::Duplicate { kind, name });
    }
    map.insert(name, value);
    Ok(())
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_policy_definition(&mut self, definition: PolicyDefinition) -> Result<(), CatalogError> {
        let version = definition.properties.version.clone();
        let entry = self
            .policy_definitions
            .entry(definition.name.clone())
            .or_default();
        if entry.contains(version.as_deref()) {
            return Err(CatalogError::Duplicate {
                kind: "policy definition",
                name: versioned_name(&definition.name, version.as_deref()),
            });
        }
        entry.insert(version, definition);
        Ok(())
    }

    pub fn add_policy_set_definition(
        &mut self,
        definition: PolicySetDefinition,
    ) -> Result<(), CatalogError> {
        let version = definition.properties.version.clone();
        let entry = self
            .policy_set_definitions
            .entry(definition.name.clone())
            .or_default();
        if entry.contains(version.as_deref()) {
            return Err(CatalogError::Duplicate {
                kind: "policy set definition",
                name: versioned_name(&definition.name, version.as_deref()),
            });
        }
        entry.insert(version, definition);
        Ok(())
    }

    pub fn add_policy_assignment(&mut self, assignment: PolicyAssignment) -> Result<(), CatalogError> {
        insert_unique(
            &mut self.policy_assignments,
            "policy assignment",
            assignment.name.clone(),
            assignment,
        )
    }

    pub fn add_role_definition(&mut self, role: RoleDefinition) -> Result<(), CatalogError> {
        insert_unique(&mut self.role_definitions, "role definition", role.name.clone(), role)
    }

    pub fn add_archetype(&mut self, archetype: Archetype) -> Result<(), CatalogError> {
        if self.archetype_overrides.contains_key(&archetype.name) {
            return Err(CatalogError::Duplicate {
                kind: "archetype",
                name: archetype.name,
            });
        }
        insert_unique(
            &mut self.archetypes,
            "archetype",
            archetype.name.clone(),
            archetype,
        )
    }

    /// Register an override; it becomes an archetype on `resolve_overrides`.
    pub fn add_archetype_override(&mut self, over: ArchetypeOverride) -> Result<(), CatalogError> {
        if self.archetypes.contains_key(&over.name) {
            return Err(CatalogError::Duplicate {
                kind: "archetype",
                name: over.name,
            });
        }
        insert_unique(
            &mut self.archetype_overrides,
            "archetype override",
            over.name.clone(),
            over,
        )
    }

    pub fn add_architecture(&mut self, architecture: Architecture) -> Result<(), CatalogError> {
        insert_unique(
            &mut self.architectures,
            "architecture",
            architecture.name.clone(),
            architecture,
        )
    }

    pub fn add_default_value_mapping(
        &mut self,
        mapping: DefaultValueMapping,
    ) -> Result<(), CatalogError> {
        insert_unique(
            &mut self.default_values,
            "default value",
            mapping.name.clone(),
            mapping,
        )
    }

    /// Turn pending overrides into archetypes.
    ///
    /// Overrides may only name plain archetypes as their base.
    pub fn resolve_overrides(&mut self) -> Result<(), CatalogError> {
        let overrides = std::mem::take(&mut self.archetype_overrides);
        for (name, over) in overrides {
            let base = self.archetypes.get(&over.base_archetype).ok_or_else(|| {
                CatalogError::UnknownBaseArchetype {
                    name: name.clone(),
                    base: over.base_archetype.clone(),
                }
            })?;
            let resolved = over.apply(base);
            self.archetypes.insert(name, resolved);
        }
        Ok(())
    }

    pub fn policy_definition_names(&self) -> impl Iterator<Item = &String> {
        self.policy_definitions.keys()
    }

    pub fn policy_set_definition_names(&self) -> impl Iterator<Item = &String> {
        self.policy_set_definitions.keys()
    }

    pub fn policy_assignment_names(&self) -> impl Iterator<Item = &String> {
        self.policy_assignments.keys()
    }

    pub fn role_definition_names(&self) -> impl Iterator<Item = &String> {
        self.role_definitions.keys()
    }

    pub fn archetype_names(&self) -> impl Iterator<Item = &String> {
        self.archetypes.keys()
    }

    pub fn architecture_names(&self) -> impl Iterator<Item = &String> {
        self.architectures.keys()
    }
}

fn versioned_name(name: &str, version: Option<&str>) -> String {
    match version {
        Some(version) => format!("{name}@{version}"),
        None => name.to_string(),
    }
}

impl AssetCatalog for MemoryCatalog {
    fn policy_definition(
        &self,
        name: &str,
        version: Option<&str>,
    ) -> Result<Option<PolicyDefinition>, CatalogError> {
        Ok(self
            .policy_definitions
            .get(name)
            .and_then(|versions| versions.get(version)))
    }

    fn policy_set_definition(
        &self,
        name: &str,
        version: Option<&str>,
    ) -> Result<Option<PolicySetDefinition>, CatalogError> {
        Ok(self
            .policy_set_definitions
            .get(name)
            .and_then(|versions| versions.get(version)))
    }

    fn policy_assignment(&self, name: &str) -> Result<Option<PolicyAssignment>, CatalogError> {
        Ok(self.policy_assignments.get(name).cloned())
    }

    fn role_definition(&self, name: &str) -> Result<Option<RoleDefinition>, CatalogError> {
        Ok(self.role_definitions.get(name).cloned())
    }

    fn archetype(&self, name: &str) -> Result<Option<Archetype>, CatalogError> {
        Ok(self.archetypes.get(name).cloned())
    }

    fn architecture(&self, name: &str) -> Result<Option<Architecture>, CatalogError> {
        Ok(self.architectures.get(name).cloned())
    }

    fn default_value_mapping(
        &self,
        name: &str,
    ) -> Result<Option<DefaultValueMapping>, CatalogError> {
        Ok(self.default_values.get(name).cloned())
    }
}
