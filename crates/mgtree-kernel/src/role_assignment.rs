//! Role assignments required by identity-bearing policy assignments.
//!
//! Derivation degrades rather than discards: failures that only affect
//! one parameter (an expression that does not evaluate, a value that is
//! not a resource id) are collected next to the assignments that were
//! derived. Failures that make the whole result untrustworthy abort the
//! pass with a `HierarchyError` and leave every node's previous set as is.

use crate::cancel::CancelToken;
use crate::error::{AssetKind, HierarchyError};
use crate::expression::{self, Environment};
use crate::hierarchy::Hierarchy;
use crate::management_group::ManagementGroup;
use mgtree_library::{
    AssetCatalog, ParameterDefinition, PolicyAssignment, PolicyDefinition, ReferencedDefinition,
    ResourceId,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// One role assignment a policy assignment's managed identity needs.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PolicyRoleAssignment {
    pub assignment_name: String,
    pub role_definition_id: String,
    pub scope: String,
    pub management_group_id: String,
}

/// A parameter-level failure that did not stop derivation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error(
    "management group `{management_group}`: policy assignment `{assignment}`: parameter `{parameter}`{}: {reason}",
    reference_suffix(.reference)
)]
pub struct RoleAssignmentDerivationError {
    pub management_group: String,
    pub assignment: String,
    pub parameter: String,
    /// Set member reference the parameter belongs to, for set definitions.
    pub reference: Option<String>,
    /// Role definitions that would have been assigned at the parameter's scope.
    pub role_definition_ids: Vec<String>,
    pub reason: String,
}

fn reference_suffix(reference: &Option<String>) -> String {
    match reference {
        Some(reference) => format!(" (set member `{reference}`)"),
        None => String::new(),
    }
}

/// Derived role assignments together with the soft errors met on the way.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RoleAssignmentReport {
    pub assignments: BTreeSet<PolicyRoleAssignment>,
    pub errors: Vec<RoleAssignmentDerivationError>,
}

impl RoleAssignmentReport {
    /// True when no soft errors were recorded.
    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn for_management_group<'a>(
        &'a self,
        id: &'a str,
    ) -> impl Iterator<Item = &'a PolicyRoleAssignment> + 'a {
        self.assignments
            .iter()
            .filter(move |assignment| assignment.management_group_id == id)
    }
}

impl Hierarchy {
    /// Derive role assignments for every node.
    ///
    /// On success each node's `policy_role_assignments` is replaced with
    /// what was derived for it and the union is returned. Soft errors are
    /// returned in the report and logged at warn level.
    pub fn policy_role_assignments(
        &self,
        cancel: &CancelToken,
    ) -> Result<RoleAssignmentReport, HierarchyError> {
        let mut nodes = self.write();
        let mut derived = BTreeMap::new();
        let mut errors = Vec::new();
        for (id, node) in nodes.iter() {
            if cancel.is_cancelled() {
                return Err(HierarchyError::Cancelled);
            }
            let mut deriver = Deriver {
                catalog: self.catalog(),
                node,
                assignments: BTreeSet::new(),
                errors: &mut errors,
            };
            deriver.run()?;
            derived.insert(id.clone(), deriver.assignments);
        }

        let mut report = RoleAssignmentReport::default();
        for (id, assignments) in derived {
            report.assignments.extend(assignments.iter().cloned());
            if let Some(node) = nodes.get_mut(&id) {
                node.policy_role_assignments = assignments;
            }
        }
        for error in &errors {
            tracing::warn!(
                management_group = %error.management_group,
                assignment = %error.assignment,
                parameter = %error.parameter,
                reason = %error.reason,
                "role assignment derivation error"
            );
        }
        tracing::debug!(
            assignments = report.assignments.len(),
            errors = errors.len(),
            "derived policy role assignments"
        );
        report.errors = errors;
        Ok(report)
    }
}

struct Deriver<'a> {
    catalog: &'a dyn AssetCatalog,
    node: &'a ManagementGroup,
    assignments: BTreeSet<PolicyRoleAssignment>,
    errors: &'a mut Vec<RoleAssignmentDerivationError>,
}

/// Outcome of resolving one assign-permissions parameter.
enum Scope {
    Resource(String),
    Skip,
    Soft(String),
}

impl Deriver<'_> {
    fn run(&mut self) -> Result<(), HierarchyError> {
        let node = self.node;
        for (name, assignment) in &node.policy_assignments {
            if !assignment.uses_managed_identity() {
                continue;
            }
            let referenced = assignment.referenced_definition().map_err(|source| {
                HierarchyError::InvalidReference {
                    management_group: node.id.clone(),
                    kind: AssetKind::PolicyAssignment,
                    asset: name.clone(),
                    source,
                }
            })?;
            match referenced {
                ReferencedDefinition::Definition(definition) => {
                    self.definition(name, assignment, &definition)?
                }
                ReferencedDefinition::SetDefinition(set) => self.set(name, assignment, &set)?,
            }
        }
        Ok(())
    }

    fn lookup_definition(
        &self,
        name: &str,
        version: Option<&str>,
    ) -> Result<PolicyDefinition, HierarchyError> {
        self.catalog
            .policy_definition(name, version)?
            .ok_or_else(|| HierarchyError::AssetNotFound {
                management_group: self.node.id.clone(),
                kind: AssetKind::PolicyDefinition,
                name: name.to_string(),
                archetype: None,
            })
    }

    fn emit(&mut self, assignment: &str, role_ids: &[String], scope: &str) {
        for role_id in role_ids {
            self.assignments.insert(PolicyRoleAssignment {
                assignment_name: assignment.to_string(),
                role_definition_id: role_id.clone(),
                scope: scope.to_string(),
                management_group_id: self.node.id.clone(),
            });
        }
    }

    fn definition(
        &mut self,
        name: &str,
        assignment: &PolicyAssignment,
        definition_name: &str,
    ) -> Result<(), HierarchyError> {
        let definition = self.lookup_definition(
            definition_name,
            assignment.properties.definition_version.as_deref(),
        )?;
        let role_ids = definition.role_definition_ids();
        if role_ids.is_empty() {
            return Err(HierarchyError::NoRoleDefinitions {
                management_group: self.node.id.clone(),
                assignment: name.to_string(),
                definition: definition_name.to_string(),
            });
        }
        let scope = self.node.resource_id();
        self.emit(name, &role_ids, &scope);

        for (parameter, declared) in definition.assign_permissions_parameters() {
            let value = assignment.parameter_value(parameter).cloned();
            let scope = self.resolve(name, parameter, None, declared, value)?;
            self.apply(name, parameter, None, &role_ids, scope);
        }
        Ok(())
    }

    fn set(
        &mut self,
        name: &str,
        assignment: &PolicyAssignment,
        set_name: &str,
    ) -> Result<(), HierarchyError> {
        let set = self
            .catalog
            .policy_set_definition(set_name, assignment.properties.definition_version.as_deref())?
            .ok_or_else(|| HierarchyError::AssetNotFound {
                management_group: self.node.id.clone(),
                kind: AssetKind::PolicySetDefinition,
                name: set_name.to_string(),
                archetype: None,
            })?;

        let mut env: Environment = set.default_parameter_values();
        env.extend(assignment.parameter_values());

        let node_scope = self.node.resource_id();
        let mut any_roles = false;
        for reference in &set.properties.policy_definitions {
            let member_name = reference.definition_name().map_err(|source| {
                HierarchyError::InvalidReference {
                    management_group: self.node.id.clone(),
                    kind: AssetKind::PolicySetDefinition,
                    asset: set_name.to_string(),
                    source,
                }
            })?;
            let member =
                self.lookup_definition(&member_name, reference.definition_version.as_deref())?;
            let role_ids = member.role_definition_ids();
            if role_ids.is_empty() {
                continue;
            }
            any_roles = true;
            self.emit(name, &role_ids, &node_scope);

            let label = reference.label();
            for (parameter, declared) in member.assign_permissions_parameters() {
                // Once the reference supplies a value, any failure to turn it
                // into a scope only affects this parameter.
                let scope = match reference.parameters.get(parameter) {
                    None => self.unsupplied(name, parameter, Some(label), declared)?,
                    Some(supplied) => {
                        let value = match &supplied.value {
                            Value::String(raw) => expression::evaluate(raw, &env),
                            other => Ok(other.clone()),
                        };
                        match value {
                            Ok(value) => scope_of(value),
                            Err(err) => Scope::Soft(err.to_string()),
                        }
                    }
                };
                self.apply(name, parameter, Some(label), &role_ids, scope);
            }
        }

        if !any_roles {
            return Err(HierarchyError::NoRoleDefinitions {
                management_group: self.node.id.clone(),
                assignment: name.to_string(),
                definition: set_name.to_string(),
            });
        }
        Ok(())
    }

    /// Turn an assignment-supplied parameter value into a role assignment scope.
    ///
    /// Absent, null and empty values count as no value.
    fn resolve(
        &self,
        assignment: &str,
        parameter: &str,
        reference: Option<&str>,
        declared: &ParameterDefinition,
        value: Option<Value>,
    ) -> Result<Scope, HierarchyError> {
        match value {
            None | Some(Value::Null) => {
                self.unsupplied(assignment, parameter, reference, declared)
            }
            Some(Value::String(s)) if s.is_empty() => {
                self.unsupplied(assignment, parameter, reference, declared)
            }
            Some(value) => Ok(scope_of(value)),
        }
    }

    /// A parameter with no value: skipped when optional, a hard error when required.
    fn unsupplied(
        &self,
        assignment: &str,
        parameter: &str,
        reference: Option<&str>,
        declared: &ParameterDefinition,
    ) -> Result<Scope, HierarchyError> {
        if declared.is_optional() {
            return Ok(Scope::Skip);
        }
        Err(HierarchyError::UnresolvedPermissionParameter {
            management_group: self.node.id.clone(),
            assignment: assignment.to_string(),
            parameter: parameter.to_string(),
            reference: reference.map(str::to_string),
        })
    }

    fn apply(
        &mut self,
        assignment: &str,
        parameter: &str,
        reference: Option<&str>,
        role_ids: &[String],
        scope: Scope,
    ) {
        match scope {
            Scope::Resource(scope) => self.emit(assignment, role_ids, &scope),
            Scope::Skip => {}
            Scope::Soft(reason) => self.soft(assignment, parameter, reference, role_ids, reason),
        }
    }

    fn soft(
        &mut self,
        assignment: &str,
        parameter: &str,
        reference: Option<&str>,
        role_ids: &[String],
        reason: String,
    ) {
        self.errors.push(RoleAssignmentDerivationError {
            management_group: self.node.id.clone(),
            assignment: assignment.to_string(),
            parameter: parameter.to_string(),
            reference: reference.map(str::to_string),
            role_definition_ids: role_ids.to_vec(),
            reason,
        });
    }
}

fn scope_of(value: Value) -> Scope {
    match value {
        Value::String(candidate) => match ResourceId::parse(&candidate) {
            Ok(_) => Scope::Resource(candidate),
            Err(err) => Scope::Soft(format!("`{candidate}` is not a resource id: {err}")),
        },
        other => Scope::Soft(format!("expected a resource id string, got `{other}`")),
    }
}
