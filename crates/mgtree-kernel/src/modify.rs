//! Targeted edits to one node's policy assignment copy.

use crate::error::HierarchyError;
use crate::hierarchy::{Hierarchy, referenced_parameters};
use mgtree_library::{
    AssignmentIdentity, EnforcementMode, NonComplianceMessage, ParameterValue, PolicyAssignment,
};
use serde_json::Value;
use std::collections::BTreeMap;

/// Fields to overwrite on an assignment. `None` leaves a field as is.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PolicyAssignmentModification {
    /// Merged into the existing parameters; each must be declared by the
    /// referenced definition.
    pub parameters: BTreeMap<String, Value>,
    pub enforcement_mode: Option<EnforcementMode>,
    pub not_scopes: Option<Vec<String>>,
    pub non_compliance_messages: Option<Vec<NonComplianceMessage>>,
    pub identity: Option<AssignmentIdentity>,
}

impl Hierarchy {
    /// Apply `modification` to the copy of assignment `name` held by `mg`
    /// and return the modified copy.
    pub fn modify_policy_assignment(
        &self,
        mg: &str,
        name: &str,
        modification: PolicyAssignmentModification,
    ) -> Result<PolicyAssignment, HierarchyError> {
        let mut nodes = self.write();
        let node = nodes
            .get_mut(mg)
            .ok_or_else(|| HierarchyError::ManagementGroupNotFound(mg.to_string()))?;
        let assignment = node.policy_assignments.get_mut(name).ok_or_else(|| {
            HierarchyError::PolicyAssignmentNotFound {
                management_group: mg.to_string(),
                assignment: name.to_string(),
            }
        })?;

        if !modification.parameters.is_empty() {
            let (definition, declared) = referenced_parameters(self.catalog(), mg, assignment)?;
            if let Some(parameter) = modification
                .parameters
                .keys()
                .find(|p| !declared.contains_key(*p))
            {
                return Err(HierarchyError::UnknownAssignmentParameter {
                    management_group: mg.to_string(),
                    assignment: name.to_string(),
                    parameter: parameter.clone(),
                    definition,
                });
            }
        }

        for (parameter, value) in modification.parameters {
            assignment
                .properties
                .parameters
                .insert(parameter, ParameterValue::new(value));
        }
        if let Some(mode) = modification.enforcement_mode {
            assignment.properties.enforcement_mode = Some(mode);
        }
        if let Some(not_scopes) = modification.not_scopes {
            assignment.properties.not_scopes = not_scopes;
        }
        if let Some(messages) = modification.non_compliance_messages {
            assignment.properties.non_compliance_messages = messages;
        }
        if let Some(identity) = modification.identity {
            assignment.identity = Some(identity);
        }

        tracing::debug!(management_group = %mg, assignment = %name, "modified policy assignment");
        Ok(assignment.clone())
    }
}
