//! Named default values pushed into assignment parameters hierarchy-wide.

use crate::cancel::CancelToken;
use crate::error::HierarchyError;
use crate::hierarchy::{Hierarchy, referenced_parameters};
use mgtree_library::ParameterValue;
use serde_json::Value;

impl Hierarchy {
    /// Set `value` on every assignment parameter the default-value mapping
    /// `name` lists, on every node holding a copy of that assignment.
    ///
    /// All targets are validated before any is written: a listed parameter
    /// the referenced definition does not declare fails the whole call
    /// with nothing changed. Returns the number of parameters written.
    pub fn add_default_policy_assignment_value(
        &self,
        name: &str,
        value: Value,
        cancel: &CancelToken,
    ) -> Result<usize, HierarchyError> {
        let mapping = self
            .catalog()
            .default_value_mapping(name)?
            .ok_or_else(|| HierarchyError::DefaultValueNotFound(name.to_string()))?;

        let mut nodes = self.write();
        let mut targets = Vec::new();
        for (mg, node) in nodes.iter() {
            if cancel.is_cancelled() {
                return Err(HierarchyError::Cancelled);
            }
            for (assignment_name, parameters) in &mapping.assignments {
                let Some(assignment) = node.policy_assignments.get(assignment_name) else {
                    continue;
                };
                let (definition, declared) =
                    referenced_parameters(self.catalog(), mg, assignment)?;
                if let Some(parameter) = parameters.iter().find(|p| !declared.contains_key(*p)) {
                    return Err(HierarchyError::UnknownAssignmentParameter {
                        management_group: mg.clone(),
                        assignment: assignment_name.clone(),
                        parameter: parameter.clone(),
                        definition,
                    });
                }
                targets.push((mg.clone(), assignment_name.clone(), parameters));
            }
        }

        let mut written = 0;
        for (mg, assignment_name, parameters) in targets {
            let Some(assignment) = nodes
                .get_mut(&mg)
                .and_then(|node| node.policy_assignments.get_mut(&assignment_name))
            else {
                continue;
            };
            for parameter in parameters {
                assignment
                    .properties
                    .parameters
                    .insert(parameter.clone(), ParameterValue::new(value.clone()));
                written += 1;
            }
        }
        tracing::debug!(default = %name, parameters = written, "applied default value");
        Ok(written)
    }
}
