//! Policy assets: definitions, set definitions and assignments.
//!
//! The types follow the ARM JSON shape (a `properties` envelope with
//! camelCase keys) so library files can be read and exported verbatim.
//! Deep copies are plain `Clone`: every field is owned.

use crate::resource_id::{
    POLICY_ASSIGNMENT_TYPE, POLICY_DEFINITION_TYPE, POLICY_SET_DEFINITION_TYPE, ResourceId,
    ResourceIdError,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

fn policy_definition_type() -> String {
    POLICY_DEFINITION_TYPE.to_string()
}

fn policy_set_definition_type() -> String {
    POLICY_SET_DEFINITION_TYPE.to_string()
}

fn policy_assignment_type() -> String {
    POLICY_ASSIGNMENT_TYPE.to_string()
}

/// A parameter declared by a policy definition or set definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterDefinition {
    #[serde(rename = "type")]
    pub parameter_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_values: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ParameterMetadata>,
}

impl ParameterDefinition {
    /// A parameter is optional when it declares a default value.
    pub fn is_optional(&self) -> bool {
        self.default_value.is_some()
    }

    /// Whether the policy engine must grant the assignment identity
    /// permissions on the resource this parameter names.
    pub fn assign_permissions(&self) -> bool {
        self.metadata
            .as_ref()
            .is_some_and(|metadata| metadata.assign_permissions)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub assign_permissions: bool,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// A concrete value supplied for a parameter: `{"value": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterValue {
    pub value: Value,
}

impl ParameterValue {
    pub fn new(value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
        }
    }
}

// ── Policy definition ──

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type", default = "policy_definition_type")]
    pub resource_type: String,
    pub properties: PolicyDefinitionProperties,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyDefinitionProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, ParameterDefinition>,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub policy_rule: Value,
}

impl PolicyDefinition {
    /// Role definition ids the policy's remediation identity needs,
    /// read from `policyRule.then.details.roleDefinitionIds`.
    pub fn role_definition_ids(&self) -> Vec<String> {
        self.properties
            .policy_rule
            .pointer("/then/details/roleDefinitionIds")
            .and_then(Value::as_array)
            .map(|ids| {
                ids.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn parameter(&self, name: &str) -> Option<&ParameterDefinition> {
        self.properties.parameters.get(name)
    }

    /// Parameters flagged `assignPermissions` in their metadata.
    pub fn assign_permissions_parameters(
        &self,
    ) -> impl Iterator<Item = (&String, &ParameterDefinition)> {
        self.properties
            .parameters
            .iter()
            .filter(|(_, parameter)| parameter.assign_permissions())
    }
}

// ── Policy set definition ──

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicySetDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type", default = "policy_set_definition_type")]
    pub resource_type: String,
    pub properties: PolicySetDefinitionProperties,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicySetDefinitionProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, ParameterDefinition>,
    #[serde(default)]
    pub policy_definitions: Vec<PolicyDefinitionReference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_definition_groups: Option<Vec<Value>>,
}

/// One member of a set definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyDefinitionReference {
    pub policy_definition_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_definition_reference_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition_version: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, ParameterValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_names: Option<Vec<String>>,
}

impl PolicyDefinitionReference {
    /// Reference id if present, otherwise the referenced definition id.
    pub fn label(&self) -> &str {
        self.policy_definition_reference_id
            .as_deref()
            .unwrap_or(&self.policy_definition_id)
    }

    /// Name of the referenced policy definition.
    pub fn definition_name(&self) -> Result<String, ReferenceError> {
        let id = ResourceId::parse(&self.policy_definition_id)?;
        if !id.is_type(POLICY_DEFINITION_TYPE) {
            return Err(ReferenceError::UnexpectedType {
                id: self.policy_definition_id.clone(),
                resource_type: id.resource_type().to_string(),
            });
        }
        Ok(id.name().to_string())
    }
}

impl PolicySetDefinition {
    /// Default values declared on the set's own parameters.
    pub fn default_parameter_values(&self) -> BTreeMap<String, Value> {
        self.properties
            .parameters
            .iter()
            .filter_map(|(name, parameter)| {
                parameter
                    .default_value
                    .as_ref()
                    .map(|value| (name.clone(), value.clone()))
            })
            .collect()
    }

    pub fn parameter(&self, name: &str) -> Option<&ParameterDefinition> {
        self.properties.parameters.get(name)
    }
}

// ── Policy assignment ──

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyAssignment {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type", default = "policy_assignment_type")]
    pub resource_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<AssignmentIdentity>,
    pub properties: PolicyAssignmentProperties,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyAssignmentProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub policy_definition_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub not_scopes: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, ParameterValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enforcement_mode: Option<EnforcementMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub non_compliance_messages: Vec<NonComplianceMessage>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resource_selectors: Vec<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub overrides: Vec<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnforcementMode {
    Default,
    DoNotEnforce,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NonComplianceMessage {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_definition_reference_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentIdentity {
    #[serde(rename = "type")]
    pub identity_type: IdentityType,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub user_assigned_identities: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IdentityType {
    SystemAssigned,
    UserAssigned,
    None,
}

/// Errors raised when an asset's definition reference has the wrong shape.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReferenceError {
    #[error(transparent)]
    ResourceId(#[from] ResourceIdError),

    #[error("reference `{id}` has type `{resource_type}`, expected a policy or policy set definition")]
    UnexpectedType { id: String, resource_type: String },
}

/// What a policy assignment points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferencedDefinition {
    Definition(String),
    SetDefinition(String),
}

impl ReferencedDefinition {
    pub fn name(&self) -> &str {
        match self {
            ReferencedDefinition::Definition(name) | ReferencedDefinition::SetDefinition(name) => {
                name
            }
        }
    }
}

impl PolicyAssignment {
    /// Whether the assignment carries a system- or user-assigned identity.
    pub fn uses_managed_identity(&self) -> bool {
        self.identity
            .as_ref()
            .is_some_and(|identity| identity.identity_type != IdentityType::None)
    }

    /// Classify the definition this assignment references.
    pub fn referenced_definition(&self) -> Result<ReferencedDefinition, ReferenceError> {
        let raw = &self.properties.policy_definition_id;
        let id = ResourceId::parse(raw)?;
        if id.is_type(POLICY_DEFINITION_TYPE) {
            Ok(ReferencedDefinition::Definition(id.name().to_string()))
        } else if id.is_type(POLICY_SET_DEFINITION_TYPE) {
            Ok(ReferencedDefinition::SetDefinition(id.name().to_string()))
        } else {
            Err(ReferenceError::UnexpectedType {
                id: raw.clone(),
                resource_type: id.resource_type().to_string(),
            })
        }
    }

    pub fn parameter_value(&self, name: &str) -> Option<&Value> {
        self.properties
            .parameters
            .get(name)
            .map(|parameter| &parameter.value)
    }

    /// Supplied parameter values as a flat map.
    pub fn parameter_values(&self) -> BTreeMap<String, Value> {
        self.properties
            .parameters
            .iter()
            .map(|(name, parameter)| (name.clone(), parameter.value.clone()))
            .collect()
    }
}
