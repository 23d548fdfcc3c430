//! Resource identifiers: the fixed templates emitted for hierarchy assets
//! and a parser for the identifiers that assets reference.

use std::fmt;

pub const MANAGEMENT_GROUP_PROVIDER: &str = "Microsoft.Management";
pub const AUTHORIZATION_PROVIDER: &str = "Microsoft.Authorization";

pub const POLICY_DEFINITION_TYPE: &str = "Microsoft.Authorization/policyDefinitions";
pub const POLICY_SET_DEFINITION_TYPE: &str = "Microsoft.Authorization/policySetDefinitions";
pub const POLICY_ASSIGNMENT_TYPE: &str = "Microsoft.Authorization/policyAssignments";
pub const ROLE_DEFINITION_TYPE: &str = "Microsoft.Authorization/roleDefinitions";
pub const MANAGEMENT_GROUP_TYPE: &str = "Microsoft.Management/managementGroups";

/// `/providers/Microsoft.Management/managementGroups/{mg}`
pub fn management_group_id(mg: &str) -> String {
    format!("/providers/{MANAGEMENT_GROUP_PROVIDER}/managementGroups/{mg}")
}

/// Policy definition deployed at management group `mg`.
pub fn policy_definition_id(mg: &str, name: &str) -> String {
    format!(
        "{}/providers/{AUTHORIZATION_PROVIDER}/policyDefinitions/{name}",
        management_group_id(mg)
    )
}

/// Policy set definition deployed at management group `mg`.
pub fn policy_set_definition_id(mg: &str, name: &str) -> String {
    format!(
        "{}/providers/{AUTHORIZATION_PROVIDER}/policySetDefinitions/{name}",
        management_group_id(mg)
    )
}

/// Policy assignment scoped to management group `mg`.
pub fn policy_assignment_id(mg: &str, name: &str) -> String {
    format!(
        "{}/providers/{AUTHORIZATION_PROVIDER}/policyAssignments/{name}",
        management_group_id(mg)
    )
}

/// Role definition deployed at management group `mg`.
pub fn role_definition_id(mg: &str, name: &str) -> String {
    format!(
        "{}/providers/{AUTHORIZATION_PROVIDER}/roleDefinitions/{name}",
        management_group_id(mg)
    )
}

/// Errors raised while parsing a resource identifier.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResourceIdError {
    #[error("resource id `{0}` must start with `/`")]
    MissingLeadingSlash(String),

    #[error("resource id `{0}` contains an empty segment")]
    EmptySegment(String),

    #[error("resource id `{0}` ends before a name segment")]
    Truncated(String),

    #[error("resource id `{id}` has unexpected segment `{segment}`")]
    UnexpectedSegment { id: String, segment: String },
}

/// A parsed resource identifier.
///
/// Only the pieces the hierarchy needs are kept: the fully qualified
/// resource type of the last resource in the id and its name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceId {
    raw: String,
    resource_type: String,
    name: String,
}

impl ResourceId {
    /// Parse an identifier such as
    /// `/subscriptions/{s}/resourceGroups/{rg}/providers/{ns}/{type}/{name}`.
    ///
    /// Accepted shapes are any sequence of `subscriptions/{id}` and
    /// `resourceGroups/{name}` pairs and `providers/{namespace}` blocks, each
    /// block followed by one or more `{type}/{name}` pairs.
    pub fn parse(raw: &str) -> Result<Self, ResourceIdError> {
        let Some(trimmed) = raw.strip_prefix('/') else {
            return Err(ResourceIdError::MissingLeadingSlash(raw.to_string()));
        };
        let segments: Vec<&str> = trimmed.split('/').collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(ResourceIdError::EmptySegment(raw.to_string()));
        }

        let truncated = || ResourceIdError::Truncated(raw.to_string());
        let mut resource_type = String::new();
        let mut name = String::new();
        let mut i = 0;

        while i < segments.len() {
            let key = segments[i];
            if key.eq_ignore_ascii_case("providers") {
                let namespace = segments.get(i + 1).ok_or_else(truncated)?;
                i += 2;
                let mut types = Vec::new();
                while i < segments.len() && !segments[i].eq_ignore_ascii_case("providers") {
                    let value = segments.get(i + 1).ok_or_else(truncated)?;
                    types.push(segments[i]);
                    name = (*value).to_string();
                    i += 2;
                }
                if types.is_empty() {
                    return Err(truncated());
                }
                resource_type = format!("{namespace}/{}", types.join("/"));
                continue;
            }

            let value = segments.get(i + 1).ok_or_else(truncated)?;
            resource_type = if key.eq_ignore_ascii_case("subscriptions") {
                "Microsoft.Resources/subscriptions".to_string()
            } else if key.eq_ignore_ascii_case("resourceGroups") {
                "Microsoft.Resources/resourceGroups".to_string()
            } else {
                return Err(ResourceIdError::UnexpectedSegment {
                    id: raw.to_string(),
                    segment: key.to_string(),
                });
            };
            name = (*value).to_string();
            i += 2;
        }

        Ok(Self {
            raw: raw.to_string(),
            resource_type,
            name,
        })
    }

    /// Fully qualified type, e.g. `Microsoft.Authorization/policyDefinitions`.
    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    /// Last segment of the resource type, e.g. `policyDefinitions`.
    pub fn type_name(&self) -> &str {
        self.resource_type
            .rsplit('/')
            .next()
            .unwrap_or(&self.resource_type)
    }

    /// Name of the resource the id points at.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Whether this id has the given fully qualified resource type.
    pub fn is_type(&self, resource_type: &str) -> bool {
        self.resource_type.eq_ignore_ascii_case(resource_type)
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
