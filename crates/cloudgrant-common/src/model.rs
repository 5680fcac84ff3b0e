//! Allocation Model

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Allocation identifier in the host system
pub type AllocationId = u64;

/// Allocation user identifier in the host system
pub type AllocationUserId = u64;

/// A user of the host system
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct User {
    /// Login name, also the federated identity name
    pub username: String,
}

impl User {
    /// Create user
    pub fn new(username: impl Into<String>) -> Self {
        Self { username: username.into() }
    }
}

/// Requesting project
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    /// Host project id
    pub id: u64,
    /// Human readable title, seed for the cloud project name
    pub title: String,
    /// Principal investigator
    pub pi: User,
}

/// A cloud backend registered in the host system
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    /// Host resource id
    pub id: u64,
    /// Display name
    pub name: String,
    /// Backend type name, e.g. `OpenStack`
    pub resource_type: String,
    /// Backend settings such as endpoint and domains
    #[serde(default)]
    pub attributes: HashMap<String, String>,
}

impl Resource {
    /// Create resource without settings
    pub fn new(id: u64, name: impl Into<String>, resource_type: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            resource_type: resource_type.into(),
            attributes: HashMap::new(),
        }
    }

    /// Builder: add a setting
    pub fn with_attribute(mut self, name: &str, value: impl Into<String>) -> Self {
        self.attributes.insert(name.to_string(), value.into());
        self
    }

    /// Get a setting, empty values count as unset
    pub fn get_attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }
}

/// Allocation status in the host system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AllocationStatus {
    /// Requested, not yet approved
    New,
    /// Approved and provisioned
    Active,
    /// Disabled
    Expired,
}

/// A grant of cloud resources to a project
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Allocation {
    /// Host allocation id
    pub id: AllocationId,
    /// Abstract amount of resources granted
    pub quantity: i64,
    /// Associated resources, only the first is used
    pub resources: Vec<Resource>,
    /// Requesting project
    pub project: Project,
    /// Host status
    pub status: AllocationStatus,
}

impl Allocation {
    /// The resource this allocation is provisioned on
    pub fn resource(&self) -> Option<&Resource> {
        self.resources.first()
    }

    /// Quantity used for quota computation, never below 1
    pub fn effective_quantity(&self) -> i64 {
        self.quantity.max(1)
    }
}

/// Pairing of a user with an allocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationUser {
    /// Host allocation user id
    pub id: AllocationUserId,
    /// Allocation the user requests access to
    pub allocation_id: AllocationId,
    /// The user
    pub user: User,
}

/// Value of an allocation attribute
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    /// Integer value, used for quotas
    Int(i64),
    /// Text value, used for project id and name
    Text(String),
}

impl AttributeValue {
    /// Integer view. Text holding a number is parsed.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            Self::Text(s) => s.trim().parse().ok(),
        }
    }

    /// Text view of the value
    pub fn as_text(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{}", v),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for AttributeValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<String> for AttributeValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<&str> for AttributeValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn allocation(quantity: i64) -> Allocation {
        Allocation {
            id: 1,
            quantity,
            resources: vec![Resource::new(1, "cloud", "OpenStack")],
            project: Project { id: 1, title: "Lab".into(), pi: User::new("pi@example.org") },
            status: AllocationStatus::New,
        }
    }

    #[test]
    fn test_effective_quantity() {
        assert_eq!(allocation(3).effective_quantity(), 3);
        assert_eq!(allocation(0).effective_quantity(), 1);
        assert_eq!(allocation(-4).effective_quantity(), 1);
    }

    #[test]
    fn test_empty_resource_attribute_is_unset() {
        let resource = Resource::new(1, "cloud", "OpenStack")
            .with_attribute("a", "")
            .with_attribute("b", "x");
        assert_eq!(resource.get_attribute("a"), None);
        assert_eq!(resource.get_attribute("b"), Some("x"));
    }

    #[test]
    fn test_attribute_value_views() {
        assert_eq!(AttributeValue::from(5).as_int(), Some(5));
        assert_eq!(AttributeValue::from("12").as_int(), Some(12));
        assert_eq!(AttributeValue::from("abc").as_int(), None);
        assert_eq!(AttributeValue::from(5).as_text(), "5");

        let json = serde_json::to_string(&AttributeValue::from(2048)).unwrap();
        assert_eq!(json, "2048");
    }
}
