//! Backend Definitions

use serde::{Deserialize, Serialize};
use std::fmt;

/// Supported cloud backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// IaaS: projects, federated users, compute/volume/network quotas
    OpenStack,
    /// Container platform: namespaces, role bindings, resource quota
    OpenShift,
}

impl Backend {
    /// All backends
    pub const ALL: [Backend; 2] = [Self::OpenStack, Self::OpenShift];

    /// Identifier used in resource types and policy tables
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenStack => "openstack",
            Self::OpenShift => "openshift",
        }
    }

    /// Resolve a host resource type name, case-insensitive
    pub fn from_resource_type(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|b| b.as_str().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_type_case_insensitive() {
        assert_eq!(Backend::from_resource_type("OpenStack"), Some(Backend::OpenStack));
        assert_eq!(Backend::from_resource_type("OPENSHIFT"), Some(Backend::OpenShift));
        assert_eq!(Backend::from_resource_type("openshift"), Some(Backend::OpenShift));
        assert_eq!(Backend::from_resource_type("Storage"), None);
        assert_eq!(Backend::from_resource_type(""), None);
    }
}
