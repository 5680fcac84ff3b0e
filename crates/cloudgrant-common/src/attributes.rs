//! Attribute names shared with the host allocation system
//!
//! These strings are the keys of the allocation and resource attribute
//! maps. The host UI reads the same names, so they must never change.

use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// Allocation attributes
// =============================================================================

/// Backend-issued project id
pub const ALLOCATION_PROJECT_ID: &str = "Allocated Project ID";

/// Generated project name
pub const ALLOCATION_PROJECT_NAME: &str = "Allocated Project Name";

// =============================================================================
// Resource attributes
// =============================================================================

/// Identity service endpoint
pub const RESOURCE_AUTH_URL: &str = "Identity Endpoint URL";

/// Domain new projects are created in
pub const RESOURCE_PROJECT_DOMAIN: &str = "OpenStack Domain for Projects";

/// Domain federated users are created in
pub const RESOURCE_USER_DOMAIN: &str = "OpenStack Domain for Users";

/// Identity provider federated users map to
pub const RESOURCE_IDP: &str = "OpenStack Identity Provider";

/// Federation protocol, `openid` when unset
pub const RESOURCE_FEDERATION_PROTOCOL: &str = "OpenStack Federation Protocol";

/// External network the default router uplinks to
pub const RESOURCE_DEFAULT_PUBLIC_NETWORK: &str = "OpenStack Public Network ID";

/// CIDR of the default project subnet
pub const RESOURCE_DEFAULT_NETWORK_CIDR: &str = "OpenStack Default Network CIDR";

// =============================================================================
// Quota dimensions
// =============================================================================

/// A named quota axis. Each variant maps to one allocation attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum QuotaDimension {
    /// OpenStack compute instances
    Instances,
    /// OpenStack vCPUs
    Vcpu,
    /// OpenStack RAM in MiB
    Ram,
    /// OpenStack volume count
    Volumes,
    /// OpenStack volume storage in GiB
    VolumesGb,
    /// OpenStack floating IPs
    FloatingIps,
    /// OpenStack object storage in GiB
    ObjectGb,
    /// OpenStack GPUs, bookkeeping only
    Gpu,
    /// OpenShift CPU limit
    LimitsCpu,
    /// OpenShift memory limit in MiB
    LimitsMemory,
    /// OpenShift ephemeral storage limit in GiB
    LimitsEphemeralStorageGb,
}

impl QuotaDimension {
    /// Every dimension known to any backend.
    pub const ALL: [QuotaDimension; 11] = [
        Self::Instances,
        Self::Vcpu,
        Self::Ram,
        Self::Volumes,
        Self::VolumesGb,
        Self::FloatingIps,
        Self::ObjectGb,
        Self::Gpu,
        Self::LimitsCpu,
        Self::LimitsMemory,
        Self::LimitsEphemeralStorageGb,
    ];

    /// Allocation attribute holding this dimension's value
    pub fn attribute_name(&self) -> &'static str {
        match self {
            Self::Instances => "OpenStack Compute Instance Quota",
            Self::Vcpu => "OpenStack Compute vCPU Quota",
            Self::Ram => "OpenStack Compute RAM Quota (MiB)",
            Self::Volumes => "OpenStack Number of Volumes Quota",
            Self::VolumesGb => "OpenStack Volume Quota (GiB)",
            Self::FloatingIps => "OpenStack Floating IP Quota",
            Self::ObjectGb => "OpenStack Swift Quota (GiB)",
            Self::Gpu => "OpenStack GPU Quota",
            Self::LimitsCpu => "OpenShift Limit on CPU Quota",
            Self::LimitsMemory => "OpenShift Limit on RAM Quota (MiB)",
            Self::LimitsEphemeralStorageGb => "OpenShift Limit on Ephemeral Storage Quota (GiB)",
        }
    }

    /// Reverse lookup from an attribute name
    pub fn from_attribute_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.attribute_name() == name)
    }
}

impl fmt::Display for QuotaDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.attribute_name())
    }
}
