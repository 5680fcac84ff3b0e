//! CloudGrant Configuration
//!
//! ```toml
//! [membership]
//! poll_interval_secs = 2
//! max_wait_secs = 120
//!
//! [openstack]
//! member_role = "member"
//! federation_protocol = "openid"
//!
//! [openshift]
//! member_role = "edit"
//! ```
//!
//! Every key is optional. Per-resource settings such as domains and the
//! identity provider live on the resource itself and override these.

use crate::error::{Result, WorkflowError};
use cloudgrant_allocator::openshift::OpenShiftSettings;
use cloudgrant_allocator::openstack::OpenStackSettings;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudGrantConfig {
    /// Membership polling
    pub membership: MembershipConfig,
    /// OpenStack defaults
    pub openstack: OpenStackSettings,
    /// OpenShift defaults
    pub openshift: OpenShiftSettings,
}

/// Shortest poll interval honored
pub const MIN_POLL_INTERVAL_SECS: u64 = 1;

/// How long adding a user waits for the project to be created
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MembershipConfig {
    /// Seconds between project id lookups
    pub poll_interval_secs: u64,
    /// Seconds before giving up
    pub max_wait_secs: u64,
}

impl Default for MembershipConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 2,
            max_wait_secs: 120,
        }
    }
}

impl MembershipConfig {
    /// Poll interval, at least [`MIN_POLL_INTERVAL_SECS`]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(MIN_POLL_INTERVAL_SECS))
    }

    /// Maximum total wait
    pub fn max_wait(&self) -> Duration {
        Duration::from_secs(self.max_wait_secs)
    }
}

impl CloudGrantConfig {
    /// Load from a TOML file. A missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .map_err(|e| WorkflowError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    /// Parse TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| WorkflowError::Config(e.to_string()))
    }

    /// Render as TOML
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| WorkflowError::Config(e.to_string()))
    }
}
