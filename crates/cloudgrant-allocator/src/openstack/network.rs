//! Default project network
//!
//! ```text
//! public network ── default_router ── default_subnet ── default_network
//! ```
//!
//! Every step looks the object up by name first, so a rerun after a partial
//! failure finishes the remaining steps only.

use super::client::{NetworkCreate, OsNetwork, OsRouter, OsSubnet, RouterCreate, SubnetCreate};
use super::OpenStackAllocator;
use crate::Result;
use cloudgrant_common::attributes::RESOURCE_DEFAULT_NETWORK_CIDR;
use tracing::info;

const DEFAULT_NETWORK: &str = "default_network";
const DEFAULT_SUBNET: &str = "default_subnet";
const DEFAULT_ROUTER: &str = "default_router";

impl OpenStackAllocator {
    /// Create network, subnet and router of a project unless present, and
    /// connect the router to the subnet.
    pub async fn create_default_network(&self, project_id: &str, public_network: &str) -> Result<()> {
        let network = self.default_network(project_id).await?;
        let subnet = self.default_subnet(project_id, &network).await?;
        let router = self.default_router(project_id, public_network).await?;

        let ports = self.api.list_ports(project_id, &router.id, &network.id).await?;
        if ports.is_empty() {
            self.api.add_router_interface(&router.id, &subnet.id).await?;
            info!(
                "Router {} connected to subnet {} for project {}",
                router.id, subnet.id, project_id
            );
        } else {
            info!(
                "Router {} already connected to network {} for project {}",
                router.id, network.id, project_id
            );
        }
        Ok(())
    }

    async fn default_network(&self, project_id: &str) -> Result<OsNetwork> {
        if let Some(network) = self.api.list_networks(project_id, DEFAULT_NETWORK).await?.into_iter().next() {
            info!("Default network {} already exists for project {}", network.id, project_id);
            return Ok(network);
        }

        let network = self
            .api
            .create_network(&NetworkCreate {
                name: DEFAULT_NETWORK.into(),
                project_id: project_id.into(),
                admin_state_up: true,
                description: "Default network created during provisioning.".into(),
            })
            .await?;
        info!("Default network {} created for project {}", network.id, project_id);
        Ok(network)
    }

    async fn default_subnet(&self, project_id: &str, network: &OsNetwork) -> Result<OsSubnet> {
        if let Some(subnet) = self.api.list_subnets(project_id, DEFAULT_SUBNET).await?.into_iter().next() {
            info!("Default subnet {} already exists for project {}", subnet.id, project_id);
            return Ok(subnet);
        }

        let cidr = self
            .setting(RESOURCE_DEFAULT_NETWORK_CIDR)
            .unwrap_or_else(|| self.settings.default_network_cidr.clone());
        let subnet = self
            .api
            .create_subnet(&SubnetCreate {
                network_id: network.id.clone(),
                name: DEFAULT_SUBNET.into(),
                ip_version: 4,
                project_id: project_id.into(),
                cidr,
                dns_nameservers: self.settings.dns_nameservers.clone(),
                description: "Default subnet created during provisioning.".into(),
            })
            .await?;
        info!("Default subnet {} created for project {}", subnet.id, project_id);
        Ok(subnet)
    }

    async fn default_router(&self, project_id: &str, public_network: &str) -> Result<OsRouter> {
        if let Some(router) = self.api.list_routers(project_id, DEFAULT_ROUTER).await?.into_iter().next() {
            return Ok(router);
        }

        let router = self
            .api
            .create_router(&RouterCreate {
                name: DEFAULT_ROUTER.into(),
                project_id: project_id.into(),
                external_network_id: Some(public_network.to_string()),
                admin_state_up: true,
                description: "Default router created during provisioning.".into(),
            })
            .await?;
        Ok(router)
    }
}
