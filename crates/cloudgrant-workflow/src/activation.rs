//! Activation and Disable Workflows
//!
//! ```text
//!                  project id recorded?
//!                 ┌────────┴────────┐
//!                no                yes
//!                 │                 │
//!   NoProject ──► create_project    reactivate_project
//!                 │ persist name + id
//!   ProjectCreated
//!                 │ quota attributes (only absent ones)
//!   QuotaSet      │ project defaults
//!                 └────────┬────────┘
//!                          │ PI identity + member role
//!   UserProvisioned        │
//!                          │ set_quota
//!   Active  ◄──────────────┘
//! ```
//!
//! Every step is idempotent; a failed activation is run again. The project
//! id is persisted right after creation and a rerun takes the reactivation
//! branch from there. A failure is reported as
//! [`WorkflowError::Activation`] carrying the last state reached.

use crate::error::{Result, WorkflowError};
use cloudgrant_allocator::{apply_quota_policy, unique_project_name, AllocatorRegistry, ResourceAllocator};
use cloudgrant_common::attributes::{ALLOCATION_PROJECT_ID, ALLOCATION_PROJECT_NAME};
use cloudgrant_common::{Allocation, AllocationAttributes, AllocationId, AllocationStore};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Progress of an activation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ActivationState {
    /// Nothing recorded yet
    NoProject,
    /// Project exists and its id is persisted
    ProjectCreated,
    /// Quota attributes are persisted
    QuotaSet,
    /// PI holds the member role
    UserProvisioned,
    /// Quota pushed to the backend
    Active,
}

impl fmt::Display for ActivationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NoProject => "no-project",
            Self::ProjectCreated => "project-created",
            Self::QuotaSet => "quota-set",
            Self::UserProvisioned => "user-provisioned",
            Self::Active => "active",
        };
        f.write_str(s)
    }
}

/// Result of an activation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActivationOutcome {
    /// Resource type has no allocator
    NotManaged,
    /// Project is active
    Activated {
        /// Backend project id
        project_id: String,
        /// Whether this run created the project
        created: bool,
    },
}

/// Result of a disable
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DisableOutcome {
    /// Resource type has no allocator
    NotManaged,
    /// Allocation never got a project
    NothingToDo,
    /// Project disabled on the backend
    Disabled {
        /// Backend project id
        project_id: String,
    },
}

struct Progress {
    allocation: AllocationId,
    state: ActivationState,
}

impl Progress {
    fn new(allocation: AllocationId) -> Self {
        Self {
            allocation,
            state: ActivationState::NoProject,
        }
    }

    fn advance(&mut self, state: ActivationState) {
        debug!("Allocation {}: {} -> {}", self.allocation, self.state, state);
        self.state = state;
    }
}

/// Create or reactivate the allocation's project and bring it to `Active`
pub async fn activate_allocation(
    store: Arc<dyn AllocationStore>,
    registry: &AllocatorRegistry,
    allocation_id: AllocationId,
) -> Result<ActivationOutcome> {
    let allocation = store.allocation(allocation_id).await?;
    let Some(allocator) = registry.find_allocator(&allocation, store.clone()) else {
        return Ok(ActivationOutcome::NotManaged);
    };
    let attributes = AllocationAttributes::new(store, allocation.id);
    let mut progress = Progress::new(allocation.id);

    match drive_activation(&allocation, allocator.as_ref(), &attributes, &mut progress).await {
        Ok(outcome) => Ok(outcome),
        Err(source) => {
            warn!(
                "Activation of allocation {} stopped at {}: {}",
                allocation.id, progress.state, source
            );
            Err(WorkflowError::Activation {
                allocation: allocation.id,
                reached: progress.state,
                source: Box::new(source),
            })
        }
    }
}

async fn drive_activation(
    allocation: &Allocation,
    allocator: &dyn ResourceAllocator,
    attributes: &AllocationAttributes,
    progress: &mut Progress,
) -> Result<ActivationOutcome> {
    let (project_id, created) = match attributes.get_text(ALLOCATION_PROJECT_ID).await? {
        Some(project_id) => {
            info!("Allocation {} has project {}, reactivating", allocation.id, project_id);
            allocator.reactivate_project(&project_id).await?;
            // Quota attributes are kept as they are on reactivation
            progress.advance(ActivationState::QuotaSet);
            (project_id, false)
        }
        None => {
            let quantity = allocation.effective_quantity();
            if quantity != allocation.quantity {
                warn!(
                    "Allocation {} has quantity {}, using {}",
                    allocation.id, allocation.quantity, quantity
                );
            }

            let project_name =
                unique_project_name(&allocation.project.title, allocator.project_name_max_length());
            let project_id = allocator.create_project(&project_name).await?;
            attributes.set(ALLOCATION_PROJECT_NAME, project_name.as_str()).await?;
            attributes.set(ALLOCATION_PROJECT_ID, project_id.as_str()).await?;
            info!(
                "Created project {} ({}) for allocation {}",
                project_name, project_id, allocation.id
            );
            progress.advance(ActivationState::ProjectCreated);

            let written = apply_quota_policy(attributes, allocator.backend(), quantity).await?;
            debug!("Allocation {}: wrote {} quota attributes", allocation.id, written.len());
            progress.advance(ActivationState::QuotaSet);

            allocator.create_project_defaults(&project_id).await?;
            (project_id, true)
        }
    };

    let pi = &allocation.project.pi.username;
    allocator.get_or_create_federated_user(pi).await?;
    allocator.assign_role_on_user(pi, &project_id).await?;
    progress.advance(ActivationState::UserProvisioned);

    allocator.set_quota(&project_id).await?;
    progress.advance(ActivationState::Active);

    Ok(ActivationOutcome::Activated { project_id, created })
}

/// Disable the allocation's project, if it has one
pub async fn disable_allocation(
    store: Arc<dyn AllocationStore>,
    registry: &AllocatorRegistry,
    allocation_id: AllocationId,
) -> Result<DisableOutcome> {
    let allocation = store.allocation(allocation_id).await?;
    let Some(allocator) = registry.find_allocator(&allocation, store.clone()) else {
        return Ok(DisableOutcome::NotManaged);
    };
    let attributes = AllocationAttributes::new(store, allocation.id);

    match attributes.get_text(ALLOCATION_PROJECT_ID).await? {
        Some(project_id) => {
            allocator.disable_project(&project_id).await?;
            info!("Disabled project {} of allocation {}", project_id, allocation.id);
            Ok(DisableOutcome::Disabled { project_id })
        }
        None => {
            warn!("Allocation {} has no project id, nothing to disable", allocation.id);
            Ok(DisableOutcome::NothingToDo)
        }
    }
}
