//! Quota Validation
//!
//! Compares the quota attributes of an allocation with what the backend
//! enforces. Two kinds of difference are reported:
//!
//! - **drift**: the attribute is absent but the backend has a value. With
//!   `apply` the backend value is copied onto the allocation.
//! - **mismatch**: attribute and backend disagree. With `apply` the
//!   attributes are pushed again.

use crate::error::Result;
use chrono::{DateTime, Utc};
use cloudgrant_allocator::AllocatorRegistry;
use cloudgrant_common::attributes::ALLOCATION_PROJECT_ID;
use cloudgrant_common::{AllocationAttributes, AllocationId, AllocationStatus, AllocationStore, QuotaDimension};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What validation concluded about an allocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationStatus {
    /// Resource type has no allocator
    NotManaged,
    /// Allocation has no project id
    MissingProjectId,
    /// Project id is recorded but the backend has no such project
    ProjectNotFound {
        /// Backend project id
        project_id: String,
    },
    /// Quota compared
    Checked {
        /// Backend project id
        project_id: String,
    },
}

/// Difference in one quota dimension
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuotaFinding {
    /// Attribute absent, backend enforces `actual`
    Drift {
        /// Dimension
        dimension: QuotaDimension,
        /// Backend value
        actual: i64,
    },
    /// Attribute and backend disagree
    Mismatch {
        /// Dimension
        dimension: QuotaDimension,
        /// Attribute value
        expected: i64,
        /// Backend value, `None` when unset there
        actual: Option<i64>,
    },
}

/// Validation result of one allocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Allocation validated
    pub allocation_id: AllocationId,
    /// Overall status
    pub status: ValidationStatus,
    /// Per-dimension differences
    pub findings: Vec<QuotaFinding>,
    /// Whether quota was pushed again
    pub reapplied: bool,
    /// When the backend was read
    pub checked_at: DateTime<Utc>,
}

impl ValidationReport {
    fn new(allocation_id: AllocationId, status: ValidationStatus) -> Self {
        Self {
            allocation_id,
            status,
            findings: Vec::new(),
            reapplied: false,
            checked_at: Utc::now(),
        }
    }

    /// Checked without differences
    pub fn is_clean(&self) -> bool {
        matches!(self.status, ValidationStatus::Checked { .. }) && self.findings.is_empty()
    }

    /// Number of mismatches
    pub fn mismatch_count(&self) -> usize {
        self.findings
            .iter()
            .filter(|f| matches!(f, QuotaFinding::Mismatch { .. }))
            .count()
    }
}

/// Quota validator
#[derive(Clone)]
pub struct QuotaValidator {
    store: Arc<dyn AllocationStore>,
    registry: Arc<AllocatorRegistry>,
}

impl QuotaValidator {
    /// Create validator
    pub fn new(store: Arc<dyn AllocationStore>, registry: Arc<AllocatorRegistry>) -> Self {
        Self { store, registry }
    }

    /// Validate one allocation, repairing differences when `apply` is set
    pub async fn validate(&self, allocation_id: AllocationId, apply: bool) -> Result<ValidationReport> {
        let allocation = self.store.allocation(allocation_id).await?;
        let Some(allocator) = self.registry.find_allocator(&allocation, self.store.clone()) else {
            return Ok(ValidationReport::new(allocation_id, ValidationStatus::NotManaged));
        };
        let attributes = AllocationAttributes::new(self.store.clone(), allocation_id);

        let Some(project_id) = attributes.get_text(ALLOCATION_PROJECT_ID).await? else {
            warn!("Allocation {} is active but has no project id", allocation_id);
            return Ok(ValidationReport::new(allocation_id, ValidationStatus::MissingProjectId));
        };

        if !allocator.project_exists(&project_id).await? {
            warn!("Project {} of allocation {} does not exist", project_id, allocation_id);
            return Ok(ValidationReport::new(
                allocation_id,
                ValidationStatus::ProjectNotFound { project_id },
            ));
        }

        let actual = allocator.get_quota(&project_id).await?;
        let mut report = ValidationReport::new(
            allocation_id,
            ValidationStatus::Checked { project_id: project_id.clone() },
        );

        for dimension in allocator.quota_dimensions() {
            let expected = attributes.get_int(dimension.attribute_name()).await?;
            let backend = actual.get(dimension).copied();

            match (expected, backend) {
                (None, None) => {}
                (None, Some(value)) => {
                    info!(
                        "Allocation {}: {} unset, backend enforces {}",
                        allocation_id, dimension, value
                    );
                    if apply {
                        attributes.set(dimension.attribute_name(), value).await?;
                    }
                    report.findings.push(QuotaFinding::Drift { dimension: *dimension, actual: value });
                }
                (Some(expected), actual) if actual != Some(expected) => {
                    warn!(
                        "Allocation {}: {} is {} but backend enforces {:?}",
                        allocation_id, dimension, expected, actual
                    );
                    report.findings.push(QuotaFinding::Mismatch {
                        dimension: *dimension,
                        expected,
                        actual,
                    });
                }
                (Some(_), _) => {}
            }
        }

        if apply && report.mismatch_count() > 0 {
            allocator.set_quota(&project_id).await?;
            report.reapplied = true;
            info!("Reapplied quota on project {}", project_id);
        }

        Ok(report)
    }

    /// Validate each allocation in turn
    pub async fn validate_all(&self, allocation_ids: &[AllocationId], apply: bool) -> Result<Vec<ValidationReport>> {
        let mut reports = Vec::with_capacity(allocation_ids.len());
        for id in allocation_ids {
            reports.push(self.validate(*id, apply).await?);
        }
        Ok(reports)
    }

    /// Validate every active allocation on a managed resource
    pub async fn validate_active(&self, apply: bool) -> Result<Vec<ValidationReport>> {
        let mut reports = Vec::new();
        for id in self.store.list_allocations().await? {
            let allocation = self.store.allocation(id).await?;
            if allocation.status != AllocationStatus::Active {
                debug!("Skipping allocation {} in status {:?}", id, allocation.status);
                continue;
            }
            let report = self.validate(id, apply).await?;
            if report.status != ValidationStatus::NotManaged {
                reports.push(report);
            }
        }
        info!("Validated {} active allocations", reports.len());
        Ok(reports)
    }
}
