//! Quota Policy Tables
//!
//! Every backend maps one unit of allocation `quantity` to a fixed amount
//! of each of its quota dimensions, plus a static floor every project gets
//! regardless of quantity:
//!
//! ```text
//! value = max(quantity, 1) * multiplier[dim] + static_floor[dim]
//! ```

use crate::backend::Backend;
use cloudgrant_common::{AllocationAttributes, QuotaDimension, StoreResult};

/// Per-backend quota conversion rules
#[derive(Debug)]
pub struct QuotaPolicy {
    /// Quota units granted per unit of quantity
    pub multipliers: &'static [(QuotaDimension, i64)],
    /// Quota units granted regardless of quantity
    pub static_floor: &'static [(QuotaDimension, i64)],
}

/// OpenStack conversion rules
pub static OPENSTACK_POLICY: QuotaPolicy = QuotaPolicy {
    multipliers: &[
        (QuotaDimension::Instances, 1),
        (QuotaDimension::Vcpu, 2),
        (QuotaDimension::Ram, 4096),
        (QuotaDimension::Volumes, 2),
        (QuotaDimension::VolumesGb, 100),
        (QuotaDimension::FloatingIps, 0),
        (QuotaDimension::ObjectGb, 1),
        (QuotaDimension::Gpu, 0),
    ],
    static_floor: &[
        (QuotaDimension::FloatingIps, 2),
        (QuotaDimension::Gpu, 0),
    ],
};

/// OpenShift conversion rules
pub static OPENSHIFT_POLICY: QuotaPolicy = QuotaPolicy {
    multipliers: &[
        (QuotaDimension::LimitsCpu, 2),
        (QuotaDimension::LimitsMemory, 2048),
        (QuotaDimension::LimitsEphemeralStorageGb, 5),
    ],
    static_floor: &[],
};

impl QuotaPolicy {
    /// Policy of a backend
    pub fn for_backend(backend: Backend) -> &'static QuotaPolicy {
        match backend {
            Backend::OpenStack => &OPENSTACK_POLICY,
            Backend::OpenShift => &OPENSHIFT_POLICY,
        }
    }

    /// Dimensions this policy computes
    pub fn dimensions(&self) -> impl Iterator<Item = QuotaDimension> + '_ {
        self.multipliers.iter().map(|(dim, _)| *dim)
    }

    /// Static floor of a dimension, 0 when absent
    pub fn floor(&self, dim: QuotaDimension) -> i64 {
        lookup(self.static_floor, dim).unwrap_or(0)
    }

    /// Quota for `quantity`, `None` for dimensions outside the multiplier table
    pub fn compute(&self, dim: QuotaDimension, quantity: i64) -> Option<i64> {
        let multiplier = lookup(self.multipliers, dim)?;
        Some(
            quantity
                .max(1)
                .saturating_mul(multiplier)
                .saturating_add(self.floor(dim)),
        )
    }
}

fn lookup(table: &[(QuotaDimension, i64)], dim: QuotaDimension) -> Option<i64> {
    table.iter().find(|(d, _)| *d == dim).map(|(_, v)| *v)
}

/// Persist computed quota for every dimension not yet set on the allocation.
///
/// Existing values are left alone. Returns what was written.
pub async fn apply_quota_policy(
    attributes: &AllocationAttributes,
    backend: Backend,
    quantity: i64,
) -> StoreResult<Vec<(QuotaDimension, i64)>> {
    let policy = QuotaPolicy::for_backend(backend);
    let mut written = Vec::new();

    for dim in policy.dimensions() {
        if attributes.get(dim.attribute_name()).await?.is_some() {
            tracing::debug!("Quota attribute {} already set, keeping it", dim);
            continue;
        }
        if let Some(value) = policy.compute(dim, quantity) {
            attributes.set(dim.attribute_name(), value).await?;
            written.push((dim, value));
        }
    }

    Ok(written)
}
