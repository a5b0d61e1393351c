//! Floating IP assignment and cleanup for a set of instances.

use log::{error, info, warn};

use crate::cloud::Compute;
use crate::error::Result;
use crate::types::FloatingIp;

/// Outcome of [`assign`].
#[derive(Debug, Default)]
pub struct AssignReport {
    /// `(instance id, floating address)` pairs that were bound.
    pub assigned: Vec<(String, String)>,
    /// Instances left without a new floating IP.
    pub failed: Vec<String>,
}

/// Allocate one floating IP per instance and bind it.
///
/// A failure only affects its own instance.  If binding fails after the
/// allocation succeeded the address is released again so it does not leak
/// into the project.
pub async fn assign(compute: &dyn Compute, instances: &[String]) -> AssignReport {
    let mut report = AssignReport::default();

    for instance_id in instances {
        let floating_ip = match compute.create_floating_ip().await {
            Ok(fip) => fip,
            Err(e) => {
                error!("Failed to create floating ip for instance {}: {}", instance_id, e);
                report.failed.push(instance_id.clone());
                continue;
            }
        };
        info!(
            "Created floating ip with address: {} (pool {})",
            floating_ip.ip,
            floating_ip.pool.as_deref().unwrap_or("default")
        );

        if let Err(e) = compute.add_floating_ip(instance_id, &floating_ip.ip).await {
            error!(
                "Failed to associate floating ip {} with instance {}: {}",
                floating_ip.ip, instance_id, e
            );
            release_unbound(compute, &floating_ip).await;
            report.failed.push(instance_id.clone());
            continue;
        }
        info!(
            "Associated floating ip {} with instance {}",
            floating_ip.ip, instance_id
        );
        report.assigned.push((instance_id.clone(), floating_ip.ip));
    }

    report
}

async fn release_unbound(compute: &dyn Compute, floating_ip: &FloatingIp) {
    match compute.delete_floating_ip(floating_ip).await {
        Ok(()) => info!("Released unassociated floating ip {}", floating_ip.ip),
        Err(e) => warn!(
            "Failed to release unassociated floating ip {}: {}",
            floating_ip.ip, e
        ),
    }
}

/// Delete every floating IP bound to one of `instances`.  Returns the
/// released addresses.
pub async fn cleanup(compute: &dyn Compute, instances: &[String]) -> Result<Vec<String>> {
    let mut released = Vec::new();

    for floating_ip in compute.list_floating_ips().await? {
        let bound_here = floating_ip
            .instance_id
            .as_ref()
            .is_some_and(|id| instances.contains(id));
        if !bound_here {
            continue;
        }
        info!("Deleting floating ip {}", floating_ip.ip);
        compute.delete_floating_ip(&floating_ip).await?;
        released.push(floating_ip.ip);
    }

    Ok(released)
}
