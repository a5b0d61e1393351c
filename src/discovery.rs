//! Address discovery for the two control groups.

use std::path::Path;

use log::info;

use crate::cache;
use crate::cloud::Compute;
use crate::error::{Error, Result};
use crate::server_group::group_members;
use crate::types::{AddressMap, IpType};

/// Addresses of type `ip_type` that `instance_ids` hold on `net_name`.
///
/// Every instance must be attached to the network; one that is not fails
/// the whole scan.
pub async fn ips_of_instances(
    compute: &dyn Compute,
    instance_ids: &[String],
    net_name: &str,
    ip_type: IpType,
) -> Result<AddressMap> {
    info!("Discovering {} ips from network {}", ip_type, net_name);

    let mut ips = AddressMap::new();
    for instance_id in instance_ids {
        let server = compute.get_server(instance_id).await?;
        let addresses = server
            .addresses
            .get(net_name)
            .ok_or_else(|| Error::MissingNetwork {
                instance: instance_id.clone(),
                network: net_name.to_string(),
            })?;
        for address in addresses.iter().filter(|a| a.ip_type == ip_type) {
            ips.insert(address.addr.clone(), ip_type);
        }
    }
    Ok(ips)
}

/// Names of the groups and network that make up one connectivity check.
#[derive(Debug, Clone)]
pub struct DiscoveryTarget<'a> {
    pub net_name: &'a str,
    pub sg_floating: &'a str,
    pub sg_non_floating: &'a str,
}

/// Return the addresses to probe.
///
/// A non-empty cache at `save_file` is trusted as-is and no provider call
/// is made.  Otherwise the floating addresses of the floating group and the
/// fixed addresses of the other group are discovered, merged and saved.
pub async fn discover(
    save_file: &Path,
    compute: &dyn Compute,
    target: &DiscoveryTarget<'_>,
) -> Result<AddressMap> {
    if let Some(ips) = cache::load(save_file).await? {
        info!("Loading instances' ips from {}", save_file.display());
        return Ok(ips);
    }

    let floating_group = group_members(compute, target.sg_floating).await?;
    let fixed_group = group_members(compute, target.sg_non_floating).await?;

    let mut ips =
        ips_of_instances(compute, &floating_group, target.net_name, IpType::Floating).await?;
    // Fixed entries are merged last and win on a shared address.
    ips.extend(ips_of_instances(compute, &fixed_group, target.net_name, IpType::Fixed).await?);

    cache::store(save_file, &ips).await?;
    info!("Saved instances' ips to {}", save_file.display());
    Ok(ips)
}
