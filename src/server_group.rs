use log::{debug, info};

use crate::cloud::Compute;
use crate::error::Result;

/// Ids of the members of the server group called `name`.
///
/// The first group with that exact name wins.  An unknown name is not an
/// error: it yields no members, so downstream steps become no-ops.
pub async fn group_members(compute: &dyn Compute, name: &str) -> Result<Vec<String>> {
    info!("Discovering members of group {}", name);

    let group = compute
        .list_server_groups()
        .await?
        .into_iter()
        .find(|group| group.name == name);

    match group {
        Some(group) => {
            debug!(
                "Group {} ({}) has {} members",
                name,
                group.id,
                group.members.len()
            );
            Ok(group.members)
        }
        None => {
            debug!("Group {} not found", name);
            Ok(Vec::new())
        }
    }
}
