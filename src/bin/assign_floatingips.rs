//! Assign floating IPs to the instances of a server group, or clean them up.

use clap::Parser;
use log::{info, warn};

use integrity_check::cli::{init_logging, AssignArgs};
use integrity_check::cloud::CloudClients;
use integrity_check::config::Config;
use integrity_check::floating_ip::{assign, cleanup};
use integrity_check::server_group::group_members;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = AssignArgs::parse();
    init_logging(args.common.log_level);

    let cfg = Config::load()?;
    let clients = CloudClients::new(cfg);

    let instances = group_members(&clients, &args.common.sg_floating).await?;
    if instances.is_empty() {
        warn!("No instances found in group {}", args.common.sg_floating);
    }

    if args.cleanup {
        let released = cleanup(&clients, &instances).await?;
        info!("Released {} floating ips", released.len());
    } else {
        let report = assign(&clients, &instances).await;
        info!(
            "Assigned {} floating ips, {} instances failed",
            report.assigned.len(),
            report.failed.len()
        );
    }
    Ok(())
}
