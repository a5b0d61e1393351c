//! Discover the test instances' addresses and check that they can all
//! reach each other.

use std::time::Instant;

use clap::Parser;
use log::{debug, info, warn};

use integrity_check::cli::{init_logging, ConnectivityArgs};
use integrity_check::cloud::CloudClients;
use integrity_check::config::Config;
use integrity_check::discovery::{discover, DiscoveryTarget};
use integrity_check::probe::{check_connectivity, pty::PtySpawner};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let start = Instant::now();
    let args = ConnectivityArgs::parse();
    init_logging(args.common.log_level);

    let cfg = Config::load()?;
    let clients = CloudClients::new(cfg);

    let target = DiscoveryTarget {
        net_name: &args.net,
        sg_floating: &args.common.sg_floating,
        sg_non_floating: &args.sg_non_floating,
    };
    let ips = discover(&args.save_file, &clients, &target).await?;
    debug!("IPs to check: {:?}", ips);

    let report = check_connectivity(
        &clients,
        &ips,
        &args.net,
        &clients.config().probe,
        &PtySpawner,
    )
    .await?;
    if !report.is_success() {
        warn!("Connectivity check found problems");
    }

    info!("Time: {:?}", start.elapsed());
    Ok(())
}
