//! Command line arguments and logging setup shared by the binaries.

use std::io::Write;
use std::path::PathBuf;

use clap::{Args, Parser, ValueEnum};

pub const NETWORK_NAME: &str = "integrity_network";
pub const SERVER_GROUP_FLOATING: &str = "nova_server_group_floating";
pub const SERVER_GROUP_NON_FLOATING: &str = "nova_server_group_non_floating";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Debug,
    Info,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Info => log::LevelFilter::Info,
        }
    }
}

#[derive(Args, Debug)]
pub struct CommonArgs {
    #[arg(short, long, value_enum, default_value_t = LogLevel::Info)]
    pub log_level: LogLevel,
    /// Server group whose instances get floating IPs.
    #[arg(long, default_value = SERVER_GROUP_FLOATING)]
    pub sg_floating: String,
}

/// Assign floating IPs to the members of a server group, or release them.
#[derive(Parser, Debug)]
#[command(name = "assign_floatingips", about, long_about = None)]
pub struct AssignArgs {
    #[command(flatten)]
    pub common: CommonArgs,
    /// Remove floating ips associations and delete them.
    #[arg(long)]
    pub cleanup: bool,
}

/// Check connectivity between the instances of two server groups.
#[derive(Parser, Debug)]
#[command(name = "connectivity_check", about, long_about = None)]
pub struct ConnectivityArgs {
    #[command(flatten)]
    pub common: CommonArgs,
    /// Server group whose instances only have fixed IPs.
    #[arg(long, default_value = SERVER_GROUP_NON_FLOATING)]
    pub sg_non_floating: String,
    /// Network the instances are plugged into.
    #[arg(long, default_value = NETWORK_NAME)]
    pub net: String,
    /// JSON file caching the discovered addresses.
    #[arg(short, long)]
    pub save_file: PathBuf,
}

/// Initialise `env_logger` at `level`; `RUST_LOG` can still refine it.
pub fn init_logging(level: LogLevel) {
    env_logger::Builder::new()
        .filter_level(level.into())
        .parse_default_env()
        .format(|buf, record| {
            writeln!(
                buf,
                "{} {}:{}",
                buf.timestamp_millis(),
                record.level(),
                record.args()
            )
        })
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn assign_defaults() {
        let args = AssignArgs::try_parse_from(["assign_floatingips"]).unwrap();
        assert_eq!(args.common.log_level, LogLevel::Info);
        assert_eq!(args.common.sg_floating, SERVER_GROUP_FLOATING);
        assert!(!args.cleanup);
    }

    #[test]
    fn assign_cleanup_mode() {
        let args = AssignArgs::try_parse_from([
            "assign_floatingips",
            "--cleanup",
            "-l",
            "debug",
            "--sg-floating",
            "group_a",
        ])
        .unwrap();
        assert!(args.cleanup);
        assert_eq!(args.common.log_level, LogLevel::Debug);
        assert_eq!(args.common.sg_floating, "group_a");
    }

    #[test]
    fn unknown_log_level_is_rejected() {
        let err = AssignArgs::try_parse_from(["assign_floatingips", "--log-level", "trace"])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidValue);
    }

    #[test]
    fn save_file_is_required() {
        let err = ConnectivityArgs::try_parse_from(["connectivity_check"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn connectivity_arguments() {
        let args = ConnectivityArgs::try_parse_from([
            "connectivity_check",
            "-s",
            "/tmp/ips.json",
            "--net",
            "net_b",
        ])
        .unwrap();
        assert_eq!(args.save_file, PathBuf::from("/tmp/ips.json"));
        assert_eq!(args.net, "net_b");
        assert_eq!(args.sg_non_floating, SERVER_GROUP_NON_FLOATING);
        assert_eq!(args.common.sg_floating, SERVER_GROUP_FLOATING);
    }
}
