//! Post-deployment integrity checks for an OpenStack cloud.
//!
//! Two binaries sit on top of this library: `assign_floatingips` manages
//! floating IPs for a server group and `connectivity_check` verifies that
//! every test instance can reach every other one over ssh.

pub mod cache;
pub mod cli;
pub mod cloud;
pub mod config;
pub mod discovery;
pub mod error;
pub mod floating_ip;
pub mod probe;
pub mod server_group;
pub mod types;

#[cfg(test)]
mod testing;
