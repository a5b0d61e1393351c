//! Data structures used throughout the toolkit.
//!
//! The provider resources are deserialised straight from the Nova and
//! Neutron JSON bodies with [`serde`](https://serde.rs/).  Only the fields
//! the toolkit reads are kept; everything else in the responses is ignored.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind of address an instance holds on a network.
///
/// Serialised as the lowercase strings Nova reports in `OS-EXT-IPS:type`,
/// which is also the format of the discovery cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IpType {
    Fixed,
    Floating,
}

impl fmt::Display for IpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IpType::Fixed => f.write_str("fixed"),
            IpType::Floating => f.write_str("floating"),
        }
    }
}

/// Discovered addresses, keyed by address.  Sorted so that destination
/// lists come out in the same order on every run.
pub type AddressMap = BTreeMap<String, IpType>;

/// A Nova server group.  `members` holds instance ids.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerGroup {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub members: Vec<String>,
}

/// One entry of a server's per-network address list.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerAddress {
    pub addr: String,
    #[serde(rename = "OS-EXT-IPS:type")]
    pub ip_type: IpType,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Server {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Network name -> addresses on that network.
    #[serde(default)]
    pub addresses: HashMap<String, Vec<ServerAddress>>,
}

/// A Nova floating IP.  `instance_id` is `None` while unbound.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FloatingIp {
    pub id: String,
    pub ip: String,
    #[serde(default)]
    pub instance_id: Option<String>,
    #[serde(default)]
    pub pool: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Network {
    pub id: String,
    pub name: String,
}
