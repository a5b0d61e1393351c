//! In-memory cloud used by the unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::cloud::{Compute, Networking};
use crate::error::{Error, Result};
use crate::types::{FloatingIp, IpType, Network, Server, ServerAddress, ServerGroup};

#[derive(Default)]
pub struct FakeCloud {
    pub groups: Vec<ServerGroup>,
    pub servers: HashMap<String, Server>,
    pub networks: Vec<Network>,
    pub floating_ips: Mutex<Vec<FloatingIp>>,
    /// Instances whose association request fails.
    pub reject_association: Vec<String>,
    /// Number of floating IPs that can still be allocated.
    pub quota: Option<usize>,
    calls: AtomicUsize,
    next_ip: AtomicUsize,
}

impl FakeCloud {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn record(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }

    pub fn with_group(mut self, name: &str, members: &[&str]) -> Self {
        self.groups.push(ServerGroup {
            id: format!("sg-{}", self.groups.len()),
            name: name.to_string(),
            members: members.iter().map(|m| m.to_string()).collect(),
        });
        self
    }

    pub fn with_server(mut self, id: &str, network: &str, addrs: &[(&str, IpType)]) -> Self {
        let addresses = addrs
            .iter()
            .map(|(addr, ip_type)| ServerAddress {
                addr: addr.to_string(),
                ip_type: *ip_type,
            })
            .collect();
        self.servers.insert(
            id.to_string(),
            Server {
                id: id.to_string(),
                name: id.to_string(),
                addresses: HashMap::from([(network.to_string(), addresses)]),
            },
        );
        self
    }

    pub fn with_network(mut self, id: &str, name: &str) -> Self {
        self.networks.push(Network {
            id: id.to_string(),
            name: name.to_string(),
        });
        self
    }

    pub fn rejecting_association(mut self, instance: &str) -> Self {
        self.reject_association.push(instance.to_string());
        self
    }

    pub fn with_quota(mut self, quota: usize) -> Self {
        self.quota = Some(quota);
        self
    }

    pub fn bound_to(&self, instance: &str) -> Vec<FloatingIp> {
        self.floating_ips
            .lock()
            .unwrap()
            .iter()
            .filter(|fip| fip.instance_id.as_deref() == Some(instance))
            .cloned()
            .collect()
    }

    fn api_error(method: &str, url: String, status: u16) -> Error {
        Error::Api {
            method: method.to_string(),
            url,
            status: reqwest::StatusCode::from_u16(status).unwrap(),
            body: String::new(),
        }
    }
}

#[async_trait]
impl Compute for FakeCloud {
    async fn list_server_groups(&self) -> Result<Vec<ServerGroup>> {
        self.record();
        Ok(self.groups.clone())
    }

    async fn get_server(&self, id: &str) -> Result<Server> {
        self.record();
        self.servers
            .get(id)
            .cloned()
            .ok_or_else(|| Self::api_error("GET", format!("servers/{}", id), 404))
    }

    async fn create_floating_ip(&self) -> Result<FloatingIp> {
        self.record();
        let mut fips = self.floating_ips.lock().unwrap();
        if let Some(quota) = self.quota {
            if fips.len() >= quota {
                return Err(Self::api_error("POST", "os-floating-ips".into(), 403));
            }
        }
        let n = self.next_ip.fetch_add(1, Ordering::SeqCst);
        let fip = FloatingIp {
            id: format!("fip-{}", n),
            ip: format!("172.16.0.{}", n + 10),
            instance_id: None,
            pool: Some("public".into()),
        };
        fips.push(fip.clone());
        Ok(fip)
    }

    async fn add_floating_ip(&self, instance_id: &str, address: &str) -> Result<()> {
        self.record();
        if self.reject_association.iter().any(|i| i == instance_id) {
            return Err(Self::api_error(
                "POST",
                format!("servers/{}/action", instance_id),
                400,
            ));
        }
        let mut fips = self.floating_ips.lock().unwrap();
        match fips.iter_mut().find(|fip| fip.ip == address) {
            Some(fip) => {
                fip.instance_id = Some(instance_id.to_string());
                Ok(())
            }
            None => Err(Self::api_error(
                "POST",
                format!("servers/{}/action", instance_id),
                404,
            )),
        }
    }

    async fn list_floating_ips(&self) -> Result<Vec<FloatingIp>> {
        self.record();
        Ok(self.floating_ips.lock().unwrap().clone())
    }

    async fn delete_floating_ip(&self, floating_ip: &FloatingIp) -> Result<()> {
        self.record();
        let mut fips = self.floating_ips.lock().unwrap();
        let before = fips.len();
        fips.retain(|fip| fip.id != floating_ip.id);
        if fips.len() == before {
            return Err(Self::api_error(
                "DELETE",
                format!("os-floating-ips/{}", floating_ip.id),
                404,
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl Networking for FakeCloud {
    async fn list_networks(&self, name: Option<&str>) -> Result<Vec<Network>> {
        self.record();
        Ok(self
            .networks
            .iter()
            .filter(|network| name.map_or(true, |n| network.name == n))
            .cloned()
            .collect())
    }
}
