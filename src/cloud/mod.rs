//! OpenStack service clients.
//!
//! [`CloudClients`] is the run context owned by each binary: it holds the
//! single Keystone [`Session`] and at most one client per service type.
//! Everything downstream talks to the services through the [`Compute`] and
//! [`Networking`] traits so it can run against in-memory fakes in tests.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use log::debug;
use tokio::sync::OnceCell;

use crate::config::Config;
use crate::error::Result;
use crate::types::{FloatingIp, Network, Server, ServerGroup};

mod http;
pub mod neutron;
pub mod nova;
pub mod session;

pub use neutron::NeutronClient;
pub use nova::NovaClient;
pub use session::Session;

#[async_trait]
pub trait Compute: Send + Sync {
    async fn list_server_groups(&self) -> Result<Vec<ServerGroup>>;

    async fn get_server(&self, id: &str) -> Result<Server>;

    /// Allocate a floating IP from the default pool.
    async fn create_floating_ip(&self) -> Result<FloatingIp>;

    /// Bind an allocated floating IP to an instance.
    async fn add_floating_ip(&self, instance_id: &str, address: &str) -> Result<()>;

    async fn list_floating_ips(&self) -> Result<Vec<FloatingIp>>;

    async fn delete_floating_ip(&self, floating_ip: &FloatingIp) -> Result<()>;
}

#[async_trait]
pub trait Networking: Send + Sync {
    /// List networks, optionally filtered by exact name on the server side.
    async fn list_networks(&self, name: Option<&str>) -> Result<Vec<Network>>;

    /// Id of the first network called `name`, if any.
    async fn network_id_by_name(&self, name: &str) -> Result<Option<String>> {
        let networks = self.list_networks(Some(name)).await?;
        Ok(networks
            .into_iter()
            .find(|network| network.name == name)
            .map(|network| network.id))
    }
}

/// Per-client construction parameters.  Unset fields fall back to the
/// loaded [`Config`].
#[derive(Debug, Clone, Default)]
pub struct ServiceOptions {
    pub region: Option<String>,
    pub service_name: Option<String>,
    pub endpoint: Option<String>,
    pub endpoint_type: Option<String>,
    pub insecure: Option<bool>,
    pub cacert: Option<PathBuf>,
}

impl ServiceOptions {
    fn resolve(self, config: &Config) -> ResolvedOptions {
        ResolvedOptions {
            region: self.region.unwrap_or_else(|| config.region_name.clone()),
            service_name: self.service_name,
            endpoint: self.endpoint,
            endpoint_type: self
                .endpoint_type
                .unwrap_or_else(|| config.endpoint_type.clone()),
            insecure: self.insecure.unwrap_or(config.insecure),
            cacert: self.cacert.or_else(|| config.cacert.clone()),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct ResolvedOptions {
    pub region: String,
    pub service_name: Option<String>,
    pub endpoint: Option<String>,
    pub endpoint_type: String,
    pub insecure: bool,
    pub cacert: Option<PathBuf>,
}

/// Lazily authenticated session plus memoized service clients.
///
/// Each client is built on first use; later calls return the same client
/// and ignore whatever options they pass.
pub struct CloudClients {
    config: Config,
    session: OnceCell<Arc<Session>>,
    nova: OnceCell<NovaClient>,
    neutron: OnceCell<NeutronClient>,
}

impl CloudClients {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            session: OnceCell::new(),
            nova: OnceCell::new(),
            neutron: OnceCell::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub async fn session(&self) -> Result<Arc<Session>> {
        let session = self
            .session
            .get_or_try_init(|| async move { Session::authenticate(&self.config).await.map(Arc::new) })
            .await?;
        Ok(Arc::clone(session))
    }

    /// The compute client built from configuration defaults.
    pub async fn compute(&self) -> Result<&NovaClient> {
        self.compute_with(self.default_options(
            &self.config.compute_service_name,
            &self.config.compute_endpoint,
        ))
        .await
    }

    pub async fn compute_with(&self, options: ServiceOptions) -> Result<&NovaClient> {
        self.nova
            .get_or_try_init(|| async move {
                let session = self.session().await?;
                debug!("Creating compute client");
                NovaClient::new(session, options.resolve(&self.config))
            })
            .await
    }

    /// The networking client built from configuration defaults.
    pub async fn network(&self) -> Result<&NeutronClient> {
        self.network_with(self.default_options(
            &self.config.network_service_name,
            &self.config.network_endpoint,
        ))
        .await
    }

    pub async fn network_with(&self, options: ServiceOptions) -> Result<&NeutronClient> {
        self.neutron
            .get_or_try_init(|| async move {
                let session = self.session().await?;
                debug!("Creating networking client");
                NeutronClient::new(session, options.resolve(&self.config))
            })
            .await
    }

    fn default_options(
        &self,
        service_name: &Option<String>,
        endpoint: &Option<String>,
    ) -> ServiceOptions {
        ServiceOptions {
            service_name: service_name.clone(),
            endpoint: endpoint.clone(),
            ..Default::default()
        }
    }
}

/// The run context itself is a compute service: the underlying client (and
/// the Keystone session) is only built by the first call that needs it.
#[async_trait]
impl Compute for CloudClients {
    async fn list_server_groups(&self) -> Result<Vec<ServerGroup>> {
        self.compute().await?.list_server_groups().await
    }

    async fn get_server(&self, id: &str) -> Result<Server> {
        self.compute().await?.get_server(id).await
    }

    async fn create_floating_ip(&self) -> Result<FloatingIp> {
        self.compute().await?.create_floating_ip().await
    }

    async fn add_floating_ip(&self, instance_id: &str, address: &str) -> Result<()> {
        self.compute().await?.add_floating_ip(instance_id, address).await
    }

    async fn list_floating_ips(&self) -> Result<Vec<FloatingIp>> {
        self.compute().await?.list_floating_ips().await
    }

    async fn delete_floating_ip(&self, floating_ip: &FloatingIp) -> Result<()> {
        self.compute().await?.delete_floating_ip(floating_ip).await
    }
}

#[async_trait]
impl Networking for CloudClients {
    async fn list_networks(&self, name: Option<&str>) -> Result<Vec<Network>> {
        self.network().await?.list_networks(name).await
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{config_for, mount_keystone};
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn session_and_clients_are_built_once() {
        let server = MockServer::start().await;
        mount_keystone(&server, 1).await;

        let clients = CloudClients::new(config_for(&server));
        let first = clients.compute().await.unwrap() as *const NovaClient;
        let second = clients
            .compute_with(ServiceOptions {
                region: Some("Elsewhere".into()),
                ..Default::default()
            })
            .await
            .unwrap() as *const NovaClient;
        assert_eq!(first, second);

        clients.network().await.unwrap();
        clients.network().await.unwrap();
        // The token mock verifies a single authentication on drop.
    }

    #[tokio::test]
    async fn network_lookup_by_name() {
        let server = MockServer::start().await;
        mount_keystone(&server, 1).await;
        Mock::given(method("GET"))
            .and(path("/network/v2.0/networks"))
            .and(header("X-Auth-Token", "tok-123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "networks": [
                    {"id": "net-2", "name": "integrity_network_old"},
                    {"id": "net-1", "name": "integrity_network"}
                ]
            })))
            .mount(&server)
            .await;

        let clients = CloudClients::new(config_for(&server));
        let neutron = clients.network().await.unwrap();
        assert_eq!(
            neutron.network_id_by_name("integrity_network").await.unwrap(),
            Some("net-1".to_string())
        );
        assert_eq!(neutron.network_id_by_name("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn run_context_authenticates_on_first_use() {
        let server = MockServer::start().await;
        mount_keystone(&server, 1).await;
        Mock::given(method("GET"))
            .and(path("/compute/v2.1/os-server-groups"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"server_groups": []})))
            .expect(2)
            .mount(&server)
            .await;

        let clients = CloudClients::new(config_for(&server));
        assert!(clients.list_server_groups().await.unwrap().is_empty());
        assert!(clients.list_server_groups().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unused_run_context_never_authenticates() {
        let server = MockServer::start().await;
        mount_keystone(&server, 0).await;
        let _clients = CloudClients::new(config_for(&server));
    }

    #[tokio::test]
    async fn authentication_failure_propagates() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2.0/tokens"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad credentials"))
            .mount(&server)
            .await;

        let clients = CloudClients::new(config_for(&server));
        match clients.compute().await {
            Err(crate::error::Error::Auth { status, .. }) => assert_eq!(status.as_u16(), 401),
            other => panic!("expected an auth error, got {:?}", other.map(|_| ())),
        }
    }
}
