use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::Deserialize;
use serde_json::json;

use super::http::{build_http, ServiceHttp};
use super::{Compute, ResolvedOptions, Session};
use crate::error::Result;
use crate::types::{FloatingIp, Server, ServerGroup};

const NOVA_API_VERSION: &str = "2.1";

/// Nova compute API client.
pub struct NovaClient {
    http: ServiceHttp,
}

#[derive(Deserialize)]
struct ServerGroupList {
    server_groups: Vec<ServerGroup>,
}

#[derive(Deserialize)]
struct ServerBody {
    server: Server,
}

#[derive(Deserialize)]
struct FloatingIpBody {
    floating_ip: FloatingIp,
}

#[derive(Deserialize)]
struct FloatingIpList {
    floating_ips: Vec<FloatingIp>,
}

impl NovaClient {
    pub(crate) fn new(session: Arc<Session>, options: ResolvedOptions) -> Result<Self> {
        let endpoint = session.endpoint_for("compute", &options)?;
        let mut headers = HeaderMap::new();
        headers.insert(
            "X-OpenStack-Nova-API-Version",
            HeaderValue::from_static(NOVA_API_VERSION),
        );
        let http = build_http(options.insecure, options.cacert.as_deref())?;
        Ok(Self {
            http: ServiceHttp::new(http, endpoint, session, headers),
        })
    }
}

#[async_trait]
impl Compute for NovaClient {
    async fn list_server_groups(&self) -> Result<Vec<ServerGroup>> {
        let list: ServerGroupList = self.http.get("os-server-groups", &[]).await?;
        Ok(list.server_groups)
    }

    async fn get_server(&self, id: &str) -> Result<Server> {
        let body: ServerBody = self.http.get(&format!("servers/{}", id), &[]).await?;
        Ok(body.server)
    }

    async fn create_floating_ip(&self) -> Result<FloatingIp> {
        let body: FloatingIpBody = self
            .http
            .post("os-floating-ips", &json!({ "pool": null }))
            .await?;
        Ok(body.floating_ip)
    }

    async fn add_floating_ip(&self, instance_id: &str, address: &str) -> Result<()> {
        self.http
            .post_action(
                &format!("servers/{}/action", instance_id),
                &json!({ "addFloatingIp": { "address": address } }),
            )
            .await
    }

    async fn list_floating_ips(&self) -> Result<Vec<FloatingIp>> {
        let list: FloatingIpList = self.http.get("os-floating-ips", &[]).await?;
        Ok(list.floating_ips)
    }

    async fn delete_floating_ip(&self, floating_ip: &FloatingIp) -> Result<()> {
        self.http
            .delete(&format!("os-floating-ips/{}", floating_ip.id))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::testing::{config_for, mount_keystone};
    use crate::cloud::CloudClients;
    use crate::error::Error;
    use crate::types::IpType;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn setup() -> (MockServer, CloudClients) {
        let server = MockServer::start().await;
        mount_keystone(&server, 1).await;
        let clients = CloudClients::new(config_for(&server));
        (server, clients)
    }

    #[tokio::test]
    async fn lists_server_groups_with_microversion_header() {
        let (server, clients) = setup().await;
        Mock::given(method("GET"))
            .and(path("/compute/v2.1/os-server-groups"))
            .and(header("X-OpenStack-Nova-API-Version", "2.1"))
            .and(header("X-Auth-Token", "tok-123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "server_groups": [
                    {"id": "sg-1", "name": "nova_server_group_floating",
                     "members": ["i-1", "i-2"], "policies": ["anti-affinity"]}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let nova = clients.compute().await.unwrap();
        let groups = nova.list_server_groups().await.unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].members, vec!["i-1", "i-2"]);
    }

    #[tokio::test]
    async fn gets_server_addresses() {
        let (server, clients) = setup().await;
        Mock::given(method("GET"))
            .and(path("/compute/v2.1/servers/i-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "server": {
                    "id": "i-1",
                    "name": "vm-1",
                    "addresses": {"integrity_network": [
                        {"addr": "10.0.0.5", "OS-EXT-IPS:type": "fixed", "version": 4}
                    ]}
                }
            })))
            .mount(&server)
            .await;

        let nova = clients.compute().await.unwrap();
        let srv = nova.get_server("i-1").await.unwrap();
        assert_eq!(srv.addresses["integrity_network"][0].ip_type, IpType::Fixed);
    }

    #[tokio::test]
    async fn floating_ip_lifecycle_requests() {
        let (server, clients) = setup().await;
        Mock::given(method("POST"))
            .and(path("/compute/v2.1/os-floating-ips"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "floating_ip": {"id": "f-1", "ip": "172.16.0.10", "instance_id": null, "pool": "public"}
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/compute/v2.1/servers/i-1/action"))
            .and(body_json(json!({"addFloatingIp": {"address": "172.16.0.10"}})))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/compute/v2.1/os-floating-ips/f-1"))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&server)
            .await;

        let nova = clients.compute().await.unwrap();
        let fip = nova.create_floating_ip().await.unwrap();
        assert_eq!(fip.ip, "172.16.0.10");
        nova.add_floating_ip("i-1", &fip.ip).await.unwrap();
        nova.delete_floating_ip(&fip).await.unwrap();
    }

    #[tokio::test]
    async fn api_errors_carry_status_and_body() {
        let (server, clients) = setup().await;
        Mock::given(method("GET"))
            .and(path("/compute/v2.1/servers/gone"))
            .respond_with(ResponseTemplate::new(404).set_body_string("Instance gone could not be found."))
            .mount(&server)
            .await;

        let nova = clients.compute().await.unwrap();
        match nova.get_server("gone").await {
            Err(Error::Api { status, body, .. }) => {
                assert_eq!(status.as_u16(), 404);
                assert!(body.contains("could not be found"));
            }
            other => panic!("expected an API error, got {:?}", other),
        }
    }
}
