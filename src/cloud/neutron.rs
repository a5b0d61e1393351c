use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use serde::Deserialize;

use super::http::{build_http, ServiceHttp};
use super::{Networking, ResolvedOptions, Session};
use crate::error::Result;
use crate::types::Network;

/// Neutron networking API client.
pub struct NeutronClient {
    http: ServiceHttp,
    /// Catalog entries for Neutron usually omit the API version.
    prefix: &'static str,
}

#[derive(Deserialize)]
struct NetworkList {
    networks: Vec<Network>,
}

impl NeutronClient {
    pub(crate) fn new(session: Arc<Session>, options: ResolvedOptions) -> Result<Self> {
        let endpoint = session.endpoint_for("network", &options)?;
        let http = build_http(options.insecure, options.cacert.as_deref())?;
        let http = ServiceHttp::new(http, endpoint, session, HeaderMap::new());
        let prefix = if http.base().ends_with("/v2.0") {
            ""
        } else {
            "v2.0/"
        };
        Ok(Self { http, prefix })
    }
}

#[async_trait]
impl Networking for NeutronClient {
    async fn list_networks(&self, name: Option<&str>) -> Result<Vec<Network>> {
        let query: Vec<(&str, &str)> = name.map(|n| vec![("name", n)]).unwrap_or_default();
        let list: NetworkList = self
            .http
            .get(&format!("{}networks", self.prefix), &query)
            .await?;
        Ok(list.networks)
    }
}
