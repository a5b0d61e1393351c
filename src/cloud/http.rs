use std::path::Path;
use std::sync::Arc;

use log::debug;
use reqwest::header::HeaderMap;
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::Session;
use crate::error::{Error, Result};

/// Build a `reqwest` client honouring the TLS settings of one service.
pub(crate) fn build_http(insecure: bool, cacert: Option<&Path>) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder().danger_accept_invalid_certs(insecure);
    if let Some(path) = cacert {
        let pem = std::fs::read(path)
            .map_err(|e| Error::Config(format!("cannot read CA bundle {}: {}", path.display(), e)))?;
        builder = builder.add_root_certificate(reqwest::Certificate::from_pem(&pem)?);
    }
    Ok(builder.build()?)
}

/// Thin JSON wrapper bound to one service endpoint and the shared session.
pub(crate) struct ServiceHttp {
    http: reqwest::Client,
    base: String,
    session: Arc<Session>,
    headers: HeaderMap,
}

impl ServiceHttp {
    pub fn new(
        http: reqwest::Client,
        base: String,
        session: Arc<Session>,
        headers: HeaderMap,
    ) -> Self {
        Self {
            http,
            base: base.trim_end_matches('/').to_string(),
            session,
            headers,
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    fn request(&self, method: Method, path: &str) -> (String, RequestBuilder) {
        let url = format!("{}/{}", self.base, path.trim_start_matches('/'));
        debug!("{} {}", method, url);
        let builder = self
            .http
            .request(method, &url)
            .headers(self.headers.clone())
            .header("X-Auth-Token", self.session.auth_header().clone());
        (url, builder)
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
        let (url, builder) = self.request(Method::GET, path);
        let resp = check(Method::GET, url, builder.query(query).send().await?).await?;
        Ok(resp.json().await?)
    }

    pub async fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let (url, builder) = self.request(Method::POST, path);
        let resp = check(Method::POST, url, builder.json(body).send().await?).await?;
        Ok(resp.json().await?)
    }

    /// POST whose response body is ignored (e.g. server actions).
    pub async fn post_action<B: Serialize>(&self, path: &str, body: &B) -> Result<()> {
        let (url, builder) = self.request(Method::POST, path);
        check(Method::POST, url, builder.json(body).send().await?).await?;
        Ok(())
    }

    pub async fn delete(&self, path: &str) -> Result<()> {
        let (url, builder) = self.request(Method::DELETE, path);
        check(Method::DELETE, url, builder.send().await?).await?;
        Ok(())
    }
}

async fn check(method: Method, url: String, resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(Error::Api {
        method: method.to_string(),
        url,
        status,
        body,
    })
}
