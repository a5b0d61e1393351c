use figment::{
    providers::{Env, Format, Json, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Keys read from the standard `OS_*` OpenStack environment variables.
const OS_ENV_KEYS: &[&str] = &[
    "auth_url",
    "username",
    "password",
    "tenant_name",
    "region_name",
    "endpoint_type",
    "insecure",
    "cacert",
];

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub auth_url: String,
    pub username: String,
    pub password: String,
    pub tenant_name: String,
    pub region_name: String,
    pub endpoint_type: String,
    pub insecure: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cacert: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compute_service_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compute_endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_service_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_endpoint: Option<String>,
    pub probe: ProbeConfig,
}

/// Settings of the SSH connectivity probe.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProbeConfig {
    pub vm_username: String,
    pub vm_password: String,
    pub anchor_address: String,
    pub ping_count: u32,
    pub ping_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub prompt_timeout_secs: u64,
    pub output_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            auth_url: "http://192.168.0.2:5000/v2.0".into(),
            username: "admin".into(),
            password: "admin".into(),
            tenant_name: "admin".into(),
            region_name: "RegionOne".into(),
            endpoint_type: "publicURL".into(),
            // Test deployments run with self-signed certificates.
            insecure: true,
            cacert: None,
            compute_service_name: None,
            compute_endpoint: None,
            network_service_name: None,
            network_endpoint: None,
            probe: ProbeConfig::default(),
        }
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            // Stock CirrOS image credentials, shared by every test VM.
            vm_username: "cirros".into(),
            vm_password: "cubswin:)".into(),
            anchor_address: "8.8.8.8".into(),
            ping_count: 4,
            ping_timeout_secs: 1,
            connect_timeout_secs: 10,
            prompt_timeout_secs: 30,
            output_timeout_secs: 30,
        }
    }
}

impl ProbeConfig {
    pub fn prompt_timeout(&self) -> Duration {
        Duration::from_secs(self.prompt_timeout_secs)
    }

    pub fn output_timeout(&self) -> Duration {
        Duration::from_secs(self.output_timeout_secs)
    }
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let mut config: Config = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file("integrity_check.toml"))
            .merge(Json::file("integrity_check.json"))
            .merge(Env::prefixed("OS_").only(OS_ENV_KEYS))
            .merge(Env::prefixed("INTEGRITY_").map(|k| format!("probe.{}", k).into()))
            .extract()
            .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

        config.auth_url = normalize_auth_url(&config.auth_url);
        if config.probe.ping_count == 0 {
            anyhow::bail!("probe.ping_count must be at least 1");
        }

        Ok(config)
    }
}

/// Keystone v2 lives under `/v2.0`; append it when the URL has no such
/// path segment.
pub fn normalize_auth_url(url: &str) -> String {
    if url.split('/').any(|segment| segment == "v2.0") {
        return url.to_string();
    }
    format!("{}/v2.0", url.trim_end_matches('/'))
}
