//! CNAME provisioning through the Cloudflare v4 API.

use rand::Rng;
use serde::Serialize;

use super::TunnelError;
use crate::config::TunnelSettings;

pub const CLOUDFLARE_API: &str = "https://api.cloudflare.com/client/v4";

const SUBDOMAIN_CHARS: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const SUBDOMAIN_LEN: usize = 8;

#[derive(Serialize)]
struct DnsRecord<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    name: &'a str,
    content: &'a str,
    ttl: u32,
    proxied: bool,
}

pub struct DnsClient {
    http: reqwest::Client,
    api_base: String,
    zone_id: String,
    api_token: String,
}

impl DnsClient {
    pub fn new(settings: &TunnelSettings) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: settings
                .api_base
                .clone()
                .unwrap_or_else(|| CLOUDFLARE_API.to_string()),
            zone_id: settings.zone_id.clone(),
            api_token: settings.api_token.clone(),
        }
    }

    /// Create a proxied CNAME `name` → `content`.
    pub async fn create_cname(&self, name: &str, content: &str) -> Result<(), TunnelError> {
        let url = format!(
            "{}/zones/{}/dns_records",
            self.api_base.trim_end_matches('/'),
            self.zone_id
        );
        let record = DnsRecord {
            kind: "CNAME",
            name,
            content,
            ttl: 120,
            proxied: true,
        };

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_token)
            .json(&record)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(TunnelError::Dns { status, body });
        }
        tracing::info!(hostname = name, "DNS record created");
        Ok(())
    }

    /// Create a record for a fresh random subdomain of `domain` and
    /// return the full hostname.
    pub async fn provision(&self, domain: &str, target: &str) -> Result<String, TunnelError> {
        let hostname = format!("{}.{}", random_subdomain(), domain);
        self.create_cname(&hostname, target).await?;
        Ok(hostname)
    }
}

pub fn random_subdomain() -> String {
    let mut rng = rand::rng();
    (0..SUBDOMAIN_LEN)
        .map(|_| SUBDOMAIN_CHARS[rng.random_range(0..SUBDOMAIN_CHARS.len())] as char)
        .collect()
}
