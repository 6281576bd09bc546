use serde::{Deserialize, Serialize};
use std::{
    io,
    path::{Path, PathBuf},
    process::Stdio,
};
use tokio::process::{Child, Command};

use super::{Tunnel, TunnelError};
use crate::config::TunnelSettings;

#[derive(Deserialize)]
struct TunnelInfo {
    id: String,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct IngressConfig {
    pub tunnel: String,
    #[serde(rename = "credentials-file")]
    pub credentials_file: PathBuf,
    pub ingress: Vec<IngressRule>,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct IngressRule {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    pub service: String,
}

/// Route `hostname` to the local server and answer 404 for anything else.
pub fn ingress_config(name: &str, credentials: &Path, hostname: &str, port: u16) -> IngressConfig {
    IngressConfig {
        tunnel: name.to_string(),
        credentials_file: credentials.to_path_buf(),
        ingress: vec![
            IngressRule {
                hostname: Some(hostname.to_string()),
                service: format!("http://localhost:{port}"),
            },
            IngressRule {
                hostname: None,
                service: "http_status:404".to_string(),
            },
        ],
    }
}

/// First id in the JSON printed by `tunnel list --output json`.
pub fn parse_tunnel_list(json: &[u8], name: &str) -> Result<String, TunnelError> {
    let tunnels: Vec<TunnelInfo> = serde_json::from_slice(json)
        .map_err(|e| TunnelError::Lookup(format!("unexpected tunnel list output: {e}")))?;
    tunnels
        .into_iter()
        .next()
        .map(|t| t.id)
        .ok_or_else(|| TunnelError::Lookup(format!("no tunnel named {name}")))
}

/// `~/.cloudflared/<id>.json`
pub fn credentials_path(tunnel_id: &str) -> Result<PathBuf, TunnelError> {
    let home = dirs::home_dir()
        .ok_or_else(|| TunnelError::Lookup("cannot determine home directory".to_string()))?;
    Ok(home.join(".cloudflared").join(format!("{tunnel_id}.json")))
}

fn spawn_error(binary: &Path, source: io::Error) -> TunnelError {
    if source.kind() == io::ErrorKind::NotFound {
        TunnelError::MissingBinary(binary.to_path_buf())
    } else {
        TunnelError::Spawn {
            binary: binary.to_path_buf(),
            source,
        }
    }
}

/// A `cloudflared tunnel run` child process and its ingress file.
pub struct Cloudflared {
    binary: PathBuf,
    name: String,
    hostname: String,
    config_file: PathBuf,
    child: Option<Child>,
    client: reqwest::Client,
}

impl Cloudflared {
    /// Resolve the tunnel and write its ingress file. Nothing is spawned yet.
    pub async fn prepare(
        settings: &TunnelSettings,
        hostname: &str,
        port: u16,
        client: reqwest::Client,
    ) -> Result<Self, TunnelError> {
        let output = Command::new(&settings.binary)
            .args(["tunnel", "list", "--name", settings.name.as_str(), "--output", "json"])
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| spawn_error(&settings.binary, e))?;
        if !output.status.success() {
            return Err(TunnelError::Lookup(format!(
                "tunnel list failed ({}): {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        let tunnel_id = parse_tunnel_list(&output.stdout, &settings.name)?;
        tracing::debug!(tunnel = %settings.name, id = %tunnel_id, "resolved tunnel");

        let credentials = credentials_path(&tunnel_id)?;
        let raw = tokio::fs::read(&credentials).await.map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => TunnelError::MissingCredentials(credentials.clone()),
            _ => TunnelError::Io(e),
        })?;
        serde_json::from_slice::<serde_json::Value>(&raw).map_err(|e| {
            TunnelError::Lookup(format!("invalid credentials {}: {e}", credentials.display()))
        })?;

        let ingress = ingress_config(&settings.name, &credentials, hostname, port);
        let config_file =
            std::env::temp_dir().join(format!("dropshelf-tunnel-{}.yml", std::process::id()));
        tokio::fs::write(&config_file, serde_yml::to_string(&ingress)?).await?;

        Ok(Self {
            binary: settings.binary.clone(),
            name: settings.name.clone(),
            hostname: hostname.to_string(),
            config_file,
            child: None,
            client,
        })
    }
}

impl Tunnel for Cloudflared {
    async fn start(&mut self) -> Result<(), TunnelError> {
        tracing::info!(binary = %self.binary.display(), "launching tunnel");
        let child = Command::new(&self.binary)
            .arg("tunnel")
            .arg("--config")
            .arg(&self.config_file)
            .arg("run")
            .arg(&self.name)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| spawn_error(&self.binary, e))?;
        self.child = Some(child);
        Ok(())
    }

    async fn is_ready(&self) -> bool {
        let url = format!("https://{}", self.hostname);
        self.client.get(&url).send().await.is_ok()
    }

    async fn wait(&mut self) -> Result<(), TunnelError> {
        let child = self.child.as_mut().ok_or(TunnelError::NotStarted)?;
        let status = child.wait().await?;
        self.child = None;
        tracing::error!(%status, "tunnel process exited");
        Err(TunnelError::Exited(status))
    }

    async fn stop(&mut self) {
        if let Some(mut child) = self.child.take() {
            tracing::info!("stopping tunnel");
            if let Err(e) = child.kill().await {
                tracing::warn!(error = %e, "failed to stop tunnel process");
            }
        }
        if let Err(e) = tokio::fs::remove_file(&self.config_file).await {
            if e.kind() != io::ErrorKind::NotFound {
                tracing::warn!(error = %e, "failed to remove {}", self.config_file.display());
            }
        }
    }
}

impl Drop for Cloudflared {
    fn drop(&mut self) {
        // The child is killed by `kill_on_drop`.
        let _ = std::fs::remove_file(&self.config_file);
    }
}
