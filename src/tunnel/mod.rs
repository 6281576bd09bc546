//! Optional public exposure through a cloudflared tunnel.
//!
//! Bring-up is one sequential pass with fixed timeouts: wait for the
//! local listener, make sure a hostname exists, launch the tunnel and
//! wait until the public URL answers. Any failure is fatal to the
//! process; there are no retries beyond the polling loops.

pub mod cloudflared;
pub mod dns;

use std::{
    future::Future,
    io,
    path::{Path, PathBuf},
    process::ExitStatus,
    time::Duration,
};

use crate::config::{self, ConfigError, TunnelSettings};

pub use cloudflared::Cloudflared;
pub use dns::DnsClient;

#[derive(thiserror::Error, Debug)]
pub enum TunnelError {
    #[error("tunnel binary not found: {0}")]
    MissingBinary(PathBuf),
    #[error("failed to start {binary}: {source}")]
    Spawn { binary: PathBuf, source: io::Error },
    #[error("tunnel process is not running")]
    NotStarted,
    #[error("tunnel process exited unexpectedly ({0})")]
    Exited(ExitStatus),
    #[error("tunnel lookup failed: {0}")]
    Lookup(String),
    #[error("tunnel credentials not found at {0}")]
    MissingCredentials(PathBuf),
    #[error("DNS API request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("DNS record creation failed ({status}): {body}")]
    Dns { status: u16, body: String },
    #[error("{what} did not respond within {}s", .timeout.as_secs())]
    Timeout {
        what: &'static str,
        timeout: Duration,
    },
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("cannot write ingress config: {0}")]
    Yaml(#[from] serde_yml::Error),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Process-level handle on a tunnel client.
#[allow(async_fn_in_trait)]
pub trait Tunnel {
    async fn start(&mut self) -> Result<(), TunnelError>;
    /// One HTTP probe of the public URL.
    async fn is_ready(&self) -> bool;
    /// Resolve when the tunnel process ends. A running tunnel never ends
    /// on its own, so this only returns errors.
    async fn wait(&mut self) -> Result<(), TunnelError>;
    async fn stop(&mut self);
}

/// Timing of the bring-up sequence.
#[derive(Debug, Clone, Copy)]
pub struct Schedule {
    pub local_interval: Duration,
    pub local_timeout: Duration,
    /// Pause after spawning before the first public probe.
    pub settle: Duration,
    pub public_interval: Duration,
    pub public_timeout: Duration,
}

impl Default for Schedule {
    fn default() -> Self {
        Self {
            local_interval: Duration::from_millis(300),
            local_timeout: Duration::from_secs(5),
            settle: Duration::from_secs(5),
            public_interval: Duration::from_secs(1),
            public_timeout: Duration::from_secs(120),
        }
    }
}

/// Bring the tunnel up and keep it running until `shutdown` resolves.
///
/// `hostname` is the previously provisioned name, if any. A newly
/// created one is written back to `config_path`.
pub async fn run(
    settings: &TunnelSettings,
    port: u16,
    hostname: Option<String>,
    config_path: &Path,
    shutdown: impl Future<Output = ()>,
) -> Result<(), TunnelError> {
    let schedule = Schedule::default();
    tokio::pin!(shutdown);

    let mut tunnel = tokio::select! {
        res = bring_up(settings, port, hostname, config_path, schedule) => res?,
        _ = &mut shutdown => return Ok(()),
    };

    tokio::select! {
        res = tunnel.wait() => res,
        _ = shutdown => {
            tunnel.stop().await;
            Ok(())
        }
    }
}

async fn bring_up(
    settings: &TunnelSettings,
    port: u16,
    hostname: Option<String>,
    config_path: &Path,
    schedule: Schedule,
) -> Result<Cloudflared, TunnelError> {
    let client = probe_client()?;

    let health = format!("http://127.0.0.1:{port}/healthz");
    tracing::info!("waiting for the server on port {port}");
    if !wait_for_http(&client, &health, schedule.local_interval, schedule.local_timeout).await {
        return Err(TunnelError::Timeout {
            what: "local server",
            timeout: schedule.local_timeout,
        });
    }

    let hostname = match hostname {
        Some(h) => h,
        None => {
            let h = DnsClient::new(settings).provision(&settings.domain, &settings.target).await?;
            config::persist_hostname(config_path, &h)?;
            tracing::info!(hostname = %h, "saved provisioned hostname to {}", config_path.display());
            h
        }
    };
    tracing::info!(%hostname, "using hostname");

    let mut tunnel = Cloudflared::prepare(settings, &hostname, port, client).await?;
    tunnel.start().await?;
    tokio::time::sleep(schedule.settle).await;

    tracing::info!("checking whether the tunnel is established");
    if !poll_ready(&tunnel, schedule.public_interval, schedule.public_timeout).await {
        tunnel.stop().await;
        return Err(TunnelError::Timeout {
            what: "tunnel",
            timeout: schedule.public_timeout,
        });
    }

    tracing::info!("server reachable at https://{hostname}");
    Ok(tunnel)
}

pub(crate) fn probe_client() -> Result<reqwest::Client, TunnelError> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()?)
}

/// Poll `url` every `interval` until any HTTP response arrives.
/// Returns `false` if `timeout` elapses first.
pub async fn wait_for_http(
    client: &reqwest::Client,
    url: &str,
    interval: Duration,
    timeout: Duration,
) -> bool {
    tokio::time::timeout(timeout, async {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            match client.get(url).send().await {
                Ok(_) => return,
                Err(e) => tracing::debug!(url, error = %e, "not ready yet"),
            }
        }
    })
    .await
    .is_ok()
}

async fn poll_ready<T: Tunnel>(tunnel: &T, interval: Duration, timeout: Duration) -> bool {
    tokio::time::timeout(timeout, async {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            if tunnel.is_ready().await {
                return;
            }
        }
    })
    .await
    .is_ok()
}
