//! YAML configuration: defaults, load, save and the one-time hostname
//! write-back performed by tunnel provisioning.

use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::{
    fs, io,
    path::{Path, PathBuf},
};

/// Config file used when neither `--config` nor `DROPSHELF_CONFIG` is set.
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";

const HEADER: &str = "# Dropshelf configuration\n# Note: change the default credentials before exposing the server\n";

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("cannot parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yml::Error,
    },
    #[error("cannot serialize configuration: {0}")]
    Serialize(#[from] serde_yml::Error),
    #[error("cannot write {path}: {source}")]
    Write { path: PathBuf, source: io::Error },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub port: u16,
    pub root_dir: PathBuf,
    pub title: String,
    pub username: String,
    pub password: String,
    /// Key for session cookie signatures. Never sent to clients.
    pub secret_key: String,
    /// Public hostname assigned by tunnel provisioning.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tunnel: Option<TunnelSettings>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            root_dir: PathBuf::from("."),
            title: "Dropshelf".to_string(),
            username: "admin".to_string(),
            password: "dropshelf".to_string(),
            secret_key: generate_secret_key(),
            hostname: None,
            tunnel: None,
        }
    }
}

/// Settings for exposing the server through a cloudflared tunnel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TunnelSettings {
    #[serde(default = "default_tunnel_binary")]
    pub binary: PathBuf,
    /// Name of a tunnel already created with `cloudflared tunnel create`.
    pub name: String,
    /// Zone under which random subdomains are created.
    pub domain: String,
    pub zone_id: String,
    pub api_token: String,
    /// CNAME content, usually `<tunnel-id>.cfargotunnel.com`.
    pub target: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
}

fn default_tunnel_binary() -> PathBuf {
    PathBuf::from("cloudflared")
}

/// 32 random bytes, hex encoded.
pub fn generate_secret_key() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

impl Config {
    /// Load `path` over the defaults. A missing file yields `Ok(None)`.
    pub fn load(path: &Path) -> Result<Option<Config>, ConfigError> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        Self::parse(&raw).map(Some).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn parse(raw: &str) -> Result<Config, serde_yml::Error> {
        if raw.trim().is_empty() {
            return Ok(Config::default());
        }
        serde_yml::from_str(raw)
    }

    /// Serialize with the explanatory header.
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        let body = serde_yml::to_string(self)?;
        Ok(format!("{HEADER}{body}"))
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = self.to_yaml()?;
        fs::write(path, contents).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// File name the listing must hide for this config path.
    pub fn file_name(path: &Path) -> String {
        path.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| DEFAULT_CONFIG_FILE.to_string())
    }
}

/// Record the provisioned hostname in the persisted config file.
pub fn persist_hostname(path: &Path, hostname: &str) -> Result<(), ConfigError> {
    let mut config = Config::load(path)?.unwrap_or_default();
    config.hostname = Some(hostname.to_string());
    config.save(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_first_run() {
        let cfg = Config::default();
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.root_dir, PathBuf::from("."));
        assert_eq!(cfg.username, "admin");
        assert_eq!(cfg.secret_key.len(), 64);
        assert!(cfg.hostname.is_none());
        assert!(cfg.tunnel.is_none());
    }

    #[test]
    fn secret_keys_differ_between_runs() {
        assert_ne!(generate_secret_key(), generate_secret_key());
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let cfg = Config::parse("port: 9000\ntitle: Shared\n").unwrap();
        assert_eq!(cfg.port, 9000);
        assert_eq!(cfg.title, "Shared");
        assert_eq!(cfg.username, "admin");
    }

    #[test]
    fn saved_file_has_header_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        let mut cfg = Config::default();
        cfg.port = 9191;
        cfg.save(&path).unwrap();

        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.starts_with("# Dropshelf configuration\n"));
        assert!(raw.contains("secret_key:"));
        assert!(!raw.contains("hostname"));

        let loaded = Config::load(&path).unwrap().unwrap();
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn missing_file_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::load(&dir.path().join("absent.yaml")).unwrap().is_none());
    }

    #[test]
    fn garbage_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "port: [not, a, number").unwrap();
        assert!(matches!(Config::load(&path), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn hostname_write_back_preserves_other_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        let cfg = Config::default();
        cfg.save(&path).unwrap();

        persist_hostname(&path, "abc12345.example.com").unwrap();
        let loaded = Config::load(&path).unwrap().unwrap();
        assert_eq!(loaded.hostname.as_deref(), Some("abc12345.example.com"));
        assert_eq!(loaded.secret_key, cfg.secret_key);
    }

    #[test]
    fn tunnel_section_round_trips() {
        let raw = "tunnel:\n  name: share\n  domain: example.com\n  zone_id: z\n  api_token: t\n  target: id.cfargotunnel.com\n";
        let cfg = Config::parse(raw).unwrap();
        let tunnel = cfg.tunnel.unwrap();
        assert_eq!(tunnel.binary, PathBuf::from("cloudflared"));
        assert_eq!(tunnel.domain, "example.com");
        assert!(tunnel.api_base.is_none());
    }
}
