// Startup configuration: where the service lives and the shared secret
// used for tokens. Values come from defaults, then an optional TOML file,
// then `CASEY_*` environment variables.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{ClientError, Result};

pub const DEFAULT_SCHEME: &str = "http";
pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 5005;
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Fully resolved configuration handed to `ApiClient`.
#[derive(Clone)]
pub struct Config {
    pub scheme: String,
    pub host: String,
    pub port: u16,
    pub secret: String,
    pub timeout: Duration,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("scheme", &self.scheme)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("secret", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Shape of the TOML file. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub scheme: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub secret: Option<String>,
    pub secret_file: Option<PathBuf>,
    pub timeout_secs: Option<u64>,
}

impl FileConfig {
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ClientError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        toml::from_str(&text)
            .map_err(|e| ClientError::Config(format!("cannot parse {}: {}", path.display(), e)))
    }

    /// Overlays `CASEY_*` variables read through `var`.
    fn apply_env(mut self, var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(v) = var("CASEY_SCHEME") {
            self.scheme = Some(v);
        }
        if let Some(v) = var("CASEY_HOST") {
            self.host = Some(v);
        }
        if let Some(v) = var("CASEY_PORT") {
            let port = v
                .parse()
                .map_err(|_| ClientError::Config(format!("CASEY_PORT is not a port number: {}", v)))?;
            self.port = Some(port);
        }
        if let Some(v) = var("CASEY_SECRET") {
            self.secret = Some(v);
        }
        if let Some(v) = var("CASEY_SECRET_FILE") {
            self.secret_file = Some(PathBuf::from(v));
        }
        if let Some(v) = var("CASEY_TIMEOUT_SECS") {
            let secs = v
                .parse()
                .map_err(|_| ClientError::Config(format!("CASEY_TIMEOUT_SECS is not a number: {}", v)))?;
            self.timeout_secs = Some(secs);
        }
        Ok(self)
    }

    fn resolve(self) -> Result<Config> {
        // An inline secret wins over a secret file.
        let secret = match (self.secret, self.secret_file) {
            (Some(secret), _) => secret,
            (None, Some(path)) => read_secret_file(&path)?,
            (None, None) => {
                return Err(ClientError::Config(
                    "no shared secret (set CASEY_SECRET or `secret` in the config file)".into(),
                ))
            }
        };
        if secret.is_empty() {
            return Err(ClientError::Config("shared secret is empty".into()));
        }

        let mut scheme = self.scheme.unwrap_or_else(|| DEFAULT_SCHEME.into());
        let mut host = self.host.unwrap_or_else(|| DEFAULT_HOST.into());
        if let Some((s, rest)) = host.split_once("://") {
            scheme = s.to_string();
            host = rest.trim_end_matches('/').to_string();
        }
        if host.is_empty() {
            return Err(ClientError::Config("host is empty".into()));
        }
        let mut port = self.port;
        if let Some((name, host_port)) = split_host_port(&host)? {
            if matches!(port, Some(p) if p != host_port) {
                return Err(ClientError::Config(format!(
                    "host {} names port {} but port is set to {}",
                    host,
                    host_port,
                    port.unwrap_or_default()
                )));
            }
            port = Some(host_port);
            host = name;
        }

        let timeout_secs = self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS);
        if timeout_secs == 0 {
            return Err(ClientError::Config("timeout must be at least one second".into()));
        }

        Ok(Config {
            scheme,
            host,
            port: port.unwrap_or(DEFAULT_PORT),
            secret,
            timeout: Duration::from_secs(timeout_secs),
        })
    }
}

/// Splits `name:port` off a host. Bracketed IPv6 literals keep their
/// colons; a bare IPv6 literal is left alone.
fn split_host_port(host: &str) -> Result<Option<(String, u16)>> {
    let (name, port) = match host.rsplit_once(':') {
        Some(split) => split,
        None => return Ok(None),
    };
    if name.contains(':') && !(name.starts_with('[') && name.ends_with(']')) {
        return Ok(None);
    }
    let port = port
        .parse()
        .map_err(|_| ClientError::Config(format!("host {} has a bad port", host)))?;
    Ok(Some((name.to_string(), port)))
}

/// The secret is the first line of the file, whitespace stripped.
fn read_secret_file(path: &Path) -> Result<String> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| ClientError::Config(format!("cannot read secret file {}: {}", path.display(), e)))?;
    Ok(text.lines().next().unwrap_or("").trim().to_string())
}

/// `~/.casey/config.toml`, if a home directory is known.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".casey").join("config.toml"))
}

impl Config {
    /// Loads configuration from the process environment.
    ///
    /// `explicit` (from `--config`) must exist; otherwise `CASEY_CONFIG` is
    /// tried, then the default path if present.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        Self::load_with(explicit, |name| std::env::var(name).ok())
    }

    /// Same as [`Config::load`] with an injectable variable lookup.
    pub fn load_with(explicit: Option<&Path>, var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let path = match explicit {
            Some(p) => Some(p.to_path_buf()),
            None => match var("CASEY_CONFIG") {
                Some(p) => Some(PathBuf::from(p)),
                None => default_config_path().filter(|p| p.is_file()),
            },
        };
        let file = match path {
            Some(p) => {
                tracing::debug!(path = %p.display(), "reading config file");
                FileConfig::from_path(&p)?
            }
            None => FileConfig::default(),
        };
        file.apply_env(var)?.resolve()
    }

    /// `scheme://host:port`, without a trailing slash.
    pub fn base_url(&self) -> String {
        format!("{}://{}:{}", self.scheme, self.host, self.port)
    }
}
