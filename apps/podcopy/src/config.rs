//! podcopy configuration.
//!
//! Configuration is stored as TOML:
//! - Linux: `~/.config/podcopy/config.toml`
//! - Windows: `%APPDATA%/podcopy/config.toml`
//!
//! A missing file means all defaults; `podcopy config init` writes one.

use std::path::{Path, PathBuf};
use std::time::Duration;

use podcopy_exec::{ContainerTarget, KubectlConfig};
use serde::{Deserialize, Serialize};

/// Cluster access and default addressing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Program used to reach the cluster.
    #[serde(default = "default_kubectl")]
    pub kubectl: PathBuf,

    /// Leading arguments for `kubectl`, e.g. `["kubectl"]` with `kubectl = "k3s"`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub kubectl_args: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kubeconfig: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,

    /// Namespace used when `--namespace` is not given.
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Container used when `--container` is not given (empty = pod default).
    #[serde(default)]
    pub container: String,

    /// Passed through as `--request-timeout`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,

    /// Upper bound for the destination probe.
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,
}

fn default_kubectl() -> PathBuf {
    PathBuf::from("kubectl")
}

fn default_namespace() -> String {
    "default".into()
}

fn default_probe_timeout() -> u64 {
    podcopy_exec::PROBE_TIMEOUT.as_secs()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            kubectl: default_kubectl(),
            kubectl_args: Vec::new(),
            kubeconfig: None,
            context: None,
            namespace: default_namespace(),
            container: String::new(),
            request_timeout_secs: None,
            probe_timeout_secs: default_probe_timeout(),
        }
    }
}

impl Config {
    /// Loads configuration from `path`, falling back to defaults if the
    /// file does not exist.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Saves the configuration to `path`.
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        // Restrict permissions on Unix.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }

        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }

    pub fn kubectl_config(&self) -> KubectlConfig {
        KubectlConfig {
            program: self.kubectl.clone(),
            program_args: self.kubectl_args.clone(),
            kubeconfig: self.kubeconfig.clone(),
            context: self.context.clone(),
            request_timeout: self.request_timeout_secs.map(Duration::from_secs),
            probe_timeout: Duration::from_secs(self.probe_timeout_secs),
        }
    }

    /// Resolves a target, letting explicit flags win over configured defaults.
    pub fn target(
        &self,
        pod: &str,
        namespace: Option<&str>,
        container: Option<&str>,
    ) -> ContainerTarget {
        ContainerTarget::new(
            namespace.unwrap_or(&self.namespace),
            pod,
            container.unwrap_or(&self.container),
        )
    }
}

/// Returns the platform-specific configuration file path.
pub fn default_path() -> anyhow::Result<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        let appdata = std::env::var("APPDATA")
            .map_err(|_| anyhow::anyhow!("APPDATA is not set; pass --config"))?;
        Ok(PathBuf::from(appdata).join("podcopy").join("config.toml"))
    }

    #[cfg(not(target_os = "windows"))]
    {
        let home = std::env::var("HOME")
            .map_err(|_| anyhow::anyhow!("HOME is not set; pass --config"))?;
        Ok(PathBuf::from(home)
            .join(".config")
            .join("podcopy")
            .join("config.toml"))
    }
}
