use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// What kind of server entity a service wraps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceType {
    Domain,
    Instance,
}

impl ServiceType {
    /// asadmin subcommand the unit file starts the entity with
    pub fn start_command(&self) -> &'static str {
        match self {
            ServiceType::Domain => "start-domain",
            ServiceType::Instance => "start-local-instance",
        }
    }

    /// asadmin subcommand the unit file stops the entity with
    pub fn stop_command(&self) -> &'static str {
        match self {
            ServiceType::Domain => "stop-domain",
            ServiceType::Instance => "stop-local-instance",
        }
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceType::Domain => f.write_str("domain"),
            ServiceType::Instance => f.write_str("instance"),
        }
    }
}

impl FromStr for ServiceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "domain" => Ok(ServiceType::Domain),
            "instance" | "node" => Ok(ServiceType::Instance),
            other => Err(format!(
                "unknown service type {other:?} (expected \"domain\" or \"instance\")"
            )),
        }
    }
}

/// Directory tree of one server entity.
///
/// A domain lives at `{domains-dir}/{domain-name}`; an instance lives at
/// `{nodes-dir}/{node-name}/{instance-name}`, so the parent and grandparent
/// directories carry the node name and nodes dir.
#[derive(Debug, Clone)]
pub struct ServerDirs {
    server_dir: PathBuf,
}

impl ServerDirs {
    /// Canonicalizes best-effort; a directory that does not exist yet keeps
    /// the path it was given.
    pub fn new(server_dir: impl Into<PathBuf>) -> Self {
        let server_dir = server_dir.into();
        let server_dir = std::fs::canonicalize(&server_dir).unwrap_or(server_dir);
        Self { server_dir }
    }

    pub fn server_dir(&self) -> &Path {
        &self.server_dir
    }

    pub fn server_name(&self) -> String {
        self.server_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn server_parent_dir(&self) -> PathBuf {
        self.server_dir
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.server_dir.clone())
    }

    /// Name of the parent directory (the node name for an instance)
    pub fn server_parent_name(&self) -> String {
        self.server_parent_dir()
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn server_grandparent_dir(&self) -> PathBuf {
        let parent = self.server_parent_dir();
        parent.parent().map(Path::to_path_buf).unwrap_or(parent)
    }
}

/// Everything one install or uninstall operation needs.
///
/// Built by the CLI (optionally seeded from a JSON file) and immutable for
/// the duration of the operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Name of the domain or instance the service wraps
    pub name: String,

    /// Domain or instance
    pub kind: ServiceType,

    /// The entity's directory (domain dir, or node/instance dir)
    pub server_dir: PathBuf,

    /// User the service should run as; falls back to `os_user` when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_user: Option<String>,

    /// OS-level user running this tool; detected, never read from a file
    #[serde(skip)]
    pub os_user: String,

    /// Path to the asadmin launcher referenced by the unit file
    #[serde(default = "default_asadmin_path")]
    pub asadmin_path: PathBuf,

    /// Echo service-manager commands instead of executing them
    #[serde(default)]
    pub dry_run: bool,

    /// Delete a pre-existing unit file for this name before installing
    #[serde(default)]
    pub force: bool,
}

fn default_asadmin_path() -> PathBuf {
    PathBuf::from("/usr/bin/asadmin")
}

impl ServiceConfig {
    /// Load config from a file path
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config from {}", path.display()))?;
        let config: Self =
            serde_json::from_str(&data).with_context(|| "failed to parse config JSON")?;
        Ok(config)
    }

    pub fn server_dirs(&self) -> ServerDirs {
        ServerDirs::new(&self.server_dir)
    }
}
