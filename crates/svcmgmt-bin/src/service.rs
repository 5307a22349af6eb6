//! Create/delete orchestration around the platform service adapter.
//!
//! Builds the `ServiceConfig` from flags (optionally seeded from a JSON
//! file), gates on platform applicability, and drives the adapter through
//! initialize → create/delete, printing the success message and appending
//! it to the instance README on a real install.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use tracing::{info, warn};

use svcmgmt_core::config::{ServiceConfig, ServiceType};
use svcmgmt_platform::service::ServiceAdapter;

#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Name of the domain or instance to wrap
    #[arg(long)]
    name: Option<String>,

    /// The entity's directory (domain dir, or node/instance dir)
    #[arg(long)]
    server_dir: Option<PathBuf>,

    /// Kind of entity: domain or instance
    #[arg(long = "type")]
    kind: Option<ServiceType>,

    /// User the service should run as (defaults to the current OS user)
    #[arg(long)]
    service_user: Option<String>,

    /// Path to the asadmin launcher referenced by the unit file
    #[arg(long)]
    asadmin_path: Option<PathBuf>,

    /// Echo service-manager commands instead of executing them
    #[arg(long)]
    dry_run: bool,

    /// Replace a pre-existing unit file for this name
    #[arg(long)]
    force: bool,

    /// JSON file supplying any of the above; flags override its values
    #[arg(long, env = "GF_SERVICE_CONFIG")]
    config_path: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct DeleteArgs {
    /// Name of the domain or instance the service wraps
    #[arg(long)]
    name: Option<String>,

    /// The entity's directory (domain dir, or node/instance dir)
    #[arg(long)]
    server_dir: Option<PathBuf>,

    /// Kind of entity: domain or instance
    #[arg(long = "type")]
    kind: Option<ServiceType>,

    /// Echo service-manager commands instead of executing them
    #[arg(long)]
    dry_run: bool,

    /// JSON file supplying any of the above; flags override its values
    #[arg(long, env = "GF_SERVICE_CONFIG")]
    config_path: Option<PathBuf>,
}

pub fn run_create(args: CreateArgs) -> Result<()> {
    let mut config = load_or_build(
        args.config_path.as_deref(),
        args.name,
        args.server_dir,
        args.kind,
    )?;
    if args.service_user.is_some() {
        config.service_user = args.service_user;
    }
    if let Some(asadmin_path) = args.asadmin_path {
        config.asadmin_path = asadmin_path;
    }
    if args.dry_run {
        config.dry_run = true;
    }
    if args.force {
        config.force = true;
    }

    let dry_run = config.dry_run;
    let mut adapter = platform_adapter(config)?;
    adapter.initialize()?;
    adapter.create_service()?;

    let message = adapter.success_message();
    println!("{message}");

    if !dry_run {
        if let Err(e) = adapter.write_readme(&message) {
            warn!("could not update the instance README: {e:#}");
        }
    }
    Ok(())
}

pub fn run_delete(args: DeleteArgs) -> Result<()> {
    let mut config = load_or_build(
        args.config_path.as_deref(),
        args.name,
        args.server_dir,
        args.kind,
    )?;
    if args.dry_run {
        config.dry_run = true;
    }

    let name = config.name.clone();
    let mut adapter = platform_adapter(config)?;
    adapter.initialize()?;

    if !adapter.delete_service()? {
        anyhow::bail!("the unit file for {name} is still present; delete it manually");
    }
    info!("service for {} removed", name);
    println!("The service for {name} was removed.");
    Ok(())
}

fn load_or_build(
    config_path: Option<&Path>,
    name: Option<String>,
    server_dir: Option<PathBuf>,
    kind: Option<ServiceType>,
) -> Result<ServiceConfig> {
    let mut config = match config_path {
        Some(path) => {
            info!("loading service config from {}", path.display());
            ServiceConfig::load(path)?
        }
        None => ServiceConfig {
            name: name.clone().context("--name is required (or use --config-path)")?,
            kind: kind.unwrap_or(ServiceType::Domain),
            server_dir: server_dir
                .clone()
                .context("--server-dir is required (or use --config-path)")?,
            service_user: None,
            os_user: String::new(),
            asadmin_path: PathBuf::from("/usr/bin/asadmin"),
            dry_run: false,
            force: false,
        },
    };

    // CLI flags override file values
    if let Some(name) = name {
        config.name = name;
    }
    if let Some(server_dir) = server_dir {
        config.server_dir = server_dir;
    }
    if let Some(kind) = kind {
        config.kind = kind;
    }
    config.os_user = current_os_user()?;
    Ok(config)
}

fn current_os_user() -> Result<String> {
    #[cfg(target_os = "linux")]
    {
        use nix::unistd::{self, Uid};
        let uid = Uid::effective();
        let entry = unistd::User::from_uid(uid)
            .context("failed to look up the current OS user")?;
        match entry {
            Some(user) => Ok(user.name),
            None => anyhow::bail!("no passwd entry for uid {uid}"),
        }
    }
    #[cfg(not(target_os = "linux"))]
    {
        std::env::var("USER").context("failed to determine the current OS user")
    }
}

fn platform_adapter(config: ServiceConfig) -> Result<Box<dyn ServiceAdapter>> {
    #[cfg(target_os = "linux")]
    {
        if !svcmgmt_linux::service::is_applicable() {
            anyhow::bail!(
                "systemd was not found on this host; no other service manager is supported"
            );
        }
        Ok(Box::new(svcmgmt_linux::service::SystemdService::new(
            config,
        )))
    }
    #[cfg(not(target_os = "linux"))]
    {
        let _ = config;
        anyhow::bail!("service management is only supported on Linux hosts")
    }
}
