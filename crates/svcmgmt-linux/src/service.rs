//! Systemd service management — install a GlassFish domain or instance as a
//! host-managed service by rendering a unit file into the systemd unit
//! directory and registering it through `systemctl`.

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use nix::unistd::{access, AccessFlags};
use tracing::{info, trace, warn};

use svcmgmt_core::config::{ServiceConfig, ServiceType};
use svcmgmt_core::process;
use svcmgmt_core::template;
use svcmgmt_platform::service::ServiceAdapter;

/// Marker directory whose presence means systemd manages this host.
const SYSTEMD_DIR: &str = "/usr/lib/systemd";

/// Where unit files for locally managed services are installed.
const UNIT_DIR: &str = "/etc/systemd/system";

const SYSTEMCTL: &str = "systemctl";
const README: &str = "README";

// Token names referenced by UNIT_TEMPLATE.
const ENTITY_NAME_TN: &str = "ENTITY_NAME";
const AS_ADMIN_PATH_TN: &str = "AS_ADMIN_PATH";
const START_COMMAND_TN: &str = "START_COMMAND";
const STOP_COMMAND_TN: &str = "STOP_COMMAND";
const LOCATION_ARGS_START_TN: &str = "LOCATION_ARGS_START";
const LOCATION_ARGS_STOP_TN: &str = "LOCATION_ARGS_STOP";
const SERVICEUSER_START_TN: &str = "SERVICEUSER_START";
const SERVICEUSER_STOP_TN: &str = "SERVICEUSER_STOP";

const UNIT_TEMPLATE: &str = r#"[Unit]
Description=GlassFish %%ENTITY_NAME%%
After=network.target

[Service]
Type=forking
RemainAfterExit=yes
%%SERVICEUSER_START%%
ExecStart=%%AS_ADMIN_PATH%% %%START_COMMAND%% %%LOCATION_ARGS_START%% %%ENTITY_NAME%%
%%SERVICEUSER_STOP%%
ExecStop=%%AS_ADMIN_PATH%% %%STOP_COMMAND%% %%LOCATION_ARGS_STOP%% %%ENTITY_NAME%%

[Install]
WantedBy=multi-user.target
"#;

/// True iff this host is Linux and systemd is present.
///
/// Factory logic must gate on this before constructing a
/// [`SystemdService`]; the constructor checks again and treats a false gate
/// as a wiring defect, not a recoverable condition.
pub fn is_applicable() -> bool {
    applicable(Path::new(SYSTEMD_DIR))
}

fn applicable(systemd_dir: &Path) -> bool {
    cfg!(target_os = "linux") && systemd_dir.is_dir()
}

/// Installs one domain or instance as a systemd service.
///
/// One value services one operation sequentially; all state here is
/// operation-scoped and discarded with the value.
#[derive(Debug)]
pub struct SystemdService {
    config: ServiceConfig,
    unit_dir: PathBuf,
    systemctl: String,
    tokens: BTreeMap<String, String>,
    template: Option<&'static str>,
    target: Option<PathBuf>,
}

impl SystemdService {
    pub fn new(config: ServiceConfig) -> Self {
        Self::with_dirs(config, Path::new(SYSTEMD_DIR), Path::new(UNIT_DIR))
    }

    /// Constructor with the systemd marker and unit directories injected.
    ///
    /// Panics if systemd is not available here: being constructed on a host
    /// the applicability gate rejects is a caller defect.
    pub fn with_dirs(config: ServiceConfig, systemd_dir: &Path, unit_dir: &Path) -> Self {
        assert!(
            applicable(systemd_dir),
            "SystemdService constructed but systemd is not available on this host"
        );
        Self {
            config,
            unit_dir: unit_dir.to_path_buf(),
            systemctl: SYSTEMCTL.to_string(),
            tokens: BTreeMap::new(),
            template: None,
            target: None,
        }
    }

    #[cfg(test)]
    fn with_systemctl(mut self, program: &str) -> Self {
        self.systemctl = program.to_string();
        self
    }

    /// Unit file name for an instance name; one name maps to exactly one file.
    pub fn unit_file_name(name: &str) -> String {
        format!("GlassFish_{name}.service")
    }

    fn target(&self) -> &Path {
        self.target
            .as_deref()
            .expect("initialize() must be called first")
    }

    fn populate_tokens(&mut self) {
        let entity_name = self.config.name.clone();
        let asadmin = self.config.asadmin_path.display().to_string();
        let start_command = self.config.kind.start_command().to_string();
        let stop_command = self.config.kind.stop_command().to_string();
        let location_start = self.location_args_start();
        let location_stop = self.location_args_stop();
        let user_start = self.service_user_start();
        let user_stop = self.service_user_stop();

        let tokens = [
            (ENTITY_NAME_TN, entity_name),
            (AS_ADMIN_PATH_TN, asadmin),
            (START_COMMAND_TN, start_command),
            (STOP_COMMAND_TN, stop_command),
            (LOCATION_ARGS_START_TN, location_start),
            (LOCATION_ARGS_STOP_TN, location_stop),
            (SERVICEUSER_START_TN, user_start),
            (SERVICEUSER_STOP_TN, user_stop),
        ];
        for (name, value) in tokens {
            self.tokens.insert(name.to_string(), value);
        }
    }

    /// A `User=` line when the service should run as a specific account,
    /// empty when the resolved user is root.
    fn service_user_start(&self) -> String {
        match self.final_user_but_not_root() {
            Some(user) => format!("User={user}"),
            None => String::new(),
        }
    }

    // The stop path needs no user context on this platform.
    fn service_user_stop(&self) -> String {
        String::new()
    }

    fn final_user(&self) -> &str {
        match &self.config.service_user {
            Some(user) if !user.trim().is_empty() => user,
            _ => &self.config.os_user,
        }
    }

    // root (e.g. running under sudo with no --service-user) means the unit
    // carries no User= directive at all.
    fn final_user_but_not_root(&self) -> Option<&str> {
        let user = self.final_user();
        (user != "root").then_some(user)
    }

    fn check_unit_dir(&mut self) -> Result<()> {
        if let Ok(canonical) = fs::canonicalize(&self.unit_dir) {
            self.unit_dir = canonical;
        }
        if !self.unit_dir.is_dir() {
            bail!(
                "{} does not exist or is not a directory; is systemd really managing this host?",
                self.unit_dir.display()
            );
        }
        if access(self.unit_dir.as_path(), AccessFlags::W_OK).is_err() {
            bail!("no permission to write into {}", self.unit_dir.display());
        }
        Ok(())
    }

    fn handle_pre_existing(&self) -> Result<()> {
        if !self.target().is_file() || !self.config.force {
            return Ok(());
        }
        let removed = fs::remove_file(self.target());
        if removed.is_err() || self.target().is_file() {
            bail!(
                "the service unit {target} already exists and could not be removed; \
                 delete it manually with `rm {target}` and retry",
                target = self.target().display()
            );
        }
        Ok(())
    }

    fn render(&self) -> String {
        let template = self
            .template
            .expect("initialize() must be called first");
        template::expand_tokens(template, &self.tokens)
    }

    // Best-effort: a stale disable on an already-unregistered unit is
    // expected and harmless. The file's absence afterward is the
    // authoritative signal of success.
    fn uninstall(&self) -> bool {
        if let Err(e) = self.disable() {
            warn!("systemctl disable failed (ignored): {e:#}");
        }
        match fs::remove_file(self.target()) {
            Ok(()) => trace!("deleted {}", self.target().display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("could not delete {}: {}", self.target().display(), e),
        }
        !self.target().exists()
    }

    fn enable(&self) -> Result<()> {
        self.call_systemctl("enable")
    }

    fn disable(&self) -> Result<()> {
        self.call_systemctl("disable")
    }

    fn call_systemctl(&self, subcommand: &str) -> Result<()> {
        let target = self.target().display().to_string();
        let args = [subcommand, target.as_str()];
        if self.config.dry_run {
            info!("dry-run: {} {}", self.systemctl, args.join(" "));
            return Ok(());
        }
        let output = process::run(&self.systemctl, &args)?;
        trace!("systemctl output: {}{}", output.stdout, output.stderr);
        Ok(())
    }
}

impl ServiceAdapter for SystemdService {
    fn initialize(&mut self) -> Result<()> {
        self.populate_tokens();
        self.template = Some(UNIT_TEMPLATE);
        self.check_unit_dir()?;
        self.target = Some(self.unit_dir.join(Self::unit_file_name(&self.config.name)));
        Ok(())
    }

    fn create_service(&mut self) -> Result<()> {
        self.handle_pre_existing()?;

        // Clear any drifted registration before installing, whether or not
        // a unit file was present.
        if self.uninstall() && !self.config.dry_run {
            info!("removed a pre-existing service registration for {}", self.config.name);
        } else {
            trace!("no pre-existing service with that name was found");
        }

        let content = self.render();
        fs::write(self.target(), &content)
            .with_context(|| format!("failed to write unit file {}", self.target().display()))?;
        trace!("target file written: {}", self.target().display());
        trace!("object dump: {:#?}", self);

        self.enable()
    }

    fn delete_service(&mut self) -> Result<bool> {
        Ok(self.uninstall())
    }

    fn success_message(&self) -> String {
        if self.config.dry_run {
            return "Dry run performed. No service was actually installed.".to_string();
        }
        format!(
            "The systemd service for the {kind} {name} was created successfully. \
             The unit file is {target}; the service will run as user {user}. \
             Manage it with systemctl via the unit name {unit}.",
            kind = self.config.kind,
            name = self.config.name,
            target = self.target().display(),
            user = self.final_user(),
            unit = Self::unit_file_name(&self.config.name),
        )
    }

    fn write_readme(&self, message: &str) -> Result<()> {
        let path = self.config.server_dirs().server_dir().join(README);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        writeln!(file, "{message}")
            .with_context(|| format!("failed to append to {}", path.display()))?;
        Ok(())
    }

    fn location_args_start(&self) -> String {
        let dirs = self.config.server_dirs();
        match self.config.kind {
            ServiceType::Domain => {
                format!("--domaindir {}", dirs.server_parent_dir().display())
            }
            ServiceType::Instance => format!(
                "--nodedir {} --node {}",
                dirs.server_grandparent_dir().display(),
                dirs.server_parent_name(),
            ),
        }
    }

    // Identical on this platform.
    fn location_args_stop(&self) -> String {
        self.location_args_start()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config(name: &str, tmp: &TempDir) -> ServiceConfig {
        ServiceConfig {
            name: name.to_string(),
            kind: ServiceType::Domain,
            server_dir: tmp.path().join("domains").join(name),
            service_user: Some("alice".to_string()),
            os_user: "builder".to_string(),
            asadmin_path: PathBuf::from("/opt/glassfish/bin/asadmin"),
            dry_run: true,
            force: false,
        }
    }

    fn service(config: ServiceConfig, tmp: &TempDir) -> SystemdService {
        let systemd = tmp.path().join("systemd");
        let units = tmp.path().join("units");
        fs::create_dir_all(&systemd).unwrap();
        fs::create_dir_all(&units).unwrap();
        SystemdService::with_dirs(config, &systemd, &units)
    }

    fn initialized(name: &str, tmp: &TempDir) -> SystemdService {
        let mut svc = service(config(name, tmp), tmp);
        svc.initialize().unwrap();
        svc
    }

    #[test]
    fn test_target_path_is_deterministic() {
        let tmp = TempDir::new().unwrap();
        let first = initialized("server1", &tmp);
        let second = initialized("server1", &tmp);
        assert_eq!(first.target(), second.target());
        assert!(first
            .target()
            .ends_with(Path::new("units/GlassFish_server1.service")));
    }

    #[test]
    fn test_applicability_requires_the_systemd_dir() {
        assert!(!applicable(Path::new("/definitely/not/a/systemd/dir")));
    }

    #[test]
    #[should_panic(expected = "systemd is not available")]
    fn test_construction_without_systemd_is_a_wiring_defect() {
        let tmp = TempDir::new().unwrap();
        let cfg = config("server1", &tmp);
        let missing = tmp.path().join("nope");
        SystemdService::with_dirs(cfg, &missing, &tmp.path().join("units"));
    }

    #[test]
    fn test_initialize_fails_when_unit_dir_is_missing() {
        let tmp = TempDir::new().unwrap();
        let systemd = tmp.path().join("systemd");
        fs::create_dir_all(&systemd).unwrap();
        let units = tmp.path().join("units");

        let mut svc = SystemdService::with_dirs(config("server1", &tmp), &systemd, &units);
        let err = svc.initialize().unwrap_err();
        assert!(err.to_string().contains(units.to_str().unwrap()));
    }

    #[test]
    fn test_dry_run_install_still_writes_the_unit_file() {
        let tmp = TempDir::new().unwrap();
        let mut svc = initialized("server1", &tmp);
        svc.create_service().unwrap();

        let content = fs::read_to_string(svc.target()).unwrap();
        assert!(content.contains("User=alice"));
        assert!(content.contains("start-domain"));
        assert!(content.contains("GlassFish server1"));
        // every referenced token resolved
        assert!(!content.contains("%%"));
    }

    #[test]
    fn test_root_user_gets_no_user_directive() {
        let tmp = TempDir::new().unwrap();
        let mut cfg = config("server1", &tmp);
        cfg.service_user = Some("root".to_string());
        let mut svc = service(cfg, &tmp);
        svc.initialize().unwrap();
        svc.create_service().unwrap();

        let content = fs::read_to_string(svc.target()).unwrap();
        assert!(!content.contains("User="));
    }

    #[test]
    fn test_blank_service_user_falls_back_to_os_user() {
        let tmp = TempDir::new().unwrap();
        let mut cfg = config("server1", &tmp);
        cfg.service_user = Some("   ".to_string());
        let mut svc = service(cfg, &tmp);
        svc.initialize().unwrap();
        svc.create_service().unwrap();

        let content = fs::read_to_string(svc.target()).unwrap();
        assert!(content.contains("User=builder"));
    }

    #[test]
    fn test_force_replaces_an_existing_unit() {
        let tmp = TempDir::new().unwrap();
        let mut cfg = config("server1", &tmp);
        cfg.force = true;
        let mut svc = service(cfg, &tmp);
        svc.initialize().unwrap();
        fs::write(svc.target(), "stale unit").unwrap();

        svc.create_service().unwrap();
        let content = fs::read_to_string(svc.target()).unwrap();
        assert!(content.contains("ExecStart="));
        assert!(!content.contains("stale unit"));
    }

    #[test]
    fn test_non_force_overwrites_an_existing_unit() {
        // Preserved permissive behavior: without --force a pre-existing
        // file does not block the install, the render replaces it.
        let tmp = TempDir::new().unwrap();
        let mut svc = initialized("server1", &tmp);
        fs::write(svc.target(), "stale unit").unwrap();

        svc.create_service().unwrap();
        let content = fs::read_to_string(svc.target()).unwrap();
        assert!(!content.contains("stale unit"));
    }

    #[test]
    fn test_delete_when_absent_is_already_satisfied() {
        let tmp = TempDir::new().unwrap();
        let mut svc = initialized("server1", &tmp);
        assert!(svc.delete_service().unwrap());
    }

    #[test]
    fn test_delete_removes_an_existing_unit() {
        let tmp = TempDir::new().unwrap();
        let mut svc = initialized("server1", &tmp);
        fs::write(svc.target(), "unit").unwrap();

        assert!(svc.delete_service().unwrap());
        assert!(!svc.target().exists());
    }

    #[test]
    fn test_enable_invokes_systemctl_once_with_the_unit_path() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().unwrap();
        let log = tmp.path().join("calls.log");
        let fake = tmp.path().join("systemctl");
        fs::write(
            &fake,
            format!("#!/bin/sh\necho \"$@\" >> {}\n", log.display()),
        )
        .unwrap();
        fs::set_permissions(&fake, fs::Permissions::from_mode(0o755)).unwrap();

        let mut cfg = config("server1", &tmp);
        cfg.dry_run = false;
        let mut svc = service(cfg, &tmp).with_systemctl(fake.to_str().unwrap());
        svc.initialize().unwrap();
        svc.create_service().unwrap();

        let calls = fs::read_to_string(&log).unwrap();
        let enables: Vec<_> = calls
            .lines()
            .filter(|line| line.starts_with("enable "))
            .collect();
        assert_eq!(enables.len(), 1);
        assert!(enables[0].ends_with("GlassFish_server1.service"));
    }

    #[test]
    fn test_dry_run_never_reaches_systemctl() {
        let tmp = TempDir::new().unwrap();
        let log = tmp.path().join("calls.log");
        // not executable on purpose: any invocation attempt would error out
        fs::write(tmp.path().join("systemctl"), "").unwrap();

        let mut svc = service(config("server1", &tmp), &tmp)
            .with_systemctl(tmp.path().join("systemctl").to_str().unwrap());
        svc.initialize().unwrap();
        svc.create_service().unwrap();
        assert!(svc.delete_service().unwrap());
        assert!(!log.exists());
    }

    #[test]
    fn test_success_message_names_the_instance_and_unit() {
        let tmp = TempDir::new().unwrap();
        let mut cfg = config("server1", &tmp);
        cfg.dry_run = false;
        let mut svc = service(cfg, &tmp);
        svc.initialize().unwrap();

        let message = svc.success_message();
        assert!(message.contains("server1"));
        assert!(message.contains("GlassFish_server1.service"));
        assert!(message.contains("alice"));
    }

    #[test]
    fn test_dry_run_success_message_is_the_fixed_notice() {
        let tmp = TempDir::new().unwrap();
        let svc = initialized("server1", &tmp);
        assert!(svc.success_message().starts_with("Dry run performed"));
    }

    #[test]
    fn test_readme_notes_accumulate() {
        let tmp = TempDir::new().unwrap();
        let cfg = config("server1", &tmp);
        fs::create_dir_all(&cfg.server_dir).unwrap();
        let svc = service(cfg.clone(), &tmp);

        svc.write_readme("first note").unwrap();
        svc.write_readme("second note").unwrap();

        let readme = fs::read_to_string(cfg.server_dir.join("README")).unwrap();
        assert!(readme.contains("first note"));
        assert!(readme.contains("second note"));
    }

    #[test]
    fn test_location_args_for_a_domain() {
        let tmp = TempDir::new().unwrap();
        let svc = service(config("server1", &tmp), &tmp);
        let args = svc.location_args_start();
        assert!(args.starts_with("--domaindir "));
        assert!(args.contains("domains"));
        assert_eq!(args, svc.location_args_stop());
    }

    #[test]
    fn test_location_args_for_an_instance() {
        let tmp = TempDir::new().unwrap();
        let mut cfg = config("i1", &tmp);
        cfg.kind = ServiceType::Instance;
        cfg.server_dir = tmp.path().join("nodes").join("node1").join("i1");
        let svc = service(cfg, &tmp);

        let args = svc.location_args_start();
        assert!(args.contains("--nodedir "));
        assert!(args.ends_with("--node node1"));
    }
}
