// Linux systemd implementation of the service-manager seam

#[cfg(target_os = "linux")]
pub mod service;
