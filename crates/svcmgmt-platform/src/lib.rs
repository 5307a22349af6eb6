// Service-manager integration seam

pub mod service;
