use anyhow::Result;

/// One implementation per service-manager family. An adapter services
/// exactly one install or uninstall operation; callers must not drive the
/// same instance name concurrently, as both operations mutate the same
/// unit-file path with no locking.
pub trait ServiceAdapter: Send + Sync {
    /// Build the token map, select the template, validate the unit
    /// directory, and compute the unit target path
    fn initialize(&mut self) -> Result<()>;

    /// Install the entity as a managed service
    fn create_service(&mut self) -> Result<()>;

    /// Remove the service registration; true iff the unit file is gone afterward
    fn delete_service(&mut self) -> Result<bool>;

    /// Operator-facing message describing the completed installation
    fn success_message(&self) -> String;

    /// Append an operator note to the entity's README
    fn write_readme(&self, message: &str) -> Result<()>;

    /// Location arguments for the start command
    fn location_args_start(&self) -> String;

    /// Location arguments for the stop command
    fn location_args_stop(&self) -> String;
}
