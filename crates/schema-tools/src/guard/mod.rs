/// Security boundary for filesystem and process access.
///
/// - `paths.rs`: containment of resolved paths inside allowed roots
/// - `command.rs`: allowlisted command types and argument validation
/// - `exec.rs`: spawning a validated command with a wall-clock limit

pub mod command;
pub mod exec;
pub mod paths;

pub use command::{CommandAllowlist, CommandSpec};
pub use exec::{CommandOutput, PreparedCommand};
pub use paths::{is_allowed, PathGuard};
