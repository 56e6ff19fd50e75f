//! Static strategy pattern for CLI commands.
//!
//! Each subcommand is its own strategy type with static dispatch; adding a
//! command means implementing `CommandStrategy` and matching it in `main`.

mod info;
mod init;
mod serve;
mod version;

pub use info::InfoStrategy;
pub use init::InitStrategy;
pub use serve::ServeStrategy;
pub use version::VersionStrategy;

/// Core trait defining the contract for all command strategies.
///
/// Each strategy defines its own input type via the associated type, so
/// parameters pass without runtime casting or boxing.
pub trait CommandStrategy: Send + Sync + 'static {
    /// The input type this strategy accepts.
    type Input;

    /// Execute the command with the given input.
    ///
    /// # Errors
    /// Returns an error if command execution fails.
    async fn execute(&self, input: Self::Input) -> anyhow::Result<()>;
}
