//! Command dispatch: bridges CLI args -> hub operations -> output formatting.

pub mod call;
pub mod config_cmd;
pub mod get;
pub mod ping;
pub mod states;
pub mod watch;

use homeward_core::HubConfig;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a hub-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    config: &HubConfig,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::States(args) => states::handle(config, args, global).await,
        Command::Get { entity_id } => get::handle(config, &entity_id, global).await,
        Command::Call(args) => call::handle(config, args, global).await,
        Command::Watch(args) => watch::handle(config, args, global).await,
        Command::Ping => ping::handle(config, global).await,
        Command::Config(_) | Command::Completions(_) => Err(CliError::Internal(
            "local command routed to hub dispatch".into(),
        )),
    }
}
