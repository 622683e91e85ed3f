//! Command dispatch: bridges CLI args -> lock engines -> output formatting.

pub mod config_cmd;
pub mod identify;
pub mod set;
pub mod status;
pub mod watch;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;
use crate::session::Session;

/// Dispatch a service-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    session: Session,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Status => status::handle(&session, global).await,
        Command::Lock(args) => set::handle(&session, &args.serial, set::Action::Lock, global).await,
        Command::Unlock(args) => {
            set::handle(&session, &args.serial, set::Action::Unlock, global).await
        }
        Command::Identify(args) => identify::handle(&session, &args.serial, global).await,
        Command::Watch(args) => watch::handle(session, args, global).await,
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => Ok(()),
    }
}
