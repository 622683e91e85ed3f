//! `lock` / `unlock`: write a target state.

use lockward_core::LockTargetState;

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::session::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Lock,
    Unlock,
}

impl Action {
    fn target(self) -> LockTargetState {
        match self {
            Self::Lock => LockTargetState::Secured,
            Self::Unlock => LockTargetState::Unsecured,
        }
    }
}

pub async fn handle(
    session: &Session,
    serial: &str,
    action: Action,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let engine = session.engine(serial).await?;
    session.bind(&engine).await?;

    let target = action.target();
    tracing::debug!(serial, %target, "writing target state");
    engine.write_target_state(target).await?;

    if !global.quiet {
        eprintln!("{} {}: target {target}", engine.name(), engine.serial());
    }
    Ok(())
}
