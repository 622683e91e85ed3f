//! `watch`: bind every lock, follow push events and polls, and print each
//! state transition until Ctrl-C.

use chrono::Local;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use lockward_core::{LockEngine, PresentedState};

use crate::cli::{GlobalOpts, OutputFormat, WatchArgs};
use crate::error::CliError;
use crate::output;
use crate::session::Session;

use super::status::LockReport;

pub async fn handle(mut session: Session, args: WatchArgs, global: &GlobalOpts) -> Result<(), CliError> {
    if let Some(secs) = args.poll_interval {
        session.set_poll_interval(secs);
    }

    let mut engines = session.discover().await?;
    if let Some(ref serial) = args.serial {
        engines.retain(|e| e.serial() == serial);
        if engines.is_empty() {
            return Err(CliError::LockNotFound {
                serial: serial.clone(),
            });
        }
    }

    for engine in &engines {
        if let Err(e) = session.bind(engine).await {
            tracing::warn!(serial = %engine.serial(), error = %e, "initial refresh failed");
        }
    }

    let color = output::should_color(global.color);
    let printers: Vec<JoinHandle<()>> = engines
        .iter()
        .map(|engine| {
            print_state(engine, engine.presented(), global.output, color, global.quiet);
            tokio::spawn(print_transitions(
                engine.clone(),
                global.output,
                color,
                global.quiet,
                session.child_token(),
            ))
        })
        .collect();

    let tasks = session.start(&engines);
    if !global.quiet {
        eprintln!("Watching {} lock(s). Press Ctrl-C to stop.", engines.len());
    }

    tokio::signal::ctrl_c().await?;
    tracing::debug!("interrupt received, shutting down");
    session.shutdown();

    for task in printers.into_iter().chain(tasks) {
        let _ = task.await;
    }
    Ok(())
}

async fn print_transitions(
    engine: LockEngine,
    format: OutputFormat,
    color: bool,
    quiet: bool,
    cancel: CancellationToken,
) {
    let mut stream = engine.subscribe();
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            changed = stream.changed() => {
                let Some(state) = changed else { break };
                print_state(&engine, state, format, color, quiet);
            }
        }
    }
}

fn print_state(engine: &LockEngine, state: PresentedState, format: OutputFormat, color: bool, quiet: bool) {
    let line = match format {
        OutputFormat::Json | OutputFormat::JsonCompact => {
            let report = LockReport {
                serial: engine.serial().to_owned(),
                name: engine.name().to_owned(),
                state,
            };
            output::render_json(&report, true)
        }
        OutputFormat::Plain => format!("{}\t{}\t{}", engine.serial(), state.current, state.target),
        OutputFormat::Table => format!(
            "{} {} ({}) current={} target={} battery={} reachable={}",
            Local::now().format("%H:%M:%S"),
            engine.name(),
            engine.serial(),
            output::paint_current(state.current, color),
            state.target,
            output::paint_battery(state.battery, color),
            output::paint_reachable(state.reachable, color),
        ),
    };
    output::print_output(&line, quiet);
}
