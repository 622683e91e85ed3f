//! `status`: bind every lock and print its presented state.

use serde::Serialize;
use tabled::Tabled;

use lockward_core::{LockEngine, PresentedState};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;
use crate::session::Session;

/// One lock's presented state, as reported to the user.
#[derive(Debug, Clone, Serialize)]
pub struct LockReport {
    pub serial: String,
    pub name: String,
    #[serde(flatten)]
    pub state: PresentedState,
}

impl LockReport {
    pub fn from_engine(engine: &LockEngine) -> Self {
        Self {
            serial: engine.serial().to_owned(),
            name: engine.name().to_owned(),
            state: engine.presented(),
        }
    }
}

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct LockRow {
    #[tabled(rename = "Serial")]
    serial: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Current")]
    current: String,
    #[tabled(rename = "Target")]
    target: String,
    #[tabled(rename = "Battery")]
    battery: String,
    #[tabled(rename = "Reachable")]
    reachable: String,
}

impl LockRow {
    fn new(report: &LockReport, color: bool) -> Self {
        Self {
            serial: report.serial.clone(),
            name: report.name.clone(),
            current: output::paint_current(report.state.current, color),
            target: report.state.target.to_string(),
            battery: output::paint_battery(report.state.battery, color),
            reachable: output::paint_reachable(report.state.reachable, color),
        }
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(session: &Session, global: &GlobalOpts) -> Result<(), CliError> {
    let engines = session.discover().await?;

    let mut reports = Vec::with_capacity(engines.len());
    for engine in &engines {
        session.bind(engine).await?;
        reports.push(LockReport::from_engine(engine));
    }

    let color = output::should_color(global.color);
    let out = output::render_list(
        global.output,
        &reports,
        |r| LockRow::new(r, color),
        |r| format!("{}\t{}", r.serial, r.state.current),
    );
    output::print_output(&out, global.quiet);
    Ok(())
}
