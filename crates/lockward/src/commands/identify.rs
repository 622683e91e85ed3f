//! `identify`: acknowledge an identify request and show accessory info.

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;
use crate::session::Session;

pub async fn handle(session: &Session, serial: &str, global: &GlobalOpts) -> Result<(), CliError> {
    let engine = session.engine(serial).await?;
    engine.identify();

    let info = engine.accessory_info();
    let out = output::render_single(
        global.output,
        &info,
        |i| {
            format!(
                "Name:         {}\nSerial:       {}\nManufacturer: {}\nModel:        {}",
                i.name, i.serial, i.manufacturer, i.model
            )
        },
        |i| i.serial.clone(),
    );
    output::print_output(&out, global.quiet);
    Ok(())
}
