//! Presentation sink that records every push in the log.

use tracing::{debug, info};

use lockward_core::{AccessoryInfo, BatteryStatus, LockCurrentState, LockTargetState, PresentationSink};

pub struct TracingSink {
    serial: String,
}

impl TracingSink {
    pub fn new(serial: impl Into<String>) -> Self {
        Self {
            serial: serial.into(),
        }
    }
}

impl PresentationSink for TracingSink {
    fn update_current_state(&self, state: LockCurrentState) {
        info!(serial = %self.serial, current = %state, code = state.as_code(), "current state");
    }

    fn update_target_state(&self, state: LockTargetState) {
        info!(serial = %self.serial, target = %state, code = state.as_code(), "target state");
    }

    fn update_battery_status(&self, status: BatteryStatus) {
        debug!(serial = %self.serial, battery = %status, "battery status");
    }

    fn update_reachable(&self, reachable: bool) {
        debug!(serial = %self.serial, reachable, "reachability");
    }

    fn set_accessory_info(&self, info: &AccessoryInfo) {
        debug!(
            serial = %info.serial,
            name = %info.name,
            manufacturer = %info.manufacturer,
            model = %info.model,
            "accessory info"
        );
    }
}
