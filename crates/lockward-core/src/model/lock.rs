// ── Presented lock state ──

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use lockward_api::LockCommand;

/// Physical state shown to the consumer.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LockCurrentState {
    Unsecured,
    Secured,
    /// Mechanical jam reported by the lock.
    Jammed,
    /// Lock disabled, or nothing known yet.
    Unknown,
}

impl LockCurrentState {
    /// HomeKit `LockCurrentState` characteristic value.
    pub fn as_code(self) -> u8 {
        match self {
            Self::Unsecured => 0,
            Self::Secured => 1,
            Self::Jammed => 2,
            Self::Unknown => 3,
        }
    }
}

/// Desired state; the only two values a consumer may request.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LockTargetState {
    Unsecured,
    Secured,
}

impl LockTargetState {
    /// HomeKit `LockTargetState` characteristic value.
    pub fn as_code(self) -> u8 {
        match self {
            Self::Unsecured => 0,
            Self::Secured => 1,
        }
    }

    /// Remote command that drives the lock towards this state.
    pub fn command(self) -> LockCommand {
        match self {
            Self::Secured => LockCommand::Lock,
            Self::Unsecured => LockCommand::Unlock,
        }
    }

    pub fn from_command(command: LockCommand) -> Self {
        match command {
            LockCommand::Lock => Self::Secured,
            LockCommand::Unlock => Self::Unsecured,
        }
    }
}

impl From<LockTargetState> for LockCurrentState {
    fn from(target: LockTargetState) -> Self {
        match target {
            LockTargetState::Unsecured => Self::Unsecured,
            LockTargetState::Secured => Self::Secured,
        }
    }
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum BatteryStatus {
    #[default]
    Normal,
    Low,
}

impl BatteryStatus {
    /// HomeKit `StatusLowBattery` characteristic value.
    pub fn as_code(self) -> u8 {
        match self {
            Self::Normal => 0,
            Self::Low => 1,
        }
    }
}

/// Everything the engine presents for one lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresentedState {
    pub current: LockCurrentState,
    pub target: LockTargetState,
    pub battery: BatteryStatus,
    pub reachable: bool,
}

impl Default for PresentedState {
    /// Before the first refresh nothing is known about the lock.
    fn default() -> Self {
        Self {
            current: LockCurrentState::Unknown,
            target: LockTargetState::Secured,
            battery: BatteryStatus::Normal,
            reachable: false,
        }
    }
}

/// Static identity information handed to the presentation layer on bind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessoryInfo {
    pub manufacturer: String,
    pub model: String,
    pub serial: String,
    pub name: String,
}

impl AccessoryInfo {
    pub fn smart_lock(serial: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            manufacturer: "SimpliSafe".into(),
            model: "Smart Lock".into(),
            serial: serial.into(),
            name: name.into(),
        }
    }
}
