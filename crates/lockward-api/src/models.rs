// Lock service response types
//
// The service is inconsistent about flag encoding across firmware
// versions (booleans, 0/1 integers, strings, null), so every boolean-ish
// field goes through `truthy`. Unmodelled fields land in `extra`.

use serde::{Deserialize, Deserializer, Serialize};
use strum::{AsRefStr, Display, EnumString};

// ── Lock record ──────────────────────────────────────────────────────

/// Code recorded when `lockState` (or the whole status block) is missing
/// or unreadable. Outside the known table, so it never maps to a state.
pub const UNKNOWN_LOCK_STATE: i64 = -1;

/// One physical lock as reported by `GET /doorlock/{subscription}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLock {
    pub serial: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_status")]
    pub status: LockStatus,
    #[serde(default)]
    pub flags: Option<LockFlags>,
    /// Catch-all for undocumented fields.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Mechanical status block of a lock record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockStatus {
    /// 0 = unlocked, 1 = locked, 2 = unlocked (alternate firmware code).
    #[serde(default = "unknown_lock_state", deserialize_with = "lock_state_code")]
    pub lock_state: i64,
    #[serde(default, deserialize_with = "truthy")]
    pub lock_jam_state: bool,
    #[serde(default, deserialize_with = "truthy")]
    pub lock_disabled: bool,
}

impl Default for LockStatus {
    fn default() -> Self {
        Self {
            lock_state: UNKNOWN_LOCK_STATE,
            lock_jam_state: false,
            lock_disabled: false,
        }
    }
}

/// Auxiliary condition flags of a lock record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockFlags {
    #[serde(default, deserialize_with = "truthy")]
    pub offline: bool,
    #[serde(default, deserialize_with = "truthy")]
    pub low_battery: bool,
}

// ── Commands ─────────────────────────────────────────────────────────

/// Command token accepted by `POST /doorlock/{subscription}/{serial}/state`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LockCommand {
    Lock,
    Unlock,
}

#[derive(Debug, Serialize)]
pub(crate) struct SetLockStateRequest {
    pub state: LockCommand,
}

// ── Helpers ──────────────────────────────────────────────────────────

/// Accept booleans, numbers (non-zero is true), `"true"`/`"1"` strings and
/// null. Anything else is false.
fn truthy<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Bool(b)) => b,
        Some(serde_json::Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(serde_json::Value::String(s)) => {
            matches!(s.to_ascii_lowercase().as_str(), "true" | "1" | "yes")
        }
        _ => false,
    })
}

fn unknown_lock_state() -> i64 {
    UNKNOWN_LOCK_STATE
}

/// Integer codes, numeric strings, and anything else as
/// [`UNKNOWN_LOCK_STATE`].
fn lock_state_code<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n.as_i64().unwrap_or(UNKNOWN_LOCK_STATE),
        Some(serde_json::Value::String(s)) => s.trim().parse().unwrap_or(UNKNOWN_LOCK_STATE),
        _ => UNKNOWN_LOCK_STATE,
    })
}

/// A malformed status block degrades to the default so the rest of the
/// listing still decodes.
fn lenient_status<'de, D>(deserializer: D) -> Result<LockStatus, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or_default())
}
