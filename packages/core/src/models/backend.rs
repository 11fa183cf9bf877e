use serde::{Deserialize, Serialize};
use std::fmt;

/// Which State Store backend currently serves reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendMode {
    External,
    InProcess,
}

impl fmt::Display for BackendMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendMode::External => write!(f, "external"),
            BackendMode::InProcess => write!(f, "in_process"),
        }
    }
}

/// Where a room's durable identity lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Persistence {
    Durable,
    MemoryOnly,
}

/// How the State Store picks its backend at startup.
///
/// `Auto` probes the external backend and falls back to the in-process one
/// when it is unreachable, re-probing later. `External` never falls back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendSelection {
    Auto,
    External,
    Memory,
}

impl std::str::FromStr for BackendSelection {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(BackendSelection::Auto),
            "external" => Ok(BackendSelection::External),
            "memory" => Ok(BackendSelection::Memory),
            other => Err(format!("unknown state backend '{}'", other)),
        }
    }
}
