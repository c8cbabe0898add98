use crate::models::{Channel, Metric};
use serde::Serialize;
use utoipa::ToSchema;

/// Read commands understood by the meter in programming mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Volta,
    Curre,
    Powep,
    Powpp,
    Frequ,
    Et0pe,
}

impl Command {
    /// Order in which a session issues the commands
    pub const ALL: [Command; 6] = [
        Command::Volta,
        Command::Curre,
        Command::Powep,
        Command::Powpp,
        Command::Frequ,
        Command::Et0pe,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Command::Volta => "VOLTA",
            Command::Curre => "CURRE",
            Command::Powep => "POWEP",
            Command::Powpp => "POWPP",
            Command::Frequ => "FREQU",
            Command::Et0pe => "ET0PE",
        }
    }

    /// Body of the `R1` frame, e.g. `VOLTA()`
    pub fn body(&self) -> String {
        format!("{}()", self.name())
    }

    pub fn metric(&self) -> Metric {
        match self {
            Command::Volta => Metric::Voltage,
            Command::Curre => Metric::Current,
            Command::Powep => Metric::PowerUsed,
            Command::Powpp => Metric::PhasePower,
            Command::Frequ => Metric::Frequency,
            Command::Et0pe => Metric::Tariff,
        }
    }

    /// Number of reply fields that carry a reading
    pub fn field_count(&self) -> usize {
        match self {
            Command::Powep | Command::Frequ => 1,
            _ => 3,
        }
    }

    /// Label for the reply field at `index` (zero based)
    pub fn channel(&self, index: usize) -> Option<Channel> {
        let n = (index + 1) as u8;
        match self {
            Command::Volta | Command::Curre | Command::Powpp => Some(Channel::Phase(n)),
            Command::Et0pe => Some(Channel::Tariff(n)),
            Command::Powep | Command::Frequ => None,
        }
    }
}

/// What the meter tells about itself in the sign-on reply, e.g. `/EKT5CE303v12`
#[derive(Debug, Clone, PartialEq)]
pub struct MeterIdentification {
    pub manufacturer: String,
    /// Baud rate / protocol indicator, echoed back in the acknowledgement
    pub mode: u8,
    pub identification: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    SignOn,
    Acknowledged,
    CommandLoop,
    SignOff,
    Closed,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionReport {
    pub device: String,
    pub measurements: usize,
    /// Reply fields that were missing or not numeric
    pub skipped: usize,
}

#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct CycleReport {
    pub devices: usize,
    pub measurements: usize,
    pub skipped: usize,
    pub failed_devices: Vec<String>,
    pub duration_ms: u64,
    pub finished_at: String,
}
