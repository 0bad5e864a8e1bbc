//! Adapter sanity check
//!
//! Queries the handful of commands a HUD cannot do without and grades the
//! link by how many of them answer.

use std::fmt;

use hud_core::AdapterValue;
use tracing::info;

use crate::adapter::AdapterResponse;
use crate::connection::AdapterConnection;

/// Commands the display depends on
pub const ESSENTIAL_COMMANDS: &[&str] = &[
    "RPM",
    "SPEED",
    "COOLANT_TEMP",
    "THROTTLE_POS",
    "ENGINE_LOAD",
    "FUEL_LEVEL",
    "INTAKE_TEMP",
    "MAF",
];

/// Overall grade of a sanity check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// No essential command answered
    NoData,
    /// Fewer than half answered
    Limited,
    Healthy,
}

/// One essential command's outcome
#[derive(Debug, Clone, PartialEq)]
pub struct CommandCheck {
    pub command: &'static str,
    /// `None` for a null or failed response
    pub reading: Option<String>,
}

/// Result of [`SanityReport::run`]
#[derive(Debug, Clone, PartialEq)]
pub struct SanityReport {
    pub protocol_id: Option<String>,
    pub protocol_name: Option<String>,
    pub checks: Vec<CommandCheck>,
}

impl SanityReport {
    /// Query every essential command once, in order
    pub async fn run(connection: &AdapterConnection) -> Self {
        let mut checks = Vec::with_capacity(ESSENTIAL_COMMANDS.len());
        for &command in ESSENTIAL_COMMANDS {
            let reading = connection.query(command).await.ok().map(|r| describe(&r));
            info!(command, supported = reading.is_some(), "Sanity check");
            checks.push(CommandCheck { command, reading });
        }

        Self {
            protocol_id: connection.protocol_id().map(str::to_string),
            protocol_name: connection.protocol_name().map(str::to_string),
            checks,
        }
    }

    pub fn supported(&self) -> Vec<&'static str> {
        self.checks
            .iter()
            .filter(|p| p.reading.is_some())
            .map(|p| p.command)
            .collect()
    }

    pub fn missing(&self) -> Vec<&'static str> {
        self.checks
            .iter()
            .filter(|p| p.reading.is_none())
            .map(|p| p.command)
            .collect()
    }

    pub fn verdict(&self) -> Verdict {
        let supported = self.supported().len();
        if supported == 0 {
            Verdict::NoData
        } else if supported * 2 < self.checks.len() {
            Verdict::Limited
        } else {
            Verdict::Healthy
        }
    }
}

/// Quantities already carry their unit
fn describe(response: &AdapterResponse) -> String {
    match (&response.value, &response.unit) {
        (AdapterValue::Quantity { .. }, _) | (_, None) => response.value.to_string(),
        (value, Some(unit)) => format!("{} {}", value, unit),
    }
}

impl fmt::Display for SanityReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Protocol: {} (ID: {})",
            self.protocol_name.as_deref().unwrap_or("none"),
            self.protocol_id.as_deref().unwrap_or("-")
        )?;
        writeln!(f)?;
        for check in &self.checks {
            match &check.reading {
                Some(reading) => writeln!(f, "{}: {}", check.command, reading)?,
                None => writeln!(f, "{}: NULL RESPONSE", check.command)?,
            }
        }

        let supported = self.supported();
        let missing = self.missing();
        writeln!(f)?;
        writeln!(
            f,
            "Essential commands supported: {}/{}",
            supported.len(),
            self.checks.len()
        )?;
        if !supported.is_empty() {
            writeln!(f, "  Supported: {}", supported.join(", "))?;
        }
        if !missing.is_empty() {
            writeln!(f, "  Missing: {}", missing.join(", "))?;
        }

        writeln!(f)?;
        match self.verdict() {
            Verdict::NoData => write!(
                f,
                "WARNING: No essential commands are supported by the ECU; the HUD will not show meaningful data."
            ),
            Verdict::Limited => write!(
                f,
                "WARNING: Less than half of essential commands are supported; the HUD will have limited data."
            ),
            Verdict::Healthy => write!(f, "OBD connection is working properly."),
        }
    }
}
