//! Diagnostic snapshots and offline replay.
//!
//! A snapshot records everything that went into the last plan: charger
//! configuration, user settings, sensor readings, raw price data, tracker
//! state, the exact [`PlanningInput`], and the resulting [`Plan`]. Feeding
//! the input back through the planner must reproduce the recorded plan.

use std::fmt;
use std::fs;
use std::path::Path;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::input::{ChargerProfile, InputAssembler, SensorReadings, UserSettings};
use crate::planner::{self, Plan, PlanningInput};
use crate::prices::PriceData;
use crate::session::{SessionTracker, TrackerSnapshot};

/// Full diagnostic dump of one charger at one evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticSnapshot {
    pub timestamp: NaiveDateTime,
    pub description: String,
    pub config_settings: ChargerProfile,
    pub user_settings: UserSettings,
    pub manual_override_active: bool,
    pub sensor_data: SensorReadings,
    pub price_data: PriceData,
    pub session_info: TrackerSnapshot,
    pub planning_input: PlanningInput,
    pub last_plan: Option<Plan>,
}

impl DiagnosticSnapshot {
    /// Captures the state behind the tracker's most recent plan.
    ///
    /// `input` must be the snapshot that produced that plan.
    pub fn capture(
        description: impl Into<String>,
        assembler: &InputAssembler,
        sensors: &SensorReadings,
        prices: &PriceData,
        tracker: &SessionTracker,
        input: &PlanningInput,
    ) -> Self {
        Self {
            timestamp: input.now,
            description: description.into(),
            config_settings: assembler.charger().clone(),
            user_settings: assembler.settings().clone(),
            manual_override_active: assembler.settings().manual_override.is_some(),
            sensor_data: sensors.clone(),
            price_data: prices.clone(),
            session_info: tracker.snapshot(),
            planning_input: input.clone(),
            last_plan: tracker.last_plan().cloned(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }

    /// Writes the snapshot as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn write_to(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Reads a snapshot written by [`DiagnosticSnapshot::write_to`].
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a snapshot.
    pub fn read_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Re-runs the planner on the recorded input.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Snapshot`] if the snapshot carries no recorded plan.
    pub fn replay(&self) -> Result<ReplayOutcome> {
        let original = self
            .last_plan
            .clone()
            .ok_or_else(|| Error::Snapshot("snapshot has no recorded plan".to_string()))?;
        let replayed = planner::generate_charging_plan(&self.planning_input);
        let differences = differences(&original, &replayed);
        Ok(ReplayOutcome {
            original,
            replayed,
            differences,
        })
    }
}

/// Result of replaying a snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayOutcome {
    pub original: Plan,
    pub replayed: Plan,
    /// Names of plan fields that differ.
    pub differences: Vec<&'static str>,
}

impl ReplayOutcome {
    pub fn matches(&self) -> bool {
        self.differences.is_empty()
    }
}

fn differences(a: &Plan, b: &Plan) -> Vec<&'static str> {
    let mut diff = Vec::new();
    if a.generated_at != b.generated_at {
        diff.push("generated_at");
    }
    if a.should_charge_now != b.should_charge_now {
        diff.push("should_charge_now");
    }
    if a.target_soc != b.target_soc {
        diff.push("target_soc");
    }
    if a.departure != b.departure {
        diff.push("departure");
    }
    if a.selected_slots != b.selected_slots {
        diff.push("selected_slots");
    }
    if a.outcome != b.outcome {
        diff.push("outcome");
    }
    if a.reasoning != b.reasoning {
        diff.push("reasoning");
    }
    diff
}

impl fmt::Display for ReplayOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- Replay ---")?;
        for (i, entry) in self.replayed.reasoning.iter().enumerate() {
            writeln!(f, "{:>2}. [{:?}] {}", i + 1, entry.stage, entry.message)?;
        }
        writeln!(f, "Recorded: {}", self.original)?;
        writeln!(f, "Replayed: {}", self.replayed)?;
        if self.matches() {
            write!(f, "Result:   plan reproduced")
        } else {
            write!(f, "Result:   MISMATCH in {}", self.differences.join(", "))
        }
    }
}
