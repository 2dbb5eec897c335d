//! Test result records and the console report built from them

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

/// Outcome of one case
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Passed,
    Failed,
    /// Not run because a prerequisite did not pass
    Skipped,
    /// Passed, but the check cannot tell "broken" apart from "not arrived yet"
    SoftPass,
}

impl Outcome {
    /// Whether the outcome counts towards the success rate
    pub fn is_pass(&self) -> bool {
        matches!(self, Outcome::Passed | Outcome::SoftPass)
    }

    fn marker(&self) -> &'static str {
        match self {
            Outcome::Passed => "✅",
            Outcome::Failed => "❌",
            Outcome::Skipped => "⏭️",
            Outcome::SoftPass => "⚠️",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Outcome::Passed => "PASS",
            Outcome::Failed => "FAIL",
            Outcome::Skipped => "SKIP",
            Outcome::SoftPass => "SOFT PASS",
        }
    }
}

/// One immutable entry in the result log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestRecord {
    /// Case name
    pub name: String,
    /// Outcome of the case
    pub outcome: Outcome,
    /// Human-readable message
    pub message: String,
    /// When the record was created
    pub timestamp: DateTime<Utc>,
    /// Optional structured details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl TestRecord {
    pub fn new(name: impl Into<String>, outcome: Outcome, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            outcome,
            message: message.into(),
            timestamp: Utc::now(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: Option<Value>) -> Self {
        self.details = details;
        self
    }

    pub fn success(&self) -> bool {
        self.outcome.is_pass()
    }
}

/// Append-only, ordered log of records
#[derive(Debug, Clone, Default)]
pub struct ResultLog {
    records: Vec<TestRecord>,
}

impl ResultLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record and log it
    pub fn record(&mut self, record: TestRecord) {
        if record.outcome == Outcome::Failed {
            warn!(case = %record.name, message = %record.message, "Case failed");
        } else {
            info!(case = %record.name, outcome = record.outcome.label(), message = %record.message, "Case finished");
        }
        self.records.push(record);
    }

    pub fn records(&self) -> &[TestRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn into_records(self) -> Vec<TestRecord> {
        self.records
    }
}

/// Aggregate counts over a set of records
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Summary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub soft: usize,
}

impl Summary {
    pub fn from_records(records: &[TestRecord]) -> Self {
        let count = |outcome: Outcome| records.iter().filter(|r| r.outcome == outcome).count();
        Self {
            total: records.len(),
            passed: count(Outcome::Passed) + count(Outcome::SoftPass),
            failed: count(Outcome::Failed),
            skipped: count(Outcome::Skipped),
            soft: count(Outcome::SoftPass),
        }
    }

    /// Percentage of records that passed (soft passes included); 0 when empty
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.passed as f64 / self.total as f64 * 100.0
        }
    }

    /// Everything that did not pass
    pub fn not_passed(&self) -> usize {
        self.failed + self.skipped
    }
}

/// The final report of one suite run
#[derive(Debug, Clone, Serialize)]
pub struct SuiteReport {
    /// Unique id of this run
    pub run_id: Uuid,
    /// Suite title
    pub title: String,
    /// Target the suite ran against
    pub target: String,
    /// Records in chronological order
    pub records: Vec<TestRecord>,
    /// Name of the gating case that halted the run, if any
    pub halted: Option<String>,
}

impl SuiteReport {
    pub fn new(
        title: impl Into<String>,
        target: impl Into<String>,
        records: Vec<TestRecord>,
        halted: Option<String>,
    ) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            title: title.into(),
            target: target.into(),
            records,
            halted,
        }
    }

    pub fn summary(&self) -> Summary {
        Summary::from_records(&self.records)
    }

    pub fn record(&self, name: &str) -> Option<&TestRecord> {
        self.records.iter().find(|r| r.name == name)
    }

    /// True when nothing failed or was skipped and the run was not halted
    pub fn all_passed(&self) -> bool {
        self.halted.is_none() && self.summary().not_passed() == 0
    }
}

const RULE: &str = "================================================================================";

impl fmt::Display for SuiteReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let summary = self.summary();

        writeln!(f)?;
        writeln!(f, "{}", RULE)?;
        writeln!(f, "🏁 {} SUMMARY", self.title.to_uppercase())?;
        writeln!(f, "{}", RULE)?;
        writeln!(f, "🔗 Target: {}", self.target)?;
        writeln!(f, "📊 Total Tests: {}", summary.total)?;
        writeln!(f, "✅ Passed: {}", summary.passed)?;
        writeln!(f, "❌ Failed: {}", summary.failed)?;
        if summary.skipped > 0 {
            writeln!(f, "⏭️  Skipped: {}", summary.skipped)?;
        }
        writeln!(f, "📈 Success Rate: {:.1}%", summary.success_rate())?;

        if let Some(gate) = &self.halted {
            writeln!(f)?;
            writeln!(f, "🛑 Run halted after gating case '{}'", gate)?;
        }

        if summary.not_passed() > 0 {
            writeln!(f)?;
            writeln!(f, "🔍 FAILED TESTS:")?;
            for record in self.records.iter().filter(|r| !r.success()) {
                writeln!(
                    f,
                    "   {} {}: {}",
                    record.outcome.marker(),
                    record.name,
                    record.message
                )?;
                if let Some(details) = &record.details {
                    writeln!(f, "      Details: {}", details)?;
                }
            }
        }

        if summary.soft > 0 {
            writeln!(f)?;
            writeln!(f, "⚠️  WARNINGS (inconclusive, counted as passed):")?;
            for record in self.records.iter().filter(|r| r.outcome == Outcome::SoftPass) {
                writeln!(f, "   ⚠️ {}: {}", record.name, record.message)?;
            }
        }

        writeln!(f)?;
        writeln!(f, "📋 DETAILED RESULTS:")?;
        for record in &self.records {
            writeln!(
                f,
                "   {} [{}] {}: {}",
                record.outcome.marker(),
                record.timestamp.format("%H:%M:%S"),
                record.name,
                record.message
            )?;
        }

        writeln!(f)?;
        writeln!(f, "{}", RULE)?;
        if self.all_passed() {
            writeln!(f, "🎉 ALL TESTS PASSED! ({})", self.title)?;
        } else if summary.total == 0 {
            writeln!(f, "⚠️  No tests were executed.")?;
        } else {
            writeln!(
                f,
                "⚠️  {} tests did not pass. Please review the issues above.",
                summary.not_passed()
            )?;
        }
        write!(f, "{}", RULE)
    }
}
