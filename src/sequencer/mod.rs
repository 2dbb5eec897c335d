//! Sequential REST test sequencer
//!
//! Runs the case catalog strictly in plan order. A case whose prerequisites
//! did not pass is recorded as skipped without touching the network, and a
//! failing gating case stops the run.

pub mod cases;
pub mod catalog;
pub mod checks;

use std::collections::HashSet;

use serde_json::json;
use tracing::{error, info, instrument};

use crate::api::ApiClient;
use crate::config::HarnessConfig;
use crate::error::{FailureKind, HarnessError, HarnessResult};
use crate::fixtures::Fixtures;
use crate::report::{Outcome, ResultLog, SuiteReport, TestRecord};
use crate::session::{CarriedReferences, Session};

pub use cases::{CaseContext, CasePass};
pub use catalog::{catalog, CaseId, CaseSpec, Plan, PlanError};

/// Title used in the backend report
pub const SUITE_TITLE: &str = "Stadtwache Backend Test";

pub struct Sequencer {
    plan: Plan,
    ctx: CaseContext,
    log: ResultLog,
}

impl Sequencer {
    /// Sequencer talking to the configured backend over reqwest
    pub fn new(config: &HarnessConfig) -> HarnessResult<Self> {
        let api = ApiClient::new(&config.api)?;
        Ok(Self::with_api(api, config))
    }

    /// Sequencer with an injected API client
    pub fn with_api(api: ApiClient, config: &HarnessConfig) -> Self {
        Self {
            plan: Plan::standard(),
            ctx: CaseContext {
                api,
                session: Session::new(),
                refs: CarriedReferences::new(),
                fixtures: Fixtures::new(&config.credentials, &config.realtime.channel),
                admin_email: config.credentials.email.clone(),
            },
            log: ResultLog::new(),
        }
    }

    /// Replace the standard plan
    pub fn with_plan(mut self, plan: Plan) -> Self {
        self.plan = plan;
        self
    }

    pub fn session(&self) -> &Session {
        &self.ctx.session
    }

    pub fn references(&self) -> &CarriedReferences {
        &self.ctx.refs
    }

    /// Run the whole plan and hand back the report
    ///
    /// The result log is drained, so a second call starts from an empty log
    /// but keeps session and carried references.
    #[instrument(skip(self), fields(base_url = %self.ctx.api.base_url()))]
    pub async fn run(&mut self) -> SuiteReport {
        info!(cases = self.plan.len(), "Starting backend suite");

        let mut passed: HashSet<CaseId> = HashSet::new();
        let mut halted = None;

        for spec in self.plan.cases().to_vec() {
            let blocker = spec
                .prerequisites
                .iter()
                .find(|prerequisite| !passed.contains(*prerequisite))
                .copied();
            if let Some(blocker) = blocker {
                let blocker_name = self.plan.spec(blocker).map(|s| s.name).unwrap_or("unknown");
                self.log.record(skipped_record(&spec, blocker_name));
                continue;
            }

            let record = self.run_case(spec.id).await;
            let success = record.success();
            self.log.record(record);

            if success {
                passed.insert(spec.id);
            } else if spec.gating {
                error!(case = spec.name, "Gating case failed, halting run");
                halted = Some(spec.name.to_string());
                break;
            }
        }

        let records = std::mem::take(&mut self.log).into_records();
        SuiteReport::new(SUITE_TITLE, self.ctx.api.base_url(), records, halted)
    }

    /// Execute one case directly, ignoring prerequisites
    ///
    /// The returned record is not appended to the run's log.
    pub async fn run_case(&mut self, id: CaseId) -> TestRecord {
        let spec = match self.plan.spec(id) {
            Some(spec) => *spec,
            None => {
                return TestRecord::new(id.to_string(), Outcome::Failed, "Case is not in the plan")
                    .with_details(Some(json!({ "kind": FailureKind::Precondition })))
            }
        };

        match cases::run_case(id, &mut self.ctx).await {
            Ok(pass) => TestRecord::new(spec.name, Outcome::Passed, pass.message).with_details(pass.details),
            Err(e) => failure_record(&spec, &e),
        }
    }
}

fn failure_record(spec: &CaseSpec, err: &HarnessError) -> TestRecord {
    let kind = err.kind();
    let message = match kind {
        FailureKind::Precondition => err.to_string(),
        _ => format!("Failed to {}: {}", spec.action, err),
    };
    TestRecord::new(spec.name, Outcome::Failed, message).with_details(Some(json!({ "kind": kind })))
}

fn skipped_record(spec: &CaseSpec, blocker: &str) -> TestRecord {
    let message = match spec.consumes {
        Some(role) => format!("No {} available: prerequisite '{}' did not pass", role, blocker),
        None => format!("Prerequisite '{}' did not pass", blocker),
    };
    TestRecord::new(spec.name, Outcome::Skipped, message).with_details(Some(json!({
        "kind": FailureKind::Precondition,
        "prerequisite": blocker,
    })))
}
