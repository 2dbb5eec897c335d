//! The fixed case catalog and the dependency plan built from it

use std::collections::{HashMap, HashSet};
use std::fmt;

use thiserror::Error;

use crate::session::EntityRole;

/// Identifier of every case the backend suite knows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CaseId {
    ServerConnectivity,
    CreateFirstAdmin,
    Login,
    CurrentUser,
    UsersByStatus,
    CreateIncident,
    ListIncidents,
    AssignIncident,
    CreatePerson,
    ListPersons,
    PersonStatistics,
    SendMessage,
    ListMessages,
    CreateReport,
    ListReports,
    EmergencyBroadcast,
    AdminStatistics,
    LiveLocations,
    AppConfiguration,
    DistrictsAndTeams,
}

/// Static description of one case
#[derive(Debug, Clone, Copy)]
pub struct CaseSpec {
    pub id: CaseId,
    /// Name used in the result log
    pub name: &'static str,
    /// Verb phrase used in failure messages ("Failed to <action>: ...")
    pub action: &'static str,
    /// Cases that must pass before this one runs
    pub prerequisites: &'static [CaseId],
    /// Carried reference this case consumes, if any
    pub consumes: Option<EntityRole>,
    /// A failure here halts the whole run
    pub gating: bool,
}

impl CaseSpec {
    const fn new(id: CaseId, name: &'static str, action: &'static str) -> Self {
        Self {
            id,
            name,
            action,
            prerequisites: &[CaseId::Login],
            consumes: None,
            gating: false,
        }
    }

    const fn after(mut self, prerequisites: &'static [CaseId]) -> Self {
        self.prerequisites = prerequisites;
        self
    }

    const fn consuming(mut self, role: EntityRole) -> Self {
        self.consumes = Some(role);
        self
    }

    const fn gating(mut self) -> Self {
        self.gating = true;
        self
    }
}

impl fmt::Display for CaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// The full catalog in its canonical, dependency-respecting order
pub fn catalog() -> Vec<CaseSpec> {
    use CaseId::*;
    vec![
        CaseSpec::new(ServerConnectivity, "Server Connectivity", "reach server")
            .after(&[])
            .gating(),
        CaseSpec::new(CreateFirstAdmin, "Create First Admin User", "create admin user")
            .after(&[ServerConnectivity]),
        CaseSpec::new(Login, "Authentication Login", "log in")
            .after(&[ServerConnectivity])
            .gating(),
        CaseSpec::new(CurrentUser, "Get Current User", "get user profile"),
        CaseSpec::new(UsersByStatus, "Get Users By Status", "get users by status"),
        CaseSpec::new(CreateIncident, "Create Incident", "create incident"),
        CaseSpec::new(ListIncidents, "Get Incidents", "get incidents"),
        CaseSpec::new(AssignIncident, "Assign Incident", "assign incident")
            .after(&[Login, CreateIncident])
            .consuming(EntityRole::Incident),
        CaseSpec::new(CreatePerson, "Create Person Entry", "create person"),
        CaseSpec::new(ListPersons, "Get Persons", "get persons"),
        CaseSpec::new(PersonStatistics, "Person Statistics", "get person stats"),
        CaseSpec::new(SendMessage, "Send Message", "send message"),
        CaseSpec::new(ListMessages, "Get Messages", "get messages"),
        CaseSpec::new(CreateReport, "Create Report", "create report"),
        CaseSpec::new(ListReports, "Get Reports", "get reports"),
        CaseSpec::new(EmergencyBroadcast, "Emergency Broadcast", "send emergency broadcast"),
        CaseSpec::new(AdminStatistics, "Admin Statistics", "get admin stats"),
        CaseSpec::new(LiveLocations, "Live Locations", "get live locations"),
        CaseSpec::new(AppConfiguration, "App Configuration", "get app config"),
        CaseSpec::new(DistrictsAndTeams, "Districts and Teams", "get districts/teams"),
    ]
}

/// Problems detected while building a plan
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    #[error("Case {0} appears more than once")]
    DuplicateCase(CaseId),

    #[error("Case {case} depends on {missing}, which is not in the plan")]
    UnknownPrerequisite { case: CaseId, missing: CaseId },

    #[error("Dependency cycle among cases: {0:?}")]
    Cycle(Vec<CaseId>),
}

/// A validated, topologically ordered list of cases
#[derive(Debug, Clone)]
pub struct Plan {
    ordered: Vec<CaseSpec>,
}

impl Plan {
    /// Order the given specs so every case follows its prerequisites
    ///
    /// Among cases that are ready at the same time, the one listed first wins,
    /// so an already-valid catalog keeps its order.
    pub fn new(specs: Vec<CaseSpec>) -> Result<Self, PlanError> {
        let mut position = HashMap::new();
        for (index, spec) in specs.iter().enumerate() {
            if position.insert(spec.id, index).is_some() {
                return Err(PlanError::DuplicateCase(spec.id));
            }
        }

        for spec in &specs {
            for prerequisite in spec.prerequisites {
                if !position.contains_key(prerequisite) {
                    return Err(PlanError::UnknownPrerequisite {
                        case: spec.id,
                        missing: *prerequisite,
                    });
                }
            }
        }

        let mut placed: HashSet<CaseId> = HashSet::new();
        let mut ordered = Vec::with_capacity(specs.len());
        while ordered.len() < specs.len() {
            let next = specs.iter().find(|spec| {
                !placed.contains(&spec.id)
                    && spec.prerequisites.iter().all(|p| placed.contains(p))
            });

            match next {
                Some(spec) => {
                    placed.insert(spec.id);
                    ordered.push(*spec);
                }
                None => {
                    let stuck = specs
                        .iter()
                        .filter(|spec| !placed.contains(&spec.id))
                        .map(|spec| spec.id)
                        .collect();
                    return Err(PlanError::Cycle(stuck));
                }
            }
        }

        Ok(Self { ordered })
    }

    /// The standard backend plan
    pub fn standard() -> Self {
        match Self::new(catalog()) {
            Ok(plan) => plan,
            // The catalog is static; a broken one is a programming error.
            Err(e) => unreachable!("built-in catalog is invalid: {}", e),
        }
    }

    pub fn cases(&self) -> &[CaseSpec] {
        &self.ordered
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }

    pub fn spec(&self, id: CaseId) -> Option<&CaseSpec> {
        self.ordered.iter().find(|spec| spec.id == id)
    }
}
