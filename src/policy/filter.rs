use serde::{Deserialize, Serialize};

use crate::agent::{ActivityClass, Agent, AgentId, CommuteClass, Employer};
use crate::population::Population;

/// A static predicate over residents. Empty lists accept everyone; `any_of` accepts a resident
/// matched by at least one of its members.
///
/// `residence_units` tests the home unit. `workplace_units` tests where the resident works and
/// never matches someone working outside the region or without a job.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AgentFilter {
    pub sectors: Vec<u8>,
    pub residence_units: Vec<usize>,
    pub workplace_units: Vec<usize>,
    pub age_bands: Vec<u8>,
    pub education_bands: Vec<u8>,
    pub activities: Vec<ActivityClass>,
    pub commute_classes: Vec<CommuteClass>,
    pub excluded_job_categories: Vec<u8>,
    pub excluded_employers: Vec<Employer>,
    pub excluded_sectors: Vec<u8>,
    pub telework: Option<bool>,
    pub any_of: Vec<AgentFilter>,
}

fn accepts<T: PartialEq>(allowed: &[T], value: &T) -> bool {
    allowed.is_empty() || allowed.contains(value)
}

impl AgentFilter {
    pub fn matches(&self, agent: &Agent) -> bool {
        if !agent.is_resident() {
            return false;
        }
        let job = agent.job.as_ref();
        let job_ok = match job {
            Some(job) => {
                accepts(&self.sectors, &job.sector)
                    && !self.excluded_job_categories.contains(&job.category)
                    && !self.excluded_employers.contains(&job.employer)
                    && !self.excluded_sectors.contains(&job.sector)
                    && self.telework.is_none_or(|telework| telework == job.telework)
            }
            None => self.sectors.is_empty() && self.telework.is_none(),
        };
        let workplace_ok = self.workplace_units.is_empty()
            || agent
                .workplace_unit()
                .is_some_and(|unit| self.workplace_units.contains(&unit));
        job_ok
            && workplace_ok
            && accepts(&self.residence_units, &agent.unit)
            && accepts(&self.age_bands, &agent.age_band)
            && accepts(&self.education_bands, &agent.education)
            && accepts(&self.activities, &agent.activity)
            && accepts(&self.commute_classes, &agent.commute)
            && (self.any_of.is_empty() || self.any_of.iter().any(|f| f.matches(agent)))
    }

    /// The first unit reference at or beyond `num_units`, nested alternatives included.
    pub fn unit_out_of_range(&self, num_units: usize) -> Option<usize> {
        self.residence_units
            .iter()
            .chain(&self.workplace_units)
            .copied()
            .find(|&unit| unit >= num_units)
            .or_else(|| {
                self.any_of
                    .iter()
                    .find_map(|filter| filter.unit_out_of_range(num_units))
            })
    }

    /// Matching residents in arena order.
    pub fn select(&self, population: &Population) -> Vec<AgentId> {
        population
            .residents()
            .filter(|&id| self.matches(population.agent(id)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{Job, Shift};

    fn worker(sector: u8, telework: bool, employer: Employer) -> Agent {
        commuter(CommuteClass::IntraCity, sector, telework, employer, Some(0))
    }

    fn commuter(
        commute: CommuteClass,
        sector: u8,
        telework: bool,
        employer: Employer,
        workplace_unit: Option<usize>,
    ) -> Agent {
        let mut agent = Agent::new_resident(
            0,
            commute,
            ActivityClass::Employed,
            1,
            12,
            4,
        );
        agent.job = Some(Job {
            shift: Shift::Full,
            category: 1,
            sector,
            telework,
            employer,
            workplace_unit,
            person_id: String::new(),
            wage: 0.0,
            formal: true,
        });
        agent
    }

    #[test]
    fn empty_filter_matches_residents_only() {
        let filter = AgentFilter::default();
        let agent = worker(3, false, Employer::Formal);
        assert!(filter.matches(&agent));
        assert!(!filter.matches(&agent.replica_at(1)));
    }

    #[test]
    fn sector_lists_need_a_job() {
        let filter = AgentFilter {
            sectors: vec![9, 18],
            ..AgentFilter::default()
        };
        assert!(filter.matches(&worker(9, false, Employer::Formal)));
        assert!(!filter.matches(&worker(8, false, Employer::Formal)));
        let child = Agent::new_resident(0, CommuteClass::NonCommuter, ActivityClass::Child, 1, 2, 1);
        assert!(!filter.matches(&child));
    }

    #[test]
    fn exclusions() {
        let filter = AgentFilter {
            excluded_employers: vec![Employer::Household],
            excluded_sectors: vec![17],
            ..AgentFilter::default()
        };
        assert!(!filter.matches(&worker(3, false, Employer::Household)));
        assert!(!filter.matches(&worker(17, false, Employer::Formal)));
        assert!(filter.matches(&worker(3, false, Employer::Informal)));
    }

    #[test]
    fn any_of_combines_alternatives() {
        let filter: AgentFilter = serde_json::from_str(
            r#"{"age_bands": [12], "any_of": [
                {"activities": ["inactive"]},
                {"activities": ["employed"], "telework": true, "excluded_sectors": [17]}
            ]}"#,
        )
        .unwrap();
        assert!(filter.matches(&worker(3, true, Employer::Formal)));
        assert!(!filter.matches(&worker(3, false, Employer::Formal)));
        assert!(!filter.matches(&worker(17, true, Employer::Formal)));
        let retired =
            Agent::new_resident(0, CommuteClass::NonCommuter, ActivityClass::Inactive, 1, 12, 4);
        assert!(filter.matches(&retired));
    }

    #[test]
    fn unit_membership() {
        let by_home = AgentFilter {
            residence_units: vec![0, 2],
            ..AgentFilter::default()
        };
        let by_workplace = AgentFilter {
            workplace_units: vec![3],
            ..AgentFilter::default()
        };
        let inbound = commuter(CommuteClass::InterCity, 3, false, Employer::Formal, Some(3));
        let away = commuter(CommuteClass::OutOfRegion, 3, false, Employer::Formal, Some(3));
        let local = commuter(CommuteClass::NonCommuter, 3, false, Employer::Formal, Some(3));
        let child_at =
            |unit| Agent::new_resident(unit, CommuteClass::NonCommuter, ActivityClass::Child, 1, 2, 1);
        let child = child_at(0);

        assert!(by_home.matches(&inbound));
        assert!(by_home.matches(&child));
        assert!(!by_home.matches(&child_at(1)));

        assert!(by_workplace.matches(&inbound));
        // Out-of-region jobs have no workplace unit; non-commuters work at home.
        assert!(!by_workplace.matches(&away));
        assert!(!by_workplace.matches(&local));
        assert!(!by_workplace.matches(&child));
        let at_home = AgentFilter {
            workplace_units: vec![0],
            ..AgentFilter::default()
        };
        assert!(at_home.matches(&local));
    }

    #[test]
    fn nested_unit_references_are_found() {
        let filter: AgentFilter = serde_json::from_str(
            r#"{"residence_units": [1], "any_of": [{"workplace_units": [2]}, {"workplace_units": [7]}]}"#,
        )
        .unwrap();
        assert_eq!(filter.unit_out_of_range(8), None);
        assert_eq!(filter.unit_out_of_range(5), Some(7));
        assert_eq!(filter.unit_out_of_range(1), Some(1));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let result = serde_json::from_str::<AgentFilter>(r#"{"sector": [3]}"#);
        assert!(result.is_err());
    }
}
