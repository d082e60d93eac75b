//! Day-triggered interventions.
//!
//! A schedule is data: a list of `(day, filter, action)` events read from JSON. Three scenarios
//! ship with the crate and any of them can be replaced by a file with the same layout:
//!
//! ```json
//! {
//!   "name": "example",
//!   "events": [
//!     {"day": 15, "filter": {"sectors": [16]}, "action": {"type": "confine", "kind": "sector"}},
//!     {"day": 20, "filter": {"residence_units": [3, 4]}, "action": {"type": "confine", "kind": "age"}},
//!     {"day": 26, "action": {"type": "start_area_confinement", "units": [14], "fraction": 0.973}}
//!   ]
//! }
//! ```
//!
//! Events on the same day fire in table order.
mod filter;

use std::collections::BTreeMap;
use std::path::Path;

use clap::ValueEnum;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use strum::{Display, IntoStaticStr};

pub use filter::AgentFilter;

use crate::agent::{ConfinementKind, Isolation};
use crate::context::Context;
use crate::error::SirLaborError;
use crate::population::ContextPopulationExt;
use crate::transmission_manager::ContextTransmissionExt;

const HISTORICAL: &str = include_str!("../../data/schedules/historical.json");
const NO_INTERVENTION: &str = include_str!("../../data/schedules/no_intervention.json");
const UNIFORM_LOCKDOWN: &str = include_str!("../../data/schedules/uniform_lockdown.json");

/// The built-in intervention schedules.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Display, ValueEnum)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Scenario {
    /// The dated interventions as they happened.
    Historical,
    /// Only voluntary confinement of elderly non-workers.
    NoIntervention,
    /// The historical schedule, except that every unit locks down fully on day 26.
    UniformLockdown,
}

/// Confinement kinds assigned to individuals rather than to spatial units.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersonalConfinement {
    Sector,
    Age,
}

impl From<PersonalConfinement> for ConfinementKind {
    fn from(kind: PersonalConfinement) -> Self {
        match kind {
            PersonalConfinement::Sector => ConfinementKind::Sector,
            PersonalConfinement::Age => ConfinementKind::Age,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, IntoStaticStr)]
#[serde(tag = "type", rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PolicyAction {
    /// Confines matching residents and their replicas. With `immobilize`, residents that are
    /// not already isolated also stop moving.
    Confine {
        kind: PersonalConfinement,
        #[serde(default)]
        immobilize: bool,
    },
    StartAreaConfinement {
        units: Vec<usize>,
        fraction: f64,
    },
    ConfineAllUnits {
        fraction: f64,
    },
    EndAreaConfinement {
        units: Vec<usize>,
    },
    /// Overwrites participation of matching workers with the entry of their workplace unit in
    /// the table for their sector.
    SetParticipation {
        by_sector: BTreeMap<u8, Vec<f64>>,
    },
    SetEveningFraction {
        value: f64,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyEvent {
    pub day: u32,
    #[serde(default)]
    pub filter: AgentFilter,
    pub action: PolicyAction,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    #[serde(default)]
    pub name: String,
    pub events: Vec<PolicyEvent>,
}

fn check_fraction(fraction: f64, day: u32) -> Result<(), SirLaborError> {
    if (0.0..=1.0).contains(&fraction) {
        Ok(())
    } else {
        Err(SirLaborError::InputError(format!(
            "day {day}: fraction {fraction} outside [0, 1]"
        )))
    }
}

fn unit_error(day: u32, unit: usize, num_units: usize) -> SirLaborError {
    SirLaborError::InputError(format!(
        "day {day}: spatial unit {unit} out of range (have {num_units})"
    ))
}

impl Schedule {
    /// # Errors
    /// Returns an error if the bundled table fails to parse.
    pub fn builtin(scenario: Scenario) -> Result<Schedule, SirLaborError> {
        let source = match scenario {
            Scenario::Historical => HISTORICAL,
            Scenario::NoIntervention => NO_INTERVENTION,
            Scenario::UniformLockdown => UNIFORM_LOCKDOWN,
        };
        Ok(serde_json::from_str(source)?)
    }

    /// # Errors
    /// Returns an error if the file can't be read or parsed.
    pub fn from_file(path: &Path) -> Result<Schedule, SirLaborError> {
        let schedule: Schedule = serde_json::from_str(&std::fs::read_to_string(path)?)?;
        info!(
            "loaded schedule '{}' ({} events) from {}",
            schedule.name,
            schedule.events.len(),
            path.display()
        );
        Ok(schedule)
    }

    /// Checks every unit reference and probability against a population of `num_units` units.
    ///
    /// # Errors
    /// Returns `InputError` on the first event that refers to a missing unit, carries a short
    /// participation table, or holds a value outside [0, 1].
    pub fn validate(&self, num_units: usize) -> Result<(), SirLaborError> {
        for event in &self.events {
            let day = event.day;
            if let Some(unit) = event.filter.unit_out_of_range(num_units) {
                return Err(unit_error(day, unit, num_units));
            }
            match &event.action {
                PolicyAction::StartAreaConfinement { units, fraction } => {
                    check_fraction(*fraction, day)?;
                    if let Some(unit) = units.iter().find(|&&unit| unit >= num_units) {
                        return Err(unit_error(day, *unit, num_units));
                    }
                }
                PolicyAction::EndAreaConfinement { units } => {
                    if let Some(unit) = units.iter().find(|&&unit| unit >= num_units) {
                        return Err(unit_error(day, *unit, num_units));
                    }
                }
                PolicyAction::ConfineAllUnits { fraction }
                | PolicyAction::SetEveningFraction { value: fraction } => {
                    check_fraction(*fraction, day)?;
                }
                PolicyAction::SetParticipation { by_sector } => {
                    for (sector, table) in by_sector {
                        if table.len() < num_units {
                            return Err(SirLaborError::InputError(format!(
                                "day {day}: sector {sector} table has {} entries for {num_units} units",
                                table.len()
                            )));
                        }
                        for value in table {
                            check_fraction(*value, day)?;
                        }
                    }
                }
                PolicyAction::Confine { .. } => {}
            }
        }
        Ok(())
    }

    /// Events that fire before `max_days`, in table order.
    pub fn events_before(&self, max_days: u32) -> impl Iterator<Item = &PolicyEvent> {
        self.events.iter().filter(move |event| event.day < max_days)
    }
}

pub trait ContextPolicyExt {
    /// Applies one event to the population.
    ///
    /// # Errors
    /// Returns `InputError` if the event refers to a unit or workplace that does not exist.
    fn apply_policy_event(&mut self, event: &PolicyEvent) -> Result<(), SirLaborError>;
}

impl ContextPolicyExt for Context {
    fn apply_policy_event(&mut self, event: &PolicyEvent) -> Result<(), SirLaborError> {
        let name: &'static str = (&event.action).into();
        debug!("day {}: {name}", event.day);

        match &event.action {
            PolicyAction::Confine { kind, immobilize } => {
                let population = self.population_mut();
                let matched = event.filter.select(population);
                debug!("confining {} residents ({kind:?})", matched.len());
                for id in matched {
                    population.confine_with_twin(id, (*kind).into());
                    if *immobilize && population.agent(id).isolation == Isolation::None {
                        population.set_isolation_with_twin(id, Isolation::ConfinedNotMoving);
                    }
                }
            }
            PolicyAction::StartAreaConfinement { units, fraction } => {
                for &unit in units {
                    self.start_area_confinement(unit, *fraction)?;
                }
            }
            PolicyAction::ConfineAllUnits { fraction } => {
                for unit in 0..self.population().num_units() {
                    self.start_area_confinement(unit, *fraction)?;
                }
            }
            PolicyAction::EndAreaConfinement { units } => {
                for &unit in units {
                    self.end_area_confinement(unit)?;
                }
            }
            PolicyAction::SetParticipation { by_sector } => {
                let population = self.population_mut();
                for id in event.filter.select(population) {
                    let Some(table) = population
                        .agent(id)
                        .sector()
                        .and_then(|sector| by_sector.get(&sector))
                    else {
                        continue;
                    };
                    let unit = population.workplace_unit(id)?;
                    let value = *table.get(unit).ok_or_else(|| {
                        SirLaborError::InputError(format!(
                            "day {}: no participation entry for workplace unit {unit}",
                            event.day
                        ))
                    })?;
                    population.agent_mut(id).participation = value;
                }
            }
            PolicyAction::SetEveningFraction { value } => {
                self.set_evening_time_fraction(*value);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{ActivityClass, Agent, CommuteClass, Employer, Job, Shift, SECTOR_COUNT};
    use crate::population::Population;
    use crate::random::ContextRandomExt;
    use crate::spatial_unit::SpatialUnit;

    #[test]
    fn builtin_schedules_parse_and_validate() {
        for scenario in [
            Scenario::Historical,
            Scenario::NoIntervention,
            Scenario::UniformLockdown,
        ] {
            let schedule = Schedule::builtin(scenario).unwrap();
            assert_eq!(schedule.name, scenario.to_string());
            schedule.validate(51).unwrap();
            assert!(schedule.events.windows(2).all(|w| w[0].day <= w[1].day));
        }
    }

    #[test]
    fn historical_schedule_has_curfew_and_lockdowns() {
        let schedule = Schedule::builtin(Scenario::Historical).unwrap();
        assert!(schedule.events.iter().any(|event| event.day == 21
            && event.action == PolicyAction::SetEveningFraction { value: 5.0 / 24.0 }));
        assert!(schedule.events.iter().any(|event| event.day == 149
            && matches!(&event.action, PolicyAction::EndAreaConfinement { units } if units.contains(&35))));
        // Only the scripted units lock down; the uniform scenario covers them all.
        assert!(!schedule
            .events
            .iter()
            .any(|event| matches!(event.action, PolicyAction::ConfineAllUnits { .. })));
    }

    #[test]
    fn no_intervention_has_no_curfew() {
        let schedule = Schedule::builtin(Scenario::NoIntervention).unwrap();
        assert_eq!(schedule.events.len(), 1);
        assert!(matches!(
            schedule.events[0].action,
            PolicyAction::Confine {
                kind: PersonalConfinement::Age,
                immobilize: false
            }
        ));
    }

    #[test]
    fn validation_catches_bad_references() {
        let schedule: Schedule = serde_json::from_str(
            r#"{"events": [{"day": 3, "action": {"type": "end_area_confinement", "units": [4]}}]}"#,
        )
        .unwrap();
        assert!(schedule.validate(5).is_ok());
        assert!(matches!(
            schedule.validate(4),
            Err(SirLaborError::InputError(_))
        ));

        let schedule: Schedule = serde_json::from_str(
            r#"{"events": [{"day": 3, "action": {"type": "start_area_confinement", "units": [0], "fraction": 1.5}}]}"#,
        )
        .unwrap();
        assert!(schedule.validate(5).is_err());

        let schedule: Schedule = serde_json::from_str(
            r#"{"events": [{"day": 3, "action": {"type": "set_participation", "by_sector": {"9": [0.5]}}}]}"#,
        )
        .unwrap();
        assert!(schedule.validate(2).is_err());
    }

    #[test]
    fn filter_units_are_validated() {
        let schedule: Schedule = serde_json::from_str(
            r#"{"events": [{"day": 9, "filter": {"workplace_units": [6]}, "action": {"type": "confine", "kind": "sector"}}]}"#,
        )
        .unwrap();
        assert!(schedule.validate(7).is_ok());
        assert!(matches!(
            schedule.validate(6),
            Err(SirLaborError::InputError(_))
        ));
    }

    #[test]
    fn unknown_action_is_rejected() {
        let result = serde_json::from_str::<Schedule>(
            r#"{"events": [{"day": 3, "action": {"type": "close_borders"}}]}"#,
        );
        assert!(result.is_err());
    }

    fn worker(unit: usize, commute: CommuteClass, sector: u8, age_band: u8) -> Agent {
        let mut agent = Agent::new_resident(unit, commute, ActivityClass::Employed, 1, age_band, 3);
        agent.job = Some(Job {
            shift: Shift::Full,
            category: 1,
            sector,
            telework: false,
            employer: Employer::Formal,
            workplace_unit: Some(unit),
            person_id: String::new(),
            wage: 0.0,
            formal: true,
        });
        agent
    }

    fn context_with_workers() -> Context {
        let mut context = Context::new();
        context.init_random(5);
        let mut population = Population::new(vec![
            SpatialUnit::new(0, [1.0; SECTOR_COUNT], 1.0),
            SpatialUnit::new(1, [1.0; SECTOR_COUNT], 1.0),
        ]);
        // 0: sector 9 commuter working in unit 1; 2: elderly non-commuter in sector 3.
        let mut commuter = worker(0, CommuteClass::InterCity, 9, 8);
        if let Some(job) = commuter.job.as_mut() {
            job.workplace_unit = Some(1);
        }
        let commuter = population.add_resident(commuter).unwrap();
        population.create_replica(commuter, 1).unwrap();
        population
            .add_resident(worker(1, CommuteClass::NonCommuter, 3, 17))
            .unwrap();
        context.set_population(population);
        context
    }

    #[test]
    fn sector_confinement_reaches_replica() {
        let mut context = context_with_workers();
        let event: PolicyEvent = serde_json::from_str(
            r#"{"day": 20, "filter": {"sectors": [9]}, "action": {"type": "confine", "kind": "sector"}}"#,
        )
        .unwrap();
        context.apply_policy_event(&event).unwrap();
        let population = context.population();
        assert_eq!(population.agent(0).confinement, ConfinementKind::Sector);
        assert_eq!(population.agent(1).confinement, ConfinementKind::Sector);
        assert_eq!(population.agent(2).confinement, ConfinementKind::None);
    }

    #[test]
    fn confinement_by_unit_membership() {
        let mut context = context_with_workers();
        let by_home: PolicyEvent = serde_json::from_str(
            r#"{"day": 20, "filter": {"residence_units": [1]}, "action": {"type": "confine", "kind": "sector"}}"#,
        )
        .unwrap();
        context.apply_policy_event(&by_home).unwrap();
        let population = context.population();
        assert_eq!(population.agent(0).confinement, ConfinementKind::None);
        assert_eq!(population.agent(2).confinement, ConfinementKind::Sector);

        // Both workers work in unit 1: the commuter from unit 0 and the local in unit 1.
        let event = |units: &str| -> PolicyEvent {
            serde_json::from_str(&format!(
                r#"{{"day": 20, "filter": {{"workplace_units": {units}}}, "action": {{"type": "confine", "kind": "age"}}}}"#
            ))
            .unwrap()
        };
        assert!(event("[0]").filter.select(context_with_workers().population()).is_empty());
        let mut context = context_with_workers();
        context.apply_policy_event(&event("[1]")).unwrap();
        let population = context.population();
        assert_eq!(population.agent(0).confinement, ConfinementKind::Age);
        assert_eq!(population.agent(1).confinement, ConfinementKind::Age);
        assert_eq!(population.agent(2).confinement, ConfinementKind::Age);
    }

    #[test]
    fn age_confinement_can_immobilize() {
        let mut context = context_with_workers();
        let event: PolicyEvent = serde_json::from_str(
            r#"{"day": 23, "filter": {"age_bands": [17]}, "action": {"type": "confine", "kind": "age", "immobilize": true}}"#,
        )
        .unwrap();
        context.apply_policy_event(&event).unwrap();
        let elderly = context.population().agent(2);
        assert_eq!(elderly.confinement, ConfinementKind::Age);
        assert_eq!(elderly.isolation, Isolation::ConfinedNotMoving);
    }

    #[test]
    fn participation_uses_workplace_unit() {
        let mut context = context_with_workers();
        let event: PolicyEvent = serde_json::from_str(
            r#"{"day": 26, "filter": {"sectors": [9, 3]}, "action": {"type": "set_participation", "by_sector": {"9": [0.1, 0.9]}}}"#,
        )
        .unwrap();
        context.apply_policy_event(&event).unwrap();
        let population = context.population();
        assert_eq!(population.agent(0).participation, 0.9);
        // Sector 3 has no table in this event.
        assert_eq!(population.agent(2).participation, 0.0);
    }

    #[test]
    fn area_events_round_trip() {
        let mut context = context_with_workers();
        let start: PolicyEvent = serde_json::from_str(
            r#"{"day": 26, "action": {"type": "confine_all_units", "fraction": 1}}"#,
        )
        .unwrap();
        let end: PolicyEvent = serde_json::from_str(
            r#"{"day": 33, "action": {"type": "end_area_confinement", "units": [1]}}"#,
        )
        .unwrap();
        context.apply_policy_event(&start).unwrap();
        assert!(context
            .population()
            .all_agents()
            .iter()
            .all(|agent| agent.confinement == ConfinementKind::Area));
        context.apply_policy_event(&end).unwrap();
        let population = context.population();
        assert_eq!(population.agent(0).confinement, ConfinementKind::Area);
        assert_eq!(population.agent(1).confinement, ConfinementKind::None);
        assert_eq!(population.agent(2).confinement, ConfinementKind::None);
    }
}
