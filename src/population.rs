//! The agent arena and the spatial units indexing it.
//!
//! Residents and replicas live in one `Vec<Agent>` and refer to each other by index, so the
//! pair can be updated together without shared ownership. Spatial units hold indices only.
use log::{trace, warn};

use crate::agent::{
    Agent, AgentId, CommuteClass, ConfinementKind, Employer, HealthStatus, Isolation, WorkMode,
    LIVE_IN_DOMESTIC, OFF_SITE_CATEGORY, RETAIL_SECTOR,
};
use crate::context::Context;
use crate::error::SirLaborError;
use crate::random::ContextRandomExt;
use crate::spatial_unit::SpatialUnit;
use crate::{define_data_plugin, define_rng};

define_rng!(ConfinementRng);

/// What an agent's confinement state leaves to decide about working today.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum WorkDecision {
    /// Neither instance is confined: the agent works on site.
    Unrestricted,
    /// On-site work happens with this probability.
    Draw(f64),
    Resolved(WorkMode),
}

#[derive(Default)]
pub struct Population {
    agents: Vec<Agent>,
    units: Vec<SpatialUnit>,
}

define_data_plugin!(PopulationPlugin, Population, Population::default());

impl Population {
    pub fn new(units: Vec<SpatialUnit>) -> Population {
        Population {
            agents: Vec::new(),
            units,
        }
    }

    fn check_unit(&self, unit: usize) -> Result<(), SirLaborError> {
        if unit >= self.units.len() {
            return Err(SirLaborError::InputError(format!(
                "spatial unit {unit} out of range (have {})",
                self.units.len()
            )));
        }
        Ok(())
    }

    /// Adds a resident to the arena and indexes it at its home unit.
    ///
    /// # Errors
    /// Returns `InputError` if the home unit does not exist.
    pub fn add_resident(&mut self, agent: Agent) -> Result<AgentId, SirLaborError> {
        self.check_unit(agent.unit)?;
        let id = self.agents.len();
        self.units[agent.unit].add_agent(id);
        self.agents.push(agent);
        Ok(id)
    }

    /// Creates the workplace replica of `resident` and links the pair.
    ///
    /// # Errors
    /// Returns `InputError` if the workplace unit does not exist, the resident is not an intra-
    /// or inter-city commuter, or it already has a replica.
    pub fn create_replica(
        &mut self,
        resident: AgentId,
        workplace_unit: usize,
    ) -> Result<AgentId, SirLaborError> {
        self.check_unit(workplace_unit)?;
        let origin = &self.agents[resident];
        if !origin.is_resident() || !origin.commute.has_replica() || origin.twin.is_some() {
            return Err(SirLaborError::InputError(format!(
                "agent {resident} cannot own a workplace replica"
            )));
        }
        let replica = origin.replica_at(workplace_unit);
        let id = self.agents.len();
        self.agents.push(replica);
        self.agents[id].twin = Some(resident);
        self.agents[resident].twin = Some(id);
        self.units[workplace_unit].add_agent(id);
        Ok(id)
    }

    pub fn agent(&self, id: AgentId) -> &Agent {
        &self.agents[id]
    }

    pub fn agent_mut(&mut self, id: AgentId) -> &mut Agent {
        &mut self.agents[id]
    }

    pub fn all_agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn spatial_units(&self) -> &[SpatialUnit] {
        &self.units
    }

    pub fn spatial_unit_mut(&mut self, unit: usize) -> &mut SpatialUnit {
        &mut self.units[unit]
    }

    pub fn num_units(&self) -> usize {
        self.units.len()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Resident ids in arena order.
    pub fn residents(&self) -> impl Iterator<Item = AgentId> + '_ {
        self.agents
            .iter()
            .enumerate()
            .filter(|(_, agent)| agent.is_resident())
            .map(|(id, _)| id)
    }

    pub fn residence_unit(&self, id: AgentId) -> usize {
        let agent = &self.agents[id];
        match agent.twin {
            Some(twin) if !agent.is_resident() => self.agents[twin].unit,
            _ => agent.unit,
        }
    }

    /// The unit where `id` works.
    ///
    /// # Errors
    /// Returns `InputError` for agents working outside the region.
    pub fn workplace_unit(&self, id: AgentId) -> Result<usize, SirLaborError> {
        let agent = &self.agents[id];
        if !agent.is_resident() {
            return Ok(agent.unit);
        }
        match (agent.commute, agent.twin) {
            (CommuteClass::NonCommuter, _) => Ok(agent.unit),
            (CommuteClass::IntraCity | CommuteClass::InterCity, Some(replica)) => {
                Ok(self.agents[replica].unit)
            }
            _ => Err(SirLaborError::InputError(format!(
                "agent {id} has no workplace in the region"
            ))),
        }
    }

    /// Merges `kind` into the confinement of `id` and, independently, of its twin.
    pub fn confine_with_twin(&mut self, id: AgentId, kind: ConfinementKind) {
        self.agents[id].apply_confinement(kind);
        if let Some(twin) = self.agents[id].twin {
            self.agents[twin].apply_confinement(kind);
        }
    }

    pub fn set_isolation_with_twin(&mut self, id: AgentId, isolation: Isolation) {
        self.agents[id].isolation = isolation;
        if let Some(twin) = self.agents[id].twin {
            self.agents[twin].isolation = isolation;
        }
    }

    /// Applies a health transition to `id` and its twin. `survives` is only read on removal:
    /// survivors are back home and free to move, the dead are permanently absent.
    pub fn update_health_status(&mut self, id: AgentId, new_status: HealthStatus, survives: bool) {
        let twin = self.agents[id].twin;
        let pair = std::iter::once(id).chain(twin);
        match new_status {
            HealthStatus::Infectious => {
                for member in pair {
                    let agent = &mut self.agents[member];
                    agent.health = HealthStatus::Infectious;
                    agent.infectious_days = 1;
                }
            }
            HealthStatus::Removed => {
                for member in pair {
                    let agent = &mut self.agents[member];
                    agent.health = HealthStatus::Removed;
                    agent.infectious_days = 0;
                    agent.present = survives && agent.is_resident();
                    agent.isolation = if survives {
                        Isolation::None
                    } else {
                        Isolation::Isolated
                    };
                }
            }
            HealthStatus::Susceptible => {
                warn!("ignoring transition of agent {id} back to susceptible");
            }
        }
    }

    /// Counts one more infectious day on both instances.
    pub fn advance_infectious_day(&mut self, id: AgentId) {
        let twin = self.agents[id].twin;
        for member in std::iter::once(id).chain(twin) {
            self.agents[member].infectious_days += 1;
        }
    }

    /// Takes `id` out of circulation: both instances absent and isolated.
    pub fn isolate(&mut self, id: AgentId) {
        let twin = self.agents[id].twin;
        for member in std::iter::once(id).chain(twin) {
            self.agents[member].present = false;
            self.agents[member].isolation = Isolation::Isolated;
        }
    }

    /// Resident leaves home; the replica, if any, shows up at work.
    pub fn travel_to_work(&mut self, id: AgentId) {
        self.agents[id].present = false;
        if let Some(twin) = self.agents[id].twin {
            self.agents[twin].present = true;
        }
    }

    pub fn return_home(&mut self, id: AgentId) {
        self.agents[id].present = true;
        if let Some(twin) = self.agents[id].twin {
            self.agents[twin].present = false;
        }
    }

    /// Participation probability in force for `id`, including the retail override when the
    /// worker (and, for commuters, the replica) is sector-confined.
    pub fn effective_participation(&self, id: AgentId) -> f64 {
        let agent = &self.agents[id];
        let Some(job) = agent.job.as_ref() else {
            return agent.participation;
        };
        let twin_confinement = agent.twin.map(|twin| self.agents[twin].confinement);
        let dual_sector = agent.confinement == ConfinementKind::Sector
            && match agent.commute {
                CommuteClass::NonCommuter => true,
                CommuteClass::IntraCity | CommuteClass::InterCity => {
                    twin_confinement == Some(ConfinementKind::Sector)
                }
                CommuteClass::OutOfRegion => false,
            };
        if job.sector == RETAIL_SECTOR && job.follows_sector_rules() && dual_sector {
            if let Some(retail) = agent.retail_participation {
                return retail;
            }
        }
        agent.participation
    }

    /// Resolves how confinement constrains today's work for the resident `id`.
    pub fn work_decision(&self, id: AgentId) -> WorkDecision {
        let agent = &self.agents[id];
        let twin_free = agent
            .twin
            .is_none_or(|twin| self.agents[twin].confinement == ConfinementKind::None);
        if agent.confinement == ConfinementKind::None && twin_free {
            return WorkDecision::Unrestricted;
        }

        let telework = agent.job.as_ref().is_some_and(|job| job.telework);
        let participation = self.effective_participation(id);
        if telework {
            WorkDecision::Resolved(WorkMode::Teleworking)
        } else if participation == 0.0 {
            WorkDecision::Resolved(WorkMode::NotWorking)
        } else {
            WorkDecision::Draw(participation)
        }
    }

    /// Restores every agent and unit to the state a realization starts from.
    pub fn reset_realization(&mut self) {
        for agent in &mut self.agents {
            agent.reset();
        }
        for unit in &mut self.units {
            unit.reset();
        }
    }

    /// Assigns each employed resident its baseline participation probability.
    pub fn reset_participation(&mut self) {
        for id in 0..self.agents.len() {
            let agent = &self.agents[id];
            let Some(job) = agent.job.as_ref() else {
                continue;
            };
            let participation = match agent.commute {
                CommuteClass::NonCommuter => self.units[agent.unit].participation_for(job.sector),
                CommuteClass::OutOfRegion => {
                    if job.employer == Employer::Formal {
                        1.0
                    } else {
                        0.0
                    }
                }
                CommuteClass::IntraCity | CommuteClass::InterCity => {
                    if job.category == OFF_SITE_CATEGORY || job.employer == Employer::Household {
                        0.0
                    } else if job.category == LIVE_IN_DOMESTIC {
                        1.0
                    } else {
                        let workplace = agent.twin.map_or(agent.unit, |twin| self.agents[twin].unit);
                        self.units[workplace].participation_for(job.sector)
                    }
                }
            };
            self.agents[id].participation = participation;
        }
    }
}

pub trait ContextPopulationExt {
    /// # Panics
    /// Panics if no population was loaded.
    fn population(&self) -> &Population;

    fn population_mut(&mut self) -> &mut Population;

    fn set_population(&mut self, population: Population);

    /// Confines every member of `unit` by area when `fraction` is 1, otherwise a random
    /// `fraction` of its residents and, separately, of its replicas.
    ///
    /// # Errors
    /// Returns `InputError` if `unit` does not exist.
    fn start_area_confinement(&mut self, unit: usize, fraction: f64) -> Result<(), SirLaborError>;

    /// Lifts area confinement from every member of `unit`.
    ///
    /// # Errors
    /// Returns `InputError` if `unit` does not exist.
    fn end_area_confinement(&mut self, unit: usize) -> Result<(), SirLaborError>;
}

impl ContextPopulationExt for Context {
    fn population(&self) -> &Population {
        self.get_data(PopulationPlugin)
    }

    fn population_mut(&mut self) -> &mut Population {
        self.get_data_mut(PopulationPlugin)
    }

    fn set_population(&mut self, population: Population) {
        *self.get_data_mut(PopulationPlugin) = population;
    }

    fn start_area_confinement(&mut self, unit: usize, fraction: f64) -> Result<(), SirLaborError> {
        let population = self.population();
        population.check_unit(unit)?;
        let selected = self.sample(ConfinementRng, |rng| {
            population.units[unit].select_for_confinement(&population.agents, fraction, rng)
        });
        trace!(
            "confining {} members of unit {unit} (fraction {fraction})",
            selected.len()
        );

        let population = self.population_mut();
        for id in selected {
            population.agents[id].apply_confinement(ConfinementKind::Area);
        }
        Ok(())
    }

    fn end_area_confinement(&mut self, unit: usize) -> Result<(), SirLaborError> {
        let population = self.population_mut();
        population.check_unit(unit)?;
        trace!("ending area confinement in unit {unit}");
        let Population { agents, units } = population;
        for &id in &units[unit].members {
            agents[id].end_area_confinement();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{ActivityClass, Job, Shift, SECTOR_COUNT};

    fn employed(unit: usize, commute: CommuteClass, sector: u8, telework: bool) -> Agent {
        let mut agent = Agent::new_resident(unit, commute, ActivityClass::Employed, 1, 8, 3);
        agent.job = Some(Job {
            shift: Shift::Full,
            category: 1,
            sector,
            telework,
            employer: Employer::Formal,
            workplace_unit: Some(unit),
            person_id: "p".to_string(),
            wage: 100.0,
            formal: true,
        });
        agent
    }

    fn two_units() -> Population {
        let mut table = [1.0; SECTOR_COUNT];
        table[2] = 0.3;
        Population::new(vec![
            SpatialUnit::new(0, table, 0.2),
            SpatialUnit::new(1, [0.0; SECTOR_COUNT], 0.0),
        ])
    }

    #[test]
    fn replica_links_both_ways() {
        let mut population = two_units();
        let resident = population
            .add_resident(employed(0, CommuteClass::InterCity, 3, false))
            .unwrap();
        let replica = population.create_replica(resident, 1).unwrap();
        assert_eq!(population.agent(resident).twin, Some(replica));
        assert_eq!(population.agent(replica).twin, Some(resident));
        assert_eq!(population.spatial_units()[1].members, vec![replica]);
        assert_eq!(population.workplace_unit(resident).unwrap(), 1);
        assert_eq!(population.residence_unit(replica), 0);
        assert!(population.create_replica(resident, 1).is_err());
    }

    #[test]
    fn out_of_range_unit_is_fatal() {
        let mut population = two_units();
        let result = population.add_resident(employed(5, CommuteClass::NonCommuter, 3, false));
        assert!(matches!(result, Err(SirLaborError::InputError(_))));
    }

    #[test]
    fn non_commuter_cannot_have_replica() {
        let mut population = two_units();
        let resident = population
            .add_resident(employed(0, CommuteClass::NonCommuter, 3, false))
            .unwrap();
        assert!(population.create_replica(resident, 1).is_err());
        assert_eq!(population.workplace_unit(resident).unwrap(), 0);
    }

    #[test]
    fn out_of_region_has_no_workplace() {
        let mut population = two_units();
        let resident = population
            .add_resident(employed(0, CommuteClass::OutOfRegion, 3, false))
            .unwrap();
        assert!(population.workplace_unit(resident).is_err());
    }

    #[test]
    fn health_transitions_mirror_to_replica() {
        let mut population = two_units();
        let resident = population
            .add_resident(employed(0, CommuteClass::InterCity, 3, false))
            .unwrap();
        let replica = population.create_replica(resident, 1).unwrap();

        population.update_health_status(replica, HealthStatus::Infectious, true);
        assert_eq!(population.agent(resident).health, HealthStatus::Infectious);
        assert_eq!(population.agent(resident).infectious_days, 1);
        population.advance_infectious_day(resident);
        assert_eq!(population.agent(replica).infectious_days, 2);

        population.travel_to_work(resident);
        population.update_health_status(resident, HealthStatus::Removed, true);
        assert!(population.agent(resident).present);
        assert!(!population.agent(replica).present);
        assert_eq!(population.agent(replica).health, HealthStatus::Removed);
    }

    #[test]
    fn death_leaves_both_absent_and_isolated() {
        let mut population = two_units();
        let resident = population
            .add_resident(employed(0, CommuteClass::IntraCity, 3, false))
            .unwrap();
        let replica = population.create_replica(resident, 0).unwrap();
        population.update_health_status(resident, HealthStatus::Infectious, true);
        population.update_health_status(resident, HealthStatus::Removed, false);
        for id in [resident, replica] {
            assert!(!population.agent(id).present);
            assert_eq!(population.agent(id).isolation, Isolation::Isolated);
        }
    }

    #[test]
    fn work_decision_paths() {
        let mut population = two_units();
        let free = population
            .add_resident(employed(0, CommuteClass::NonCommuter, 3, false))
            .unwrap();
        let teleworker = population
            .add_resident(employed(0, CommuteClass::NonCommuter, 3, true))
            .unwrap();
        let idle = population
            .add_resident(employed(1, CommuteClass::NonCommuter, 3, false))
            .unwrap();
        population.reset_participation();

        assert_eq!(population.work_decision(free), WorkDecision::Unrestricted);
        population.confine_with_twin(free, ConfinementKind::Area);
        assert_eq!(population.work_decision(free), WorkDecision::Draw(0.3));

        population.confine_with_twin(teleworker, ConfinementKind::Sector);
        assert_eq!(
            population.work_decision(teleworker),
            WorkDecision::Resolved(WorkMode::Teleworking)
        );

        population.confine_with_twin(idle, ConfinementKind::Age);
        assert_eq!(
            population.work_decision(idle),
            WorkDecision::Resolved(WorkMode::NotWorking)
        );
    }

    #[test]
    fn confined_replica_restricts_commuter() {
        let mut population = two_units();
        let resident = population
            .add_resident(employed(1, CommuteClass::InterCity, 3, false))
            .unwrap();
        let replica = population.create_replica(resident, 0).unwrap();
        population.reset_participation();
        population.agent_mut(replica).apply_confinement(ConfinementKind::Area);
        assert_eq!(population.work_decision(resident), WorkDecision::Draw(0.3));
    }

    #[test]
    fn retail_override_needs_both_instances_sector_confined() {
        let mut population = two_units();
        let resident = population
            .add_resident(employed(1, CommuteClass::InterCity, RETAIL_SECTOR, false))
            .unwrap();
        let replica = population.create_replica(resident, 0).unwrap();
        population.agent_mut(resident).retail_participation = Some(0.2);
        population.reset_participation();
        assert_eq!(population.agent(resident).participation, 1.0);

        population.agent_mut(resident).apply_confinement(ConfinementKind::Sector);
        assert_eq!(population.effective_participation(resident), 1.0);
        population.agent_mut(replica).apply_confinement(ConfinementKind::Sector);
        assert_eq!(population.effective_participation(resident), 0.2);
    }

    #[test]
    fn baseline_participation_by_commute_class() {
        let mut population = two_units();
        let mut household = employed(0, CommuteClass::InterCity, 3, false);
        if let Some(job) = household.job.as_mut() {
            job.employer = Employer::Household;
        }
        let household = population.add_resident(household).unwrap();
        population.create_replica(household, 0).unwrap();

        let mut live_in = employed(1, CommuteClass::IntraCity, 3, false);
        if let Some(job) = live_in.job.as_mut() {
            job.category = LIVE_IN_DOMESTIC;
        }
        let live_in = population.add_resident(live_in).unwrap();
        population.create_replica(live_in, 1).unwrap();

        let mut abroad = employed(0, CommuteClass::OutOfRegion, 3, false);
        if let Some(job) = abroad.job.as_mut() {
            job.employer = Employer::Informal;
        }
        let abroad = population.add_resident(abroad).unwrap();

        population.reset_participation();
        assert_eq!(population.agent(household).participation, 0.0);
        assert_eq!(population.agent(live_in).participation, 1.0);
        assert_eq!(population.agent(abroad).participation, 0.0);
    }

    /// Ten residents at home in unit 0 and ten commuters from unit 1 working there.
    fn crowded_unit(context: &mut Context) {
        let mut population = two_units();
        for _ in 0..10 {
            population
                .add_resident(employed(0, CommuteClass::NonCommuter, 3, false))
                .unwrap();
        }
        for _ in 0..10 {
            let resident = population
                .add_resident(employed(1, CommuteClass::InterCity, 3, false))
                .unwrap();
            population.create_replica(resident, 0).unwrap();
        }
        context.set_population(population);
    }

    fn area_confined(context: &Context, unit: usize) -> (usize, usize) {
        let population = context.population();
        let confined: Vec<&Agent> = population.spatial_units()[unit]
            .members
            .iter()
            .map(|&id| population.agent(id))
            .filter(|agent| {
                matches!(
                    agent.confinement,
                    ConfinementKind::Area | ConfinementKind::AreaAndSector
                )
            })
            .collect();
        let residents = confined.iter().filter(|agent| agent.is_resident()).count();
        (residents, confined.len() - residents)
    }

    #[test]
    fn partial_confinement_and_release() {
        let mut context = Context::new();
        context.init_random(11);
        crowded_unit(&mut context);
        let first_member = context.population().spatial_units()[0].members[0];
        context
            .population_mut()
            .agent_mut(first_member)
            .apply_confinement(ConfinementKind::Sector);

        context.start_area_confinement(0, 0.5).unwrap();
        assert_eq!(area_confined(&context, 0), (5, 5));
        // Commuters' home instances in unit 1 are untouched.
        assert_eq!(area_confined(&context, 1), (0, 0));

        context.end_area_confinement(0).unwrap();
        assert_eq!(area_confined(&context, 0), (0, 0));
        let population = context.population();
        assert_eq!(
            population.agent(first_member).confinement,
            ConfinementKind::Sector
        );
        let unconfined = population.spatial_units()[0]
            .members
            .iter()
            .filter(|&&id| population.agent(id).confinement == ConfinementKind::None)
            .count();
        assert_eq!(unconfined, 19);
    }

    #[test]
    fn full_confinement_covers_every_member() {
        let mut context = Context::new();
        context.init_random(11);
        crowded_unit(&mut context);
        context.start_area_confinement(0, 1.0).unwrap();
        assert_eq!(area_confined(&context, 0), (10, 10));
        assert!(context.start_area_confinement(7, 1.0).is_err());
    }

    #[test]
    fn reset_realization_restores_initial_state() {
        let mut population = two_units();
        let resident = population
            .add_resident(employed(0, CommuteClass::InterCity, 3, false))
            .unwrap();
        let replica = population.create_replica(resident, 1).unwrap();
        population.update_health_status(resident, HealthStatus::Infectious, true);
        population.spatial_unit_mut(0).remove_susceptible(resident);
        population.spatial_unit_mut(1).remove_susceptible(replica);
        population.confine_with_twin(resident, ConfinementKind::Age);
        population.travel_to_work(resident);

        population.reset_realization();
        let home = population.agent(resident);
        assert_eq!(home.health, HealthStatus::Susceptible);
        assert_eq!(home.confinement, ConfinementKind::None);
        assert!(home.present);
        assert!(!population.agent(replica).present);
        assert_eq!(population.spatial_units()[0].susceptible_agents(), &[resident]);
        assert_eq!(population.spatial_units()[1].susceptible_agents(), &[replica]);
    }
}
