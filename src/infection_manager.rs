//! Disease progression of tracked cases: seeding, detection and isolation, removal, and applying
//! the infections drawn by the contact rounds.
use log::{debug, trace};

use crate::agent::{AgentId, HealthStatus};
use crate::context::Context;
use crate::error::SirLaborError;
use crate::parameters::ContextParametersExt;
use crate::population::ContextPopulationExt;
use crate::random::ContextRandomExt;
use crate::transmission_manager::PendingInfections;
use crate::{define_data_plugin, define_rng};

define_rng!(SeedingRng);
define_rng!(ProgressionRng);

/// What the draw on the detection day decided for a case.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DetectionOutcome {
    pub isolated: bool,
    pub detected: bool,
}

/// Splits `[0, 1]` into isolated and detected, isolated only, detected only, and neither, in
/// that order.
pub fn detection_outcome(
    draw: f64,
    isolation_probability: f64,
    detection_probability: f64,
) -> DetectionOutcome {
    let both = isolation_probability * detection_probability;
    let isolated_only = both + isolation_probability * (1.0 - detection_probability);
    let detected_only = isolated_only + (1.0 - isolation_probability) * detection_probability;
    DetectionOutcome {
        isolated: draw <= isolated_only,
        detected: draw <= both || (isolated_only < draw && draw <= detected_only),
    }
}

#[derive(Default)]
struct InfectionData {
    /// Infectious residents in the order they were infected.
    infectious: Vec<AgentId>,
    deaths: f64,
}

define_data_plugin!(InfectionPlugin, InfectionData, InfectionData::default());

pub trait ContextInfectionExt {
    /// Forgets every tracked case and the death tally.
    fn reset_infections(&mut self);

    /// Infects `initial_infections[x]` susceptible residents of every unit `x`, each one counted
    /// as detected at home.
    ///
    /// # Errors
    /// Returns `InputError` if the seed vector doesn't cover every unit or asks for more
    /// residents than a unit has.
    fn seed_infections(&mut self, initial_infections: &[u32]) -> Result<(), SirLaborError>;

    /// Advances every tracked case by one day.
    fn progress_infections(&mut self);

    /// Applies the infections marked during today's contact rounds.
    fn apply_pending_infections(&mut self, pending: PendingInfections);

    fn infectious_residents(&self) -> &[AgentId];

    /// Weighted deaths so far in this realization.
    fn deaths(&self) -> f64;
}

impl Context {
    /// Makes the resident `id` infectious and takes both instances off the worklists.
    fn infect_resident(&mut self, id: AgentId) {
        let population = self.population_mut();
        population.update_health_status(id, HealthStatus::Infectious, true);
        let home = population.agent(id).unit;
        population.spatial_unit_mut(home).remove_susceptible(id);
        if let Some(replica) = population.agent(id).twin {
            let workplace = population.agent(replica).unit;
            population
                .spatial_unit_mut(workplace)
                .remove_susceptible(replica);
        }
        self.get_data_mut(InfectionPlugin).infectious.push(id);
    }
}

impl ContextInfectionExt for Context {
    fn reset_infections(&mut self) {
        let data = self.get_data_mut(InfectionPlugin);
        data.infectious.clear();
        data.deaths = 0.0;
    }

    fn seed_infections(&mut self, initial_infections: &[u32]) -> Result<(), SirLaborError> {
        let num_units = self.population().num_units();
        if initial_infections.len() != num_units {
            return Err(SirLaborError::InputError(format!(
                "{} initial infection counts for {num_units} spatial units",
                initial_infections.len()
            )));
        }
        let weight = self.parameters().agent_weight;

        for (unit, &count) in initial_infections.iter().enumerate() {
            if count == 0 {
                continue;
            }
            let population = self.population();
            let candidates: Vec<AgentId> = population.spatial_units()[unit]
                .susceptible_agents()
                .iter()
                .copied()
                .filter(|&id| population.agent(id).is_resident())
                .collect();
            let requested = count as usize;
            if requested > candidates.len() {
                return Err(SirLaborError::InputError(format!(
                    "cannot seed {requested} infections in unit {unit}: only {} susceptible \
                     residents",
                    candidates.len()
                )));
            }

            let chosen = self.sample_without_replacement(SeedingRng, &candidates, requested);
            for id in chosen {
                self.infect_resident(id);
                self.population_mut().spatial_unit_mut(unit).cumulative_detected += weight;
            }
            trace!("seeded {requested} infections in unit {unit}");
        }
        Ok(())
    }

    fn progress_infections(&mut self) {
        let parameters = self.parameters();
        let (detection_day, recovery_day) = (parameters.detection_day, parameters.recovery_day);
        let (isolation, detection) = (
            parameters.isolation_probability,
            parameters.detection_probability,
        );
        let (survival, weight) = (parameters.survival_probability, parameters.agent_weight);

        let cases = self.get_data(InfectionPlugin).infectious.clone();
        let mut removals = Vec::new();
        for id in cases {
            let days = self.population().agent(id).infectious_days;
            if days == detection_day {
                self.population_mut().advance_infectious_day(id);
                let draw = self.sample_uniform(ProgressionRng);
                let outcome = detection_outcome(draw, isolation, detection);
                let population = self.population_mut();
                if outcome.isolated {
                    population.isolate(id);
                }
                if outcome.detected {
                    let home = population.residence_unit(id);
                    population.spatial_unit_mut(home).cumulative_detected += weight;
                }
            } else if days >= recovery_day {
                removals.push(id);
            } else {
                self.population_mut().advance_infectious_day(id);
            }
        }

        for id in removals {
            let survives = self.sample_uniform(ProgressionRng) <= survival;
            self.population_mut()
                .update_health_status(id, HealthStatus::Removed, survives);
            let data = self.get_data_mut(InfectionPlugin);
            data.infectious.retain(|&case| case != id);
            if !survives {
                data.deaths += weight;
                debug!("agent {id} died on day {}", self.get_current_day());
            }
        }
    }

    fn apply_pending_infections(&mut self, pending: PendingInfections) {
        let count = pending.len();
        for id in pending.drain() {
            let population = self.population();
            let agent = population.agent(id);
            let resident = match agent.twin {
                Some(twin) if !agent.is_resident() => twin,
                _ => id,
            };
            if population.agent(resident).health == HealthStatus::Susceptible {
                self.infect_resident(resident);
            }
        }
        if count > 0 {
            trace!("{count} new infections on day {}", self.get_current_day());
        }
    }

    fn infectious_residents(&self) -> &[AgentId] {
        self.try_get_data(InfectionPlugin)
            .map(|data| data.infectious.as_slice())
            .unwrap_or(&[])
    }

    fn deaths(&self) -> f64 {
        self.try_get_data(InfectionPlugin)
            .map_or(0.0, |data| data.deaths)
    }
}
