//! The contact process: three rounds a day in which present susceptibles meet the infectious
//! agents present in the same spatial unit.
use log::trace;

use crate::agent::AgentId;
use crate::context::Context;
use crate::parameters::ContextParametersExt;
use crate::population::ContextPopulationExt;
use crate::rand::Rng;
use crate::random::ContextRandomExt;
use crate::{define_data_plugin, define_rng, HashSet};

define_rng!(TransmissionRng);

/// Probability that a susceptible present among `infectious` infectious agents out of
/// `population` is infected during a round of weight `time_fraction`.
pub fn infection_probability(
    transmission_rate: f64,
    population: usize,
    time_fraction: f64,
    confinement_factor: f64,
    infectious: usize,
) -> f64 {
    if population == 0 || infectious == 0 {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let per_contact = (transmission_rate / population as f64 * time_fraction * confinement_factor)
        .clamp(0.0, 1.0);
    let exponent = i32::try_from(infectious).unwrap_or(i32::MAX);
    1.0 - (1.0 - per_contact).powi(exponent)
}

/// Whether a uniform `draw` infects at `probability`. The boundary counts as an infection;
/// a zero probability never infects.
pub fn is_infected(draw: f64, probability: f64) -> bool {
    probability > 0.0 && draw <= probability
}

/// Agents drawn for infection today, in draw order. Status changes wait until every round is
/// over.
#[derive(Default, Debug)]
pub struct PendingInfections {
    marked: HashSet<AgentId>,
    order: Vec<AgentId>,
}

impl PendingInfections {
    /// Marks `id` and, if it has one, its twin.
    pub fn mark(&mut self, id: AgentId, twin: Option<AgentId>) {
        if self.marked.insert(id) {
            self.order.push(id);
        }
        if let Some(twin) = twin {
            self.marked.insert(twin);
        }
    }

    pub fn contains(&self, id: AgentId) -> bool {
        self.marked.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// The marked agents in the order they were drawn.
    pub fn drain(self) -> impl Iterator<Item = AgentId> {
        self.order.into_iter()
    }
}

struct TransmissionData {
    evening_time_fraction: f64,
}

define_data_plugin!(
    TransmissionPlugin,
    TransmissionData,
    TransmissionData {
        evening_time_fraction: 6.0 / 24.0,
    }
);

pub trait ContextTransmissionExt {
    /// Changes the weight of the third daily round, e.g. when a curfew starts.
    fn set_evening_time_fraction(&mut self, value: f64);

    fn evening_time_fraction(&self) -> f64;

    /// Runs one contact round over every spatial unit in index order, marking new infections in
    /// `pending`. Counts are read once per unit at the start of its round.
    fn contact_round(&self, time_fraction: f64, pending: &mut PendingInfections);
}

impl ContextTransmissionExt for Context {
    fn set_evening_time_fraction(&mut self, value: f64) {
        trace!("evening time fraction set to {value}");
        self.get_data_mut(TransmissionPlugin).evening_time_fraction = value;
    }

    fn evening_time_fraction(&self) -> f64 {
        self.try_get_data(TransmissionPlugin)
            .map_or(self.parameters().evening_time_fraction, |data| {
                data.evening_time_fraction
            })
    }

    fn contact_round(&self, time_fraction: f64, pending: &mut PendingInfections) {
        let parameters = self.parameters();
        let population = self.population();
        let agents = population.all_agents();
        let before = pending.len();

        self.sample(TransmissionRng, |rng| {
            for unit in population.spatial_units() {
                if unit.susceptible.is_empty() {
                    continue;
                }
                let floor = (unit.id >= parameters.first_peripheral_unit)
                    .then_some(parameters.peripheral_population_floor);
                let present = unit.effective_population(agents, floor);
                let infectious = unit.infectious_present_count(agents);
                if infectious == 0 {
                    continue;
                }

                for &id in &unit.susceptible {
                    let agent = &agents[id];
                    if !agent.present || pending.contains(id) {
                        continue;
                    }
                    let draw: f64 = rng.random();
                    let probability = infection_probability(
                        parameters.transmission_rate,
                        present,
                        time_fraction,
                        agent.confinement_factor(
                            parameters.strict_confinement_factor,
                            parameters.non_strict_confinement_factor,
                        ),
                        infectious,
                    );
                    if is_infected(draw, probability) {
                        pending.mark(id, agent.twin);
                    }
                }
            }
        });
        trace!(
            "contact round ({time_fraction}): {} new infections",
            pending.len() - before
        );
    }
}
