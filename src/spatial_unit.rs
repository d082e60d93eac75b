//! Spatial units index agents; they never own them.
use crate::rand::Rng;

use crate::agent::{Agent, AgentId, HealthStatus, SECTOR_COUNT};
use crate::random::sample_multiple_from_known_length;

#[derive(Clone, Debug)]
pub struct SpatialUnit {
    pub id: usize,
    /// Residents and replicas indexed here, in insertion order.
    pub members: Vec<AgentId>,
    /// Baseline participation probability by sector code (index `sector - 1`).
    pub sector_participation: [f64; SECTOR_COUNT],
    /// Participation of retail workers when both instances are sector-confined.
    pub retail_participation: f64,
    /// Susceptible members. Entries leave only when an infection is applied.
    pub susceptible: Vec<AgentId>,
    /// Detected cases attributed to residents of this unit, weighted.
    pub cumulative_detected: f64,
}

impl SpatialUnit {
    pub fn new(
        id: usize,
        sector_participation: [f64; SECTOR_COUNT],
        retail_participation: f64,
    ) -> SpatialUnit {
        SpatialUnit {
            id,
            members: Vec::new(),
            sector_participation,
            retail_participation,
            susceptible: Vec::new(),
            cumulative_detected: 0.0,
        }
    }

    pub fn add_agent(&mut self, agent: AgentId) {
        self.members.push(agent);
        self.susceptible.push(agent);
    }

    /// Baseline participation for a sector code in 1..=21.
    pub fn participation_for(&self, sector: u8) -> f64 {
        self.sector_participation[usize::from(sector) - 1]
    }

    /// Picks the members an area confinement of `fraction` applies to. A full confinement takes
    /// every member; a partial one takes `floor(fraction * n)` residents and, independently,
    /// `floor(fraction * m)` replicas, both without replacement.
    pub fn select_for_confinement<R: Rng>(
        &self,
        agents: &[Agent],
        fraction: f64,
        rng: &mut R,
    ) -> Vec<AgentId> {
        if fraction >= 1.0 {
            return self.members.clone();
        }
        let (residents, replicas): (Vec<AgentId>, Vec<AgentId>) = self
            .members
            .iter()
            .copied()
            .partition(|&id| agents[id].is_resident());

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let quota = |n: usize| (fraction * n as f64).floor() as usize;
        let mut selected =
            sample_multiple_from_known_length(rng, residents.iter().copied(), quota(residents.len()));
        selected.extend(sample_multiple_from_known_length(
            rng,
            replicas.iter().copied(),
            quota(replicas.len()),
        ));
        selected
    }

    /// Members present today: the contact-process denominator before any floor.
    pub fn present_count(&self, agents: &[Agent]) -> usize {
        self.members.iter().filter(|&&id| agents[id].present).count()
    }

    /// The contact-process denominator. Peripheral units are floored at `floor`.
    pub fn effective_population(&self, agents: &[Agent], floor: Option<usize>) -> usize {
        let present = self.present_count(agents);
        match floor {
            Some(floor) => present.max(floor),
            None => present,
        }
    }

    pub fn infectious_present_count(&self, agents: &[Agent]) -> usize {
        self.members
            .iter()
            .filter(|&&id| agents[id].present && agents[id].health == HealthStatus::Infectious)
            .count()
    }

    pub fn susceptible_agents(&self) -> &[AgentId] {
        &self.susceptible
    }

    /// Drops `agent` from the susceptible worklist.
    pub fn remove_susceptible(&mut self, agent: AgentId) {
        self.susceptible.retain(|&id| id != agent);
    }

    /// Rebuilds the worklist and counters for a fresh realization.
    pub fn reset(&mut self) {
        self.susceptible.clone_from(&self.members);
        self.cumulative_detected = 0.0;
    }
}
