//! The daily commute and work state machine.
//!
//! Employed residents are split once per realization into live-in domestic workers,
//! fixed-location workers, full-shift commuters, and the two halves of the split-shift
//! commuters. Every day each group resolves where its members are and how they work, and the
//! travelers are sent home again between contact rounds.
use log::trace;

use crate::agent::{
    ActivityClass, AgentId, CommuteClass, ConfinementKind, Isolation, Shift, WorkMode,
    LIVE_IN_DOMESTIC,
};
use crate::context::Context;
use crate::parameters::ContextParametersExt;
use crate::population::{ContextPopulationExt, WorkDecision};
use crate::random::ContextRandomExt;
use crate::{define_data_plugin, define_rng, HashSet};

define_rng!(LaborRng);
define_rng!(OrderingRng);

/// Commuter groups that leave home and come back within a day.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CommuterGroup {
    /// Full-shift and out-of-region commuters: away for the first two rounds.
    FullShift,
    /// Split-shift commuters working the first round.
    Morning,
    /// Split-shift commuters working the second round.
    Afternoon,
}

#[derive(Default, Debug)]
struct WorkerGroups {
    live_in: Vec<AgentId>,
    fixed_location: Vec<AgentId>,
    full_shift: Vec<AgentId>,
    morning: Vec<AgentId>,
    afternoon: Vec<AgentId>,
}

impl WorkerGroups {
    fn commuters_mut(&mut self, group: CommuterGroup) -> &mut Vec<AgentId> {
        match group {
            CommuterGroup::FullShift => &mut self.full_shift,
            CommuterGroup::Morning => &mut self.morning,
            CommuterGroup::Afternoon => &mut self.afternoon,
        }
    }
}

#[derive(Default)]
struct LaborData {
    groups: WorkerGroups,
    /// Commuter trips today. A split-shift trip counts one half.
    mobility: f64,
    full_shift_travelers: Vec<AgentId>,
    morning_travelers: Vec<AgentId>,
    afternoon_travelers: Vec<AgentId>,
}

impl LaborData {
    fn travelers_mut(&mut self, group: CommuterGroup) -> &mut Vec<AgentId> {
        match group {
            CommuterGroup::FullShift => &mut self.full_shift_travelers,
            CommuterGroup::Morning => &mut self.morning_travelers,
            CommuterGroup::Afternoon => &mut self.afternoon_travelers,
        }
    }
}

define_data_plugin!(LaborPlugin, LaborData, LaborData::default());

pub trait ContextLaborExt {
    /// Rebuilds the worker groups for a new realization, including a fresh random split of the
    /// split-shift commuters into morning and afternoon halves.
    fn partition_workers(&mut self);

    /// Clears today's mobility count and traveler lists.
    fn begin_labor_day(&mut self);

    /// Moves live-in domestic workers to or from their employer's unit.
    fn move_live_in_workers(&mut self, day: u32);

    /// Resolves the work mode of workers who never leave their unit.
    fn resolve_fixed_location_workers(&mut self);

    /// Sends `group` to work according to the day's rule and each member's confinement.
    fn dispatch_commuters(&mut self, group: CommuterGroup, day: u32);

    /// Brings every member of `group` who traveled today back home.
    fn return_travelers(&mut self, group: CommuterGroup);

    fn daily_mobility(&self) -> f64;
}

impl Context {
    fn labor_draw(&self, participation: f64) -> bool {
        self.sample_uniform(LaborRng) <= participation
    }

    /// Today's work mode of a worker who stays where they are.
    fn resolve_work_status(&self, id: AgentId) -> WorkMode {
        match self.population().work_decision(id) {
            WorkDecision::Unrestricted => WorkMode::FaceToFace,
            WorkDecision::Draw(participation) => {
                if self.labor_draw(participation) {
                    WorkMode::FaceToFace
                } else {
                    WorkMode::NotWorking
                }
            }
            WorkDecision::Resolved(mode) => mode,
        }
    }

    /// Sends `id` to its workplace if it works there today, and returns its work mode.
    fn commute_to_workplace(&mut self, id: AgentId) -> WorkMode {
        let travels = match self.population().work_decision(id) {
            WorkDecision::Unrestricted => true,
            WorkDecision::Draw(participation) => self.labor_draw(participation),
            WorkDecision::Resolved(mode) => return mode,
        };
        if travels {
            self.population_mut().travel_to_work(id);
            WorkMode::FaceToFace
        } else {
            WorkMode::NotWorking
        }
    }

    fn set_work_today(&mut self, id: AgentId, mode: WorkMode) {
        self.population_mut().agent_mut(id).work_today = mode;
    }
}

impl ContextLaborExt for Context {
    fn partition_workers(&mut self) {
        let population = self.population();
        let mut residents: Vec<AgentId> = population.residents().collect();
        self.shuffle(OrderingRng, &mut residents);

        let mut groups = WorkerGroups::default();
        let mut split_shift = Vec::new();
        for id in residents {
            let agent = population.agent(id);
            let Some(job) = agent.job.as_ref() else {
                continue;
            };
            if agent.activity != ActivityClass::Employed {
                continue;
            }
            let live_in = job.category == LIVE_IN_DOMESTIC;
            match (agent.commute, job.shift) {
                (commute, _) if live_in => {
                    if commute.has_replica() {
                        groups.live_in.push(id);
                    }
                }
                (CommuteClass::NonCommuter, _) => groups.fixed_location.push(id),
                (CommuteClass::OutOfRegion, _) | (_, Shift::Full) => groups.full_shift.push(id),
                (_, Shift::Partial) => split_shift.push(id),
            }
        }

        let morning =
            self.sample_without_replacement(OrderingRng, &split_shift, split_shift.len() / 2);
        let morning_set: HashSet<AgentId> = morning.iter().copied().collect();
        groups.afternoon = split_shift
            .into_iter()
            .filter(|id| !morning_set.contains(id))
            .collect();
        groups.morning = morning;

        trace!(
            "worker groups: {} live-in, {} fixed, {} full shift, {} morning, {} afternoon",
            groups.live_in.len(),
            groups.fixed_location.len(),
            groups.full_shift.len(),
            groups.morning.len(),
            groups.afternoon.len()
        );
        let data = self.get_data_mut(LaborPlugin);
        data.groups = groups;
        data.mobility = 0.0;
    }

    fn begin_labor_day(&mut self) {
        let data = self.get_data_mut(LaborPlugin);
        data.mobility = 0.0;
        data.full_shift_travelers.clear();
        data.morning_travelers.clear();
        data.afternoon_travelers.clear();
    }

    fn move_live_in_workers(&mut self, day: u32) {
        let workday = self.parameters().calendar.live_in_workday(day);
        let live_in = std::mem::take(&mut self.get_data_mut(LaborPlugin).groups.live_in);
        let mut trips = 0.0;
        for &id in &live_in {
            let population = self.population_mut();
            let agent = population.agent(id);
            let (isolation, confined) = (
                agent.isolation,
                agent.confinement != ConfinementKind::None,
            );
            let mode = match isolation {
                Isolation::Isolated => {
                    population.agent_mut(id).present = false;
                    if let Some(replica) = population.agent(id).twin {
                        population.agent_mut(replica).present = false;
                    }
                    WorkMode::NotWorking
                }
                Isolation::ConfinedNotMoving => {
                    population.travel_to_work(id);
                    WorkMode::FaceToFace
                }
                Isolation::None if workday => {
                    population.travel_to_work(id);
                    trips += 1.0;
                    WorkMode::FaceToFace
                }
                Isolation::None => {
                    if confined {
                        population.travel_to_work(id);
                    } else {
                        population.return_home(id);
                    }
                    WorkMode::FaceToFace
                }
            };
            self.set_work_today(id, mode);
        }
        let data = self.get_data_mut(LaborPlugin);
        data.groups.live_in = live_in;
        data.mobility += trips;
    }

    fn resolve_fixed_location_workers(&mut self) {
        let fixed = std::mem::take(&mut self.get_data_mut(LaborPlugin).groups.fixed_location);
        for &id in &fixed {
            let mode = if self.population().agent(id).isolation == Isolation::Isolated {
                WorkMode::NotWorking
            } else {
                self.resolve_work_status(id)
            };
            self.set_work_today(id, mode);
        }
        self.get_data_mut(LaborPlugin).groups.fixed_location = fixed;
    }

    fn dispatch_commuters(&mut self, group: CommuterGroup, day: u32) {
        let rule = self.parameters().calendar.rule(day);
        let trip = match group {
            CommuterGroup::FullShift => 1.0,
            CommuterGroup::Morning | CommuterGroup::Afternoon => 0.5,
        };
        let members = std::mem::take(self.get_data_mut(LaborPlugin).groups.commuters_mut(group));
        let mut travelers = Vec::new();
        let mut trips = 0.0;

        for &id in &members {
            let agent = self.population().agent(id);
            let (isolation, has_replica) = (agent.isolation, agent.commute.has_replica());
            let sector = agent.sector().unwrap_or_default();
            let mode = match isolation {
                Isolation::None if rule.travels(sector) => {
                    let mode = self.commute_to_workplace(id);
                    if self.population().agent(id).present {
                        mode
                    } else {
                        travelers.push(id);
                        if has_replica {
                            trips += trip;
                        }
                        WorkMode::FaceToFace
                    }
                }
                Isolation::None | Isolation::ConfinedNotMoving => self.resolve_work_status(id),
                Isolation::Isolated => WorkMode::NotWorking,
            };
            self.set_work_today(id, mode);
        }

        let data = self.get_data_mut(LaborPlugin);
        *data.groups.commuters_mut(group) = members;
        data.travelers_mut(group).extend(travelers);
        data.mobility += trips;
    }

    fn return_travelers(&mut self, group: CommuterGroup) {
        let travelers = std::mem::take(self.get_data_mut(LaborPlugin).travelers_mut(group));
        let population = self.population_mut();
        for &id in &travelers {
            population.return_home(id);
        }
    }

    fn daily_mobility(&self) -> f64 {
        self.try_get_data(LaborPlugin)
            .map_or(0.0, |data| data.mobility)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{Agent, Employer, Job, SECTOR_COUNT};
    use crate::global_properties::ContextGlobalPropertiesExt;
    use crate::parameters::{Parameters, SimulationParameters};
    use crate::population::Population;
    use crate::spatial_unit::SpatialUnit;

    fn worker(unit: usize, commute: CommuteClass, shift: Shift, category: u8, sector: u8) -> Agent {
        let mut agent = Agent::new_resident(unit, commute, ActivityClass::Employed, 0, 8, 3);
        agent.job = Some(Job {
            shift,
            category,
            sector,
            telework: false,
            employer: Employer::Formal,
            workplace_unit: Some(1),
            person_id: String::new(),
            wage: 0.0,
            formal: true,
        });
        agent
    }

    struct Workforce {
        context: Context,
        fixed: AgentId,
        full: AgentId,
        abroad: AgentId,
        split: Vec<AgentId>,
        live_in: AgentId,
        child: AgentId,
    }

    fn workforce(participation: f64) -> Workforce {
        let mut context = Context::new();
        context.init_random(42);
        context
            .set_global_property_value(SimulationParameters, Parameters::example(vec![0, 0]))
            .unwrap();
        let mut population = Population::new(vec![
            SpatialUnit::new(0, [participation; SECTOR_COUNT], participation),
            SpatialUnit::new(1, [participation; SECTOR_COUNT], participation),
        ]);

        let fixed = population
            .add_resident(worker(0, CommuteClass::NonCommuter, Shift::Full, 1, 3))
            .unwrap();
        let full = population
            .add_resident(worker(0, CommuteClass::InterCity, Shift::Full, 1, 3))
            .unwrap();
        population.create_replica(full, 1).unwrap();
        let abroad = population
            .add_resident(worker(0, CommuteClass::OutOfRegion, Shift::Full, 1, 3))
            .unwrap();
        let mut split = Vec::new();
        for _ in 0..5 {
            let id = population
                .add_resident(worker(0, CommuteClass::IntraCity, Shift::Partial, 1, 3))
                .unwrap();
            population.create_replica(id, 0).unwrap();
            split.push(id);
        }
        let live_in = population
            .add_resident(worker(0, CommuteClass::InterCity, Shift::Full, LIVE_IN_DOMESTIC, 4))
            .unwrap();
        population.create_replica(live_in, 1).unwrap();
        let child = population
            .add_resident(Agent::new_resident(
                0,
                CommuteClass::NonCommuter,
                ActivityClass::Child,
                0,
                2,
                1,
            ))
            .unwrap();
        population.reset_participation();
        context.set_population(population);
        context.partition_workers();
        Workforce {
            context,
            fixed,
            full,
            abroad,
            split,
            live_in,
            child,
        }
    }

    fn group(context: &Context, select: fn(&WorkerGroups) -> &Vec<AgentId>) -> Vec<AgentId> {
        let mut ids = select(&context.get_data(LaborPlugin).groups).clone();
        ids.sort_unstable();
        ids
    }

    #[test]
    fn partition_covers_each_worker_once() {
        let workforce = workforce(1.0);
        let context = &workforce.context;
        assert_eq!(group(context, |g| &g.fixed_location), vec![workforce.fixed]);
        let mut full = vec![workforce.full, workforce.abroad];
        full.sort_unstable();
        assert_eq!(group(context, |g| &g.full_shift), full);
        assert_eq!(group(context, |g| &g.live_in), vec![workforce.live_in]);

        let morning = group(context, |g| &g.morning);
        let afternoon = group(context, |g| &g.afternoon);
        assert_eq!(morning.len(), 2);
        assert_eq!(afternoon.len(), 3);
        let mut split: Vec<AgentId> = morning.iter().chain(&afternoon).copied().collect();
        split.sort_unstable();
        assert_eq!(split, workforce.split);
        assert!(!split.contains(&workforce.child));
    }

    #[test]
    fn weekday_commute_and_return() {
        let mut workforce = workforce(1.0);
        let context = &mut workforce.context;
        context.begin_labor_day();
        context.dispatch_commuters(CommuterGroup::FullShift, 1);
        context.dispatch_commuters(CommuterGroup::Morning, 1);

        let population = context.population();
        let replica = population.agent(workforce.full).twin.unwrap();
        assert!(!population.agent(workforce.full).present);
        assert!(population.agent(replica).present);
        assert!(!population.agent(workforce.abroad).present);
        assert_eq!(
            population.agent(workforce.full).work_today,
            WorkMode::FaceToFace
        );
        // Out-of-region trips don't count as mobility.
        assert_eq!(context.daily_mobility(), 1.0 + 2.0 * 0.5);

        context.return_travelers(CommuterGroup::Morning);
        context.dispatch_commuters(CommuterGroup::Afternoon, 1);
        assert_eq!(context.daily_mobility(), 1.0 + 5.0 * 0.5);
        context.return_travelers(CommuterGroup::FullShift);
        context.return_travelers(CommuterGroup::Afternoon);

        let population = context.population();
        for &id in workforce.split.iter().chain([&workforce.full, &workforce.abroad]) {
            assert!(population.agent(id).present);
            if let Some(replica) = population.agent(id).twin {
                assert!(!population.agent(replica).present);
            }
        }
    }

    #[test]
    fn sunday_rule_keeps_idle_sectors_home() {
        let mut workforce = workforce(1.0);
        let context = &mut workforce.context;
        context.begin_labor_day();
        // Day 7 is a Sunday and sector 3 stays home.
        context.dispatch_commuters(CommuterGroup::FullShift, 7);
        let population = context.population();
        assert!(population.agent(workforce.full).present);
        assert_eq!(
            population.agent(workforce.full).work_today,
            WorkMode::FaceToFace
        );
        assert_eq!(context.daily_mobility(), 0.0);
    }

    #[test]
    fn confinement_without_participation_means_not_working() {
        let mut workforce = workforce(0.0);
        let context = &mut workforce.context;
        context
            .population_mut()
            .confine_with_twin(workforce.full, ConfinementKind::Sector);
        context
            .population_mut()
            .confine_with_twin(workforce.fixed, ConfinementKind::Sector);
        context.begin_labor_day();
        context.resolve_fixed_location_workers();
        context.dispatch_commuters(CommuterGroup::FullShift, 1);
        let population = context.population();
        assert!(population.agent(workforce.full).present);
        assert_eq!(
            population.agent(workforce.full).work_today,
            WorkMode::NotWorking
        );
        assert_eq!(
            population.agent(workforce.fixed).work_today,
            WorkMode::NotWorking
        );
    }

    #[test]
    fn isolated_commuters_stay_home_idle() {
        let mut workforce = workforce(1.0);
        let context = &mut workforce.context;
        context.population_mut().isolate(workforce.full);
        context.begin_labor_day();
        context.dispatch_commuters(CommuterGroup::FullShift, 1);
        let population = context.population();
        assert!(!population.agent(workforce.full).present);
        assert_eq!(
            population.agent(workforce.full).work_today,
            WorkMode::NotWorking
        );
        assert_eq!(context.daily_mobility(), 0.0);
    }

    #[test]
    fn live_in_workers_follow_the_week() {
        let mut workforce = workforce(1.0);
        let context = &mut workforce.context;
        let replica = context.population().agent(workforce.live_in).twin.unwrap();

        context.begin_labor_day();
        context.move_live_in_workers(6);
        assert!(context.population().agent(replica).present);
        assert!(!context.population().agent(workforce.live_in).present);
        assert_eq!(context.daily_mobility(), 1.0);

        context.begin_labor_day();
        context.move_live_in_workers(7);
        assert!(context.population().agent(workforce.live_in).present);
        assert!(!context.population().agent(replica).present);
        assert_eq!(context.daily_mobility(), 0.0);

        context
            .population_mut()
            .confine_with_twin(workforce.live_in, ConfinementKind::Area);
        context.move_live_in_workers(7);
        assert!(context.population().agent(replica).present);

        context.population_mut().isolate(workforce.live_in);
        context.move_live_in_workers(1);
        let population = context.population();
        assert!(!population.agent(replica).present);
        assert!(!population.agent(workforce.live_in).present);
        assert_eq!(
            population.agent(workforce.live_in).work_today,
            WorkMode::NotWorking
        );
    }
}
