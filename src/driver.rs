//! Runs the realizations of a simulation.
//!
//! Each realization rewinds the population to its initial state, seeds the outbreak and
//! schedules three plans per day on the context: policy events in the `First` phase, the
//! simulated day in `Normal`, and output recording in `Last`.
use log::{debug, error, info};

use crate::calibration::{read_series, read_table, CalibrationOutcome};
use crate::context::{Context, ExecutionPhase};
use crate::error::SirLaborError;
use crate::infection_manager::ContextInfectionExt;
use crate::labor_manager::{CommuterGroup, ContextLaborExt};
use crate::output::ContextOutputExt;
use crate::parameters::ContextParametersExt;
use crate::policy::{ContextPolicyExt, Schedule};
use crate::population::ContextPopulationExt;
use crate::population_loader::load_population;
use crate::random::ContextRandomExt;
use crate::report::ContextReportExt;
use crate::transmission_manager::{ContextTransmissionExt, PendingInfections};
use crate::define_data_plugin;

#[derive(Default)]
struct DriverData {
    /// The first error raised inside a plan. Execution stops as soon as it is set.
    error: Option<SirLaborError>,
}

define_data_plugin!(DriverPlugin, DriverData, DriverData::default());

fn abort(context: &mut Context, err: SirLaborError) {
    error!("day {}: {err}", context.get_current_day());
    let data = context.get_data_mut(DriverPlugin);
    if data.error.is_none() {
        data.error = Some(err);
    }
    context.shutdown();
}

/// The contact and movement phases of one day, after that day's policy events.
pub fn simulate_day(context: &mut Context, day: u32) {
    context.progress_infections();

    context.begin_labor_day();
    context.move_live_in_workers(day);
    context.resolve_fixed_location_workers();
    context.dispatch_commuters(CommuterGroup::FullShift, day);
    context.dispatch_commuters(CommuterGroup::Morning, day);

    let morning = context.parameters().morning_time_fraction;
    let mut pending = PendingInfections::default();
    context.contact_round(morning, &mut pending);

    context.return_travelers(CommuterGroup::Morning);
    context.dispatch_commuters(CommuterGroup::Afternoon, day);
    context.contact_round(morning, &mut pending);

    context.return_travelers(CommuterGroup::FullShift);
    context.return_travelers(CommuterGroup::Afternoon);
    context.contact_round(context.evening_time_fraction(), &mut pending);

    debug!(
        "day {day}: {} infectious, {} new, mobility {}",
        context.infectious_residents().len(),
        pending.len(),
        context.daily_mobility()
    );
    context.apply_pending_infections(pending);
}

/// Runs realization `realization` with every stream seeded from `base_seed + realization`.
///
/// # Errors
/// Returns the first error raised while seeding or applying a policy event.
pub fn run_realization(
    context: &mut Context,
    schedule: &Schedule,
    base_seed: u64,
    realization: u32,
) -> Result<(), SirLaborError> {
    let parameters = context.parameters().clone();
    context.init_random(base_seed + u64::from(realization));

    let population = context.population_mut();
    population.reset_realization();
    population.reset_participation();
    context.set_evening_time_fraction(parameters.evening_time_fraction);
    context.reset_infections();
    context.begin_realization_output(realization);
    context.partition_workers();
    context.seed_infections(&parameters.initial_infections)?;

    for event in schedule.events_before(parameters.max_days) {
        let event = event.clone();
        context.add_plan_with_phase(
            event.day,
            move |context| {
                if let Err(err) = context.apply_policy_event(&event) {
                    abort(context, err);
                }
            },
            ExecutionPhase::First,
        );
    }
    for day in 0..parameters.max_days {
        context.add_plan(day, move |context| simulate_day(context, day));
        context.add_plan_with_phase(
            day,
            move |context| context.record_day(day),
            ExecutionPhase::Last,
        );
    }

    context.execute();
    context.reset_clock();
    if let Some(err) = context.get_data_mut(DriverPlugin).error.take() {
        return Err(err);
    }
    info!(
        "realization {realization} finished: {} infectious, {} deaths",
        context.infectious_residents().len(),
        context.deaths()
    );
    Ok(())
}

/// Loads the population and schedule named by the parameters, runs every realization in
/// `[first_realization, last_realization)`, and writes the reports.
///
/// # Errors
/// Returns an error if an input can't be loaded or is inconsistent, or a report can't be
/// written.
pub fn run_simulation(context: &mut Context, base_seed: u64) -> Result<(), SirLaborError> {
    let parameters = context.parameters().clone();
    let population = load_population(&parameters.sector_table, &parameters.cohort_table)?;
    let num_units = population.num_units();
    context.set_population(population);

    let schedule = match &parameters.schedule_file {
        Some(path) => Schedule::from_file(path)?,
        None => Schedule::builtin(parameters.scenario)?,
    };
    schedule.validate(num_units)?;
    info!(
        "running realizations {}..{} of scenario {} for {} days",
        parameters.first_realization,
        parameters.last_realization,
        schedule.name,
        parameters.max_days
    );

    context.add_simulation_reports()?;
    for realization in parameters.first_realization..parameters.last_realization {
        run_realization(context, &schedule, base_seed, realization)?;
    }
    context.write_calibration_report()?;

    if let (Some(regional), Some(units)) = (
        &parameters.observed_regional_file,
        &parameters.observed_unit_file,
    ) {
        let outcome = CalibrationOutcome::evaluate(
            &context.calibration_table(),
            &read_series(regional)?,
            &read_table(units)?,
        )?;
        info!(
            "detection estimate {}, NSE {} / {} / {}",
            outcome.detection_estimate,
            outcome.nse_cumulative_by_unit,
            outcome.nse_incremental_by_unit,
            outcome.nse_regional_increments
        );
        context.write_outcome_report(&outcome);
    }
    context.flush_reports()
}
