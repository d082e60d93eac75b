//! Per-day and per-run CSV reports.
use std::collections::BTreeMap;

use log::info;
use serde::{Deserialize, Serialize};

use crate::agent::{HealthStatus, WorkMode};
use crate::calibration::{checkpoint_day, checkpoint_index, CalibrationOutcome, CHECKPOINTS};
use crate::context::Context;
use crate::error::SirLaborError;
use crate::infection_manager::ContextInfectionExt;
use crate::labor_manager::ContextLaborExt;
use crate::parameters::ContextParametersExt;
use crate::population::ContextPopulationExt;
use crate::report::ContextReportExt;
use crate::{define_data_plugin, define_report};

/// Resident counts of one cohort by health status and today's work mode.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct CohortStatusReport {
    pub realization: u32,
    pub day: u32,
    pub cohort: u32,
    pub susceptible_not_working: u32,
    pub infectious_not_working: u32,
    pub removed_not_working: u32,
    pub susceptible_face_to_face: u32,
    pub infectious_face_to_face: u32,
    pub removed_face_to_face: u32,
    pub susceptible_teleworking: u32,
    pub infectious_teleworking: u32,
    pub removed_teleworking: u32,
}

define_report!(CohortStatusReport);

impl CohortStatusReport {
    fn count(&mut self, health: HealthStatus, work: WorkMode) {
        let slot = match (work, health) {
            (WorkMode::NotWorking, HealthStatus::Susceptible) => &mut self.susceptible_not_working,
            (WorkMode::NotWorking, HealthStatus::Infectious) => &mut self.infectious_not_working,
            (WorkMode::NotWorking, HealthStatus::Removed) => &mut self.removed_not_working,
            (WorkMode::FaceToFace, HealthStatus::Susceptible) => {
                &mut self.susceptible_face_to_face
            }
            (WorkMode::FaceToFace, HealthStatus::Infectious) => &mut self.infectious_face_to_face,
            (WorkMode::FaceToFace, HealthStatus::Removed) => &mut self.removed_face_to_face,
            (WorkMode::Teleworking, HealthStatus::Susceptible) => {
                &mut self.susceptible_teleworking
            }
            (WorkMode::Teleworking, HealthStatus::Infectious) => &mut self.infectious_teleworking,
            (WorkMode::Teleworking, HealthStatus::Removed) => &mut self.removed_teleworking,
        };
        *slot += 1;
    }

    pub fn total(&self) -> u32 {
        self.susceptible_not_working
            + self.infectious_not_working
            + self.removed_not_working
            + self.susceptible_face_to_face
            + self.infectious_face_to_face
            + self.removed_face_to_face
            + self.susceptible_teleworking
            + self.infectious_teleworking
            + self.removed_teleworking
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct MobilityReport {
    pub realization: u32,
    pub day: u32,
    pub mobility: f64,
}

define_report!(MobilityReport);

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct DetectedReport {
    pub realization: u32,
    pub day: u32,
    pub unit: usize,
    pub cumulative_detected: f64,
}

define_report!(DetectedReport);

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct DeathsReport {
    pub realization: u32,
    pub deaths: f64,
}

define_report!(DeathsReport);

/// Cumulative detected cases at a checkpoint, averaged over realizations.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct CalibrationReport {
    pub checkpoint: usize,
    pub day: u32,
    pub unit: usize,
    pub mean_cumulative_detected: f64,
}

define_report!(CalibrationReport);

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct OutcomeReport {
    pub transmission_rate: f64,
    pub isolation_probability: f64,
    pub strict_confinement_factor: f64,
    pub survival_probability: f64,
    pub detection_estimate: f64,
    pub nse_cumulative_by_unit: f64,
    pub nse_incremental_by_unit: f64,
    pub nse_regional_increments: f64,
}

define_report!(OutcomeReport);

#[derive(Default)]
struct OutputData {
    realization: u32,
    realizations_recorded: u32,
    /// Sum over realizations of the cumulative detected row at each checkpoint.
    checkpoint_sums: Vec<Vec<f64>>,
}

define_data_plugin!(OutputPlugin, OutputData, OutputData::default());

pub trait ContextOutputExt {
    /// Opens the report files for a run.
    ///
    /// # Errors
    /// Returns an error if a file exists and overwriting is off, or can't be created.
    fn add_simulation_reports(&mut self) -> Result<(), SirLaborError>;

    /// Starts recording a new realization.
    fn begin_realization_output(&mut self, realization: u32);

    /// Writes today's rows: cohort distribution, mobility and cumulative detected by unit. Adds
    /// checkpoint rows to the calibration sums and writes the death tally on its day.
    fn record_day(&mut self, day: u32);

    /// Checkpoint table averaged over the recorded realizations.
    fn calibration_table(&self) -> Vec<Vec<f64>>;

    /// Writes the averaged checkpoint table.
    ///
    /// # Errors
    /// Returns an error if the report was not added.
    fn write_calibration_report(&mut self) -> Result<(), SirLaborError>;

    /// Writes the outcome row for the current parameters.
    fn write_outcome_report(&self, outcome: &CalibrationOutcome);
}

impl ContextOutputExt for Context {
    fn add_simulation_reports(&mut self) -> Result<(), SirLaborError> {
        if self.parameters().write_cohort_distribution {
            self.add_report::<CohortStatusReport>("cohort_status")?;
        }
        self.add_report::<MobilityReport>("mobility")?;
        self.add_report::<DetectedReport>("detected")?;
        self.add_report::<DeathsReport>("deaths")?;
        self.add_report::<CalibrationReport>("calibration")?;
        let parameters = self.parameters();
        if parameters.observed_regional_file.is_some() && parameters.observed_unit_file.is_some() {
            self.add_report::<OutcomeReport>("outcome")?;
        }
        Ok(())
    }

    fn begin_realization_output(&mut self, realization: u32) {
        let num_units = self.population().num_units();
        let data = self.get_data_mut(OutputPlugin);
        data.realization = realization;
        if data.checkpoint_sums.is_empty() {
            data.checkpoint_sums = vec![vec![0.0; num_units]; CHECKPOINTS];
        }
        data.realizations_recorded += 1;
    }

    fn record_day(&mut self, day: u32) {
        let parameters = self.parameters();
        let last_day = parameters.max_days - 1;
        let deaths_day = parameters.deaths_checkpoint_day.min(last_day);
        let write_cohorts = parameters.write_cohort_distribution;
        let realization = self.get_data(OutputPlugin).realization;
        let population = self.population();

        if write_cohorts {
            let mut cohorts: BTreeMap<u32, CohortStatusReport> = BTreeMap::new();
            for id in population.residents() {
                let agent = population.agent(id);
                cohorts
                    .entry(agent.cohort)
                    .or_insert_with(|| CohortStatusReport {
                        realization,
                        day,
                        cohort: agent.cohort,
                        ..CohortStatusReport::default()
                    })
                    .count(agent.health, agent.work_today);
            }
            for row in cohorts.into_values() {
                self.send_report(row);
            }
        }

        self.send_report(MobilityReport {
            realization,
            day,
            mobility: self.daily_mobility(),
        });
        let detected: Vec<f64> = population
            .spatial_units()
            .iter()
            .map(|unit| unit.cumulative_detected)
            .collect();
        for (unit, &cumulative_detected) in detected.iter().enumerate() {
            self.send_report(DetectedReport {
                realization,
                day,
                unit,
                cumulative_detected,
            });
        }

        if day == deaths_day {
            self.send_report(DeathsReport {
                realization,
                deaths: self.deaths(),
            });
        }

        if let Some(checkpoint) = checkpoint_index(day) {
            let sums = &mut self.get_data_mut(OutputPlugin).checkpoint_sums[checkpoint];
            for (sum, value) in sums.iter_mut().zip(detected) {
                *sum += value;
            }
        }
    }

    fn calibration_table(&self) -> Vec<Vec<f64>> {
        let Some(data) = self.try_get_data(OutputPlugin) else {
            return Vec::new();
        };
        let count = f64::from(data.realizations_recorded.max(1));
        data.checkpoint_sums
            .iter()
            .map(|row| row.iter().map(|sum| sum / count).collect())
            .collect()
    }

    fn write_calibration_report(&mut self) -> Result<(), SirLaborError> {
        let table = self.calibration_table();
        for (checkpoint, row) in table.iter().enumerate() {
            for (unit, &mean_cumulative_detected) in row.iter().enumerate() {
                self.send_report(CalibrationReport {
                    checkpoint,
                    day: checkpoint_day(checkpoint),
                    unit,
                    mean_cumulative_detected,
                });
            }
        }
        info!("wrote calibration table over {} checkpoints", table.len());
        self.flush_reports()
    }

    fn write_outcome_report(&self, outcome: &CalibrationOutcome) {
        let parameters = self.parameters();
        self.send_report(OutcomeReport {
            transmission_rate: parameters.transmission_rate,
            isolation_probability: parameters.isolation_probability,
            strict_confinement_factor: parameters.strict_confinement_factor,
            survival_probability: parameters.survival_probability,
            detection_estimate: outcome.detection_estimate,
            nse_cumulative_by_unit: outcome.nse_cumulative_by_unit,
            nse_incremental_by_unit: outcome.nse_incremental_by_unit,
            nse_regional_increments: outcome.nse_regional_increments,
        });
    }
}
