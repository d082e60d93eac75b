//! Run parameters, read from a JSON document and stored as a global property.
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::calendar::Calendar;
use crate::context::Context;
use crate::define_global_property;
use crate::error::SirLaborError;
use crate::global_properties::ContextGlobalPropertiesExt;
use crate::policy::Scenario;

/// Initial infections per spatial unit on day 0 of the historical outbreak.
const HISTORICAL_SEEDS: [u32; 51] = [
    1, 1, 1, 0, 0, 1, 1, 0, 0, 1, 0, 1, 0, 1, 0, 1, 0, 0, 0, 1, 0, 1, 0, 1, 0, 1, 0, 0, 0, 1, 0, 0,
    3, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1,
];

fn default_non_strict_confinement_factor() -> f64 {
    0.56
}
fn default_detection_probability() -> f64 {
    1.0
}
fn default_survival_probability() -> f64 {
    0.996
}
fn default_time_fraction() -> f64 {
    6.0 / 24.0
}
fn default_peripheral_population_floor() -> usize {
    10530
}
fn default_first_peripheral_unit() -> usize {
    32
}
fn default_last_realization() -> u32 {
    1
}
fn default_max_days() -> u32 {
    154
}
fn default_agent_weight() -> f64 {
    15.0
}
fn default_detection_day() -> u32 {
    6
}
fn default_recovery_day() -> u32 {
    13
}
fn default_initial_infections() -> Vec<u32> {
    HISTORICAL_SEEDS.to_vec()
}
fn default_deaths_checkpoint_day() -> u32 {
    151
}
fn default_true() -> bool {
    true
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Parameters {
    /// B: combined contact and per-contact infection rate.
    pub transmission_rate: f64,
    /// pA: probability that a case isolates on its detection day.
    pub isolation_probability: f64,
    /// Ks: contact multiplier for area-and-sector and age confinement.
    pub strict_confinement_factor: f64,
    /// Kns: contact multiplier for area-only and sector-only confinement.
    #[serde(default = "default_non_strict_confinement_factor")]
    pub non_strict_confinement_factor: f64,
    /// pD
    #[serde(default = "default_detection_probability")]
    pub detection_probability: f64,
    /// q
    #[serde(default = "default_survival_probability")]
    pub survival_probability: f64,
    /// Time fraction of the first two contact rounds.
    #[serde(default = "default_time_fraction")]
    pub morning_time_fraction: f64,
    /// Time fraction of the third round at the start of each realization.
    #[serde(default = "default_time_fraction")]
    pub evening_time_fraction: f64,
    /// Nm: lower bound on the contact denominator of peripheral units.
    #[serde(default = "default_peripheral_population_floor")]
    pub peripheral_population_floor: usize,
    #[serde(default = "default_first_peripheral_unit")]
    pub first_peripheral_unit: usize,
    #[serde(default = "default_scenario")]
    pub scenario: Scenario,
    /// Replaces the scenario's bundled schedule.
    #[serde(default)]
    pub schedule_file: Option<PathBuf>,
    #[serde(default)]
    pub first_realization: u32,
    /// Exclusive.
    #[serde(default = "default_last_realization")]
    pub last_realization: u32,
    #[serde(default = "default_max_days")]
    pub max_days: u32,
    /// Number of people each agent stands for in detected and death counts.
    #[serde(default = "default_agent_weight")]
    pub agent_weight: f64,
    #[serde(default = "default_detection_day")]
    pub detection_day: u32,
    #[serde(default = "default_recovery_day")]
    pub recovery_day: u32,
    #[serde(default = "default_initial_infections")]
    pub initial_infections: Vec<u32>,
    #[serde(default)]
    pub calendar: Calendar,
    pub sector_table: PathBuf,
    pub cohort_table: PathBuf,
    #[serde(default = "default_deaths_checkpoint_day")]
    pub deaths_checkpoint_day: u32,
    #[serde(default = "default_true")]
    pub write_cohort_distribution: bool,
    /// Observed regional cumulative detected cases at the weekly checkpoints.
    #[serde(default)]
    pub observed_regional_file: Option<PathBuf>,
    /// Observed cumulative detected cases by unit at the weekly checkpoints.
    #[serde(default)]
    pub observed_unit_file: Option<PathBuf>,
}

fn default_scenario() -> Scenario {
    Scenario::Historical
}

fn probability(name: &str, value: f64) -> Result<(), SirLaborError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(SirLaborError::ConfigError(format!(
            "{name} must lie in [0, 1], got {value}"
        )))
    }
}

fn validate_parameters(parameters: &Parameters) -> Result<(), SirLaborError> {
    probability("isolation_probability", parameters.isolation_probability)?;
    probability("detection_probability", parameters.detection_probability)?;
    probability("survival_probability", parameters.survival_probability)?;
    probability(
        "strict_confinement_factor",
        parameters.strict_confinement_factor,
    )?;
    probability(
        "non_strict_confinement_factor",
        parameters.non_strict_confinement_factor,
    )?;
    probability("morning_time_fraction", parameters.morning_time_fraction)?;
    probability("evening_time_fraction", parameters.evening_time_fraction)?;
    if parameters.transmission_rate.is_nan() || parameters.transmission_rate < 0.0 {
        return Err(SirLaborError::ConfigError(format!(
            "transmission_rate must be non-negative, got {}",
            parameters.transmission_rate
        )));
    }
    if parameters.first_realization >= parameters.last_realization {
        return Err(SirLaborError::ConfigError(format!(
            "first_realization ({}) must be below last_realization ({})",
            parameters.first_realization, parameters.last_realization
        )));
    }
    if parameters.max_days == 0 {
        return Err(SirLaborError::ConfigError(
            "max_days must be positive".to_string(),
        ));
    }
    if parameters.detection_day >= parameters.recovery_day {
        return Err(SirLaborError::ConfigError(format!(
            "detection_day ({}) must come before recovery_day ({})",
            parameters.detection_day, parameters.recovery_day
        )));
    }
    if parameters.agent_weight.is_nan() || parameters.agent_weight <= 0.0 {
        return Err(SirLaborError::ConfigError(
            "agent_weight must be positive".to_string(),
        ));
    }
    Ok(())
}

define_global_property!(SimulationParameters, Parameters, validate_parameters);

impl Parameters {
    pub fn realizations(&self) -> u32 {
        self.last_realization - self.first_realization
    }

    /// Resolves relative input paths against `base`.
    #[must_use]
    pub fn relative_to(mut self, base: &Path) -> Parameters {
        let resolve = |path: &mut PathBuf| {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        };
        resolve(&mut self.sector_table);
        resolve(&mut self.cohort_table);
        for path in [
            &mut self.schedule_file,
            &mut self.observed_regional_file,
            &mut self.observed_unit_file,
        ]
        .into_iter()
        .flatten()
        {
            resolve(path);
        }
        self
    }
}

#[cfg(test)]
impl Parameters {
    /// Parameters for unit tests that build their population by hand.
    pub(crate) fn example(initial_infections: Vec<u32>) -> Parameters {
        Parameters {
            transmission_rate: 0.3,
            isolation_probability: 0.0,
            strict_confinement_factor: 0.1,
            non_strict_confinement_factor: default_non_strict_confinement_factor(),
            detection_probability: 0.0,
            survival_probability: 1.0,
            morning_time_fraction: default_time_fraction(),
            evening_time_fraction: default_time_fraction(),
            peripheral_population_floor: default_peripheral_population_floor(),
            first_peripheral_unit: default_first_peripheral_unit(),
            scenario: Scenario::NoIntervention,
            schedule_file: None,
            first_realization: 0,
            last_realization: 1,
            max_days: 20,
            agent_weight: default_agent_weight(),
            detection_day: default_detection_day(),
            recovery_day: default_recovery_day(),
            initial_infections,
            calendar: Calendar::default(),
            sector_table: PathBuf::new(),
            cohort_table: PathBuf::new(),
            deaths_checkpoint_day: default_deaths_checkpoint_day(),
            write_cohort_distribution: false,
            observed_regional_file: None,
            observed_unit_file: None,
        }
    }
}

pub trait ContextParametersExt {
    /// # Panics
    /// Panics if the parameters were never set.
    fn parameters(&self) -> &Parameters;
}

impl ContextParametersExt for Context {
    fn parameters(&self) -> &Parameters {
        self.get_global_property_value(SimulationParameters)
            .expect("simulation parameters are not set")
    }
}

/// Reads the JSON configuration at `path`, applies the scenario override, and stores the result.
/// Relative table paths are taken relative to the configuration file.
///
/// # Errors
/// Returns an error if the file can't be read, doesn't parse, or fails validation.
pub fn init_parameters(
    context: &mut Context,
    path: &Path,
    scenario: Option<Scenario>,
) -> Result<(), SirLaborError> {
    let mut parameters = context.load_parameters_from_json::<Parameters>(path)?;
    if let Some(scenario) = scenario {
        parameters.scenario = scenario;
    }
    let base = path.parent().unwrap_or_else(|| Path::new("."));
    context.set_global_property_value(SimulationParameters, parameters.relative_to(base))
}
