//! Goodness-of-fit of the simulated detected-case checkpoints against observed series.
use std::path::Path;

use crate::error::SirLaborError;

/// Weekly checkpoints on days 6, 13, ..., 153.
pub const CHECKPOINTS: usize = 22;
const FIRST_CHECKPOINT_DAY: u32 = 6;

/// Reported instead of a detection estimate when the simulation undershoots the observations.
pub const INVALID_DETECTION_ESTIMATE: f64 = 999.0;

/// The checkpoint index of `day`, if it is a checkpoint day.
pub fn checkpoint_index(day: u32) -> Option<usize> {
    if day < FIRST_CHECKPOINT_DAY || (day - FIRST_CHECKPOINT_DAY) % 7 != 0 {
        return None;
    }
    let index = ((day - FIRST_CHECKPOINT_DAY) / 7) as usize;
    (index < CHECKPOINTS).then_some(index)
}

#[allow(clippy::cast_possible_truncation)]
pub fn checkpoint_day(index: usize) -> u32 {
    FIRST_CHECKPOINT_DAY + 7 * index as u32
}

/// Least-squares slope through the origin of `observed` on `simulated`. `None` when the last
/// simulated value does not exceed the last observed one, or the simulated series is all zero.
pub fn estimate_detection_rate(simulated: &[f64], observed: &[f64]) -> Option<f64> {
    let (last_simulated, last_observed) = (simulated.last()?, observed.last()?);
    if last_simulated <= last_observed {
        return None;
    }
    let cross: f64 = simulated.iter().zip(observed).map(|(x, y)| x * y).sum();
    let squares: f64 = simulated.iter().map(|x| x * x).sum();
    (squares > 0.0).then(|| cross / squares)
}

/// Nash-Sutcliffe efficiency: `1 - sum((O - S)^2) / sum((O - mean(O))^2)`. Lies in
/// `(-inf, 1]`; a constant observed series yields NaN or -inf.
pub fn nash_sutcliffe(simulated: &[f64], observed: &[f64]) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    let mean = observed.iter().sum::<f64>() / observed.len() as f64;
    let error: f64 = observed
        .iter()
        .zip(simulated)
        .map(|(o, s)| (o - s).powi(2))
        .sum();
    let variance: f64 = observed.iter().map(|o| (o - mean).powi(2)).sum();
    1.0 - error / variance
}

fn increments(rows: &[Vec<f64>]) -> Vec<f64> {
    rows.windows(2)
        .flat_map(|pair| pair[1].iter().zip(&pair[0]).map(|(next, prev)| next - prev))
        .collect()
}

/// Share of the total growth that happens between consecutive checkpoints.
fn increment_distribution(series: &[f64]) -> Vec<f64> {
    let (Some(first), Some(last)) = (series.first(), series.last()) else {
        return Vec::new();
    };
    let total = last - first;
    series
        .windows(2)
        .map(|pair| (pair[1] - pair[0]) / total)
        .collect()
}

fn check_shape(table: &[Vec<f64>], units: usize, name: &str) -> Result<(), SirLaborError> {
    if table.len() != CHECKPOINTS || table.iter().any(|row| row.len() != units) {
        return Err(SirLaborError::InputError(format!(
            "{name} must have {CHECKPOINTS} rows of {units} values"
        )));
    }
    Ok(())
}

#[derive(Clone, Debug, PartialEq)]
pub struct CalibrationOutcome {
    /// [`INVALID_DETECTION_ESTIMATE`] when no valid estimate exists.
    pub detection_estimate: f64,
    pub nse_cumulative_by_unit: f64,
    pub nse_incremental_by_unit: f64,
    pub nse_regional_increments: f64,
}

impl CalibrationOutcome {
    /// Scores the averaged checkpoint table (checkpoints by units) against the observed
    /// regional series and the observed table by unit. The simulated table is scaled by the
    /// detection estimate, or left as is when the estimate is invalid.
    ///
    /// # Errors
    /// Returns `InputError` if the shapes don't match.
    pub fn evaluate(
        table: &[Vec<f64>],
        observed_regional: &[f64],
        observed_units: &[Vec<f64>],
    ) -> Result<CalibrationOutcome, SirLaborError> {
        let units = table.first().map_or(0, Vec::len);
        check_shape(table, units, "simulated checkpoint table")?;
        check_shape(observed_units, units, "observed checkpoint table")?;
        if observed_regional.len() != CHECKPOINTS {
            return Err(SirLaborError::InputError(format!(
                "observed regional series must have {CHECKPOINTS} values, got {}",
                observed_regional.len()
            )));
        }

        let regional: Vec<f64> = table.iter().map(|row| row.iter().sum()).collect();
        let estimate = estimate_detection_rate(&regional, observed_regional);
        let scale = estimate.unwrap_or(1.0);
        let scaled: Vec<Vec<f64>> = table
            .iter()
            .map(|row| row.iter().map(|value| value * scale).collect())
            .collect();

        let flat = |rows: &[Vec<f64>]| rows.iter().flatten().copied().collect::<Vec<f64>>();
        Ok(CalibrationOutcome {
            detection_estimate: estimate.unwrap_or(INVALID_DETECTION_ESTIMATE),
            nse_cumulative_by_unit: nash_sutcliffe(&flat(&scaled), &flat(observed_units)),
            nse_incremental_by_unit: nash_sutcliffe(
                &increments(&scaled),
                &increments(observed_units),
            ),
            nse_regional_increments: nash_sutcliffe(
                &increment_distribution(&regional),
                &increment_distribution(observed_regional),
            ),
        })
    }
}

fn read_rows(path: &Path) -> Result<Vec<Vec<f64>>, SirLaborError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .trim(csv::Trim::All)
        .from_path(path)?;
    let mut rows = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record?;
        let row = record
            .iter()
            .map(|field| {
                field.parse::<f64>().map_err(|_| {
                    SirLaborError::InputError(format!(
                        "{} line {}: '{field}' is not a number",
                        path.display(),
                        line + 1
                    ))
                })
            })
            .collect::<Result<Vec<f64>, _>>()?;
        rows.push(row);
    }
    Ok(rows)
}

/// Reads a headerless series with one value per line.
///
/// # Errors
/// Returns an error if the file can't be read or holds a non-numeric field.
pub fn read_series(path: &Path) -> Result<Vec<f64>, SirLaborError> {
    Ok(read_rows(path)?.into_iter().flatten().collect())
}

/// Reads a headerless table with one row per checkpoint.
///
/// # Errors
/// Returns an error if the file can't be read or holds a non-numeric field.
pub fn read_table(path: &Path) -> Result<Vec<Vec<f64>>, SirLaborError> {
    read_rows(path)
}
