//! Builds the population from the sector-probability table and the cohort table.
//!
//! Both tables are CSV files whose first row names the columns. Columns are read by position.
use std::fs::File;
use std::io::Read;
use std::path::Path;

use log::{debug, info};
use serde::Deserialize;

use crate::agent::{
    ActivityClass, Agent, CommuteClass, Employer, Job, Shift, RETAIL_SECTOR, SECTOR_COUNT,
};
use crate::error::SirLaborError;
use crate::population::Population;
use crate::spatial_unit::SpatialUnit;

/// Sectors whose baseline participation comes from the sector table, in column order.
const TABLE_SECTORS: [u8; 11] = [3, 4, 7, 8, 9, 10, 13, 14, 17, 18, 19];
/// Sectors that keep working under any confinement.
const ESSENTIAL_SECTORS: [u8; 5] = [1, 2, 5, 11, 15];
const SECTOR_TABLE_COLUMNS: usize = TABLE_SECTORS.len() + 2;

#[derive(Deserialize, Debug)]
struct CohortRecord {
    count: f64,
    residence_unit: f64,
    commute: f64,
    activity: f64,
    cohort: f64,
    age_band: f64,
    education: f64,
    // Rows of people without a job stop after the education column.
    #[serde(default)]
    shift: Option<f64>,
    #[serde(default)]
    category: Option<f64>,
    #[serde(default)]
    sector: Option<f64>,
    #[serde(default)]
    telework: Option<f64>,
    #[serde(default)]
    employer: Option<f64>,
    #[serde(default)]
    workplace_unit: Option<f64>,
    #[serde(default)]
    person_id: Option<String>,
    #[serde(default)]
    wage: Option<f64>,
    #[serde(default)]
    formal: Option<f64>,
}

fn input_error(line: u64, message: &str) -> SirLaborError {
    SirLaborError::InputError(format!("line {line}: {message}"))
}

/// A non-negative integral value stored in a numeric column.
fn whole(value: f64, field: &str, line: u64) -> Result<u32, SirLaborError> {
    if value < 0.0 || value.fract() != 0.0 || value > f64::from(u32::MAX) {
        return Err(input_error(
            line,
            &format!("{field} must be a non-negative integer, got {value}"),
        ));
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    Ok(value as u32)
}

fn small_code(value: f64, field: &str, line: u64) -> Result<u8, SirLaborError> {
    u8::try_from(whole(value, field, line)?)
        .map_err(|_| input_error(line, &format!("{field} code {value} out of range")))
}

fn coded<T: TryFrom<u8, Error = SirLaborError>>(
    value: f64,
    field: &str,
    line: u64,
) -> Result<T, SirLaborError> {
    T::try_from(small_code(value, field, line)?).map_err(|e| match e {
        SirLaborError::InputError(message) => input_error(line, &message),
        other => other,
    })
}

fn required(value: Option<f64>, field: &str, line: u64) -> Result<f64, SirLaborError> {
    value.ok_or_else(|| input_error(line, &format!("employed cohort is missing {field}")))
}

/// Expands the eleven table columns into the participation vector indexed by `sector - 1`.
fn sector_vector(columns: &[f64]) -> [f64; SECTOR_COUNT] {
    let mut vector = [0.0; SECTOR_COUNT];
    for sector in ESSENTIAL_SECTORS {
        vector[usize::from(sector) - 1] = 1.0;
    }
    for (sector, value) in TABLE_SECTORS.iter().zip(columns) {
        vector[usize::from(*sector) - 1] = *value;
    }
    vector
}

/// Reads one spatial unit per row.
///
/// # Errors
/// Returns `InputError` if a row is short, out of order, or holds a probability outside [0, 1].
pub fn read_sector_table<R: Read>(source: R) -> Result<Vec<SpatialUnit>, SirLaborError> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(source);
    let mut units = Vec::new();
    for (index, result) in reader.records().enumerate() {
        let record = result?;
        let line = record.position().map_or(0, csv::Position::line);
        let values: Vec<f64> = record.deserialize(None)?;
        if values.len() < SECTOR_TABLE_COLUMNS {
            return Err(input_error(
                line,
                &format!(
                    "expected {SECTOR_TABLE_COLUMNS} columns, found {}",
                    values.len()
                ),
            ));
        }
        let id = whole(values[0], "unit id", line)? as usize;
        if id != index {
            return Err(input_error(
                line,
                &format!("unit id {id} found where {index} was expected"),
            ));
        }
        let probabilities = &values[1..SECTOR_TABLE_COLUMNS];
        if probabilities.iter().any(|p| !(0.0..=1.0).contains(p)) {
            return Err(input_error(line, "participation probabilities must lie in [0, 1]"));
        }
        units.push(SpatialUnit::new(
            id,
            sector_vector(&probabilities[..TABLE_SECTORS.len()]),
            probabilities[TABLE_SECTORS.len()],
        ));
    }
    debug!("read {} spatial units", units.len());
    Ok(units)
}

fn job_from_record(
    record: &CohortRecord,
    commute: CommuteClass,
    line: u64,
) -> Result<Job, SirLaborError> {
    let sector = small_code(required(record.sector, "sector", line)?, "sector", line)?;
    if !(1..=SECTOR_COUNT).contains(&usize::from(sector)) {
        return Err(input_error(line, &format!("sector {sector} outside 1..=21")));
    }
    let workplace_unit = record
        .workplace_unit
        .map(|unit| whole(unit, "workplace unit", line).map(|unit| unit as usize))
        .transpose()?;
    if commute.has_replica() && workplace_unit.is_none() {
        return Err(input_error(line, "commuter without a workplace unit"));
    }

    Ok(Job {
        shift: coded(required(record.shift, "shift", line)?, "shift", line)?,
        category: small_code(
            required(record.category, "job category", line)?,
            "job category",
            line,
        )?,
        sector,
        telework: required(record.telework, "telework", line)? != 0.0,
        employer: coded(required(record.employer, "employer", line)?, "employer", line)?,
        workplace_unit,
        person_id: record.person_id.clone().unwrap_or_default(),
        wage: record.wage.unwrap_or(0.0),
        formal: record.formal.is_some_and(|flag| flag != 0.0),
    })
}

/// Expands each cohort row into `count` residents and attaches replicas for commuters.
///
/// # Errors
/// Returns `InputError` on unknown codes, out-of-range units, or employed rows without job data.
pub fn read_cohort_table<R: Read>(
    population: &mut Population,
    source: R,
) -> Result<(), SirLaborError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(source);
    let num_units = population.num_units();

    for result in reader.records() {
        let record = result?;
        let line = record.position().map_or(0, csv::Position::line);
        let row: CohortRecord = record.deserialize(None)?;

        let residence = whole(row.residence_unit, "residence unit", line)? as usize;
        if residence >= num_units {
            return Err(input_error(
                line,
                &format!("residence unit {residence} out of range (have {num_units})"),
            ));
        }
        let commute: CommuteClass = coded(row.commute, "commute class", line)?;
        let activity: ActivityClass = coded(row.activity, "activity class", line)?;
        let job = if activity == ActivityClass::Employed {
            Some(job_from_record(&row, commute, line)?)
        } else {
            None
        };
        if let Some(unit) = job.as_ref().and_then(|job| job.workplace_unit) {
            if commute.has_replica() && unit >= num_units {
                return Err(input_error(
                    line,
                    &format!("workplace unit {unit} out of range (have {num_units})"),
                ));
            }
        }

        let mut template = Agent::new_resident(
            residence,
            commute,
            activity,
            whole(row.cohort, "cohort id", line)?,
            small_code(row.age_band, "age band", line)?,
            small_code(row.education, "education band", line)?,
        );
        template.retail_participation = job
            .as_ref()
            .filter(|job| {
                job.sector == RETAIL_SECTOR
                    && commute != CommuteClass::OutOfRegion
                    && job.follows_sector_rules()
            })
            .and_then(|job| job.workplace_unit.or(Some(residence)))
            .and_then(|unit| population.spatial_units().get(unit))
            .map(|unit| unit.retail_participation);
        template.job = job;

        for _ in 0..whole(row.count, "count", line)? {
            let id = population.add_resident(template.clone())?;
            if commute.has_replica() {
                if let Some(workplace) = template.job.as_ref().and_then(|job| job.workplace_unit) {
                    population.create_replica(id, workplace)?;
                }
            }
        }
    }
    Ok(())
}

/// Reads both tables from disk.
///
/// # Errors
/// Returns an error if either file can't be read or fails validation.
pub fn load_population(
    sector_table: &Path,
    cohort_table: &Path,
) -> Result<Population, SirLaborError> {
    let units = read_sector_table(File::open(sector_table)?)?;
    let mut population = Population::new(units);
    read_cohort_table(&mut population, File::open(cohort_table)?)?;
    info!(
        "loaded {} agents in {} spatial units",
        population.len(),
        population.num_units()
    );
    Ok(population)
}
