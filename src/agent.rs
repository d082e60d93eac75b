//! Agents and the closed vocabularies describing them.
//!
//! Every person in the region is a *resident* agent indexed at its home unit. Intra- and
//! inter-city commuters also own a *workplace replica* indexed at the unit where they work; the
//! pair shares health state and at most one of them is present at any time outside of
//! movement resolution.
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

use crate::error::SirLaborError;

/// Index of an agent in the population arena.
pub type AgentId = usize;

/// Number of economic sector codes ("ramas"), numbered 1 through 21.
pub const SECTOR_COUNT: usize = 21;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter)]
pub enum HealthStatus {
    Susceptible,
    Infectious,
    Removed,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Resident,
    WorkplaceReplica,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommuteClass {
    NonCommuter,
    IntraCity,
    InterCity,
    OutOfRegion,
}

impl CommuteClass {
    /// Intra- and inter-city commuters are the ones with a workplace replica.
    pub fn has_replica(self) -> bool {
        matches!(self, CommuteClass::IntraCity | CommuteClass::InterCity)
    }
}

impl TryFrom<u8> for CommuteClass {
    type Error = SirLaborError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(CommuteClass::NonCommuter),
            1 => Ok(CommuteClass::IntraCity),
            2 => Ok(CommuteClass::InterCity),
            3 => Ok(CommuteClass::OutOfRegion),
            _ => Err(SirLaborError::InputError(format!(
                "unknown commute class code {code}"
            ))),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityClass {
    Child,
    Employed,
    Unemployed,
    Inactive,
}

impl TryFrom<u8> for ActivityClass {
    type Error = SirLaborError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(ActivityClass::Child),
            1 => Ok(ActivityClass::Employed),
            2 => Ok(ActivityClass::Unemployed),
            3 => Ok(ActivityClass::Inactive),
            _ => Err(SirLaborError::InputError(format!(
                "unknown activity class code {code}"
            ))),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfinementKind {
    None,
    Area,
    Sector,
    AreaAndSector,
    Age,
}

impl ConfinementKind {
    /// Merges `incoming` into `self`. Age confinement always wins, area and sector combine, and
    /// anything else leaves the current kind in place.
    #[must_use]
    pub fn merge(self, incoming: ConfinementKind) -> ConfinementKind {
        use ConfinementKind::{Age, Area, AreaAndSector, Sector};
        match (self, incoming) {
            (_, ConfinementKind::None) | (Age, _) => self,
            (_, Age) => Age,
            (ConfinementKind::None, kind) => kind,
            (Area, Sector) | (Sector, Area) => AreaAndSector,
            _ => self,
        }
    }

    /// The kind left once area confinement is lifted.
    #[must_use]
    pub fn without_area(self) -> ConfinementKind {
        match self {
            ConfinementKind::Area => ConfinementKind::None,
            ConfinementKind::AreaAndSector => ConfinementKind::Sector,
            kind => kind,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Isolation {
    None,
    Isolated,
    ConfinedNotMoving,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter)]
pub enum WorkMode {
    NotWorking,
    FaceToFace,
    Teleworking,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Shift {
    Full,
    Partial,
}

impl TryFrom<u8> for Shift {
    type Error = SirLaborError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(Shift::Full),
            2 => Ok(Shift::Partial),
            _ => Err(SirLaborError::InputError(format!("unknown shift code {code}"))),
        }
    }
}

/// The kind of employer: formal firm, informal firm or a private household.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Employer {
    Formal,
    Informal,
    Household,
}

impl TryFrom<u8> for Employer {
    type Error = SirLaborError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(Employer::Formal),
            2 => Ok(Employer::Informal),
            3 => Ok(Employer::Household),
            _ => Err(SirLaborError::InputError(format!(
                "unknown employer code {code}"
            ))),
        }
    }
}

/// Job category of live-in domestic workers.
pub const LIVE_IN_DOMESTIC: u8 = 6;
/// Job category whose commuters have zero participation while confined.
pub const OFF_SITE_CATEGORY: u8 = 5;
/// Sector with a dedicated participation probability under dual sector confinement.
pub const RETAIL_SECTOR: u8 = 7;

/// Job attributes, present only for employed residents.
#[derive(Clone, Debug, PartialEq)]
pub struct Job {
    pub shift: Shift,
    pub category: u8,
    pub sector: u8,
    pub telework: bool,
    pub employer: Employer,
    pub workplace_unit: Option<usize>,
    pub person_id: String,
    pub wage: f64,
    pub formal: bool,
}

impl Job {
    /// Whether sector-specific participation rules apply to this job.
    pub fn follows_sector_rules(&self) -> bool {
        self.employer != Employer::Household
            && self.category != OFF_SITE_CATEGORY
            && self.category != LIVE_IN_DOMESTIC
    }
}

#[derive(Clone, Debug)]
pub struct Agent {
    /// The unit where this instance is indexed: home for residents, workplace for replicas.
    pub unit: usize,
    pub role: Role,
    pub health: HealthStatus,
    pub commute: CommuteClass,
    pub activity: ActivityClass,
    pub present: bool,
    pub confinement: ConfinementKind,
    pub isolation: Isolation,
    pub infectious_days: u32,
    pub work_today: WorkMode,
    pub cohort: u32,
    pub age_band: u8,
    pub education: u8,
    pub job: Option<Job>,
    /// Probability of working on site while confined.
    pub participation: f64,
    /// Replaces `participation` for retail workers when both instances are sector-confined.
    pub retail_participation: Option<f64>,
    /// The paired resident or replica.
    pub twin: Option<AgentId>,
}

impl Agent {
    pub fn new_resident(
        unit: usize,
        commute: CommuteClass,
        activity: ActivityClass,
        cohort: u32,
        age_band: u8,
        education: u8,
    ) -> Agent {
        Agent {
            unit,
            role: Role::Resident,
            health: HealthStatus::Susceptible,
            commute,
            activity,
            present: true,
            confinement: ConfinementKind::None,
            isolation: Isolation::None,
            infectious_days: 0,
            work_today: WorkMode::NotWorking,
            cohort,
            age_band,
            education,
            job: None,
            participation: 0.0,
            retail_participation: None,
            twin: None,
        }
    }

    /// Builds the workplace replica of this resident. The replica carries no job of its own.
    pub fn replica_at(&self, workplace_unit: usize) -> Agent {
        Agent {
            unit: workplace_unit,
            role: Role::WorkplaceReplica,
            present: false,
            job: None,
            retail_participation: None,
            twin: None,
            ..self.clone()
        }
    }

    pub fn is_resident(&self) -> bool {
        self.role == Role::Resident
    }

    pub fn sector(&self) -> Option<u8> {
        self.job.as_ref().map(|job| job.sector)
    }

    /// The unit a resident works in, if it works inside the region.
    pub fn workplace_unit(&self) -> Option<usize> {
        let job = self.job.as_ref()?;
        match self.commute {
            CommuteClass::NonCommuter => Some(self.unit),
            CommuteClass::IntraCity | CommuteClass::InterCity => job.workplace_unit,
            CommuteClass::OutOfRegion => None,
        }
    }

    pub fn apply_confinement(&mut self, kind: ConfinementKind) {
        self.confinement = self.confinement.merge(kind);
    }

    pub fn end_area_confinement(&mut self) {
        self.confinement = self.confinement.without_area();
    }

    /// Multiplier on the contact rate while present. Replicas are at work and are never reduced.
    pub fn confinement_factor(&self, strict: f64, non_strict: f64) -> f64 {
        if !self.is_resident() {
            return 1.0;
        }
        match self.confinement {
            ConfinementKind::None => 1.0,
            ConfinementKind::AreaAndSector | ConfinementKind::Age => strict,
            ConfinementKind::Area | ConfinementKind::Sector => non_strict,
        }
    }

    /// Restores the state every realization starts from.
    pub fn reset(&mut self) {
        self.health = HealthStatus::Susceptible;
        self.confinement = ConfinementKind::None;
        self.work_today = WorkMode::NotWorking;
        self.isolation = Isolation::None;
        self.infectious_days = 0;
        self.present = self.is_resident();
    }
}
