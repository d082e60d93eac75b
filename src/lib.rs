//! A metapopulation simulator of epidemic spread and labor participation under lockdowns
//!
//! The region is divided into spatial units. Every person lives in one unit and, if they
//! commute, works in another. A commuter is represented by two agents: the resident at home
//! and a replica in the workplace unit, which share health status and isolation. Each day the
//! simulation:
//! * applies the policy events scheduled for that day (curfews, area, sector and age
//!   confinements)
//! * advances the course of every infection
//! * decides who works face to face, who teleworks and who stays idle
//! * moves commuters between units across three contact rounds, and infects susceptibles in
//!   proportion to the infectious people present
//!
//! The event loop lives in [`context::Context`]: modules keep their state in data plugins and
//! extend the context with traits, such as [`population::ContextPopulationExt`] and
//! [`labor_manager::ContextLaborExt`]. Every random draw comes from a named stream seeded
//! from the run seed, so a seed reproduces a run exactly.
//!
//! Results are written as CSV reports: cohort distributions, daily mobility, cumulative
//! detected cases by unit, deaths, and a calibration table scored against observed series.
pub mod agent;
pub mod calendar;
pub mod calibration;
pub mod context;
pub mod driver;
pub mod error;
pub mod global_properties;
pub mod hashing;
pub mod infection_manager;
pub mod labor_manager;
pub mod log;
pub mod output;
pub mod parameters;
pub mod plan;
pub mod policy;
pub mod population;
pub mod population_loader;
pub mod random;
pub mod report;
pub mod runner;
pub mod spatial_unit;
pub mod transmission_manager;

pub use context::{Context, ExecutionPhase};
pub use error::SirLaborError;
pub use global_properties::ContextGlobalPropertiesExt;
pub use hashing::{HashMap, HashSet};
pub use parameters::{ContextParametersExt, Parameters};
pub use population::ContextPopulationExt;
pub use random::ContextRandomExt;
pub use report::ContextReportExt;
pub use runner::run_with_args;

// Used by `define_rng!`.
pub use paste;
pub use rand;
