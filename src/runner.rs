use std::path::PathBuf;

use clap::{Args, Command, FromArgMatches as _};
use log::info;

use crate::context::Context;
use crate::driver::run_simulation;
use crate::error::SirLaborError;
use crate::log::apply_log_spec;
use crate::parameters::init_parameters;
use crate::policy::Scenario;
use crate::report::ContextReportExt;

/// Command line arguments of the simulator
#[derive(Args, Debug)]
pub struct BaseArgs {
    /// Random seed; realization r uses seed + r
    #[arg(short, long, default_value = "0")]
    pub random_seed: u64,

    /// Path to the JSON parameters file
    #[arg(short, long)]
    pub config: PathBuf,

    /// Directory for report output
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Prefix for report file names
    #[arg(long, default_value = "")]
    pub file_prefix: String,

    /// Overwrite existing report files
    #[arg(short, long)]
    pub force_overwrite: bool,

    /// Log filter, e.g. `info` or `sirlabor::policy=trace,info`
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// Overrides the scenario named in the parameters file
    #[arg(short, long, value_enum)]
    pub scenario: Option<Scenario>,
}

fn create_cli() -> Command {
    let cli = Command::new("sirlabor")
        .about("Joint simulation of epidemic spread and labor participation under lockdowns");
    BaseArgs::augment_args(cli)
}

/// Parses the process arguments and runs the simulation they describe.
///
/// # Errors
/// Returns an error if the arguments don't parse or the simulation fails.
pub fn run_with_args() -> Result<Context, SirLaborError> {
    let matches = create_cli().get_matches();
    let args = BaseArgs::from_arg_matches(&matches)
        .map_err(|err| SirLaborError::ConfigError(err.to_string()))?;
    run_with_args_internal(args)
}

/// Runs the simulation described by `args` and returns the finished context.
///
/// # Errors
/// Returns an error if the parameters, inputs or reports can't be set up, or a realization
/// fails.
pub fn run_with_args_internal(args: BaseArgs) -> Result<Context, SirLaborError> {
    if let Some(spec) = &args.log_level {
        apply_log_spec(spec)?;
    }

    let mut context = Context::new();
    info!("loading parameters from {}", args.config.display());
    init_parameters(&mut context, &args.config, args.scenario)?;

    let report_config = context.report_options();
    if let Some(output_dir) = args.output_dir {
        report_config.directory(output_dir);
    }
    report_config
        .file_prefix(args.file_prefix)
        .overwrite(args.force_overwrite);

    run_simulation(&mut context, args.random_seed)?;
    Ok(context)
}
