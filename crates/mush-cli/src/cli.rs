use clap::{Args, Parser, Subcommand, ValueEnum};
use multishifter::engine::config::BrillouinZone;
use multishifter::workflows::twist::SupercellSelection;
use serde::Deserialize;
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    author = "MultiShifter Developers",
    version,
    about = "MultiShifter CLI - Generate sliced slabs, shifted interfaces and twisted moiré bilayers from a crystal lattice.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Set the number of threads for parallel computation.
    /// Defaults to the number of available logical cores.
    #[arg(short = 'j', long, global = true, value_name = "NUM")]
    pub threads: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Slice a structure so that its ab-plane exposes a Miller plane.
    Slice(SliceArgs),
    /// Repeat a structure along its c vector.
    Stack(StackArgs),
    /// Shift a slab over a uniform in-plane grid and classify equivalent shifts.
    Shift(ShiftArgs),
    /// Build commensurate approximants of a twisted bilayer.
    Twist(TwistArgs),
}

/// Input, output and overrides shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct JobArgs {
    /// Path to the TOML job file holding the lattice, the sites and optional settings.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub input: PathBuf,

    /// Path for the TOML report. Printed to stdout when omitted.
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Set a specific configuration value, overriding the job file.
    /// Can be used multiple times. Example: -S twist.max-lattice-sites=500
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

/// Arguments for the `slice` subcommand.
#[derive(Args, Debug)]
pub struct SliceArgs {
    #[command(flatten)]
    pub job: JobArgs,

    /// Miller indices of the plane to expose, overriding `slice.miller`.
    #[arg(short, long, num_args = 3, value_names = ["H", "K", "L"], allow_negative_numbers = true)]
    pub miller: Option<Vec<i64>>,
}

/// Arguments for the `stack` subcommand.
#[derive(Args, Debug)]
pub struct StackArgs {
    #[command(flatten)]
    pub job: JobArgs,

    /// Number of repetitions along c, overriding `stack.stacks`.
    #[arg(short = 'n', long, value_name = "INT", allow_negative_numbers = true)]
    pub stacks: Option<i64>,
}

/// Arguments for the `shift` subcommand.
#[derive(Args, Debug)]
pub struct ShiftArgs {
    #[command(flatten)]
    pub job: JobArgs,

    /// Grid density along a, overriding `shift.a-max`.
    #[arg(short = 'a', long, value_name = "INT")]
    pub a_max: Option<usize>,

    /// Grid density along b, overriding `shift.b-max`.
    #[arg(short = 'b', long, value_name = "INT")]
    pub b_max: Option<usize>,

    /// Cleavage values along the plane normal, overriding `shift.cleavage`.
    #[arg(long = "cleave", value_name = "FLOAT", num_args = 1.., allow_negative_numbers = true)]
    pub cleavage: Option<Vec<f64>>,
}

/// Brillouin zones to report for the `twist` subcommand; `both` runs each fold.
#[derive(ValueEnum, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ZoneArg {
    Aligned,
    Rotated,
    Both,
}

impl ZoneArg {
    pub fn zones(self) -> Vec<BrillouinZone> {
        match self {
            ZoneArg::Aligned => vec![BrillouinZone::Aligned],
            ZoneArg::Rotated => vec![BrillouinZone::Rotated],
            ZoneArg::Both => BrillouinZone::BOTH.to_vec(),
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupercellsArg {
    Best,
    All,
}

impl From<SupercellsArg> for SupercellSelection {
    fn from(arg: SupercellsArg) -> Self {
        match arg {
            SupercellsArg::Best => SupercellSelection::Best,
            SupercellsArg::All => SupercellSelection::All,
        }
    }
}

/// Arguments for the `twist` subcommand.
#[derive(Args, Debug)]
pub struct TwistArgs {
    #[command(flatten)]
    pub job: JobArgs,

    /// Twist angle in degrees, overriding `twist.angle`.
    #[arg(short = 'a', long, value_name = "DEGREES", allow_negative_numbers = true)]
    pub angle: Option<f64>,

    /// Brillouin zone the moiré reciprocal vectors are folded into.
    #[arg(short, long, value_enum)]
    pub zone: Option<ZoneArg>,

    /// Upper bound on bilayer lattice sites when expanding supercells; 0 disables the expansion.
    #[arg(long, value_name = "INT")]
    pub max_lattice_sites: Option<usize>,

    /// Minimum strain improvement for a larger supercell to be preferred.
    #[arg(long = "error-tol", value_name = "FLOAT")]
    pub error_tolerance: Option<f64>,

    /// Report only the best supercell per layer, or the best of every size.
    #[arg(long, value_enum)]
    pub supercells: Option<SupercellsArg>,
}
