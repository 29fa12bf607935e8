use crate::cli::ShiftArgs;
use crate::config::builder;
use crate::error::Result;
use crate::report::{self, ShiftReport};
use crate::utils::progress::CliProgressHandler;
use multishifter::engine::progress::ProgressReporter;
use multishifter::workflows::shift::Shifter;
use tracing::info;

pub fn run(args: ShiftArgs, progress_handler: &CliProgressHandler) -> Result<()> {
    let job = builder::build_shift_job(&args)?;
    info!(
        a_max = job.config.a_max,
        b_max = job.config.b_max,
        point_operations = job.match_config.point_operations.len(),
        "Shifting slab from {:?}",
        &args.job.input
    );

    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());
    let shifter = Shifter::new(&job.structure, &job.config, &job.match_config.matcher(), &reporter)?;
    info!(
        classes = shifter.equivalence_map().num_classes(),
        "Shift workflow finished."
    );

    report::write_report(&ShiftReport::from(&shifter), job.output.as_deref())
}
