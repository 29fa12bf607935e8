use crate::cli::SliceArgs;
use crate::config::builder;
use crate::error::Result;
use crate::report::{self, SliceReport};
use multishifter::workflows::slice::Slicer;
use tracing::info;

pub fn run(args: SliceArgs) -> Result<()> {
    let job = builder::build_slice_job(&args)?;
    info!(
        miller = ?job.miller,
        sites = job.structure.len(),
        "Slicing structure from {:?}",
        &args.job.input
    );

    let slicer = Slicer::new(&job.structure, &job.miller, &job.config)?;
    report::write_report(&SliceReport::from(&slicer), job.output.as_deref())
}
