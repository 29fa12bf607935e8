use crate::cli::StackArgs;
use crate::config::builder;
use crate::error::Result;
use crate::report::{self, StackReport};
use multishifter::engine::tasks::slab;
use tracing::info;

pub fn run(args: StackArgs) -> Result<()> {
    let job = builder::build_stack_job(&args)?;
    info!(stacks = job.stacks, "Stacking structure from {:?}", &args.job.input);

    let stacked = slab::make_stacked_structure(&job.structure, job.stacks)?;
    let report = StackReport {
        stacks: job.stacks,
        structure: (&stacked).into(),
    };
    report::write_report(&report, job.output.as_deref())
}
