use crate::cli::TwistArgs;
use crate::config::builder;
use crate::error::Result;
use crate::report::{self, LatticeReport, TwistReport, ZoneReport};
use crate::utils::progress::CliProgressHandler;
use multishifter::engine::config::Layer;
use multishifter::engine::progress::ProgressReporter;
use multishifter::workflows::twist::MoireStructureGenerator;
use tracing::{info, warn};

pub fn run(args: TwistArgs, progress_handler: &CliProgressHandler) -> Result<()> {
    let job = builder::build_twist_job(&args)?;
    info!(
        degrees = job.degrees,
        max_lattice_sites = job.config.max_lattice_sites,
        selection = %job.selection,
        "Twisting slab from {:?}",
        &args.job.input
    );

    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());
    let generator = MoireStructureGenerator::new(&job.structure, job.degrees, &job.config, &reporter)?;
    let approximator = generator.approximator();

    let mut zones = Vec::with_capacity(job.zones.len());
    for &zone in &job.zones {
        let reports = generator.reports(zone, job.selection)?;
        if reports.is_empty() {
            warn!(%zone, "No approximant was selected.");
        }
        for report in &reports {
            info!(
                %zone,
                size = report.size,
                bilayer_sites = report.bilayer.len(),
                aligned_strain = report.layer(Layer::Aligned).deformation.strain_error(),
                rotated_strain = report.layer(Layer::Rotated).deformation.strain_error(),
                "Selected approximant."
            );
        }
        zones.push(ZoneReport::new(approximator, zone, &reports));
    }

    let moire = approximator.moire();
    let report = TwistReport {
        degrees: job.degrees,
        supercells: job.selection,
        max_lattice_sites: job.config.max_lattice_sites,
        aligned_lattice: LatticeReport::from(moire.aligned_lattice()),
        rotated_lattice: LatticeReport::from(moire.rotated_lattice()),
        zones,
    };
    report::write_report(&report, job.output.as_deref())
}
