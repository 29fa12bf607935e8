use super::defaults::DefaultsConfig;
use super::file::FileConfig;
use super::models::{ShiftJob, SliceJob, StackJob, TwistJob};
use crate::cli::{JobArgs, ShiftArgs, SliceArgs, StackArgs, SupercellsArg, TwistArgs, ZoneArg};
use crate::error::{CliError, Result};
use clap::ValueEnum;
use multishifter::core::models::lattice::Lattice;
use multishifter::core::models::structure::{Site, Structure};
use multishifter::engine::config::{
    ConfigError, MatchConfig, ShiftConfigBuilder, SliceConfigBuilder, TwistConfigBuilder,
};
use multishifter::engine::error::EngineError;
use nalgebra::{Matrix3, Point3, Vector3};
use std::str::FromStr;
use tracing::debug;

pub fn build_slice_job(args: &SliceArgs) -> Result<SliceJob> {
    let file_config = load_job_file(&args.job)?;
    let structure = build_structure(&file_config)?;
    let slice_file = file_config.slice.unwrap_or_default();

    let miller = match (&args.miller, slice_file.miller) {
        (Some(cli), _) => match cli.as_slice() {
            [h, k, l] => Vector3::new(*h, *k, *l),
            _ => {
                return Err(CliError::Argument(format!(
                    "--miller takes exactly three indices, got {}",
                    cli.len()
                )));
            }
        },
        (None, Some([h, k, l])) => Vector3::new(h, k, l),
        (None, None) => {
            return Err(CliError::Config(
                "A Miller plane is required: pass `--miller H K L` or set `slice.miller`.".to_string(),
            ));
        }
    };

    let mut builder = SliceConfigBuilder::new();
    if let Some(entry) = slice_file.max_unimodular_entry {
        builder = builder.max_unimodular_entry(entry);
    }
    if let Some(rounds) = slice_file.max_reduction_rounds {
        builder = builder.max_reduction_rounds(rounds);
    }
    if let Some(tolerance) = slice_file.normal_tolerance {
        builder = builder.normal_tolerance(tolerance);
    }

    Ok(SliceJob {
        structure,
        miller,
        config: builder.build().map_err(config_error)?,
        output: args.job.output.clone(),
    })
}

pub fn build_stack_job(args: &StackArgs) -> Result<StackJob> {
    let defaults = DefaultsConfig::default();
    let file_config = load_job_file(&args.job)?;
    let structure = build_structure(&file_config)?;

    let stacks = args
        .stacks
        .or(file_config.stack.and_then(|s| s.stacks))
        .unwrap_or(defaults.stacks);

    Ok(StackJob {
        structure,
        stacks,
        output: args.job.output.clone(),
    })
}

pub fn build_shift_job(args: &ShiftArgs) -> Result<ShiftJob> {
    let defaults = DefaultsConfig::default();
    let mut file_config = load_job_file(&args.job)?;
    let structure = build_structure(&file_config)?;
    let shift_file = file_config.shift.take().unwrap_or_default();

    let config = ShiftConfigBuilder::new()
        .a_max(args.a_max.or(shift_file.a_max).unwrap_or(defaults.a_max))
        .b_max(args.b_max.or(shift_file.b_max).unwrap_or(defaults.b_max))
        .cleavage_values(
            args.cleavage
                .clone()
                .or(shift_file.cleavage)
                .unwrap_or(defaults.cleavage),
        )
        .build()
        .map_err(config_error)?;

    let match_file = file_config.matching.take().unwrap_or_default();
    let mut match_config = MatchConfig::default();
    if let Some(tolerance) = match_file.site_tolerance {
        match_config.site_tolerance = tolerance;
    }
    if let Some(operations) = match_file.point_operations {
        match_config.point_operations = operations
            .iter()
            .map(|rows| Matrix3::from_fn(|i, j| rows[i][j]))
            .collect();
    }

    Ok(ShiftJob {
        structure,
        config,
        match_config,
        output: args.job.output.clone(),
    })
}

pub fn build_twist_job(args: &TwistArgs) -> Result<TwistJob> {
    let defaults = DefaultsConfig::default();
    let file_config = load_job_file(&args.job)?;
    let structure = build_structure(&file_config)?;
    let twist_file = file_config.twist.unwrap_or_default();

    let degrees = args.angle.or(twist_file.angle).ok_or_else(|| {
        CliError::Config("A twist angle is required: pass `--angle` or set `twist.angle`.".to_string())
    })?;
    let zones = args.zone.or(twist_file.zone).unwrap_or(defaults.zone).zones();
    let selection = args
        .supercells
        .map(Into::into)
        .or(twist_file.supercells)
        .unwrap_or(defaults.supercells);

    let mut builder = TwistConfigBuilder::new();
    if let Some(&zone) = zones.first() {
        builder = builder.zone(zone);
    }
    if let Some(entry) = twist_file.max_transformation_entry {
        builder = builder.max_transformation_entry(entry);
    }
    if let Some(radius) = twist_file.candidate_radius {
        builder = builder.candidate_radius(radius);
    }
    if let Some(tolerance) = twist_file.commensurability_tolerance {
        builder = builder.commensurability_tolerance(tolerance);
    }
    if let Some(sites) = args.max_lattice_sites.or(twist_file.max_lattice_sites) {
        builder = builder.max_lattice_sites(sites);
    }
    if let Some(tolerance) = args.error_tolerance.or(twist_file.error_tolerance) {
        builder = builder.error_tolerance(tolerance);
    }

    Ok(TwistJob {
        structure,
        degrees,
        zones,
        selection,
        config: builder.build().map_err(config_error)?,
        output: args.job.output.clone(),
    })
}

fn load_job_file(job: &JobArgs) -> Result<FileConfig> {
    let file_config = FileConfig::from_file(&job.input)?;
    apply_set_values(file_config, &job.set_values)
}

/// The structure described by `[lattice]` and `[[sites]]`.
pub fn build_structure(file_config: &FileConfig) -> Result<Structure> {
    let lattice_file = file_config
        .lattice
        .ok_or_else(|| CliError::Config("The job file requires a `[lattice]` section.".to_string()))?;
    let lattice = Lattice::from_vectors(
        &Vector3::from(lattice_file.a),
        &Vector3::from(lattice_file.b),
        &Vector3::from(lattice_file.c),
    )
    .map_err(EngineError::from)?;

    let sites = file_config
        .sites
        .iter()
        .map(|site| Site::new(site.label.clone(), Point3::from(site.cartesian)))
        .collect::<Vec<_>>();
    debug!(sites = sites.len(), "Built input structure.");
    Ok(Structure::new(lattice, sites))
}

fn config_error(e: ConfigError) -> CliError {
    CliError::Config(e.to_string())
}

fn parse_value<T: FromStr>(key: &str, value: &str, kind: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| CliError::Config(format!("Invalid {} value for {}: {}", kind, key, value)))
}

fn parse_enum<T: ValueEnum>(key: &str, value: &str) -> Result<T> {
    <T as ValueEnum>::from_str(value, true)
        .map_err(|_| CliError::Config(format!("Invalid choice for {}: {}", key, value)))
}

fn apply_set_values(mut config: FileConfig, set_values: &[String]) -> Result<FileConfig> {
    for kv_pair in set_values {
        let Some((key, value)) = kv_pair.split_once('=') else {
            return Err(CliError::Config(format!(
                "Invalid --set format: '{}'. Expected KEY=VALUE.",
                kv_pair
            )));
        };

        match key {
            "slice.max-unimodular-entry" => {
                config.slice.get_or_insert_with(Default::default).max_unimodular_entry =
                    Some(parse_value(key, value, "integer")?);
            }
            "slice.max-reduction-rounds" => {
                config.slice.get_or_insert_with(Default::default).max_reduction_rounds =
                    Some(parse_value(key, value, "integer")?);
            }
            "slice.normal-tolerance" => {
                config.slice.get_or_insert_with(Default::default).normal_tolerance = Some(parse_value(key, value, "float")?);
            }
            "stack.stacks" => {
                config.stack.get_or_insert_with(Default::default).stacks = Some(parse_value(key, value, "integer")?);
            }
            "shift.a-max" => {
                config.shift.get_or_insert_with(Default::default).a_max = Some(parse_value(key, value, "integer")?);
            }
            "shift.b-max" => {
                config.shift.get_or_insert_with(Default::default).b_max = Some(parse_value(key, value, "integer")?);
            }
            "twist.angle" => {
                config.twist.get_or_insert_with(Default::default).angle = Some(parse_value(key, value, "float")?);
            }
            "twist.zone" => {
                config.twist.get_or_insert_with(Default::default).zone = Some(parse_enum::<ZoneArg>(key, value)?);
            }
            "twist.supercells" => {
                config.twist.get_or_insert_with(Default::default).supercells =
                    Some(parse_enum::<SupercellsArg>(key, value)?.into());
            }
            "twist.max-transformation-entry" => {
                config.twist.get_or_insert_with(Default::default).max_transformation_entry =
                    Some(parse_value(key, value, "integer")?);
            }
            "twist.candidate-radius" => {
                config.twist.get_or_insert_with(Default::default).candidate_radius =
                    Some(parse_value(key, value, "integer")?);
            }
            "twist.commensurability-tolerance" => {
                config.twist.get_or_insert_with(Default::default).commensurability_tolerance =
                    Some(parse_value(key, value, "float")?);
            }
            "twist.max-lattice-sites" => {
                config.twist.get_or_insert_with(Default::default).max_lattice_sites =
                    Some(parse_value(key, value, "integer")?);
            }
            "twist.error-tolerance" => {
                config.twist.get_or_insert_with(Default::default).error_tolerance =
                    Some(parse_value(key, value, "float")?);
            }
            "match.site-tolerance" => {
                config.matching.get_or_insert_with(Default::default).site_tolerance =
                    Some(parse_value(key, value, "float")?);
            }
            _ => {
                return Err(CliError::Config(format!(
                    "Unsupported configuration key for --set: '{}'",
                    key
                )));
            }
        }
    }
    Ok(config)
}
