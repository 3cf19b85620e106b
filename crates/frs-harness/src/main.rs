#![forbid(unsafe_code)]

use anyhow::{Context, Result, bail};
use frs_error::FrsError;
use frs_harness::tracing_setup::{Verbosity, init_subscriber};
use frs_harness::{
    CcBuilder, FormatterImage, HarnessConfig, Orchestrator, ProcessRunner, Scenario,
    discover_programs,
};
use frs_inject::{
    CorruptionStrategy, DEFAULT_SEED, GaussianBitflip, ImageInjector, Scratch, StrategyKind,
    UniformBitflip,
};
use frs_namespace::{ClearFileSystem, FillFileSystem, FillOptions, FsAction, HostDirFs};
use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{info, warn};

fn main() {
    match run() {
        Ok(0) => {}
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err:#}");
            let code = err
                .downcast_ref::<FrsError>()
                .map_or(1, FrsError::exit_code);
            std::process::exit(code);
        }
    }
}

fn run() -> Result<i32> {
    let mut verbose = false;
    let mut quiet = false;
    let args: Vec<String> = env::args()
        .skip(1)
        .filter(|arg| match arg.as_str() {
            "-v" | "--verbose" => {
                verbose = true;
                false
            }
            "-q" | "--quiet" => {
                quiet = true;
                false
            }
            _ => true,
        })
        .collect();
    init_subscriber(Verbosity::from_flags(verbose, quiet));

    match args.first().map(String::as_str) {
        Some("run") => run_scenario(&args[1..]),
        Some("inject") => inject(&args[1..]).map(|()| 0),
        Some("scenario") => show_scenario(&args[1..]).map(|()| 0),
        Some("fill") => fill(&args[1..]).map(|()| 0),
        Some("clear") => clear(&args[1..]).map(|()| 0),
        Some("--help" | "-h" | "help") | None => {
            print_usage();
            Ok(0)
        }
        Some(other) => {
            print_usage();
            bail!("unknown command: {other}")
        }
    }
}

/// Value following `args[index]`, parsed.
fn value<T: FromStr>(args: &[String], index: usize) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let flag = &args[index];
    let raw = args
        .get(index + 1)
        .with_context(|| format!("{flag} requires a value"))?;
    raw.parse()
        .with_context(|| format!("invalid {flag} value: {raw}"))
}

fn run_scenario(args: &[String]) -> Result<i32> {
    let mut config = match args.iter().position(|arg| arg == "--config") {
        Some(index) => {
            let path: PathBuf = value(args, index)?;
            HarnessConfig::load(&path)
                .with_context(|| format!("failed to load config {}", path.display()))?
        }
        None => HarnessConfig::default(),
    };

    let mut index = 0_usize;
    while index < args.len() {
        match args[index].as_str() {
            "--config" => {}
            "--scenario" => config.scenario = Some(value(args, index)?),
            "--tests" => config.paths.tests_folder = value(args, index)?,
            "--root" => config.paths.root_folder = value(args, index)?,
            "--image" => config.paths.image = value(args, index)?,
            "--build-dir" => config.paths.build_dir = value(args, index)?,
            "--formatter" => config.paths.formatter = Some(value(args, index)?),
            "--strategy" => config.corruption.bitflip = value(args, index)?,
            "--seed" => config.corruption.seed = value(args, index)?,
            "--scratch-width" => config.corruption.scratch_width = value(args, index)?,
            "--scratch-intensity" => config.corruption.scratch_intensity = value(args, index)?,
            "--log-out" => config.log_out = Some(value(args, index)?),
            "--new-image" => {
                config.new_image = true;
                index += 1;
                continue;
            }
            "--clean" => {
                config.clean = true;
                index += 1;
                continue;
            }
            other => bail!("unknown run option: {other}"),
        }
        index += 2;
    }
    config.validate()?;

    if config.new_image {
        let formatter = config
            .paths
            .formatter
            .as_deref()
            .context("--new-image requires --formatter")?;
        FormatterImage::new(formatter, config.formatter.clone())
            .with_clean(config.clean)
            .build(&config.paths.image)
            .context("failed to create a fresh image")?;
    }

    let scenario = Scenario::load_or_fallback(config.scenario.as_deref());
    let programs = discover_programs(&config.paths.tests_folder, &config.build.test_prefix)
        .with_context(|| {
            format!(
                "failed to list validation programs in {}",
                config.paths.tests_folder.display()
            )
        })?;
    if programs.is_empty() {
        bail!(
            "no {}*.c validation programs in {}",
            config.build.test_prefix,
            config.paths.tests_folder.display()
        );
    }

    let builder = CcBuilder::from_config(&config)?;
    let build_dir = builder.out_dir().to_path_buf();
    let mut orchestrator = Orchestrator::new(
        builder,
        ProcessRunner::new(),
        programs,
        &config.paths.image,
        config.corruption.clone(),
    );
    let report = orchestrator.run(&scenario);

    if let Some(path) = &config.log_out {
        orchestrator
            .log()
            .write_to(path)
            .with_context(|| format!("failed to write run log {}", path.display()))?;
    }
    if config.clean {
        if let Err(error) = std::fs::remove_dir_all(&build_dir) {
            warn!(dir = %build_dir.display(), %error, "could not remove build products");
        }
    }

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(report.exit_code())
}

fn inject(args: &[String]) -> Result<()> {
    let mut image: Option<PathBuf> = None;
    let mut kind = StrategyKind::Uniform;
    let mut size: Option<usize> = None;
    let mut count = 1_u64;
    let mut seed = DEFAULT_SEED;
    let mut width = Scratch::default().width;
    let mut intensity = Scratch::default().intensity;
    let mut mean_ratio = GaussianBitflip::default().mean_ratio;
    let mut stddev_ratio = GaussianBitflip::default().stddev_ratio;

    let mut index = 0_usize;
    while index < args.len() {
        match args[index].as_str() {
            "--image" => image = Some(value(args, index)?),
            "--strategy" => kind = value(args, index)?,
            "--size" => size = Some(value(args, index)?),
            "--count" => count = value(args, index)?,
            "--seed" => seed = value(args, index)?,
            "--width" => width = value(args, index)?,
            "--intensity" => intensity = value(args, index)?,
            "--mean" => mean_ratio = value(args, index)?,
            "--stddev" => stddev_ratio = value(args, index)?,
            other => bail!("unknown inject option: {other}"),
        }
        index += 2;
    }
    let image = image.context("inject requires --image")?;

    let strategy = match kind {
        StrategyKind::Uniform => CorruptionStrategy::Uniform(UniformBitflip {
            num_flips: size.unwrap_or(UniformBitflip::default().num_flips),
            seed,
        }),
        StrategyKind::Gaussian => CorruptionStrategy::Gaussian(GaussianBitflip {
            num_flips: size.unwrap_or(GaussianBitflip::default().num_flips),
            mean_ratio,
            stddev_ratio,
            seed,
        }),
        StrategyKind::Scratch => CorruptionStrategy::Scratch(Scratch {
            scratch_length: size.unwrap_or(Scratch::default().scratch_length),
            width,
            intensity,
            seed,
        }),
    };

    let injector = ImageInjector::new(&image);
    info!(image = %image.display(), %strategy, count, "injecting");
    let outcomes = injector.inject_repeated(&strategy, count)?;
    let mutations: u64 = outcomes.iter().map(|outcome| outcome.mutations).sum();
    #[allow(clippy::cast_precision_loss)]
    let corruption_total = strategy.expected_corruption() * count as f64;
    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "image": image.display().to_string(),
            "strategy": strategy,
            "passes": outcomes,
            "mutations": mutations,
            "corruption_total": corruption_total,
        }))?
    );
    Ok(())
}

fn show_scenario(args: &[String]) -> Result<()> {
    let scenario = Scenario::load_or_fallback(args.first().map(Path::new));
    println!("{}", serde_json::to_string_pretty(&scenario)?);
    Ok(())
}

fn fill(args: &[String]) -> Result<()> {
    let dir = args.first().context("fill requires a target directory")?;
    let mut options = FillOptions::default();
    let mut index = 1_usize;
    while index < args.len() {
        match args[index].as_str() {
            "--files" => options.files = Some(value(args, index)?),
            "--dirs" => options.dirs = Some(value(args, index)?),
            "--summary" => options.summary = Some(value(args, index)?),
            "--min-depth" => options.min_depth = Some(value(args, index)?),
            "--max-depth" => options.max_depth = Some(value(args, index)?),
            "--seed" => options.seed = value(args, index)?,
            other => bail!("unknown fill option: {other}"),
        }
        index += 2;
    }

    let mut fs = HostDirFs::new(dir, options.seed)?;
    let action = FillFileSystem::new(options);
    let report = action
        .action(&mut fs)
        .with_context(|| format!("{} failed on {dir}", action.name()))?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn clear(args: &[String]) -> Result<()> {
    let dir = args.first().context("clear requires a target directory")?;
    let mut fs = HostDirFs::new(dir, DEFAULT_SEED)?;
    let report = ClearFileSystem
        .action(&mut fs)
        .with_context(|| format!("clear_file_system failed on {dir}"))?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn print_usage() {
    println!("frs-harness: corruption injection and resilience runs");
    println!();
    println!("USAGE:");
    println!("  frs-harness [-v|-q] <command> [options]");
    println!();
    println!("  frs-harness run [--config F] [--scenario F] [--tests DIR] [--root DIR]");
    println!("                  [--image F] [--build-dir DIR] [--strategy random|gaussian]");
    println!("                  [--seed N] [--scratch-width N] [--scratch-intensity X]");
    println!("                  [--new-image --formatter DIR] [--log-out F] [--clean]");
    println!("  frs-harness inject --image F [--strategy random|gaussian|scratch] [--size N]");
    println!("                  [--count N] [--seed N] [--width N] [--intensity X]");
    println!("                  [--mean X] [--stddev X]");
    println!("  frs-harness scenario [F]");
    println!("  frs-harness fill <dir> [--files N] [--dirs N] [--summary N]");
    println!("                  [--min-depth N] [--max-depth N] [--seed N]");
    println!("  frs-harness clear <dir>");
    println!();
    println!("SCENARIO SCRIPTS:");
    println!("  One step per line: T <workload>, I <flips> or S <scratch length>.");
    println!("  '#' starts a comment. Without a usable script the built-in sequence");
    println!("  T 1000, I 100000, T 1000, I 100000, T 1000, I 100000, T 1000 is used.");
    println!();
    println!("LOGGING:");
    println!("  FRS_LOG or RUST_LOG set tracing filters, e.g. FRS_LOG=frs_inject=debug.");
    println!();
    println!("EXIT STATUS:");
    println!("  0 when every test step passed, 1 on a validation failure, 2 on a build");
    println!("  failure, 3 on invalid corruption parameters, 4 on invalid configuration.");
}
