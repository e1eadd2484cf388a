//! Subcommand handlers. Each returns the process exit code.

use super::commands::{BuildArgs, CompareArgs, PhasesArgs};
use super::output::{ComparisonReport, OutputFormatter, PhaseListing};
use crate::config::BuildConfig;
use crate::context::{AptPackageIndex, BuildContext, JsonPackageDb, ProcessExecutor};
use crate::module::{BuildModule, Module, ModuleTypeRegistry};
use crate::moduleset::ModuleSet;
use crate::progress::LoggingHandler;
use crate::session::BuildSession;
use crate::version::compare_versions;
use anyhow::{Context, Result};
use std::path::Path;
use tracing::{debug, error, info};

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_USAGE: i32 = 2;

pub fn handle_build(args: &BuildArgs, quiet: bool) -> i32 {
    let mut config = match load_config(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!("Configuration error: {:#}", e);
            return EXIT_USAGE;
        }
    };
    if args.platform_packages {
        config.platform_packages = true;
    }

    let mut modules = match load_moduleset(&args.moduleset, &config) {
        Ok(modules) => modules,
        Err(e) => {
            error!("{:#}", e);
            return EXIT_USAGE;
        }
    };

    if let Some(missing) = args.modules.iter().find(|m| !modules.contains(m)) {
        error!("Module '{}' is not in {}", missing, args.moduleset.display());
        return EXIT_USAGE;
    }

    let packagedb = match JsonPackageDb::open(config.packagedb_path()) {
        Ok(db) => db,
        Err(e) => {
            error!("Failed to open package database: {}", e);
            return EXIT_FAILURE;
        }
    };
    let executor = ProcessExecutor;
    let index = AptPackageIndex::default();
    let progress = LoggingHandler;
    let ctx = BuildContext::new(&config, &executor, &packagedb, &index).with_progress(&progress);
    let session = BuildSession::new(ctx);

    info!(modules = ?args.modules, "Starting build");
    let reports = match session.build_all(&mut modules, &args.modules, args.phase.as_deref()) {
        Ok(reports) => reports,
        Err(e) => {
            error!("Build failed: {}", e);
            return if e.is_configuration() {
                EXIT_USAGE
            } else {
                EXIT_FAILURE
            };
        }
    };

    if !quiet {
        match OutputFormatter::new(args.format.into()).format_build(&reports) {
            Ok(output) => print!("{}", output),
            Err(e) => {
                error!("{:#}", e);
                return EXIT_FAILURE;
            }
        }
    }
    EXIT_SUCCESS
}

pub fn handle_phases(args: &PhasesArgs) -> i32 {
    let result = load_config(args.config.as_deref())
        .and_then(|config| load_moduleset(&args.moduleset, &config));
    let modules = match result {
        Ok(modules) => modules,
        Err(e) => {
            error!("{:#}", e);
            return EXIT_USAGE;
        }
    };

    let Some(module) = modules.get(&args.module) else {
        error!("Module '{}' is not in {}", args.module, args.moduleset.display());
        return EXIT_USAGE;
    };

    let listing = PhaseListing {
        module: module.name().to_string(),
        kind: module.kind().to_string(),
        default_target: module.default_target().to_string(),
        phases: module.phases(),
    };
    match OutputFormatter::new(args.format.into()).format_phases(&listing) {
        Ok(output) => {
            print!("{}", output);
            EXIT_SUCCESS
        }
        Err(e) => {
            error!("{:#}", e);
            EXIT_FAILURE
        }
    }
}

pub fn handle_compare(args: &CompareArgs) -> i32 {
    let verdict = compare_versions(&args.installed, &args.minimum, &args.recommended);
    debug!(installed = %args.installed, verdict = %verdict, "Compared versions");

    let report = ComparisonReport::new(&args.installed, &args.minimum, &args.recommended, verdict);
    match OutputFormatter::new(args.format.into()).format_comparison(&report) {
        Ok(output) => {
            println!("{}", output);
            EXIT_SUCCESS
        }
        Err(e) => {
            error!("{:#}", e);
            EXIT_FAILURE
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<BuildConfig> {
    let config = BuildConfig::resolve(path).context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;
    debug!("{}", config);
    Ok(config)
}

fn load_moduleset(path: &Path, config: &BuildConfig) -> Result<ModuleSet> {
    let registry = ModuleTypeRegistry::with_defaults().context("Invalid module type")?;
    ModuleSet::load(path, &registry, config)
        .with_context(|| format!("Failed to load moduleset {}", path.display()))
}
