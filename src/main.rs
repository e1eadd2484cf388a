use phasebuild::cli::commands::{CliArgs, Commands};
use phasebuild::cli::handlers::{handle_build, handle_compare, handle_phases};
use phasebuild::util::logging::{init_with_level, parse_level};
use phasebuild::VERSION;

use clap::Parser;
use std::env;
use tracing::{debug, Level};

fn main() {
    let args = CliArgs::parse();
    init_logging_from_args(&args);

    debug!("phasebuild v{} starting", VERSION);
    debug!("Arguments: {:?}", args);

    let exit_code = match &args.command {
        Commands::Build(build_args) => handle_build(build_args, args.quiet),
        Commands::Phases(phases_args) => handle_phases(phases_args),
        Commands::Compare(compare_args) => handle_compare(compare_args),
    };

    std::process::exit(exit_code);
}

fn init_logging_from_args(args: &CliArgs) {
    let level = if let Some(level_str) = &args.log_level {
        parse_level(level_str)
    } else if args.verbose {
        Level::DEBUG
    } else if args.quiet {
        Level::ERROR
    } else {
        let level_str = env::var("PHASEBUILD_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        parse_level(&level_str)
    };

    init_with_level(level);
}
