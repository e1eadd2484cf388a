use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Phase-driven builder for source and system modules
#[derive(Parser, Debug)]
#[command(
    name = "phasebuild",
    about = "Phase-driven builder for source and system modules",
    version,
    author,
    long_about = "phasebuild runs modules declared in a moduleset file through their build \
                  phases (checkout, build, install, ...), re-fetching sources when a phase \
                  fails and skipping builds that an installed platform package already \
                  satisfies."
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, global = true, value_name = "LEVEL", help = "Set logging level")]
    pub log_level: Option<String>,

    #[arg(short = 'v', long, global = true, help = "Enable debug logging")]
    pub verbose: bool,

    #[arg(
        short = 'q',
        long,
        global = true,
        conflicts_with = "verbose",
        help = "Quiet mode - suppress non-error output"
    )]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(
        about = "Build modules from a moduleset",
        long_about = "Runs each named module to its default target, or to --phase when given.\n\n\
                      Examples:\n  \
                      phasebuild build perl-xml-parser -m modules.xml\n  \
                      phasebuild build perl-uri --phase build -m modules.xml\n  \
                      phasebuild build perl-xml-parser --platform-packages -m modules.xml"
    )]
    Build(BuildArgs),

    #[command(
        about = "List a module's phases",
        long_about = "Shows each phase with its prerequisites and fallbacks.\n\n\
                      Examples:\n  \
                      phasebuild phases perl-xml-parser -m modules.xml\n  \
                      phasebuild phases expat -m modules.xml --format json"
    )]
    Phases(PhasesArgs),

    #[command(
        about = "Compare an installed version against requirements",
        long_about = "Reports whether INSTALLED meets RECOMMENDED, meets only MINIMUM, or \
                      falls below MINIMUM. Epochs and Debian revisions are ignored.\n\n\
                      Examples:\n  \
                      phasebuild compare 2:1.5-3 1.0 1.5\n  \
                      phasebuild compare 1.4 1.0 1.6 --format json"
    )]
    Compare(CompareArgs),
}

#[derive(Parser, Debug, Clone)]
pub struct BuildArgs {
    #[arg(value_name = "MODULE", required = true, help = "Modules to build, in order")]
    pub modules: Vec<String>,

    #[arg(short = 'm', long, value_name = "FILE", help = "Moduleset file")]
    pub moduleset: PathBuf,

    #[arg(short = 'c', long, value_name = "FILE", help = "Config file (defaults to ~/.config/phasebuild/config.toml)")]
    pub config: Option<PathBuf>,

    #[arg(long, value_name = "PHASE", help = "Phase to run to instead of the module's default target")]
    pub phase: Option<String>,

    #[arg(long, help = "Satisfy modules from platform packages when possible")]
    pub platform_packages: bool,

    #[arg(
        short = 'f',
        long,
        value_enum,
        default_value = "human",
        help = "Output format"
    )]
    pub format: OutputFormatArg,
}

#[derive(Parser, Debug, Clone)]
pub struct PhasesArgs {
    #[arg(value_name = "MODULE")]
    pub module: String,

    #[arg(short = 'm', long, value_name = "FILE", help = "Moduleset file")]
    pub moduleset: PathBuf,

    #[arg(short = 'c', long, value_name = "FILE", help = "Config file")]
    pub config: Option<PathBuf>,

    #[arg(
        short = 'f',
        long,
        value_enum,
        default_value = "human",
        help = "Output format"
    )]
    pub format: OutputFormatArg,
}

#[derive(Parser, Debug, Clone)]
pub struct CompareArgs {
    #[arg(value_name = "INSTALLED")]
    pub installed: String,

    #[arg(value_name = "MINIMUM")]
    pub minimum: String,

    #[arg(value_name = "RECOMMENDED")]
    pub recommended: String,

    #[arg(
        short = 'f',
        long,
        value_enum,
        default_value = "human",
        help = "Output format"
    )]
    pub format: OutputFormatArg,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormatArg {
    Json,
    Yaml,
    Human,
}

impl From<OutputFormatArg> for super::output::OutputFormat {
    fn from(arg: OutputFormatArg) -> Self {
        match arg {
            OutputFormatArg::Json => super::output::OutputFormat::Json,
            OutputFormatArg::Yaml => super::output::OutputFormat::Yaml,
            OutputFormatArg::Human => super::output::OutputFormat::Human,
        }
    }
}
