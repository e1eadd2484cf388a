//! Build configuration for phasebuild
//!
//! Settings are read from a TOML file (by default
//! `~/.config/phasebuild/config.toml`) and then overridden by environment
//! variables. Values are resolved once when the configuration is loaded and
//! stay fixed for the rest of the build session.
//!
//! # Environment Variables
//!
//! - `PHASEBUILD_PREFIX`: Install prefix - default: `~/phasebuild/install`
//! - `PHASEBUILD_CHECKOUTROOT`: Directory holding source checkouts - default: `~/phasebuild/checkout`
//! - `PHASEBUILD_PLATFORM_PACKAGES`: Satisfy modules from platform packages (true|false) - default: "false"
//! - `PHASEBUILD_LOG_LEVEL`: Logging level - default: "info"
//! - `PERL`: Perl interpreter - default: "perl"
//! - `MAKE`: Make program - default: "make"
//!
//! # Example
//!
//! ```toml
//! prefix = "/opt/gnome"
//! makeargs = "-j4"
//! platform_packages = true
//!
//! [module_makeargs]
//! perl-xml-parser = "EXPAT_LIBPATH=/opt/expat/lib"
//!
//! [module_extra_env.perl-xml-parser]
//! PERL5LIB = "/opt/gnome/lib/perl5"
//!
//! [external_dependencies.perl-xml-parser]
//! minimum = "2.34"
//! recommended = "2.41"
//! package = "libxml-parser-perl"
//! ```

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use thiserror::Error;

const DEFAULT_PERL: &str = "perl";
const DEFAULT_MAKE: &str = "make";
const DEFAULT_LOG_LEVEL: &str = "info";
const FALLBACK_ROOT: &str = "/usr/local/phasebuild";

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration validation failed
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),

    /// Failed to parse an environment override
    #[error("Failed to parse {field}: {error}")]
    ParseError { field: String, error: String },
}

/// Minimum and recommended versions of a module's platform package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalDependency {
    pub minimum: String,
    pub recommended: String,
    /// Platform package name when it differs from the module name.
    #[serde(default)]
    pub package: Option<String>,
}

/// External programs invoked by phase bodies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolPaths {
    pub perl: String,
    pub make: String,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            perl: DEFAULT_PERL.to_string(),
            make: DEFAULT_MAKE.to_string(),
        }
    }
}

/// Main configuration structure for phasebuild
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Install prefix passed to module builds
    pub prefix: PathBuf,

    /// Directory under which modules are checked out
    pub checkoutroot: PathBuf,

    /// Extra arguments appended to every configure step
    pub makeargs: String,

    /// Per-module replacement for `makeargs`
    pub module_makeargs: HashMap<String, String>,

    /// Per-module environment additions for build commands
    pub module_extra_env: HashMap<String, BTreeMap<String, String>>,

    /// Version requirements used when satisfying modules from platform packages
    pub external_dependencies: HashMap<String, ExternalDependency>,

    /// Try platform packages before building from source
    pub platform_packages: bool,

    pub tools: ToolPaths,

    /// Package database file; defaults to a file under the prefix
    pub packagedb: Option<PathBuf>,

    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for BuildConfig {
    fn default() -> Self {
        let root = dirs::home_dir()
            .map(|home| home.join("phasebuild"))
            .unwrap_or_else(|| PathBuf::from(FALLBACK_ROOT));

        Self {
            prefix: root.join("install"),
            checkoutroot: root.join("checkout"),
            makeargs: String::new(),
            module_makeargs: HashMap::new(),
            module_extra_env: HashMap::new(),
            external_dependencies: HashMap::new(),
            platform_packages: false,
            tools: ToolPaths::default(),
            packagedb: None,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

impl BuildConfig {
    /// Location of the user's config file, if a config directory exists.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("phasebuild").join("config.toml"))
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Loads `path`, or the default config file when present, then applies
    /// environment overrides.
    pub fn resolve(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::load(path)?,
            None => match Self::default_path().filter(|p| p.exists()) {
                Some(path) => Self::load(&path)?,
                None => Self::default(),
            },
        };
        config.with_env_overrides()
    }

    pub fn with_env_overrides(mut self) -> Result<Self, ConfigError> {
        if let Ok(prefix) = env::var("PHASEBUILD_PREFIX") {
            self.prefix = PathBuf::from(prefix);
        }
        if let Ok(root) = env::var("PHASEBUILD_CHECKOUTROOT") {
            self.checkoutroot = PathBuf::from(root);
        }
        if let Ok(value) = env::var("PHASEBUILD_PLATFORM_PACKAGES") {
            self.platform_packages =
                value.parse::<bool>().map_err(|e| ConfigError::ParseError {
                    field: "PHASEBUILD_PLATFORM_PACKAGES".to_string(),
                    error: e.to_string(),
                })?;
        }
        if let Ok(level) = env::var("PHASEBUILD_LOG_LEVEL") {
            self.log_level = level;
        }
        if let Ok(perl) = env::var("PERL") {
            self.tools.perl = perl;
        }
        if let Ok(make) = env::var("MAKE") {
            self.tools.make = make;
        }
        Ok(self)
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.prefix.as_os_str().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "prefix cannot be empty".to_string(),
            ));
        }

        if self.tools.perl.trim().is_empty() || self.tools.make.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "tool paths cannot be empty".to_string(),
            ));
        }

        for (module, dep) in &self.external_dependencies {
            if dep.minimum.trim().is_empty() || dep.recommended.trim().is_empty() {
                return Err(ConfigError::ValidationFailed(format!(
                    "external dependency '{}' needs both minimum and recommended versions",
                    module
                )));
            }
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(ConfigError::ValidationFailed(format!(
                "Invalid log level: {}. Must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            )));
        }

        Ok(())
    }

    pub fn external_dependency(&self, module: &str) -> Option<&ExternalDependency> {
        self.external_dependencies.get(module)
    }

    /// Per-module makeargs, or the global value when none is set.
    pub fn makeargs_for(&self, module: &str) -> &str {
        self.module_makeargs
            .get(module)
            .map(String::as_str)
            .unwrap_or(&self.makeargs)
    }

    pub fn extra_env_for(&self, module: &str) -> Vec<(String, String)> {
        self.module_extra_env
            .get(module)
            .map(|env| {
                env.iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn packagedb_path(&self) -> PathBuf {
        self.packagedb.clone().unwrap_or_else(|| {
            self.prefix
                .join("_phasebuild")
                .join("packagedb.json")
        })
    }

    /// Substitutes `${prefix}` and `${checkoutroot}`. Unknown variables are
    /// left as written.
    pub fn expand(&self, value: &str) -> String {
        static VARIABLE: OnceLock<Option<Regex>> = OnceLock::new();
        let Some(re) = VARIABLE
            .get_or_init(|| Regex::new(r"\$\{(\w+)\}").ok())
            .as_ref()
        else {
            return value.to_string();
        };

        re.replace_all(value, |caps: &regex::Captures<'_>| match &caps[1] {
            "prefix" => self.prefix.display().to_string(),
            "checkoutroot" => self.checkoutroot.display().to_string(),
            _ => caps[0].to_string(),
        })
        .into_owned()
    }
}

impl fmt::Display for BuildConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "phasebuild configuration:")?;
        writeln!(f, "  Prefix: {}", self.prefix.display())?;
        writeln!(f, "  Checkout root: {}", self.checkoutroot.display())?;
        writeln!(f, "  Makeargs: {}", self.makeargs)?;
        writeln!(f, "  Platform packages: {}", self.platform_packages)?;
        writeln!(f, "  Perl: {}", self.tools.perl)?;
        writeln!(f, "  Make: {}", self.tools.make)?;
        writeln!(f, "  Package DB: {}", self.packagedb_path().display())?;
        write!(f, "  Log level: {}", self.log_level)
    }
}
