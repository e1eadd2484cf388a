//! Output formatting for multiple formats
//!
//! Build reports, phase listings and version verdicts render as JSON, YAML or
//! human-readable text.

use anyhow::{Context, Result};
use serde::Serialize;

use crate::module::PhaseInfo;
use crate::session::BuildReport;
use crate::version::{strip_epoch_and_revision, Satisfaction};

/// Output format enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// JSON format (machine-readable)
    Json,
    /// YAML format
    Yaml,
    /// Human-readable formatted text
    Human,
}

/// Result of `phasebuild compare`.
#[derive(Debug, Clone, Serialize)]
pub struct ComparisonReport {
    pub installed: String,
    /// Installed version after epoch and revision stripping.
    pub normalized: String,
    pub minimum: String,
    pub recommended: String,
    pub verdict: Satisfaction,
}

impl ComparisonReport {
    pub fn new(installed: &str, minimum: &str, recommended: &str, verdict: Satisfaction) -> Self {
        Self {
            installed: installed.to_string(),
            normalized: strip_epoch_and_revision(installed).to_string(),
            minimum: minimum.to_string(),
            recommended: recommended.to_string(),
            verdict,
        }
    }
}

/// Phase listing for one module.
#[derive(Debug, Clone, Serialize)]
pub struct PhaseListing {
    pub module: String,
    pub kind: String,
    pub default_target: String,
    pub phases: Vec<PhaseInfo>,
}

pub struct OutputFormatter {
    format: OutputFormat,
}

impl OutputFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn format_build(&self, reports: &[BuildReport]) -> Result<String> {
        match self.format {
            OutputFormat::Json => {
                serde_json::to_string_pretty(reports).context("Failed to serialize build reports to JSON")
            }
            OutputFormat::Yaml => {
                serde_yaml::to_string(reports).context("Failed to serialize build reports to YAML")
            }
            OutputFormat::Human => Ok(self.format_build_human(reports)),
        }
    }

    pub fn format_phases(&self, listing: &PhaseListing) -> Result<String> {
        match self.format {
            OutputFormat::Json => {
                serde_json::to_string_pretty(listing).context("Failed to serialize phases to JSON")
            }
            OutputFormat::Yaml => {
                serde_yaml::to_string(listing).context("Failed to serialize phases to YAML")
            }
            OutputFormat::Human => Ok(self.format_phases_human(listing)),
        }
    }

    pub fn format_comparison(&self, report: &ComparisonReport) -> Result<String> {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(report)
                .context("Failed to serialize comparison to JSON"),
            OutputFormat::Yaml => {
                serde_yaml::to_string(report).context("Failed to serialize comparison to YAML")
            }
            OutputFormat::Human => Ok(format!(
                "{} ({}): {} [minimum {}, recommended {}]",
                report.installed,
                report.normalized,
                report.verdict,
                report.minimum,
                report.recommended
            )),
        }
    }

    fn format_build_human(&self, reports: &[BuildReport]) -> String {
        let mut output = String::new();
        for report in reports {
            let mark = match report.advisory {
                Some(_) => "\u{26A0}",
                None => "\u{2713}",
            };
            output.push_str(&format!(
                "{} {} ({})\n",
                mark,
                report.module,
                report.lifecycle.as_str()
            ));

            let executed = report.executed();
            if executed.is_empty() {
                output.push_str("\u{2514}\u{2500} Phases:   (none)\n");
            } else {
                output.push_str(&format!("\u{251C}\u{2500} Phases:   {}\n", executed.join(" \u{2192} ")));
            }
            if let Some(fallback) = report.fallback {
                output.push_str(&format!("\u{251C}\u{2500} Fallback: {}\n", fallback));
            }
            if let Some(advisory) = &report.advisory {
                output.push_str(&format!("\u{2514}\u{2500} Advisory: {}\n", advisory));
            }
        }
        output
    }

    fn format_phases_human(&self, listing: &PhaseListing) -> String {
        let mut output = format!(
            "{} ({}), default target: {}\n",
            listing.module, listing.kind, listing.default_target
        );
        for (i, phase) in listing.phases.iter().enumerate() {
            let connector = if i == listing.phases.len() - 1 {
                "\u{2514}"
            } else {
                "\u{251C}"
            };
            output.push_str(&format!("{}\u{2500} {}", connector, phase.name));
            if !phase.prerequisites.is_empty() {
                output.push_str(&format!("  after: {}", phase.prerequisites.join(", ")));
            }
            if !phase.fallbacks.is_empty() {
                output.push_str(&format!("  on error: {}", phase.fallbacks.join(", ")));
            }
            if !phase.provides.is_empty() {
                output.push_str(&format!("  provides: {}", phase.provides.join(", ")));
            }
            output.push('\n');
        }
        output
    }
}
