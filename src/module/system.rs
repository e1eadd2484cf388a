//! Dependencies supplied by the operating system rather than built here.

use super::{Module, ModuleVariant, XmlAttribute, XmlContract};
use crate::config::BuildConfig;
use crate::context::{BuildContext, CommandLine};
use crate::error::PhaseError;
use crate::moduleset::{self, ModulesetError};
use crate::phase::{PhaseDef, PhaseGraph, PhaseOutcome, PhaseTracker};
use roxmltree::Node;
use serde::Serialize;
use std::any::Any;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use tracing::{debug, warn};

pub const PHASE_START: &str = "start";
pub const PHASE_CHECK: &str = "check";

/// Module that XML catalog lookups need.
const XML_CATALOG_MODULE: &str = "xmlcatalog";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyKind {
    Path,
    CInclude,
    PkgConfig,
    Xml,
    Python,
    Other(String),
}

impl DependencyKind {
    pub fn as_str(&self) -> &str {
        match self {
            DependencyKind::Path => "path",
            DependencyKind::CInclude => "c_include",
            DependencyKind::PkgConfig => "pkgconfig",
            DependencyKind::Xml => "xml",
            DependencyKind::Python => "python",
            DependencyKind::Other(kind) => kind,
        }
    }

    /// Command that succeeds when `value` is present on the system.
    fn probe(&self, value: &str) -> Option<CommandLine> {
        match self {
            DependencyKind::PkgConfig => Some(CommandLine::argv(["pkg-config", "--exists", value])),
            // The value is passed as $1 so it is never parsed as shell syntax.
            DependencyKind::Path => Some(CommandLine::argv([
                "sh",
                "-c",
                "command -v \"$1\"",
                "sh",
                value,
            ])),
            DependencyKind::CInclude => Some(CommandLine::argv([
                "test".to_string(),
                "-f".to_string(),
                format!("/usr/include/{}", value),
            ])),
            DependencyKind::Xml => Some(CommandLine::argv([
                "xmlcatalog",
                "--noout",
                "/etc/xml/catalog",
                value,
            ])),
            DependencyKind::Python | DependencyKind::Other(_) => None,
        }
    }
}

impl FromStr for DependencyKind {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "path" => DependencyKind::Path,
            "c_include" => DependencyKind::CInclude,
            "pkgconfig" => DependencyKind::PkgConfig,
            "xml" => DependencyKind::Xml,
            "python" | "python2" | "python3" => DependencyKind::Python,
            other => DependencyKind::Other(other.to_string()),
        })
    }
}

impl fmt::Display for DependencyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SystemDependency {
    pub kind: DependencyKind,
    pub value: String,
}

impl SystemDependency {
    pub fn new(kind: DependencyKind, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SystemModule {
    name: String,
    dependencies: Vec<String>,
    system_dependencies: Vec<SystemDependency>,
    runtime: bool,
    source: Option<String>,
    source_key: Option<String>,
    source_key_server: Option<String>,
    tracker: PhaseTracker,
}

impl SystemModule {
    pub fn new(name: impl Into<String>, system_dependencies: Vec<SystemDependency>) -> Self {
        let mut module = Self {
            name: name.into(),
            dependencies: Vec::new(),
            system_dependencies,
            runtime: true,
            source: None,
            source_key: None,
            source_key_server: None,
            tracker: PhaseTracker::new(),
        };
        module.inject_xml_catalog();
        module
    }

    /// Single-dependency module standing in for a missing declaration.
    pub fn create_virtual(name: impl Into<String>, kind: DependencyKind, value: impl Into<String>) -> Self {
        Self::new(name, vec![SystemDependency::new(kind, value)])
    }

    pub fn with_dependencies(mut self, dependencies: Vec<String>) -> Self {
        self.dependencies = dependencies;
        self.inject_xml_catalog();
        self
    }

    pub fn with_runtime(mut self, runtime: bool) -> Self {
        self.runtime = runtime;
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_source_key(mut self, key: impl Into<String>, server: Option<String>) -> Self {
        self.source_key = Some(key.into());
        self.source_key_server = server;
        self
    }

    pub fn system_dependencies(&self) -> &[SystemDependency] {
        &self.system_dependencies
    }

    pub fn runtime(&self) -> bool {
        self.runtime
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub fn source_key(&self) -> Option<&str> {
        self.source_key.as_deref()
    }

    pub fn source_key_server(&self) -> Option<&str> {
        self.source_key_server.as_deref()
    }

    fn inject_xml_catalog(&mut self) {
        let needs_catalog = self
            .system_dependencies
            .iter()
            .any(|d| d.kind == DependencyKind::Xml);
        if needs_catalog && !self.dependencies.iter().any(|d| d == XML_CATALOG_MODULE) {
            self.dependencies.push(XML_CATALOG_MODULE.to_string());
        }
    }

    pub fn from_xml(node: Node<'_, '_>, _config: &BuildConfig) -> Result<Self, ModulesetError> {
        let name = moduleset::required_attribute(node, "id")?;

        let system_dependencies = node
            .children()
            .filter(|c| c.has_tag_name("systemdependencies"))
            .flat_map(|c| c.children().filter(|d| d.has_tag_name("dep")))
            .map(|dep| -> Result<SystemDependency, ModulesetError> {
                let kind = moduleset::required_attribute(dep, "type")?;
                let value = moduleset::required_attribute(dep, "name")?;
                let kind = kind.parse().unwrap_or(DependencyKind::Other(kind));
                Ok(SystemDependency::new(kind, value))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut module = Self::new(name, system_dependencies)
            .with_dependencies(moduleset::child_dependencies(node))
            .with_runtime(node.attribute("runtime") != Some("no"));
        module.source = node.attribute("apt-source").map(str::to_string);
        module.source_key = node.attribute("apt-key").map(str::to_string);
        module.source_key_server = node.attribute("apt-key-server").map(str::to_string);
        Ok(module)
    }

    fn do_start(&self, _ctx: &BuildContext<'_>) -> PhaseOutcome {
        PhaseOutcome::Done
    }

    fn do_check(&self, ctx: &BuildContext<'_>) -> PhaseOutcome {
        self.check(ctx).into()
    }

    fn check(&self, ctx: &BuildContext<'_>) -> Result<(), PhaseError> {
        ctx.set_action("Checking system dependencies", &self.name);
        for dep in &self.system_dependencies {
            let Some(probe) = dep.kind.probe(&dep.value) else {
                warn!(module = %self.name, kind = %dep.kind, value = %dep.value, "No check available, skipping");
                continue;
            };
            debug!(module = %self.name, kind = %dep.kind, value = %dep.value, "Checking");
            ctx.executor.execute(&probe, None, &[]).map_err(|e| {
                PhaseError::Other(format!(
                    "system dependency {}:{} not found ({})",
                    dep.kind, dep.value, e
                ))
            })?;
        }
        Ok(())
    }
}

impl Module for SystemModule {
    fn name(&self) -> &str {
        &self.name
    }

    fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    fn default_target(&self) -> &'static str {
        PHASE_CHECK
    }

    fn tracker(&self) -> &PhaseTracker {
        &self.tracker
    }

    fn tracker_mut(&mut self) -> &mut PhaseTracker {
        &mut self.tracker
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl ModuleVariant for SystemModule {
    const KIND: &'static str = "systemmodule";

    fn graph() -> &'static PhaseGraph<Self> {
        static GRAPH: OnceLock<PhaseGraph<SystemModule>> = OnceLock::new();
        GRAPH.get_or_init(|| {
            PhaseGraph::builder(Self::KIND)
                .phase(PhaseDef::new(PHASE_START, Self::do_start))
                .phase(PhaseDef::new(PHASE_CHECK, Self::do_check).requires(&[PHASE_START]))
                .build()
        })
    }

    fn xml_contract() -> XmlContract {
        const ATTRIBUTES: &[XmlAttribute] = &[
            XmlAttribute::required("id"),
            XmlAttribute::optional("runtime", Some("yes")),
            XmlAttribute::optional("apt-source", None),
            XmlAttribute::optional("apt-key", None),
            XmlAttribute::optional("apt-key-server", None),
        ];
        XmlContract {
            tag: Self::KIND,
            attributes: ATTRIBUTES,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{
        Executor, JsonPackageDb, ProcessExecutor, RecordingExecutor, StaticPackageIndex,
    };
    use crate::error::BuildError;
    use crate::phase::{Lifecycle, PhaseRunner};

    fn parse(xml: &str) -> Result<SystemModule, ModulesetError> {
        let doc = roxmltree::Document::parse(xml).unwrap();
        SystemModule::from_xml(doc.root_element(), &BuildConfig::default())
    }

    #[test]
    fn test_xml_dependency_injects_catalog() {
        let module = SystemModule::new(
            "docbook-xsl",
            vec![SystemDependency::new(
                DependencyKind::Xml,
                "http://docbook.sourceforge.net/release/xsl/current/",
            )],
        );
        assert_eq!(module.dependencies(), &["xmlcatalog".to_string()]);
        assert!(module.runtime());
    }

    #[test]
    fn test_create_virtual() {
        let module = SystemModule::create_virtual("zlib", DependencyKind::PkgConfig, "zlib.pc");
        assert_eq!(module.name(), "zlib");
        assert_eq!(
            module.system_dependencies(),
            &[SystemDependency::new(DependencyKind::PkgConfig, "zlib.pc")]
        );
        assert!(module.dependencies().is_empty());
    }

    #[test]
    fn test_from_xml() {
        let module = parse(
            r#"<systemmodule id="docbook" runtime="no" apt-source="deb http://example.org stable main" apt-key="ABCD">
  <dependencies><dep package="libxml2"/></dependencies>
  <systemdependencies>
    <dep type="xml" name="-//OASIS//DTD DocBook XML V4.5//EN"/>
    <dep type="c_include" name="zlib.h"/>
  </systemdependencies>
</systemmodule>"#,
        )
        .unwrap();

        assert_eq!(module.name(), "docbook");
        assert!(!module.runtime());
        assert_eq!(module.source(), Some("deb http://example.org stable main"));
        assert_eq!(module.source_key(), Some("ABCD"));
        assert_eq!(module.source_key_server(), None);
        assert_eq!(
            module.dependencies(),
            &["libxml2".to_string(), "xmlcatalog".to_string()]
        );
        assert_eq!(module.system_dependencies()[1].kind, DependencyKind::CInclude);
    }

    #[test]
    fn test_from_xml_runtime_defaults_true() {
        let module = parse(r#"<systemmodule id="zlib"/>"#).unwrap();
        assert!(module.runtime());
    }

    #[test]
    fn test_from_xml_missing_id() {
        assert!(matches!(
            parse(r#"<systemmodule/>"#),
            Err(ModulesetError::MissingAttribute { .. })
        ));
    }

    #[test]
    fn test_check_probes_each_dependency() {
        let config = BuildConfig::default();
        let executor = RecordingExecutor::new();
        let db = JsonPackageDb::in_memory();
        let index = StaticPackageIndex::new();
        let ctx = BuildContext::new(&config, &executor, &db, &index);

        let mut module = SystemModule::new(
            "gtk-deps",
            vec![
                SystemDependency::new(DependencyKind::PkgConfig, "glib-2.0"),
                SystemDependency::new(DependencyKind::Path, "msgfmt"),
                SystemDependency::new(DependencyKind::CInclude, "zlib.h"),
                SystemDependency::new(DependencyKind::Python, "gi"),
            ],
        );
        let result = PhaseRunner::run(&mut module, None, &ctx).unwrap();

        assert_eq!(result.executed, vec![PHASE_START, PHASE_CHECK]);
        assert_eq!(
            executor.commands(),
            vec![
                "pkg-config --exists glib-2.0",
                "sh -c command -v \"$1\" sh msgfmt",
                "test -f /usr/include/zlib.h",
            ]
        );
        assert_eq!(module.tracker().lifecycle(), Lifecycle::Done);
    }

    #[test]
    fn test_missing_dependency_is_fatal() {
        let config = BuildConfig::default();
        let executor = RecordingExecutor::new().fail_on("pkg-config");
        let db = JsonPackageDb::in_memory();
        let index = StaticPackageIndex::new();
        let ctx = BuildContext::new(&config, &executor, &db, &index);

        let mut module = SystemModule::create_virtual("libfoo", DependencyKind::PkgConfig, "foo");
        let err = PhaseRunner::run(&mut module, None, &ctx).unwrap_err();
        assert!(matches!(err, BuildError::PhaseFailed { .. }));
        assert!(err.to_string().contains("check"));
        assert_eq!(module.tracker().lifecycle(), Lifecycle::Failed);
    }

    #[test]
    fn test_path_value_is_not_shell_code() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("marker");
        let value = format!("sh; touch {}", marker.display());

        let probe = DependencyKind::Path.probe(&value).unwrap();
        let result = ProcessExecutor.execute(&probe, None, &[]);

        assert!(result.is_err());
        assert!(!marker.exists());
    }

    #[test]
    fn test_path_probe_finds_shell() {
        let probe = DependencyKind::Path.probe("sh").unwrap();
        assert!(ProcessExecutor.execute(&probe, None, &[]).is_ok());
    }
}
