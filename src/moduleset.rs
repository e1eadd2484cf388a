//! Moduleset files: the XML list of modules a build can draw from.
//!
//! ```xml
//! <moduleset>
//!   <perl id="perl-xml-parser" makeargs="EXPAT_LIBPATH=${prefix}/lib">
//!     <branch repo="https://example.org/XML-Parser.git" revision="2.46"/>
//!     <dependencies><dep package="expat"/></dependencies>
//!   </perl>
//!   <systemmodule id="expat">
//!     <systemdependencies><dep type="c_include" name="expat.h"/></systemdependencies>
//!   </systemmodule>
//! </moduleset>
//! ```

use crate::config::BuildConfig;
use crate::module::{BuildModule, Module, ModuleTypeRegistry};
use roxmltree::{Document, Node};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

const ROOT_ELEMENT: &str = "moduleset";

#[derive(Debug, Error)]
pub enum ModulesetError {
    #[error("failed to read moduleset {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed moduleset XML: {0}")]
    Xml(#[from] roxmltree::Error),

    #[error("expected <moduleset> root element, found <{0}>")]
    UnexpectedRoot(String),

    #[error("<{tag}> is missing required attribute '{attribute}'")]
    MissingAttribute { tag: String, attribute: String },

    #[error("module '{0}' is declared more than once")]
    DuplicateModule(String),
}

/// Value of a required attribute.
pub(crate) fn required_attribute(node: Node<'_, '_>, name: &str) -> Result<String, ModulesetError> {
    node.attribute(name)
        .map(str::to_string)
        .ok_or_else(|| ModulesetError::MissingAttribute {
            tag: node.tag_name().name().to_string(),
            attribute: name.to_string(),
        })
}

/// Package names from `<dependencies><dep package=".."/></dependencies>`.
pub(crate) fn child_dependencies(node: Node<'_, '_>) -> Vec<String> {
    node.children()
        .filter(|c| c.has_tag_name("dependencies"))
        .flat_map(|c| c.children().filter(|d| d.has_tag_name("dep")))
        .filter_map(|dep| dep.attribute("package"))
        .map(str::to_string)
        .collect()
}

/// Modules in declaration order.
#[derive(Default)]
pub struct ModuleSet {
    modules: Vec<Box<dyn BuildModule>>,
}

impl ModuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse(
        xml: &str,
        registry: &ModuleTypeRegistry,
        config: &BuildConfig,
    ) -> Result<Self, ModulesetError> {
        let doc = Document::parse(xml)?;
        let root = doc.root_element();
        if !root.has_tag_name(ROOT_ELEMENT) {
            return Err(ModulesetError::UnexpectedRoot(
                root.tag_name().name().to_string(),
            ));
        }

        let mut set = Self::new();
        for node in root.children().filter(Node::is_element) {
            let tag = node.tag_name().name();
            let Some(parser) = registry.get(tag) else {
                warn!(tag, "Skipping unsupported moduleset element");
                continue;
            };
            let module = parser(node, config)?;
            debug!(module = module.name(), kind = tag, "Loaded module");
            set.insert(module)?;
        }
        Ok(set)
    }

    pub fn load(
        path: &Path,
        registry: &ModuleTypeRegistry,
        config: &BuildConfig,
    ) -> Result<Self, ModulesetError> {
        let xml = std::fs::read_to_string(path).map_err(|source| ModulesetError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&xml, registry, config)
    }

    pub fn insert(&mut self, module: Box<dyn BuildModule>) -> Result<(), ModulesetError> {
        if self.contains(module.name()) {
            return Err(ModulesetError::DuplicateModule(module.name().to_string()));
        }
        self.modules.push(module);
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.modules.iter().any(|m| m.name() == name)
    }

    pub fn get(&self, name: &str) -> Option<&dyn BuildModule> {
        self.modules
            .iter()
            .find(|m| m.name() == name)
            .map(|m| m.as_ref())
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Box<dyn BuildModule>> {
        self.modules.iter_mut().find(|m| m.name() == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.modules.iter().map(|m| m.name()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn BuildModule> {
        self.modules.iter().map(|m| m.as_ref())
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}
