//! Module type registry

use super::{BuildModule, ModuleVariant, PerlModule, SystemModule, XmlContract};
use crate::config::BuildConfig;
use crate::error::BuildError;
use crate::moduleset::ModulesetError;
use roxmltree::Node;
use std::collections::HashMap;

/// Builds a module from its moduleset element.
pub type ModuleParser =
    fn(Node<'_, '_>, &BuildConfig) -> Result<Box<dyn BuildModule>, ModulesetError>;

struct Registration {
    parser: ModuleParser,
    contract: XmlContract,
}

/// Registry of module types, keyed by moduleset element name
pub struct ModuleTypeRegistry {
    types: HashMap<&'static str, Registration>,
    order: Vec<&'static str>,
}

impl ModuleTypeRegistry {
    pub fn new() -> Self {
        Self {
            types: HashMap::new(),
            order: Vec::new(),
        }
    }

    pub fn with_defaults() -> Result<Self, BuildError> {
        let mut registry = Self::new();
        registry.register::<PerlModule>(|node, config| {
            Ok(Box::new(PerlModule::from_xml(node, config)?))
        })?;
        registry.register::<SystemModule>(|node, config| {
            Ok(Box::new(SystemModule::from_xml(node, config)?))
        })?;
        Ok(registry)
    }

    /// Registers `M` under its element name. Its phase graph is checked here
    /// so a broken table never reaches a build.
    pub fn register<M: ModuleVariant>(&mut self, parser: ModuleParser) -> Result<(), BuildError> {
        M::graph().validate().map_err(|source| BuildError::Graph {
            kind: M::KIND.to_string(),
            source,
        })?;

        if self
            .types
            .insert(
                M::KIND,
                Registration {
                    parser,
                    contract: M::xml_contract(),
                },
            )
            .is_none()
        {
            self.order.push(M::KIND);
        }
        Ok(())
    }

    pub fn get(&self, tag: &str) -> Option<ModuleParser> {
        self.types.get(tag).map(|r| r.parser)
    }

    pub fn contract(&self, tag: &str) -> Option<&XmlContract> {
        self.types.get(tag).map(|r| &r.contract)
    }

    /// Registered element names, in registration order.
    pub fn tags(&self) -> &[&'static str] {
        &self.order
    }
}

impl Default for ModuleTypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}
