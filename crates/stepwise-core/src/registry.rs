//! The fixed, read-only set of tools a session may call.
//!
//! Tools are registered once through `ToolRegistryBuilder`; the built
//! registry cannot be extended. Registration order is kept so the system
//! prompt lists tools in the order the host declared them.

use std::collections::HashMap;
use std::fmt;

use stepwise_contracts::{
    error::{StepwiseError, StepwiseResult},
    tool::ToolDescriptor,
};

use crate::traits::Tool;

/// A closure-backed tool body.
pub type ToolFn = Box<dyn Fn(&str) -> String + Send + Sync>;

/// A `Tool` assembled from a name, a description and a closure.
pub struct FnTool {
    name: String,
    description: String,
    capabilities: Vec<String>,
    body: ToolFn,
}

impl FnTool {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        body: impl Fn(&str) -> String + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            capabilities: Vec::new(),
            body: Box::new(body),
        }
    }

    /// Declare a capability the session must hold to run this tool.
    pub fn requires(mut self, capability: impl Into<String>) -> Self {
        self.capabilities.push(capability.into());
        self
    }
}

impl fmt::Debug for FnTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnTool")
            .field("name", &self.name)
            .field("capabilities", &self.capabilities)
            .finish_non_exhaustive()
    }
}

impl Tool for FnTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn required_capabilities(&self) -> Vec<String> {
        self.capabilities.clone()
    }

    fn invoke(&self, input: &str) -> String {
        (self.body)(input)
    }
}

/// Name → tool lookup, built once.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn builder() -> ToolRegistryBuilder {
        ToolRegistryBuilder::default()
    }

    /// A registry with no tools, for protocols that never act.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn lookup(&self, name: &str) -> Option<&dyn Tool> {
        self.index.get(name).map(|&i| self.tools[i].as_ref())
    }

    /// Descriptors in registration order.
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.tools.iter().map(|t| t.descriptor()).collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}

/// Collects tools before the registry is frozen.
#[derive(Default)]
pub struct ToolRegistryBuilder {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistryBuilder {
    pub fn register(self, tool: impl Tool + 'static) -> Self {
        self.register_boxed(Box::new(tool))
    }

    pub fn register_boxed(mut self, tool: Box<dyn Tool>) -> Self {
        self.tools.push(tool);
        self
    }

    /// Freeze the registry.
    ///
    /// # Errors
    ///
    /// `ConfigError` when two tools share a name or a name is blank.
    pub fn build(self) -> StepwiseResult<ToolRegistry> {
        let mut index = HashMap::with_capacity(self.tools.len());
        for (i, tool) in self.tools.iter().enumerate() {
            let name = tool.name();
            if name.trim().is_empty() {
                return Err(StepwiseError::ConfigError {
                    reason: format!("tool at position {} has a blank name", i),
                });
            }
            if index.insert(name.to_string(), i).is_some() {
                return Err(StepwiseError::ConfigError {
                    reason: format!("tool '{}' is registered more than once", name),
                });
            }
        }
        Ok(ToolRegistry {
            tools: self.tools,
            index,
        })
    }
}
