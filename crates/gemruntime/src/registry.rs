use gemcore::{DescriptorLookup, GraphError, Node, NodeDescriptor, NodeError, NodeTag};
use std::collections::HashMap;
use std::sync::Arc;

/// Factory trait for creating node instances
pub trait NodeFactory: Send + Sync {
    /// Schema and role of the node kind this factory builds
    fn descriptor(&self) -> &NodeDescriptor;

    /// Create a fresh node instance for one graph position
    fn create(&self) -> Result<Box<dyn Node>, NodeError>;
}

/// Registry of available node kinds, keyed by tag
pub struct NodeRegistry {
    factories: HashMap<NodeTag, Arc<dyn NodeFactory>>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register a node factory, replacing any previous factory for the same tag
    pub fn register(&mut self, factory: Arc<dyn NodeFactory>) {
        let tag = factory.descriptor().tag;
        tracing::info!("Registering node type: {}", tag);
        if self.factories.insert(tag, factory).is_some() {
            tracing::warn!("Node type {} was already registered; replaced", tag);
        }
    }

    /// Create the node instance for the record at `node`
    pub fn create_node(&self, node: usize, tag: NodeTag) -> Result<Box<dyn Node>, GraphError> {
        let factory = self
            .factories
            .get(&tag)
            .ok_or(GraphError::UnknownNodeTag { node, tag })?;

        factory
            .create()
            .map_err(|source| GraphError::Instantiation { node, tag, source })
    }

    /// All registered tags, sorted
    pub fn list_tags(&self) -> Vec<NodeTag> {
        let mut tags: Vec<NodeTag> = self.factories.keys().copied().collect();
        tags.sort();
        tags
    }

    pub fn descriptor(&self, tag: &NodeTag) -> Option<&NodeDescriptor> {
        self.factories.get(tag).map(|f| f.descriptor())
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl DescriptorLookup for NodeRegistry {
    fn lookup(&self, tag: &NodeTag) -> Option<&NodeDescriptor> {
        self.descriptor(tag)
    }
}
