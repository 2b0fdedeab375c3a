use async_trait::async_trait;
use gemcore::{
    ConstantKind, Node, NodeContext, NodeDescriptor, NodeError, NodeOutput, NodeRole, NodeTag,
    Value,
};
use gemruntime::NodeFactory;

/// Simple debug node that logs its input and passes it on
pub struct DebugNode;

impl DebugNode {
    pub const TAG: NodeTag = NodeTag::from_static("DbgLG");
}

#[async_trait]
impl Node for DebugNode {
    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let message = ctx.require_input("message")?.clone();
        let label = match ctx.constant_or("label", Value::Null) {
            Value::String(label) if !label.is_empty() => label,
            _ => "debug".to_string(),
        };

        let rendered = match message.as_str() {
            Some(text) => text.to_string(),
            None => message.to_json().to_string(),
        };

        tracing::info!("[{}] {}", label, rendered);
        ctx.events.info(format!("DEBUG [{}]: {}", label, rendered));

        Ok(NodeOutput::new().with_output("message", message))
    }
}

pub struct DebugNodeFactory {
    descriptor: NodeDescriptor,
}

impl DebugNodeFactory {
    pub fn new() -> Self {
        Self {
            descriptor: NodeDescriptor::new(DebugNode::TAG, "Debug Log", NodeRole::Transform)
                .with_category("debug")
                .with_input("message")
                .with_output("message")
                .with_constant(
                    "label",
                    ConstantKind::Text {
                        default: String::new(),
                    },
                ),
        }
    }
}

impl Default for DebugNodeFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeFactory for DebugNodeFactory {
    fn descriptor(&self) -> &NodeDescriptor {
        &self.descriptor
    }

    fn create(&self) -> Result<Box<dyn Node>, NodeError> {
        Ok(Box::new(DebugNode))
    }
}
