use async_trait::async_trait;
use gemcore::{
    ConstantKind, Node, NodeContext, NodeDescriptor, NodeError, NodeOutput, NodeRole, NodeTag,
    Value,
};
use gemruntime::NodeFactory;

/// Feeds a user-supplied value into the graph
///
/// The `value` constant is parsed as JSON when it can be; anything else is
/// emitted as plain text.
pub struct InputDataNode;

impl InputDataNode {
    pub const TAG: NodeTag = NodeTag::from_static("InpDT");
}

#[async_trait]
impl Node for InputDataNode {
    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let raw = ctx
            .require_constant("value")?
            .as_str()
            .ok_or_else(|| NodeError::Configuration("value must be text".to_string()))?;

        let data = match serde_json::from_str::<serde_json::Value>(raw) {
            Ok(serde_json::Value::Number(n)) => n.as_f64().map(Value::Number).unwrap_or_default(),
            Ok(serde_json::Value::Bool(b)) => Value::Bool(b),
            Ok(serde_json::Value::String(s)) => Value::String(s),
            Ok(serde_json::Value::Null) => Value::Null,
            Ok(json) => Value::Json(json),
            Err(_) => Value::String(raw.to_string()),
        };

        tracing::debug!("Node {} emits {:?}", ctx.node_index, data);
        Ok(NodeOutput::new().with_output("data", data))
    }
}

pub struct InputDataNodeFactory {
    descriptor: NodeDescriptor,
}

impl InputDataNodeFactory {
    pub fn new() -> Self {
        Self {
            descriptor: NodeDescriptor::new(InputDataNode::TAG, "Input Data", NodeRole::Source)
                .with_category("data")
                .with_output("data")
                .with_constant(
                    "value",
                    ConstantKind::Text {
                        default: String::new(),
                    },
                ),
        }
    }
}

impl Default for InputDataNodeFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeFactory for InputDataNodeFactory {
    fn descriptor(&self) -> &NodeDescriptor {
        &self.descriptor
    }

    fn create(&self) -> Result<Box<dyn Node>, NodeError> {
        Ok(Box::new(InputDataNode))
    }
}

/// Collects a result at the end of a graph
pub struct OutputDataNode;

impl OutputDataNode {
    pub const TAG: NodeTag = NodeTag::from_static("OutDT");
}

#[async_trait]
impl Node for OutputDataNode {
    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let data = ctx.require_input("data")?.clone();
        ctx.events.info(format!("Result: {}", data.to_json()));
        Ok(NodeOutput::new().with_output("data", data))
    }
}

pub struct OutputDataNodeFactory {
    descriptor: NodeDescriptor,
}

impl OutputDataNodeFactory {
    pub fn new() -> Self {
        Self {
            descriptor: NodeDescriptor::new(OutputDataNode::TAG, "Output Data", NodeRole::Sink)
                .with_category("data")
                .with_input("data")
                .with_output("data"),
        }
    }
}

impl Default for OutputDataNodeFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeFactory for OutputDataNodeFactory {
    fn descriptor(&self) -> &NodeDescriptor {
        &self.descriptor
    }

    fn create(&self) -> Result<Box<dyn Node>, NodeError> {
        Ok(Box::new(OutputDataNode))
    }
}
