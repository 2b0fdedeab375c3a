use async_trait::async_trait;
use gemcore::{
    ConstantKind, Node, NodeContext, NodeDescriptor, NodeError, NodeOutput, NodeRole, NodeTag,
};
use gemruntime::NodeFactory;

/// Multiplies a numeric input by a decimal factor
pub struct ScaleNode;

impl ScaleNode {
    pub const TAG: NodeTag = NodeTag::from_static("Scale");
}

#[async_trait]
impl Node for ScaleNode {
    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let input = ctx.require_input("x")?;
        let x = input.as_f64().ok_or_else(|| NodeError::InvalidInputType {
            field: "x".to_string(),
            expected: "number".to_string(),
            actual: input.type_name().to_string(),
        })?;

        // The factor is typed in by the user, so a bad one is the node's own failure
        let raw = ctx.require_constant("factor")?.as_str().unwrap_or_default();
        let factor: f64 = raw
            .trim()
            .parse()
            .map_err(|_| NodeError::runtime(format!("factor '{}' is not a number", raw)))?;

        Ok(NodeOutput::new().with_output("result", x * factor))
    }
}

pub struct ScaleNodeFactory {
    descriptor: NodeDescriptor,
}

impl ScaleNodeFactory {
    pub fn new() -> Self {
        Self {
            descriptor: NodeDescriptor::new(ScaleNode::TAG, "Scale", NodeRole::Transform)
                .with_category("math")
                .with_input("x")
                .with_output("result")
                .with_constant(
                    "factor",
                    ConstantKind::Text {
                        default: "1".to_string(),
                    },
                ),
        }
    }
}

impl Default for ScaleNodeFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeFactory for ScaleNodeFactory {
    fn descriptor(&self) -> &NodeDescriptor {
        &self.descriptor
    }

    fn create(&self) -> Result<Box<dyn Node>, NodeError> {
        Ok(Box::new(ScaleNode))
    }
}
