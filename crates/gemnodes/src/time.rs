use async_trait::async_trait;
use gemcore::{
    ConstantKind, Node, NodeContext, NodeDescriptor, NodeError, NodeOutput, NodeRole, NodeTag,
    Value,
};
use gemruntime::NodeFactory;
use tokio::time::{sleep, Duration};

/// Delay a value for a specified duration
pub struct DelayNode;

impl DelayNode {
    pub const TAG: NodeTag = NodeTag::from_static("Delay");
}

#[async_trait]
impl Node for DelayNode {
    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let value = ctx.require_input("value")?.clone();
        let delay_ms = ctx
            .constant_or("delay_ms", Value::Number(0.0))
            .as_f64()
            .unwrap_or(0.0);

        if delay_ms < 0.0 {
            return Err(NodeError::Configuration(format!(
                "delay_ms must not be negative, got {}",
                delay_ms
            )));
        }

        ctx.events.info(format!("Delaying for {}ms", delay_ms));

        tokio::select! {
            _ = sleep(Duration::from_millis(delay_ms as u64)) => {}
            _ = ctx.cancellation.cancelled() => return Err(NodeError::Cancelled),
        }

        Ok(NodeOutput::new().with_output("value", value))
    }
}

pub struct DelayNodeFactory {
    descriptor: NodeDescriptor,
}

impl DelayNodeFactory {
    pub fn new() -> Self {
        Self {
            descriptor: NodeDescriptor::new(DelayNode::TAG, "Delay", NodeRole::Transform)
                .with_category("time")
                .with_input("value")
                .with_output("value")
                .with_constant("delay_ms", ConstantKind::Integer { default: 1000 }),
        }
    }
}

impl Default for DelayNodeFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeFactory for DelayNodeFactory {
    fn descriptor(&self) -> &NodeDescriptor {
        &self.descriptor
    }

    fn create(&self) -> Result<Box<dyn Node>, NodeError> {
        Ok(Box::new(DelayNode))
    }
}
