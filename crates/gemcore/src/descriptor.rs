//! Static schema of a node kind: ordered fields, constant codecs and role.

use crate::{ConstantError, NodeTag, Value};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// How the engine treats a node kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeRole {
    /// Pure source: seeds the run and never waits for inputs
    Source,
    /// Terminal node: its outputs are returned to the caller, not propagated
    Sink,
    Transform,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeDescriptor {
    pub tag: NodeTag,
    pub name: String,
    pub category: String,
    pub role: NodeRole,
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
    pub constants: Vec<ConstantField>,
}

impl NodeDescriptor {
    pub fn new(tag: NodeTag, name: impl Into<String>, role: NodeRole) -> Self {
        Self {
            tag,
            name: name.into(),
            category: "core".to_string(),
            role,
            inputs: Vec::new(),
            outputs: Vec::new(),
            constants: Vec::new(),
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_input(mut self, name: impl Into<String>) -> Self {
        self.inputs.push(name.into());
        self
    }

    pub fn with_output(mut self, name: impl Into<String>) -> Self {
        self.outputs.push(name.into());
        self
    }

    pub fn with_constant(mut self, name: impl Into<String>, kind: ConstantKind) -> Self {
        self.constants.push(ConstantField {
            name: name.into(),
            kind,
        });
        self
    }

    pub fn is_source(&self) -> bool {
        self.role == NodeRole::Source
    }

    pub fn is_sink(&self) -> bool {
        self.role == NodeRole::Sink
    }

    pub fn constant(&self, name: &str) -> Option<&ConstantField> {
        self.constants.iter().find(|c| c.name == name)
    }

    pub fn constant_names(&self) -> impl Iterator<Item = &str> {
        self.constants.iter().map(|c| c.name.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstantField {
    pub name: String,
    pub kind: ConstantKind,
}

impl ConstantField {
    pub fn serialize(&self, value: &Value) -> Result<Vec<u8>, ConstantError> {
        self.kind.serialize(value)
    }

    pub fn deserialize(&self, bytes: &[u8]) -> Result<Value, ConstantError> {
        self.kind.deserialize(bytes)
    }
}

/// Byte codec of a constant field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConstantKind {
    /// UTF-8 text
    Text { default: String },
    /// 8-byte big-endian signed integer
    Integer { default: i64 },
    /// Single byte, 0 or 1
    Flag { default: bool },
    /// UTF-8 of the selected option
    Choice { options: Vec<String>, default: usize },
    /// Opaque bytes
    Raw,
}

impl ConstantKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            ConstantKind::Text { .. } => "string",
            ConstantKind::Integer { .. } => "integer",
            ConstantKind::Flag { .. } => "bool",
            ConstantKind::Choice { .. } => "choice",
            ConstantKind::Raw => "bytes",
        }
    }

    pub fn serialize(&self, value: &Value) -> Result<Vec<u8>, ConstantError> {
        match (self, value) {
            (ConstantKind::Text { .. }, Value::String(s)) => Ok(s.as_bytes().to_vec()),
            (ConstantKind::Integer { .. }, Value::Number(n)) if n.fract() == 0.0 => {
                Ok((*n as i64).to_be_bytes().to_vec())
            }
            (ConstantKind::Flag { .. }, Value::Bool(b)) => Ok(vec![u8::from(*b)]),
            (ConstantKind::Choice { options, .. }, Value::String(s)) => {
                if options.contains(s) {
                    Ok(s.as_bytes().to_vec())
                } else {
                    Err(ConstantError::UnknownChoice(s.clone()))
                }
            }
            (ConstantKind::Raw, Value::Bytes(b)) => Ok(b.clone()),
            (kind, other) => Err(ConstantError::TypeMismatch {
                expected: kind.type_name(),
                actual: other.type_name(),
            }),
        }
    }

    pub fn deserialize(&self, bytes: &[u8]) -> Result<Value, ConstantError> {
        match self {
            ConstantKind::Text { .. } => std::str::from_utf8(bytes)
                .map(Value::from)
                .map_err(|_| ConstantError::InvalidUtf8),
            ConstantKind::Integer { .. } => {
                let raw = <[u8; 8]>::try_from(bytes).map_err(|_| ConstantError::InvalidLength {
                    expected: 8,
                    actual: bytes.len(),
                })?;
                Ok(Value::from(i64::from_be_bytes(raw)))
            }
            ConstantKind::Flag { .. } => match bytes {
                [0] => Ok(Value::Bool(false)),
                [1] => Ok(Value::Bool(true)),
                [other] => Err(ConstantError::InvalidFlag(*other)),
                _ => Err(ConstantError::InvalidLength {
                    expected: 1,
                    actual: bytes.len(),
                }),
            },
            ConstantKind::Choice { options, .. } => {
                let text = std::str::from_utf8(bytes).map_err(|_| ConstantError::InvalidUtf8)?;
                if options.iter().any(|o| o == text) {
                    Ok(Value::from(text))
                } else {
                    Err(ConstantError::UnknownChoice(text.to_string()))
                }
            }
            ConstantKind::Raw => Ok(Value::Bytes(bytes.to_vec())),
        }
    }

    pub fn default_value(&self) -> Value {
        match self {
            ConstantKind::Text { default } => Value::from(default.as_str()),
            ConstantKind::Integer { default } => Value::from(*default),
            ConstantKind::Flag { default } => Value::Bool(*default),
            ConstantKind::Choice { options, default } => options
                .get(*default)
                .map(|o| Value::from(o.as_str()))
                .unwrap_or(Value::Null),
            ConstantKind::Raw => Value::Bytes(Vec::new()),
        }
    }
}

/// Read-only tag → descriptor lookup consumed by the codec.
pub trait DescriptorLookup {
    fn lookup(&self, tag: &NodeTag) -> Option<&NodeDescriptor>;
}

impl DescriptorLookup for HashMap<NodeTag, NodeDescriptor> {
    fn lookup(&self, tag: &NodeTag) -> Option<&NodeDescriptor> {
        self.get(tag)
    }
}

impl DescriptorLookup for [NodeDescriptor] {
    fn lookup(&self, tag: &NodeTag) -> Option<&NodeDescriptor> {
        self.iter().find(|d| d.tag == *tag)
    }
}
