use crate::TagError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Identifier of one input slot instance, unique within a graph.
pub type SlotId = u64;

/// Five-character ASCII node tag selecting a node descriptor.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NodeTag([u8; NodeTag::LEN]);

impl NodeTag {
    pub const LEN: usize = 5;

    pub fn new(tag: &str) -> Result<Self, TagError> {
        Self::from_bytes(tag.as_bytes()).map_err(|_| TagError(tag.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TagError> {
        match <[u8; Self::LEN]>::try_from(bytes) {
            Ok(raw) if raw.iter().all(|b| Self::is_tag_byte(*b)) => Ok(Self(raw)),
            _ => Err(TagError(String::from_utf8_lossy(bytes).into_owned())),
        }
    }

    /// Build a tag from a literal. Invalid literals fail at compile time in const contexts.
    pub const fn from_static(tag: &'static str) -> Self {
        let bytes = tag.as_bytes();
        assert!(bytes.len() == Self::LEN, "node tag must be 5 bytes long");
        let mut i = 0;
        while i < Self::LEN {
            assert!(Self::is_tag_byte(bytes[i]), "node tag must be printable ASCII");
            i += 1;
        }
        Self([bytes[0], bytes[1], bytes[2], bytes[3], bytes[4]])
    }

    pub fn as_bytes(&self) -> &[u8; Self::LEN] {
        &self.0
    }

    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.0).unwrap_or_default()
    }

    const fn is_tag_byte(b: u8) -> bool {
        b.is_ascii_graphic() || b == b' '
    }
}

impl fmt::Display for NodeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for NodeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeTag({})", self.as_str())
    }
}

impl TryFrom<String> for NodeTag {
    type Error = TagError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        NodeTag::new(&value)
    }
}

impl From<NodeTag> for String {
    fn from(tag: NodeTag) -> Self {
        tag.as_str().to_string()
    }
}

/// One node instance of an executable graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub tag: NodeTag,
    /// Slot id of every declared input field, in descriptor order
    pub inputs: Vec<SlotId>,
    /// Per declared output field, the input slots it feeds
    pub outputs: Vec<Vec<SlotId>>,
    /// Raw constant blobs keyed by field name
    pub constants: BTreeMap<String, Vec<u8>>,
}

impl NodeRecord {
    pub fn new(tag: NodeTag) -> Self {
        Self {
            tag,
            inputs: Vec::new(),
            outputs: Vec::new(),
            constants: BTreeMap::new(),
        }
    }

    pub fn with_input(mut self, slot: SlotId) -> Self {
        self.inputs.push(slot);
        self
    }

    pub fn with_output(mut self, consumers: impl IntoIterator<Item = SlotId>) -> Self {
        self.outputs.push(consumers.into_iter().collect());
        self
    }

    pub fn with_constant(mut self, name: impl Into<String>, blob: impl Into<Vec<u8>>) -> Self {
        self.constants.insert(name.into(), blob.into());
        self
    }

    /// Every slot id this record mentions: its inputs followed by all output consumers.
    pub fn referenced_slots(&self) -> impl Iterator<Item = SlotId> + '_ {
        self.inputs
            .iter()
            .chain(self.outputs.iter().flatten())
            .copied()
    }
}

/// Ordered node records; a node's position is its identity during a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutableGraph {
    nodes: Vec<NodeRecord>,
}

impl ExecutableGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record, returning its index
    pub fn push(&mut self, node: NodeRecord) -> usize {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    pub fn get(&self, index: usize) -> Option<&NodeRecord> {
        self.nodes.get(index)
    }

    pub fn nodes(&self) -> &[NodeRecord] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &NodeRecord)> {
        self.nodes.iter().enumerate()
    }

    pub fn max_slot_id(&self) -> Option<SlotId> {
        self.nodes.iter().flat_map(NodeRecord::referenced_slots).max()
    }
}

impl From<Vec<NodeRecord>> for ExecutableGraph {
    fn from(nodes: Vec<NodeRecord>) -> Self {
        Self { nodes }
    }
}

impl FromIterator<NodeRecord> for ExecutableGraph {
    fn from_iter<T: IntoIterator<Item = NodeRecord>>(iter: T) -> Self {
        Self {
            nodes: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_requires_five_printable_ascii_bytes() {
        assert!(NodeTag::new("InpDT").is_ok());
        assert!(NodeTag::new("Inp").is_err());
        assert!(NodeTag::new("InpDTX").is_err());
        assert!(NodeTag::new("Inp\nT").is_err());
        assert!(NodeTag::new("Inpé").is_err());
    }

    #[test]
    fn tag_serializes_as_plain_string() {
        let tag = NodeTag::from_static("OutDT");
        assert_eq!(serde_json::to_string(&tag).unwrap(), "\"OutDT\"");
        let back: NodeTag = serde_json::from_str("\"OutDT\"").unwrap();
        assert_eq!(back, tag);
        assert!(serde_json::from_str::<NodeTag>("\"toolong\"").is_err());
    }

    #[test]
    fn max_slot_id_covers_inputs_and_outputs() {
        let graph: ExecutableGraph = vec![
            NodeRecord::new(NodeTag::from_static("InpDT")).with_output([9]),
            NodeRecord::new(NodeTag::from_static("OutDT")).with_input(4),
        ]
        .into();
        assert_eq!(graph.max_slot_id(), Some(9));
    }
}
