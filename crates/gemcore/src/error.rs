use crate::NodeTag;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FlowError {
    #[error("Format error: {0}")]
    Format(#[from] FormatError),

    #[error("Encode error: {0}")]
    Encode(#[from] EncodeError),

    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    /// A node reported one of its own expected failures. Carried unchanged.
    #[error("{0}")]
    ExecutionRuntime(NodeError),

    /// Any other failure raised while a node executed.
    #[error("Node {node} ({tag}) failed unexpectedly: {source}")]
    ExecutionDebug {
        node: usize,
        tag: NodeTag,
        #[source]
        source: NodeError,
    },

    #[error("Run cancelled")]
    Cancelled,

    #[error("Run exceeded the step limit of {limit} queue pops")]
    StepLimitExceeded { limit: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures raised by a node's `execute`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NodeError {
    /// Expected, node-specific failure (e.g. an unusable user-supplied constant).
    #[error("Runtime error: {0}")]
    Runtime(String),

    #[error("Missing required input: {0}")]
    MissingInput(String),

    #[error("Invalid input type for '{field}': expected {expected}, got {actual}")]
    InvalidInputType {
        field: String,
        expected: String,
        actual: String,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Node panicked: {0}")]
    Panicked(String),

    #[error("Cancelled")]
    Cancelled,
}

impl NodeError {
    pub fn runtime(message: impl Into<String>) -> Self {
        NodeError::Runtime(message.into())
    }

    pub fn is_runtime(&self) -> bool {
        matches!(self, NodeError::Runtime(_))
    }
}

/// Fatal problems found while preparing a graph for execution.
#[derive(Error, Debug)]
pub enum GraphError {
    #[error("Unknown node tag '{tag}' at node {node}")]
    UnknownNodeTag { node: usize, tag: NodeTag },

    #[error("Node {node} ({tag}) does not match its descriptor: {detail}")]
    SchemaMismatch {
        node: usize,
        tag: NodeTag,
        detail: String,
    },

    #[error("Node {node} ({tag}): constant '{field}' could not be decoded: {source}")]
    ConstantDecode {
        node: usize,
        tag: NodeTag,
        field: String,
        #[source]
        source: ConstantError,
    },

    #[error("Node {node} ({tag}) feeds slot {slot}, which is not an input of any node")]
    DanglingSlot { node: usize, tag: NodeTag, slot: u64 },

    #[error("Node {node} ({tag}) could not be instantiated: {source}")]
    Instantiation {
        node: usize,
        tag: NodeTag,
        #[source]
        source: NodeError,
    },
}

/// Byte-level problems in a `.gem` buffer. Decoding never returns a partial graph.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("Bad magic: expected \"SHC\", found {found:?}")]
    BadMagic { found: Vec<u8> },

    #[error("Truncated input at byte {offset}: {needed} more byte(s) required")]
    Truncated { offset: usize, needed: usize },

    #[error("Record {record}: declared length {declared} but the record body spans {consumed} byte(s)")]
    FrameLengthMismatch {
        record: usize,
        declared: usize,
        consumed: usize,
    },

    #[error("Unknown format version {0:#04x}")]
    UnknownVersion(u8),

    #[error("Unknown file type {0:#04x}")]
    UnknownFileType(u8),

    #[error("Unsupported slot id size of {0} byte(s)")]
    UnsupportedUidSize(u8),

    #[error("Expected a newline delimiter at byte {offset}")]
    MissingDelimiter { offset: usize },

    #[error("File contains no node records")]
    NoRecords,

    #[error("Record {record}: invalid node tag {bytes:?}")]
    InvalidTag { record: usize, bytes: Vec<u8> },

    #[error("Record {record}: unknown node tag '{tag}'")]
    UnknownNodeTag { record: usize, tag: NodeTag },

    #[error("Record {record} ({tag}) does not match its descriptor: {detail}")]
    SchemaMismatch {
        record: usize,
        tag: NodeTag,
        detail: String,
    },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    #[error("Graph has no nodes")]
    EmptyGraph,

    #[error("Unknown node tag '{tag}' at node {node}")]
    UnknownNodeTag { node: usize, tag: NodeTag },

    #[error("Node {node} ({tag}) does not match its descriptor: {detail}")]
    SchemaMismatch {
        node: usize,
        tag: NodeTag,
        detail: String,
    },

    #[error("Node {node}: {what} count {count} does not fit in one byte")]
    CountOverflow {
        node: usize,
        what: &'static str,
        count: usize,
    },

    #[error("Node {node}: slot id {id} does not fit in {uid_size} byte(s)")]
    UidOverflow { node: usize, id: u64, uid_size: u8 },

    #[error("Node {node}: constant '{field}' is {len} bytes, above the 65535 byte limit")]
    BlobTooLarge {
        node: usize,
        field: String,
        len: usize,
    },

    #[error("Node {node}: record is {len} bytes, above the 3-byte length limit")]
    RecordTooLarge { node: usize, len: usize },

    #[error("Unsupported slot id size of {0} byte(s)")]
    UnsupportedUidSize(u8),
}

/// A constant value could not be converted to or from its byte form.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConstantError {
    #[error("text constant is not valid UTF-8")]
    InvalidUtf8,

    #[error("expected {expected} byte(s), got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("flag byte must be 0 or 1, got {0}")]
    InvalidFlag(u8),

    #[error("'{0}' is not one of the allowed options")]
    UnknownChoice(String),

    #[error("expected a {expected} value, got {actual}")]
    TypeMismatch {
        expected: &'static str,
        actual: &'static str,
    },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Node tag must be exactly 5 printable ASCII characters, got {0:?}")]
pub struct TagError(pub String);
