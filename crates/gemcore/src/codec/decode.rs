use super::{read_be, FileHeader, BLOB_LEN_SIZE, COUNT_SIZE, DELIMITER, RECORD_LEN_SIZE};
use crate::{DescriptorLookup, ExecutableGraph, FormatError, NodeRecord, NodeTag, SlotId};

/// Decode a `.gem` buffer into an executable graph.
pub fn decode<L>(bytes: &[u8], lookup: &L) -> Result<ExecutableGraph, FormatError>
where
    L: DescriptorLookup + ?Sized,
{
    decode_with_header(bytes, lookup).map(|(_, graph)| graph)
}

pub fn decode_with_header<L>(
    bytes: &[u8],
    lookup: &L,
) -> Result<(FileHeader, ExecutableGraph), FormatError>
where
    L: DescriptorLookup + ?Sized,
{
    let header = FileHeader::parse(bytes)?;
    let mut graph = ExecutableGraph::new();
    let mut offset = FileHeader::ENCODED_LEN;

    while offset < bytes.len() {
        let declared = read_be(slice(bytes, offset, RECORD_LEN_SIZE)?) as usize;
        offset += RECORD_LEN_SIZE;
        let payload = slice(bytes, offset, declared)?;
        let record = RecordDecoder::new(graph.len(), offset, header.uid_size, payload)
            .decode(lookup)?;
        graph.push(record);
        offset += declared;
    }

    if graph.is_empty() {
        return Err(FormatError::NoRecords);
    }
    tracing::debug!(nodes = graph.len(), uid_size = header.uid_size, "decoded executable graph");
    Ok((header, graph))
}

fn slice(bytes: &[u8], offset: usize, len: usize) -> Result<&[u8], FormatError> {
    bytes
        .get(offset..offset + len)
        .ok_or_else(|| FormatError::Truncated {
            offset: bytes.len(),
            needed: offset + len - bytes.len(),
        })
}

/// Parser position inside a record body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecodeMode {
    /// The three section counts
    Sizes,
    /// One input slot id per step
    Inputs,
    /// Consumer count of the next output field
    RefSizes,
    /// One consumer slot id per step
    Outputs,
    /// Length of the next constant blob
    ConstSizes,
    /// Blob bytes
    Const,
    Done,
}

/// Decodes one record payload: the body followed by its delimiter.
struct RecordDecoder<'a> {
    index: usize,
    /// Absolute file offset of the payload, for error reporting
    offset: usize,
    uid_size: usize,
    payload: &'a [u8],
    pos: usize,
    input_count: usize,
    output_count: usize,
    const_count: usize,
    inputs: Vec<SlotId>,
    outputs: Vec<Vec<SlotId>>,
    pending_refs: usize,
    refs: Vec<SlotId>,
    pending_blob: usize,
    blobs: Vec<Vec<u8>>,
}

impl<'a> RecordDecoder<'a> {
    fn new(index: usize, offset: usize, uid_size: u8, payload: &'a [u8]) -> Self {
        Self {
            index,
            offset,
            uid_size: usize::from(uid_size),
            payload,
            pos: 0,
            input_count: 0,
            output_count: 0,
            const_count: 0,
            inputs: Vec::new(),
            outputs: Vec::new(),
            pending_refs: 0,
            refs: Vec::new(),
            pending_blob: 0,
            blobs: Vec::new(),
        }
    }

    fn decode<L>(mut self, lookup: &L) -> Result<NodeRecord, FormatError>
    where
        L: DescriptorLookup + ?Sized,
    {
        let tag_bytes = self.take(NodeTag::LEN)?;
        let tag = NodeTag::from_bytes(tag_bytes).map_err(|_| FormatError::InvalidTag {
            record: self.index,
            bytes: tag_bytes.to_vec(),
        })?;
        let descriptor = lookup.lookup(&tag).ok_or(FormatError::UnknownNodeTag {
            record: self.index,
            tag,
        })?;

        let mut mode = DecodeMode::Sizes;
        while mode != DecodeMode::Done {
            mode = self.step(mode)?;
        }
        // Exactly one byte, the delimiter, may remain after the body.
        if self.pos + 1 != self.payload.len() {
            return Err(self.length_mismatch(self.pos));
        }
        if self.payload[self.pos] != DELIMITER {
            return Err(FormatError::MissingDelimiter {
                offset: self.offset + self.pos,
            });
        }

        let mismatch = |detail: String| FormatError::SchemaMismatch {
            record: self.index,
            tag,
            detail,
        };
        if self.inputs.len() != descriptor.inputs.len() {
            return Err(mismatch(format!(
                "{} inputs, descriptor declares {}",
                self.inputs.len(),
                descriptor.inputs.len()
            )));
        }
        if self.outputs.len() != descriptor.outputs.len() {
            return Err(mismatch(format!(
                "{} outputs, descriptor declares {}",
                self.outputs.len(),
                descriptor.outputs.len()
            )));
        }
        if self.blobs.len() != descriptor.constants.len() {
            return Err(mismatch(format!(
                "{} constants, descriptor declares {}",
                self.blobs.len(),
                descriptor.constants.len()
            )));
        }

        // Blobs are stored in descriptor order.
        let constants = descriptor
            .constant_names()
            .map(str::to_string)
            .zip(self.blobs)
            .collect();

        Ok(NodeRecord {
            tag,
            inputs: self.inputs,
            outputs: self.outputs,
            constants,
        })
    }

    fn step(&mut self, mode: DecodeMode) -> Result<DecodeMode, FormatError> {
        let next = match mode {
            DecodeMode::Sizes => {
                self.input_count = self.count()?;
                self.output_count = self.count()?;
                self.const_count = self.count()?;
                self.after_sizes()
            }
            DecodeMode::Inputs => {
                let id = self.uid()?;
                self.inputs.push(id);
                if self.inputs.len() < self.input_count {
                    DecodeMode::Inputs
                } else {
                    self.after_inputs()
                }
            }
            DecodeMode::RefSizes => {
                let refs = self.count()?;
                if refs == 0 {
                    self.outputs.push(Vec::new());
                    self.after_output_field()
                } else {
                    self.pending_refs = refs;
                    DecodeMode::Outputs
                }
            }
            DecodeMode::Outputs => {
                let id = self.uid()?;
                self.refs.push(id);
                self.pending_refs -= 1;
                if self.pending_refs > 0 {
                    DecodeMode::Outputs
                } else {
                    self.outputs.push(std::mem::take(&mut self.refs));
                    self.after_output_field()
                }
            }
            DecodeMode::ConstSizes => {
                self.pending_blob = read_be(self.take(BLOB_LEN_SIZE)?) as usize;
                DecodeMode::Const
            }
            DecodeMode::Const => {
                // A zero-length blob takes no bytes.
                let blob = self.take(self.pending_blob)?.to_vec();
                self.blobs.push(blob);
                if self.blobs.len() < self.const_count {
                    DecodeMode::ConstSizes
                } else {
                    DecodeMode::Done
                }
            }
            DecodeMode::Done => DecodeMode::Done,
        };
        Ok(next)
    }

    fn after_sizes(&self) -> DecodeMode {
        if self.input_count > 0 {
            DecodeMode::Inputs
        } else {
            self.after_inputs()
        }
    }

    fn after_inputs(&self) -> DecodeMode {
        if self.output_count > 0 {
            DecodeMode::RefSizes
        } else {
            self.after_outputs()
        }
    }

    fn after_output_field(&self) -> DecodeMode {
        if self.outputs.len() < self.output_count {
            DecodeMode::RefSizes
        } else {
            self.after_outputs()
        }
    }

    fn after_outputs(&self) -> DecodeMode {
        if self.const_count > 0 {
            DecodeMode::ConstSizes
        } else {
            DecodeMode::Done
        }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], FormatError> {
        let end = self.pos + len;
        let payload: &'a [u8] = self.payload;
        let chunk = payload.get(self.pos..end).ok_or_else(|| self.length_mismatch(end))?;
        self.pos = end;
        Ok(chunk)
    }

    fn count(&mut self) -> Result<usize, FormatError> {
        Ok(read_be(self.take(COUNT_SIZE)?) as usize)
    }

    fn uid(&mut self) -> Result<SlotId, FormatError> {
        Ok(read_be(self.take(self.uid_size)?))
    }

    /// `consumed` counts body bytes; the delimiter adds one more.
    fn length_mismatch(&self, consumed: usize) -> FormatError {
        FormatError::FrameLengthMismatch {
            record: self.index,
            declared: self.payload.len(),
            consumed: consumed + 1,
        }
    }
}
