use super::{
    max_for_width, write_be, FileHeader, BLOB_LEN_SIZE, COUNT_SIZE, DELIMITER, MAX_UID_SIZE,
    RECORD_LEN_SIZE,
};
use crate::{DescriptorLookup, EncodeError, ExecutableGraph, NodeDescriptor, NodeRecord, SlotId};

/// Encode a graph with the narrowest slot id width that fits it.
pub fn encode<L>(graph: &ExecutableGraph, lookup: &L) -> Result<Vec<u8>, EncodeError>
where
    L: DescriptorLookup + ?Sized,
{
    Encoder::new().encode(graph, lookup)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Encoder {
    uid_size: Option<u8>,
}

impl Encoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Force the width of slot ids instead of deriving it from the graph.
    pub fn with_uid_size(mut self, uid_size: u8) -> Self {
        self.uid_size = Some(uid_size);
        self
    }

    pub fn encode<L>(&self, graph: &ExecutableGraph, lookup: &L) -> Result<Vec<u8>, EncodeError>
    where
        L: DescriptorLookup + ?Sized,
    {
        if graph.is_empty() {
            return Err(EncodeError::EmptyGraph);
        }
        let uid_size = match self.uid_size {
            Some(size) if size == 0 || size > MAX_UID_SIZE => {
                return Err(EncodeError::UnsupportedUidSize(size))
            }
            Some(size) => size,
            None => narrowest_uid_size(graph.max_slot_id().unwrap_or(0)),
        };

        let mut out = Vec::new();
        FileHeader::new(uid_size).write_to(&mut out);
        for (index, record) in graph.iter() {
            let descriptor = lookup.lookup(&record.tag).ok_or(EncodeError::UnknownNodeTag {
                node: index,
                tag: record.tag,
            })?;
            let payload = encode_record(index, record, descriptor, usize::from(uid_size))?;
            if payload.len() as u64 > max_for_width(RECORD_LEN_SIZE) {
                return Err(EncodeError::RecordTooLarge {
                    node: index,
                    len: payload.len(),
                });
            }
            write_be(&mut out, payload.len() as u64, RECORD_LEN_SIZE);
            out.extend_from_slice(&payload);
        }
        tracing::debug!(nodes = graph.len(), uid_size, bytes = out.len(), "encoded executable graph");
        Ok(out)
    }
}

fn narrowest_uid_size(max_id: SlotId) -> u8 {
    let bits = u64::BITS - max_id.leading_zeros();
    bits.div_ceil(8).max(1) as u8
}

fn encode_record(
    index: usize,
    record: &NodeRecord,
    descriptor: &NodeDescriptor,
    uid_size: usize,
) -> Result<Vec<u8>, EncodeError> {
    check_schema(index, record, descriptor)?;

    let count = |what: &'static str, count: usize| -> Result<u64, EncodeError> {
        if count as u64 > max_for_width(COUNT_SIZE) {
            Err(EncodeError::CountOverflow { node: index, what, count })
        } else {
            Ok(count as u64)
        }
    };
    let uid = |out: &mut Vec<u8>, id: SlotId| -> Result<(), EncodeError> {
        if id > max_for_width(uid_size) {
            return Err(EncodeError::UidOverflow {
                node: index,
                id,
                uid_size: uid_size as u8,
            });
        }
        write_be(out, id, uid_size);
        Ok(())
    };

    let mut out = Vec::new();
    out.extend_from_slice(record.tag.as_bytes());
    write_be(&mut out, count("input", record.inputs.len())?, COUNT_SIZE);
    write_be(&mut out, count("output", record.outputs.len())?, COUNT_SIZE);
    write_be(&mut out, count("constant", record.constants.len())?, COUNT_SIZE);

    for id in &record.inputs {
        uid(&mut out, *id)?;
    }
    for consumers in &record.outputs {
        write_be(&mut out, count("consumer", consumers.len())?, COUNT_SIZE);
        for id in consumers {
            uid(&mut out, *id)?;
        }
    }
    // Descriptor order, never map order.
    for field in &descriptor.constants {
        let blob = record
            .constants
            .get(&field.name)
            .map(Vec::as_slice)
            .unwrap_or_default();
        if blob.len() as u64 > max_for_width(BLOB_LEN_SIZE) {
            return Err(EncodeError::BlobTooLarge {
                node: index,
                field: field.name.clone(),
                len: blob.len(),
            });
        }
        write_be(&mut out, blob.len() as u64, BLOB_LEN_SIZE);
        out.extend_from_slice(blob);
    }
    out.push(DELIMITER);
    Ok(out)
}

fn check_schema(
    index: usize,
    record: &NodeRecord,
    descriptor: &NodeDescriptor,
) -> Result<(), EncodeError> {
    let mismatch = |detail: String| EncodeError::SchemaMismatch {
        node: index,
        tag: record.tag,
        detail,
    };
    if record.inputs.len() != descriptor.inputs.len() {
        return Err(mismatch(format!(
            "{} inputs, descriptor declares {}",
            record.inputs.len(),
            descriptor.inputs.len()
        )));
    }
    if record.outputs.len() != descriptor.outputs.len() {
        return Err(mismatch(format!(
            "{} outputs, descriptor declares {}",
            record.outputs.len(),
            descriptor.outputs.len()
        )));
    }
    let declared: Vec<&str> = descriptor.constant_names().collect();
    let mut present: Vec<&str> = record.constants.keys().map(String::as_str).collect();
    let mut expected = declared.clone();
    present.sort_unstable();
    expected.sort_unstable();
    if present != expected {
        return Err(mismatch(format!(
            "constants {:?}, descriptor declares {:?}",
            present, declared
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uid_width_grows_with_largest_id() {
        assert_eq!(narrowest_uid_size(0), 1);
        assert_eq!(narrowest_uid_size(255), 1);
        assert_eq!(narrowest_uid_size(256), 2);
        assert_eq!(narrowest_uid_size(u64::MAX), 8);
    }
}
