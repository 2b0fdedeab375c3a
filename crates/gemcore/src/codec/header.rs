use super::{DEFAULT_UID_SIZE, DELIMITER, FILE_TYPE_EXECUTABLE, FORMAT_VERSION, MAGIC, MAX_UID_SIZE};
use crate::FormatError;

/// The two header sections preceding the records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHeader {
    pub file_type: u8,
    pub version: u8,
    /// Width in bytes of every slot id in the file
    pub uid_size: u8,
}

impl FileHeader {
    /// Bytes taken by magic, file type, version, uid size and both delimiters
    pub const ENCODED_LEN: usize = 8;

    pub fn new(uid_size: u8) -> Self {
        Self {
            file_type: FILE_TYPE_EXECUTABLE,
            version: FORMAT_VERSION,
            uid_size,
        }
    }

    pub fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&[self.file_type, self.version, DELIMITER]);
        out.extend_from_slice(&[self.uid_size, DELIMITER]);
    }

    pub fn parse(bytes: &[u8]) -> Result<Self, FormatError> {
        let magic_len = MAGIC.len().min(bytes.len());
        if bytes[..magic_len] != MAGIC[..magic_len] {
            return Err(FormatError::BadMagic {
                found: bytes[..magic_len].to_vec(),
            });
        }
        if bytes.len() < Self::ENCODED_LEN {
            return Err(FormatError::Truncated {
                offset: bytes.len(),
                needed: Self::ENCODED_LEN - bytes.len(),
            });
        }

        let header = Self {
            file_type: bytes[3],
            version: bytes[4],
            uid_size: bytes[6],
        };
        if bytes[5] != DELIMITER {
            return Err(FormatError::MissingDelimiter { offset: 5 });
        }
        if bytes[7] != DELIMITER {
            return Err(FormatError::MissingDelimiter { offset: 7 });
        }
        if header.file_type != FILE_TYPE_EXECUTABLE {
            return Err(FormatError::UnknownFileType(header.file_type));
        }
        if header.version != FORMAT_VERSION {
            return Err(FormatError::UnknownVersion(header.version));
        }
        if header.uid_size == 0 || header.uid_size > MAX_UID_SIZE {
            return Err(FormatError::UnsupportedUidSize(header.uid_size));
        }
        Ok(header)
    }
}

impl Default for FileHeader {
    fn default() -> Self {
        Self::new(DEFAULT_UID_SIZE)
    }
}
