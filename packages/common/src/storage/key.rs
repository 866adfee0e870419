use std::fmt;

/// An opaque store key encoded as a filesystem-safe file name.
///
/// Keys are arbitrary strings (`cast_<id>`, `<project>_scenes`, ...), so the
/// on-disk name is the lowercase hex encoding of the key's UTF-8 bytes.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct EncodedKey(String);

impl EncodedKey {
    /// Encode a store key.
    pub fn encode(key: &str) -> Self {
        Self(hex::encode(key.as_bytes()))
    }

    /// Decode a file name produced by [`EncodedKey::encode`].
    ///
    /// Returns `None` for names that are not valid hex-encoded UTF-8, such as
    /// temp files or anything else that wandered into the directory.
    pub fn decode_file_name(name: &str) -> Option<String> {
        let bytes = hex::decode(name).ok()?;
        String::from_utf8(bytes).ok()
    }

    /// Return the encoded file name.
    pub fn as_file_name(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for EncodedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EncodedKey({})", self.0)
    }
}

impl fmt::Display for EncodedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A point-in-time storage usage estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaEstimate {
    /// Bytes currently in use.
    pub usage: u64,
    /// Total bytes the store may hold.
    pub quota: u64,
}

impl QuotaEstimate {
    /// Bytes still available before the quota is reached.
    pub fn available(&self) -> u64 {
        self.quota.saturating_sub(self.usage)
    }

    /// Check that replacing `replaced` bytes with `incoming` bytes fits.
    pub fn admit(&self, replaced: u64, incoming: u64) -> Result<(), super::StorageError> {
        let available = self.available().saturating_add(replaced);
        if incoming > available {
            return Err(super::StorageError::QuotaExceeded {
                requested: incoming,
                available,
            });
        }
        Ok(())
    }
}
