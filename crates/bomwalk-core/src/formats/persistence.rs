//! # Record Format
//!
//! Binary encoding of every value stored by `RedbCatalog`.
//!
//! Format: Header (5 bytes) + postcard-serialized value.
//! - 4 bytes: Magic ("BOMW")
//! - 1 byte: Version
//!
//! The header and the payload size are validated before the payload is
//! handed to postcard, so a corrupted or foreign record fails cleanly.

use crate::{BomError, primitives};
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Maximum accepted record size. A single part master with its whole
/// revision history stays far below this.
pub const MAX_RECORD_SIZE: usize = 64 * 1024 * 1024;

const HEADER_SIZE: usize = 5;

// =============================================================================
// RECORD HEADER
// =============================================================================

/// The header preceding every stored record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistenceHeader {
    pub magic: [u8; 4],
    pub version: u8,
}

impl PersistenceHeader {
    /// Header with the current format version.
    #[must_use]
    pub fn new() -> Self {
        Self {
            magic: *primitives::MAGIC_BYTES,
            version: primitives::FORMAT_VERSION,
        }
    }

    pub fn validate(&self) -> Result<(), BomError> {
        if &self.magic != primitives::MAGIC_BYTES {
            return Err(BomError::Deserialization("Invalid magic bytes".to_string()));
        }
        if self.version != primitives::FORMAT_VERSION {
            return Err(BomError::Deserialization(format!(
                "Unsupported version: {} (expected {})",
                self.version,
                primitives::FORMAT_VERSION
            )));
        }
        Ok(())
    }

    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[0..4].copy_from_slice(&self.magic);
        bytes[4] = self.version;
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, BomError> {
        let (Some(magic), Some(&version)) = (bytes.get(0..4), bytes.get(4)) else {
            return Err(BomError::Deserialization("Header too short".to_string()));
        };
        let mut header = Self { magic: [0u8; 4], version };
        header.magic.copy_from_slice(magic);
        Ok(header)
    }
}

impl Default for PersistenceHeader {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// ENCODE / DECODE
// =============================================================================

/// Encode a value as header + postcard payload.
pub fn encode_record<T: Serialize>(value: &T) -> Result<Vec<u8>, BomError> {
    let payload =
        postcard::to_stdvec(value).map_err(|e| BomError::Serialization(e.to_string()))?;

    let mut record = Vec::with_capacity(HEADER_SIZE + payload.len());
    record.extend_from_slice(&PersistenceHeader::new().to_bytes());
    record.extend_from_slice(&payload);
    Ok(record)
}

/// Decode a record written by `encode_record`.
pub fn decode_record<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, BomError> {
    if bytes.len() > MAX_RECORD_SIZE {
        return Err(BomError::Deserialization(format!(
            "Record size {} bytes exceeds maximum allowed {} bytes",
            bytes.len(),
            MAX_RECORD_SIZE
        )));
    }

    let header = PersistenceHeader::from_bytes(bytes)?;
    header.validate()?;

    let payload = bytes.get(HEADER_SIZE..).unwrap_or_default();
    postcard::from_bytes(payload)
        .map_err(|e| BomError::Deserialization(format!("Failed to decode record: {}", e)))
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effectivity::Effectivity;
    use crate::{PartMaster, PartMasterKey, PartSubstituteLink, PartUsageLink};
    use chrono::{TimeZone, Utc};

    #[test]
    fn header_roundtrip() {
        let header = PersistenceHeader::new();
        let restored = PersistenceHeader::from_bytes(&header.to_bytes()).expect("parse header");
        assert_eq!(restored, header);
    }

    #[test]
    fn part_master_record_is_stable() {
        let date = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).single().expect("date");
        let mut part = PartMaster::new(PartMasterKey::new("ws", "P"), "alice");
        let rev = part.add_revision("A");
        rev.effectivities
            .push(Effectivity::date_based(1, "from May", Some(date), None).expect("eff"));
        rev.add_iteration(vec![
            PartUsageLink::new(1, "Q")
                .with_amount(2.5, Some("kg"))
                .with_substitute(PartSubstituteLink::new(2, "R")),
        ]);

        let bytes1 = encode_record(&part).expect("encode");
        let restored: PartMaster = decode_record(&bytes1).expect("decode");
        let bytes2 = encode_record(&restored).expect("encode again");

        assert_eq!(restored, part);
        assert_eq!(bytes1, bytes2, "encode -> decode -> encode must be bit-exact");
    }

    #[test]
    fn invalid_magic_rejected() {
        let mut bytes = vec![0u8; 10];
        bytes[0..4].copy_from_slice(b"XXXX");
        assert!(decode_record::<PartMaster>(&bytes).is_err());
    }

    #[test]
    fn truncated_record_rejected() {
        assert!(matches!(
            decode_record::<PartMaster>(b"BOM"),
            Err(BomError::Deserialization(_))
        ));
    }
}
