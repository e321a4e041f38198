//! Core data types for the PledgeGuard protocol

pub mod campaign;
pub mod commitment;
pub mod oracle;
pub mod receipt;

/// 32-byte digest (deliverable hashes, commitments, nullifier hashes)
pub type Hash32 = [u8; 32];

/// Serde helper rendering [u8; 32] as a hex string
pub mod hex32 {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<[u8; 32], D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        super::parse_hash32(&s).map_err(serde::de::Error::custom)
    }
}

/// Same as [`hex32`] for optional digests
pub mod hex32_opt {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &Option<[u8; 32]>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match bytes {
            Some(b) => serializer.serialize_some(&hex::encode(b)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<[u8; 32]>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s: Option<String> = Option::deserialize(deserializer)?;
        s.map(|s| super::parse_hash32(&s).map_err(serde::de::Error::custom))
            .transpose()
    }
}

/// Parse a 64-char hex string into a digest
pub fn parse_hash32(s: &str) -> Result<Hash32, String> {
    let bytes = hex::decode(s.trim_start_matches("0x")).map_err(|e| e.to_string())?;
    if bytes.len() != 32 {
        return Err(format!("expected 32 bytes, got {}", bytes.len()));
    }
    let mut arr = [0u8; 32];
    arr.copy_from_slice(&bytes);
    Ok(arr)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hash32() {
        let hex = "ab".repeat(32);
        assert_eq!(parse_hash32(&hex).unwrap(), [0xab; 32]);
        assert_eq!(parse_hash32(&format!("0x{hex}")).unwrap(), [0xab; 32]);
        assert!(parse_hash32("abcd").is_err());
        assert!(parse_hash32("zz").is_err());
    }
}
