//! Commitment records for private contributions

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{hex32, Hash32};

/// Registered commitment/nullifier pair
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitmentRecord {
    /// Binding digest over (amount, secret, nullifier)
    #[serde(with = "hex32")]
    pub commitment: Hash32,
    /// Lower bound the hidden amount is proven against
    pub min_amount: Decimal,
    #[serde(with = "hex32")]
    pub nullifier_hash: Hash32,
    /// Set once credited to a campaign
    pub used: bool,
    pub registered_at: i64,
    pub spent_in: Option<Uuid>,
    pub spent_at: Option<i64>,
}

/// Proof accompanying a private contribution.
///
/// `payload` is opaque to the ledger; only the configured verifier reads it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContributionProof {
    /// Nullifier hash the proof is bound to
    #[serde(with = "hex32")]
    pub nullifier_hash: Hash32,
    #[serde(with = "payload_hex")]
    pub payload: Vec<u8>,
}

/// Preimage of a commitment, revealed only to claim a private refund
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitmentOpening {
    pub amount: Decimal,
    #[serde(with = "hex32")]
    pub secret: Hash32,
    #[serde(with = "hex32")]
    pub nullifier: Hash32,
}

mod payload_hex {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        hex::decode(s.trim_start_matches("0x")).map_err(serde::de::Error::custom)
    }
}
