use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use jobpool_core::JobId;

/// Wire frame for results crossing a process boundary.
///
/// The envelope is decoded in two steps: the frame itself, then the
/// payload. A payload that fails to decode still identifies its job, so the
/// manager can report the failure instead of waiting for a result that
/// will never arrive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub job_id: JobId,

    /// MessagePack-encoded `JobResult<T>`.
    #[serde(with = "serde_bytes")]
    pub payload: Vec<u8>,

    /// When the worker posted the result.
    pub timestamp: DateTime<Utc>,

    /// Process id of the posting worker.
    pub sender_pid: u32,
}

impl Envelope {
    /// Create a new envelope, serializing the payload with MessagePack.
    pub fn new<T: Serialize>(job_id: JobId, payload: &T) -> Result<Self, rmp_serde::encode::Error> {
        Ok(Self {
            job_id,
            payload: rmp_serde::to_vec_named(payload)?,
            timestamp: Utc::now(),
            sender_pid: std::process::id(),
        })
    }

    /// Deserialize the payload into the expected type.
    pub fn decode<T: for<'de> Deserialize<'de>>(&self) -> Result<T, rmp_serde::decode::Error> {
        rmp_serde::from_slice(&self.payload)
    }

    /// Serialize this entire envelope to MessagePack bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, rmp_serde::encode::Error> {
        rmp_serde::to_vec_named(self)
    }

    /// Deserialize an envelope from MessagePack bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, rmp_serde::decode::Error> {
        rmp_serde::from_slice(bytes)
    }
}

/// Helper module for serde to handle `Vec<u8>` as raw bytes in MessagePack.
mod serde_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_bytes(bytes)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let bytes: &[u8] = Deserialize::deserialize(d)?;
        Ok(bytes.to_vec())
    }
}
