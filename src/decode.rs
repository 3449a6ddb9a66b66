//! Pure decoding of miner API replies.
//!
//! Every reply is one JSON object holding a `STATUS` array, an optional payload
//! array under a command specific key (`SUMMARY`, `DEVS`, ...) and an `id`.
//! Nothing here touches the network, so replies can be tested as literals.
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{ApiError, ApiResult};
use crate::types::StatusRecord;

/// A decoded reply with its payload array.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseEnvelope<T> {
    pub status: Vec<StatusRecord>,
    pub payload: Vec<T>,
    pub id: i64,
}

#[derive(Deserialize)]
struct RawEnvelope {
    #[serde(rename = "STATUS")]
    status: Vec<StatusRecord>,
    #[serde(default)]
    id: i64,
    #[serde(flatten)]
    rest: Map<String, Value>,
}

impl<T> ResponseEnvelope<T> {
    pub fn first_status(&self) -> ApiResult<&StatusRecord> {
        self.status
            .first()
            .ok_or_else(|| ApiError::Decode("empty STATUS array".into()))
    }

    /// Fail with [`ApiError::Rejected`] unless the first status is "S".
    pub fn ensure_success(&self) -> ApiResult<()> {
        ensure_success(&self.status)
    }

    /// Take the only payload element; zero or several is a protocol error.
    pub fn single(self, key: &str) -> ApiResult<T> {
        let mut payload = self.payload;
        if payload.len() != 1 {
            return Err(ApiError::Cardinality {
                key: key.to_string(),
                count: payload.len(),
            });
        }
        Ok(payload.remove(0))
    }
}

fn ensure_success(status: &[StatusRecord]) -> ApiResult<()> {
    let first = status
        .first()
        .ok_or_else(|| ApiError::Decode("empty STATUS array".into()))?;
    if first.is_success() {
        Ok(())
    } else {
        Err(ApiError::Rejected {
            code: first.code,
            description: first.description.clone(),
        })
    }
}

/// Decode `raw` as an envelope whose payload array sits under `payload_key`.
///
/// A missing payload key decodes as an empty payload: cgminer leaves the key
/// out when it has nothing to list (no devices, no pools) and on failed
/// commands. Callers that expect exactly one object get
/// [`ApiError::Cardinality`] from [`ResponseEnvelope::single`].
pub fn decode<T: DeserializeOwned>(raw: &[u8], payload_key: &str) -> ApiResult<ResponseEnvelope<T>> {
    let mut env: RawEnvelope = serde_json::from_slice(raw)?;
    let payload = match env.rest.remove(payload_key) {
        Some(v) => serde_json::from_value::<Vec<T>>(v)
            .map_err(|e| ApiError::Decode(format!("{payload_key}: {e}")))?,
        None => Vec::new(),
    };
    Ok(ResponseEnvelope {
        status: env.status,
        payload,
        id: env.id,
    })
}

/// Decode a reply that carries only `STATUS` (and `id`), such as `addpool`.
pub fn decode_status(raw: &[u8]) -> ApiResult<ResponseEnvelope<()>> {
    let env: RawEnvelope = serde_json::from_slice(raw)?;
    Ok(ResponseEnvelope {
        status: env.status,
        payload: Vec::new(),
        id: env.id,
    })
}

/// Decode a reply and return its single payload object.
pub fn decode_single<T: DeserializeOwned>(raw: &[u8], payload_key: &str) -> ApiResult<T> {
    decode::<T>(raw, payload_key)?.single(payload_key)
}
