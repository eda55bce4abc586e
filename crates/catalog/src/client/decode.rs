//! Decoder for the three response shapes a streamable HTTP downstream may
//! produce: a single JSON-RPC object, a JSON array batch, or a stream of
//! SSE `data:` frames each carrying one of the former.

use crate::rpc::RpcResponse;

use super::DriverError;

/// Decode a response body and select the envelope matching `expected_id`.
///
/// Every parseable candidate is collected first; with a positive expected id
/// the matching envelope wins, otherwise the first candidate does. `[DONE]`
/// sentinels and empty `data:` frames are skipped.
pub(crate) fn decode_response(raw: &str, expected_id: Option<i64>) -> Result<RpcResponse, DriverError> {
    let data = raw.trim();
    if data.is_empty() {
        return Err(DriverError::EmptyBody);
    }

    let mut candidates: Vec<RpcResponse> = Vec::new();

    if let Ok(one) = serde_json::from_str::<RpcResponse>(data) {
        push_candidate(&mut candidates, one);
    }
    if let Ok(batch) = serde_json::from_str::<Vec<RpcResponse>>(data) {
        for envelope in batch {
            push_candidate(&mut candidates, envelope);
        }
    }
    for line in data.lines() {
        let line = line.trim();
        let Some(payload) = line.strip_prefix("data:") else {
            continue;
        };
        let payload = payload.trim();
        if payload.is_empty() || payload == "[DONE]" {
            continue;
        }
        if let Ok(one) = serde_json::from_str::<RpcResponse>(payload) {
            push_candidate(&mut candidates, one);
            continue;
        }
        if let Ok(batch) = serde_json::from_str::<Vec<RpcResponse>>(payload) {
            for envelope in batch {
                push_candidate(&mut candidates, envelope);
            }
        }
    }

    if candidates.is_empty() {
        return Err(DriverError::Decode(data.to_string()));
    }
    match expected_id {
        Some(expected) if expected > 0 => candidates
            .into_iter()
            .find(|candidate| candidate.id == Some(expected))
            .ok_or(DriverError::ResponseIdNotFound(expected)),
        _ => Ok(candidates.swap_remove(0)),
    }
}

fn push_candidate(candidates: &mut Vec<RpcResponse>, envelope: RpcResponse) {
    if envelope.is_meaningful() {
        candidates.push(envelope);
    }
}
