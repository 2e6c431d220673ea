//! Replaying adapters that serve recorded interactions.

pub mod source;

use std::sync::Mutex;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::cassette::replayer::CassetteReplayer;
use crate::ports::{FetchError, FetchErrorKind};

pub use source::ReplayingSource;

/// Replay a `Result<T, FetchError>` recorded with the Ok/Err convention.
///
/// Mirror of `recording::record_result`. A missing or undecodable
/// interaction becomes a `replay` fetch error.
pub(crate) fn replay_result<T: DeserializeOwned>(
    replayer: &Mutex<CassetteReplayer>,
    port: &str,
    method: &str,
    input: &Value,
) -> Result<T, FetchError> {
    let replay_error = |message: String| FetchError::new(FetchErrorKind::Replay, message);
    let output = {
        let mut guard = replayer.lock().map_err(|e| replay_error(e.to_string()))?;
        guard.next_interaction(port, method, input).map_err(replay_error)?.output.clone()
    };
    if let Some(ok) = output.get("Ok") {
        return serde_json::from_value(ok.clone())
            .map_err(|e| replay_error(format!("{port}::{method}: bad Ok value: {e}")));
    }
    if let Some(err) = output.get("Err") {
        let error: FetchError = serde_json::from_value(err.clone())
            .map_err(|e| replay_error(format!("{port}::{method}: bad Err value: {e}")))?;
        return Err(error);
    }
    Err(replay_error(format!("{port}::{method}: output is neither Ok nor Err")))
}
