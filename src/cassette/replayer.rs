//! Replays recorded interactions from a cassette.

use std::collections::HashMap;

use serde_json::Value;

use super::format::{Cassette, Interaction};

/// Key identifying one call: port, method and canonical input.
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
struct CallKey {
    port: String,
    method: String,
    input: String,
}

impl CallKey {
    fn new(port: &str, method: &str, input: &Value) -> Self {
        Self {
            port: port.to_string(),
            method: method.to_string(),
            input: crate::normalize::canonical_string(input),
        }
    }
}

/// Replays interactions from a loaded cassette.
///
/// Calls are matched by port, method and input rather than by position,
/// because concurrent fetches complete in a different order on every run.
/// Repeated identical calls are served in recorded order.
pub struct CassetteReplayer {
    queues: HashMap<CallKey, Vec<Interaction>>,
    cursors: HashMap<CallKey, usize>,
}

impl CassetteReplayer {
    /// Create a new replayer from a loaded cassette.
    #[must_use]
    pub fn new(cassette: &Cassette) -> Self {
        let mut queues: HashMap<CallKey, Vec<Interaction>> = HashMap::new();
        for interaction in &cassette.interactions {
            let key = CallKey::new(&interaction.port, &interaction.method, &interaction.input);
            queues.entry(key).or_default().push(interaction.clone());
        }
        let cursors = queues.keys().map(|k| (k.clone(), 0)).collect();
        Self { queues, cursors }
    }

    /// Return the next recorded interaction for this call.
    ///
    /// # Errors
    ///
    /// Returns a message naming the call when the cassette holds no (more)
    /// interactions for it.
    pub fn next_interaction(
        &mut self,
        port: &str,
        method: &str,
        input: &Value,
    ) -> Result<&Interaction, String> {
        let key = CallKey::new(port, method, input);
        let Some(queue) = self.queues.get(&key) else {
            return Err(format!(
                "cassette has no interaction for {port}::{method} with input {}",
                key.input
            ));
        };
        let cursor = self.cursors.entry(key.clone()).or_insert(0);
        let Some(interaction) = queue.get(*cursor) else {
            return Err(format!(
                "cassette exhausted: all {} interactions for {port}::{method} with input {} have been consumed",
                queue.len(),
                key.input
            ));
        };
        *cursor += 1;
        Ok(interaction)
    }
}
