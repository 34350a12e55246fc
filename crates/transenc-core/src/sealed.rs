//! Encrypted field wrapper for values persisted at rest.

use serde::{Deserialize, Serialize};

use crate::envelope::Envelope;
use crate::error::Result;
use crate::protocol::EnvelopeProtocol;

/// A value sealed for one peer, suitable for storing in a database column.
///
/// Reading does not consume the envelope's nonce, so a stored field can be
/// revealed any number of times.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedField {
    pub peer_id: String,
    pub envelope: Envelope,
}

impl SealedField {
    pub fn conceal(protocol: &EnvelopeProtocol, peer_id: &str, plaintext: &str) -> Result<Self> {
        Ok(Self {
            peer_id: peer_id.to_string(),
            envelope: protocol.encrypt(plaintext, peer_id)?,
        })
    }

    pub fn reveal(&self, protocol: &EnvelopeProtocol) -> Result<String> {
        protocol.decrypt_stored(&self.envelope, &self.peer_id)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
