//! Display-only choice commitments.
//!
//! A digest over the move, the submission time and a random nonce is stored
//! next to the choice. The opponent never checks it against a later reveal,
//! so it gives no commit-reveal guarantee; only the local holder of the
//! opening can verify it.

use chrono::{DateTime, Utc};
use rand::RngCore;
use rps_core::Move;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoiceCommitment {
    pub hash: Vec<u8>,
    pub timestamp: DateTime<Utc>,
    #[serde(skip)]
    opening: Option<Opening>,
}

/// What is needed to recompute the hash
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Opening {
    pub choice: Move,
    pub nonce: Vec<u8>,
}

impl ChoiceCommitment {
    pub fn new(choice: Move) -> Self {
        let mut nonce = vec![0u8; 16];
        rand::thread_rng().fill_bytes(&mut nonce);
        Self::with_nonce(choice, Utc::now(), nonce)
    }

    pub fn with_nonce(choice: Move, timestamp: DateTime<Utc>, nonce: Vec<u8>) -> Self {
        let hash = digest(choice, timestamp, &nonce);
        Self {
            hash,
            timestamp,
            opening: Some(Opening { choice, nonce }),
        }
    }

    pub fn hash_hex(&self) -> String {
        hex::encode(&self.hash)
    }

    pub fn opening(&self) -> Option<&Opening> {
        self.opening.as_ref()
    }

    pub fn verify(&self, choice: Move, nonce: &[u8]) -> bool {
        digest(choice, self.timestamp, nonce) == self.hash
    }
}

fn digest(choice: Move, timestamp: DateTime<Utc>, nonce: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(choice.as_str().as_bytes());
    hasher.update(timestamp.timestamp_millis().to_be_bytes());
    hasher.update(nonce);
    hasher.finalize().to_vec()
}
