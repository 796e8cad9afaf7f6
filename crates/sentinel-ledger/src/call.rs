use serde::{Deserialize, Serialize};
use sentinel_crypto::{Signature, SigningKey, VerifyingKey};
use sentinel_types::{EventType, PhotoHash, SessionId};

use crate::error::{LedgerError, LedgerResult};

/// Maximum lengths of the contract's string arguments, in characters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldLimits {
    pub session_id: usize,
    pub event_type: usize,
    pub photo_hash: usize,
}

impl FieldLimits {
    /// Limits of the `access-log` contract's `log-entry` function.
    pub const ACCESS_LOG: Self = Self {
        session_id: 50,
        event_type: 10,
        photo_hash: 64,
    };
}

impl Default for FieldLimits {
    fn default() -> Self {
        Self::ACCESS_LOG
    }
}

/// Truncate to at most `max_chars` characters, on a char boundary.
pub fn bounded(value: &str, max_chars: usize) -> &str {
    match value.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &value[..byte_idx],
        None => value,
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostConditionMode {
    #[default]
    Allow,
    Deny,
}

/// Unsigned contract call, as submitted to the ledger network.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractCall {
    pub contract_address: String,
    pub contract_name: String,
    pub function_name: String,
    /// `[session_id, event_type, photo_hash]`, each already bounded.
    pub args: Vec<String>,
    pub sender: String,
    /// Hex-encoded Ed25519 public key of the sender.
    pub sender_key: String,
    pub nonce: u64,
    pub fee: u64,
    pub post_condition_mode: PostConditionMode,
}

impl ContractCall {
    /// The three event arguments, truncated to the contract's limits.
    pub fn event_args(
        session_id: &SessionId,
        event_type: EventType,
        photo_hash: &PhotoHash,
        limits: &FieldLimits,
    ) -> Vec<String> {
        let hash_hex = photo_hash.to_hex();
        vec![
            bounded(session_id.as_str(), limits.session_id).to_string(),
            bounded(event_type.as_str(), limits.event_type).to_string(),
            bounded(&hash_hex, limits.photo_hash).to_string(),
        ]
    }

    /// Reject calls whose arguments exceed the contract limits.
    pub fn check_limits(&self, limits: &FieldLimits) -> LedgerResult<()> {
        let [session, event_type, hash] = self.args.as_slice() else {
            return Err(LedgerError::Rejected(format!(
                "expected 3 arguments, got {}",
                self.args.len()
            )));
        };
        for (field, value, max) in [
            ("session_id", session, limits.session_id),
            ("event_type", event_type, limits.event_type),
            ("photo_hash", hash, limits.photo_hash),
        ] {
            let actual = value.chars().count();
            if actual > max {
                return Err(LedgerError::ArgumentTooLong { field, max, actual });
            }
        }
        Ok(())
    }

    /// Canonical bytes covered by the signature.
    pub fn signing_bytes(&self) -> LedgerResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| LedgerError::Serialization(e.to_string()))
    }

    pub fn sign(self, key: &SigningKey) -> LedgerResult<SignedCall> {
        let signature = key.sign(&self.signing_bytes()?);
        Ok(SignedCall {
            call: self,
            signature,
        })
    }
}

/// A contract call plus the sender's signature over its canonical bytes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedCall {
    pub call: ContractCall,
    pub signature: Signature,
}

impl SignedCall {
    /// Check the signature and that `sender` matches `sender_key`.
    pub fn verify(&self) -> LedgerResult<()> {
        let key_bytes: [u8; 32] = hex::decode(&self.call.sender_key)
            .ok()
            .and_then(|b| b.try_into().ok())
            .ok_or(LedgerError::InvalidSignature)?;
        let key = VerifyingKey::from_bytes(key_bytes).map_err(|_| LedgerError::InvalidSignature)?;
        if key.sender_address() != self.call.sender {
            return Err(LedgerError::InvalidSignature);
        }
        key.verify(&self.call.signing_bytes()?, &self.signature)
            .map_err(|_| LedgerError::InvalidSignature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(key: &SigningKey, args: Vec<String>) -> ContractCall {
        ContractCall {
            contract_address: "ST1PQHQKV0RJXZFYVDEQMMKSWZQAG97KXKPSWD05E".into(),
            contract_name: "access-log".into(),
            function_name: "log-entry".into(),
            args,
            sender: key.sender_address(),
            sender_key: hex::encode(key.verifying_key().as_bytes()),
            nonce: 0,
            fee: 1000,
            post_condition_mode: PostConditionMode::Allow,
        }
    }

    #[test]
    fn bounded_truncates_on_char_boundary() {
        assert_eq!(bounded("abcdef", 3), "abc");
        assert_eq!(bounded("abc", 10), "abc");
        assert_eq!(bounded("ééé", 2), "éé");
        assert_eq!(bounded("", 5), "");
    }

    #[test]
    fn event_args_fit_limits() {
        let limits = FieldLimits {
            session_id: 5,
            event_type: 3,
            photo_hash: 8,
        };
        let args = ContractCall::event_args(
            &SessionId::generate(),
            EventType::Entry,
            &PhotoHash::from_digest([0xab; 32]),
            &limits,
        );
        assert_eq!(args[0].len(), 5);
        assert_eq!(args[1], "ENT");
        assert_eq!(args[2], "abababab");
    }

    #[test]
    fn default_limits_keep_full_values() {
        let sid = SessionId::generate();
        let hash = PhotoHash::from_digest([1; 32]);
        let args = ContractCall::event_args(&sid, EventType::Exit, &hash, &FieldLimits::ACCESS_LOG);
        assert_eq!(args, vec![sid.to_string(), "EXIT".to_string(), hash.to_hex()]);
    }

    #[test]
    fn check_limits_catches_oversized_args() {
        let key = SigningKey::from_bytes([3; 32]);
        let c = call(&key, vec!["x".repeat(51), "ENTRY".into(), "00".into()]);
        assert_eq!(
            c.check_limits(&FieldLimits::ACCESS_LOG),
            Err(LedgerError::ArgumentTooLong {
                field: "session_id",
                max: 50,
                actual: 51
            })
        );
        let c = call(&key, vec!["S1".into()]);
        assert!(matches!(c.check_limits(&FieldLimits::ACCESS_LOG), Err(LedgerError::Rejected(_))));
    }

    #[test]
    fn signed_call_verifies_and_detects_tampering() {
        let key = SigningKey::from_bytes([4; 32]);
        let signed = call(&key, vec!["S1".into(), "ENTRY".into(), "aa".into()])
            .sign(&key)
            .unwrap();
        signed.verify().unwrap();

        let mut tampered = signed.clone();
        tampered.call.args[1] = "EXIT".into();
        assert_eq!(tampered.verify(), Err(LedgerError::InvalidSignature));

        let mut wrong_sender = signed;
        wrong_sender.call.sender = "ST000".into();
        assert_eq!(wrong_sender.verify(), Err(LedgerError::InvalidSignature));
    }
}
