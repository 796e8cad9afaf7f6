use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Maximum length accepted for a facility PIN.
const MAX_PIN_LEN: usize = 32;
/// Maximum length accepted for a session identifier.
const MAX_SESSION_ID_LEN: usize = 64;

/// Opaque, globally unique session identifier.
///
/// Generated sessions are `S` followed by the uppercase simple form of a
/// UUID v7, so identifiers sort roughly by creation time and always fit the
/// ledger's 50-character session argument.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionId(String);

impl SessionId {
    /// Generate a new time-ordered session ID.
    pub fn generate() -> Self {
        let raw = uuid::Uuid::now_v7().simple().to_string().to_uppercase();
        Self(format!("S{raw}"))
    }

    /// Parse an existing session ID (e.g. from a URL path).
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        let s = s.trim();
        if s.is_empty() || s.len() > MAX_SESSION_ID_LEN {
            return Err(TypeError::InvalidIdentifier {
                kind: "session id",
                reason: format!("length must be 1..={MAX_SESSION_ID_LEN}"),
            });
        }
        if !s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(TypeError::InvalidIdentifier {
                kind: "session id",
                reason: "only ASCII letters, digits, '-' and '_' are allowed".into(),
            });
        }
        Ok(Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionId({})", self.0)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for SessionId {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<SessionId> for String {
    fn from(id: SessionId) -> Self {
        id.0
    }
}

/// Facility identifier scoping sessions and events to one physical site.
///
/// PINs are short ASCII-alphanumeric codes. They are a foreign key, not a
/// secret: knowing a PIN is what authorizes a capture device.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CompanyPin(String);

impl CompanyPin {
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(TypeError::InvalidIdentifier {
                kind: "company pin",
                reason: "must not be empty".into(),
            });
        }
        if s.len() > MAX_PIN_LEN {
            return Err(TypeError::InvalidIdentifier {
                kind: "company pin",
                reason: format!("longer than {MAX_PIN_LEN} characters"),
            });
        }
        if !s.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(TypeError::InvalidIdentifier {
                kind: "company pin",
                reason: "only ASCII letters and digits are allowed".into(),
            });
        }
        Ok(Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for CompanyPin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CompanyPin({})", self.0)
    }
}

impl fmt::Display for CompanyPin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for CompanyPin {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CompanyPin> for String {
    fn from(pin: CompanyPin) -> Self {
        pin.0
    }
}
