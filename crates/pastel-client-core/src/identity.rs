use serde::{Deserialize, Serialize};
use std::fmt;

/// Length of a well-formed Pastel identity string (spec §3: "an opaque
/// 86-character public identity").
pub const IDENTITY_LEN: usize = 86;

/// An opaque public identity. The private key lives only in the wallet
/// process; this type never carries key material.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(pub String);

impl Identity {
    /// Construct an `Identity`, validating the expected length.
    pub fn new(s: impl Into<String>) -> Result<Self, IdentityError> {
        let s = s.into();
        if s.len() != IDENTITY_LEN {
            return Err(IdentityError::WrongLength {
                expected: IDENTITY_LEN,
                got: s.len(),
            });
        }
        Ok(Self(s))
    }

    /// Wrap a string without validating its length. Used for values that
    /// originate from a trusted collaborator (the chain node RPC) that
    /// has already validated them.
    pub fn new_unchecked(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("identity must be {expected} characters, got {got}")]
    WrongLength { expected: usize, got: usize },
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix_len = self.0.len().min(8);
        write!(f, "Identity({}…)", &self.0[..prefix_len])
    }
}

impl From<String> for Identity {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for Identity {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
