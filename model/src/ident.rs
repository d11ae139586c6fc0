use std::{fmt, str::FromStr};

use sha1::{Digest, Sha1};

use crate::error::ModelErr;

const DIGEST_LEN: usize = 20;

/// Content-derived identifier of a parameter set's serialized bytes.
///
/// Identical bytes always yield the identical id, which is used as the sole
/// storage key for a pending contribution. SHA-1 keeps ids compatible with
/// the artifacts already produced by deployed clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContributionId([u8; DIGEST_LEN]);

impl ContributionId {
    /// Computes the identifier of `bytes`.
    pub fn digest(bytes: &[u8]) -> Self {
        let mut hasher = Sha1::new();
        hasher.update(bytes);
        Self(hasher.finalize().into())
    }

    pub fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
        &self.0
    }
}

impl fmt::Display for ContributionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl FromStr for ContributionId {
    type Err = ModelErr;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|_| ModelErr::Malformed("id is not hex"))?;
        let digest: [u8; DIGEST_LEN] = bytes
            .try_into()
            .map_err(|_| ModelErr::Malformed("id has wrong length"))?;

        Ok(Self(digest))
    }
}
