use serde::{Deserialize, Serialize};

/// Wire-level metadata announcing one contribution upload.
///
/// The payload itself travels in the `Contribution` frame that follows, so
/// the coordinator can validate this header before touching the bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitSpec {
    /// Bearer token; doubles as the submitting client's identity.
    pub token: String,
    /// Target project identifier.
    pub project: String,
    /// Hex content identifier the client computed over the payload.
    pub id: String,
}

/// Wire-level request for a project's model definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchSpec {
    pub token: String,
    pub project: String,
}
