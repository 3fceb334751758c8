use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::identity::PrincipalId;
use crate::temporal::Timestamp;

/// System metadata as supplied by a caller before stamping.
///
/// Every field is optional. `principal` may be present (for example when the
/// request was deserialized from an untrusted source) but it is never honoured:
/// stamping always replaces it with the authenticated actor.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SysMetadataRequest {
    pub comment: Option<String>,
    pub timestamp: Option<Timestamp>,
    pub originator: Option<String>,
    pub principal: Option<PrincipalId>,
}

impl SysMetadataRequest {
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn with_timestamp(mut self, timestamp: Timestamp) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn with_originator(mut self, originator: impl Into<String>) -> Self {
        self.originator = Some(originator.into());
        self
    }
}

/// Stamped system metadata stored with every version.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SysMetadata {
    pub comment: String,
    pub timestamp: Timestamp,
    pub originator: Option<String>,
    pub principal: PrincipalId,
}

impl SysMetadata {
    /// Apply the stamping defaults to a caller request.
    ///
    /// `now` is used only when the caller gave no timestamp; `actor` always
    /// wins over any principal in the request.
    pub fn stamp(
        request: SysMetadataRequest,
        default_comment: &str,
        now: Timestamp,
        actor: PrincipalId,
    ) -> Self {
        Self {
            comment: request.comment.unwrap_or_else(|| default_comment.to_string()),
            timestamp: request.timestamp.unwrap_or(now),
            originator: request.originator,
            principal: actor,
        }
    }
}

/// Full metadata bundle: engine-owned system part plus opaque application part.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub sys_metadata: SysMetadata,
    /// Passed through untouched; never interpreted by the archivist.
    pub app_metadata: Option<Value>,
}
