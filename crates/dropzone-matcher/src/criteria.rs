use serde::{Deserialize, Serialize};

use dropzone_types::{OBJECT_CREATED_DETAIL_TYPE, S3_EVENT_SOURCE, StorageChangeEvent};

/// Which storage-change events should trigger a launch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchCriteria {
    pub source: String,
    pub detail_type: String,
    pub bucket_name: String,
    /// Byte-wise prefix; no normalization of slashes or case.
    pub key_prefix: String,
    /// Objects must be strictly larger than this.
    pub min_size_exclusive: u64,
}

impl MatchCriteria {
    /// New non-empty objects in `bucket` whose key starts with `key_prefix`.
    pub fn object_created(bucket_name: impl Into<String>, key_prefix: impl Into<String>) -> Self {
        Self {
            source: S3_EVENT_SOURCE.into(),
            detail_type: OBJECT_CREATED_DETAIL_TYPE.into(),
            bucket_name: bucket_name.into(),
            key_prefix: key_prefix.into(),
            min_size_exclusive: 0,
        }
    }

    pub fn matches(&self, event: &StorageChangeEvent) -> bool {
        matches(event, self)
    }
}

/// True iff the event comes from the configured source, type and bucket,
/// its key starts with the prefix, and its size is strictly above the
/// threshold. Events without a size never match.
pub fn matches(event: &StorageChangeEvent, criteria: &MatchCriteria) -> bool {
    first_mismatch(event, criteria).is_none()
}

/// Why an event did not qualify. Useful for debug logging only; a
/// non-match is never an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mismatch {
    Source,
    DetailType,
    Bucket,
    KeyPrefix,
    Size,
}

/// First criterion the event fails, or `None` if it matches.
pub fn first_mismatch(event: &StorageChangeEvent, criteria: &MatchCriteria) -> Option<Mismatch> {
    if event.source != criteria.source {
        Some(Mismatch::Source)
    } else if event.detail_type != criteria.detail_type {
        Some(Mismatch::DetailType)
    } else if event.bucket_name() != criteria.bucket_name {
        Some(Mismatch::Bucket)
    } else if !event.object_key().as_bytes().starts_with(criteria.key_prefix.as_bytes()) {
        Some(Mismatch::KeyPrefix)
    } else if !event
        .object_size()
        .is_some_and(|size| size > criteria.min_size_exclusive)
    {
        Some(Mismatch::Size)
    } else {
        None
    }
}

/// Why a raw payload was not accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rejection {
    Undecodable,
    NoMatch(Mismatch),
}

/// Decodes raw payloads and applies the criteria.
#[derive(Debug, Clone)]
pub struct EventMatcher {
    criteria: MatchCriteria,
}

impl EventMatcher {
    pub fn new(criteria: MatchCriteria) -> Self {
        Self { criteria }
    }

    pub fn criteria(&self) -> &MatchCriteria {
        &self.criteria
    }

    pub fn matches(&self, event: &StorageChangeEvent) -> bool {
        matches(event, &self.criteria)
    }

    /// Decode and evaluate a raw payload. Anything that does not decode
    /// into a storage-change event is rejected like any other non-match.
    pub fn evaluate_raw(
        &self,
        payload: &serde_json::Value,
    ) -> std::result::Result<StorageChangeEvent, Rejection> {
        let event: StorageChangeEvent = match serde_json::from_value(payload.clone()) {
            Ok(event) => event,
            Err(e) => {
                tracing::debug!(error = %e, "ignoring undecodable event");
                return Err(Rejection::Undecodable);
            }
        };
        match first_mismatch(&event, &self.criteria) {
            None => Ok(event),
            Some(reason) => {
                tracing::debug!(?reason, key = event.object_key(), "event does not match");
                Err(Rejection::NoMatch(reason))
            }
        }
    }
}
