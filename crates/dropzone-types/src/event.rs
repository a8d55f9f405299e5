use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// `source` value stamped on every storage-service notification.
pub const S3_EVENT_SOURCE: &str = "aws.s3";

/// `detail-type` of a notification for a newly written object.
pub const OBJECT_CREATED_DETAIL_TYPE: &str = "Object Created";

/// A storage-change notification as delivered by the event-routing service.
///
/// Only `source`, `detail-type`, `detail.bucket.name` and `detail.object.key`
/// are required to decode; everything else is optional and unknown fields are
/// ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageChangeEvent {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    pub source: String,
    #[serde(rename = "detail-type")]
    pub detail_type: String,
    #[serde(default)]
    pub account: Option<String>,
    #[serde(default)]
    pub time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub resources: Vec<String>,
    pub detail: StorageChangeDetail,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageChangeDetail {
    #[serde(default)]
    pub version: Option<String>,
    pub bucket: BucketRef,
    pub object: ObjectRef,
    #[serde(default, rename = "request-id")]
    pub request_id: Option<String>,
    #[serde(default)]
    pub requester: Option<String>,
    #[serde(default, rename = "source-ip-address")]
    pub source_ip_address: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketRef {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRef {
    pub key: String,
    /// Absent on deletion notifications.
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub etag: Option<String>,
    #[serde(default, rename = "version-id")]
    pub version_id: Option<String>,
    #[serde(default)]
    pub sequencer: Option<String>,
}

impl StorageChangeEvent {
    /// Minimal object-created notification, stamped with the current time.
    pub fn object_created(bucket: impl Into<String>, key: impl Into<String>, size: u64) -> Self {
        let bucket = bucket.into();
        Self {
            version: Some("0".into()),
            id: None,
            source: S3_EVENT_SOURCE.into(),
            detail_type: OBJECT_CREATED_DETAIL_TYPE.into(),
            account: None,
            time: Some(Utc::now()),
            region: None,
            resources: vec![format!("arn:aws:s3:::{bucket}")],
            detail: StorageChangeDetail {
                version: Some("0".into()),
                bucket: BucketRef { name: bucket },
                object: ObjectRef {
                    key: key.into(),
                    size: Some(size),
                    etag: None,
                    version_id: None,
                    sequencer: None,
                },
                request_id: None,
                requester: None,
                source_ip_address: None,
                reason: Some("PutObject".into()),
            },
        }
    }

    pub fn bucket_name(&self) -> &str {
        &self.detail.bucket.name
    }

    /// `$.detail.object.key`, the value bound into the task command.
    pub fn object_key(&self) -> &str {
        &self.detail.object.key
    }

    pub fn object_size(&self) -> Option<u64> {
        self.detail.object.size
    }
}
