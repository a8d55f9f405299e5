use serde::{Deserialize, Serialize};

use dropzone_types::StorageChangeEvent;

use crate::criteria::MatchCriteria;

/// Subscription pattern in the event-routing service's JSON dialect.
///
/// ```json
/// {
///   "source": ["aws.s3"],
///   "detail-type": ["Object Created"],
///   "detail": {
///     "bucket": { "name": ["my-bucket"] },
///     "object": { "key": [{ "prefix": "input/" }], "size": [{ "numeric": [">", 0] }] }
///   }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventPattern {
    pub source: Vec<String>,
    #[serde(rename = "detail-type")]
    pub detail_type: Vec<String>,
    pub detail: DetailPattern,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailPattern {
    pub bucket: BucketPattern,
    pub object: ObjectPattern,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketPattern {
    pub name: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectPattern {
    pub key: Vec<PrefixFilter>,
    pub size: Vec<NumericFilter>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrefixFilter {
    pub prefix: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NumericOp {
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = "=")]
    Eq,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumericFilter {
    pub numeric: (NumericOp, u64),
}

impl NumericFilter {
    pub fn greater_than(value: u64) -> Self {
        Self {
            numeric: (NumericOp::Gt, value),
        }
    }

    fn accepts(&self, actual: u64) -> bool {
        let (op, bound) = self.numeric;
        match op {
            NumericOp::Gt => actual > bound,
            NumericOp::Ge => actual >= bound,
            NumericOp::Lt => actual < bound,
            NumericOp::Le => actual <= bound,
            NumericOp::Eq => actual == bound,
        }
    }
}

impl From<&MatchCriteria> for EventPattern {
    fn from(criteria: &MatchCriteria) -> Self {
        Self {
            source: vec![criteria.source.clone()],
            detail_type: vec![criteria.detail_type.clone()],
            detail: DetailPattern {
                bucket: BucketPattern {
                    name: vec![criteria.bucket_name.clone()],
                },
                object: ObjectPattern {
                    key: vec![PrefixFilter {
                        prefix: criteria.key_prefix.clone(),
                    }],
                    size: vec![NumericFilter::greater_than(criteria.min_size_exclusive)],
                },
            },
        }
    }
}

impl EventPattern {
    /// Evaluate the pattern the way the routing service would: each listed
    /// field must match one of its alternatives; numeric filters all apply.
    pub fn matches(&self, event: &StorageChangeEvent) -> bool {
        self.source.contains(&event.source)
            && self.detail_type.contains(&event.detail_type)
            && self.detail.bucket.name.iter().any(|n| n == event.bucket_name())
            && self
                .detail
                .object
                .key
                .iter()
                .any(|f| event.object_key().starts_with(f.prefix.as_str()))
            && match event.object_size() {
                Some(size) => self.detail.object.size.iter().all(|f| f.accepts(size)),
                None => self.detail.object.size.is_empty(),
            }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}
