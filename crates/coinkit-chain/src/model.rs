//! Ledger data model.
//!
//! These are ledger-owned entities. The client reads them and proposes
//! changes through [`Operation`]s, but never writes them directly.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// An account on the ledger.
///
/// The ledger's Go encoder emits capitalized field names, so both spellings
/// are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    #[serde(alias = "Owner")]
    pub owner: String,

    /// Sequence number of the last operation this account authorized.
    /// Zero means none yet.
    #[serde(alias = "Sequence")]
    pub sequence: u32,

    #[serde(alias = "Balance", default)]
    pub balance: u64,
}

/// A storage node registered on the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provider {
    /// Assigned by the ledger.
    pub id: u64,

    #[serde(default)]
    pub owner: String,

    /// Measured in megabytes.
    #[serde(default)]
    pub capacity: u32,
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "provider #{}, owner:{}, capacity:{}",
            self.id, self.owner, self.capacity
        )
    }
}

/// A named unit of storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bucket {
    pub name: String,

    #[serde(default)]
    pub owner: String,

    /// Declared size in megabytes.
    pub size: u32,

    /// Pointer to the content. Empty until the owner sets it.
    #[serde(default)]
    pub magnet: String,

    /// Providers hosting this bucket; only ids are populated.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub providers: Vec<Provider>,
}

impl Bucket {
    /// Declared size in bytes.
    pub fn size_bytes(&self) -> u64 {
        u64::from(self.size) * 1024 * 1024
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bucket:{}, size:{}", self.name, self.size)
    }
}

/// Filters for a providers query. Unset fields do not filter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    /// Providers hosting the named bucket.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

impl ProviderQuery {
    pub fn by_id(id: u64) -> Self {
        Self {
            id: Some(id),
            ..Self::default()
        }
    }

    pub fn by_owner(owner: impl Into<String>) -> Self {
        Self {
            owner: Some(owner.into()),
            ..Self::default()
        }
    }
}

/// Filters for a buckets query. Unset fields do not filter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    /// Buckets allocated to this provider.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

impl BucketQuery {
    pub fn by_name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn by_owner(owner: impl Into<String>) -> Self {
        Self {
            owner: Some(owner.into()),
            ..Self::default()
        }
    }

    pub fn by_provider(provider: u64) -> Self {
        Self {
            provider: Some(provider),
            ..Self::default()
        }
    }
}

/// Payload of a Data message. Only the fields a query asked for are set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accounts: Option<HashMap<String, Option<Account>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub providers: Option<Vec<Provider>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buckets: Option<Vec<Bucket>>,
}

/// Ledger operations the client knows how to submit.
///
/// Serialized adjacently tagged, matching the `{type, operation}` part of a
/// signed operation record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "operation")]
pub enum Operation {
    CreateProvider {
        capacity: u32,
    },
    CreateBucket {
        name: String,
        size: u32,
    },
    UpdateBucket {
        name: String,
        magnet: String,
    },
    DeleteBucket {
        name: String,
    },
    Allocate {
        #[serde(rename = "bucketName")]
        bucket_name: String,
        #[serde(rename = "providerID")]
        provider_id: u64,
    },
    Deallocate {
        #[serde(rename = "bucketName")]
        bucket_name: String,
        #[serde(rename = "providerID")]
        provider_id: u64,
    },
}

impl Operation {
    /// The operation type tag.
    pub fn kind(&self) -> &'static str {
        match self {
            Operation::CreateProvider { .. } => "CreateProvider",
            Operation::CreateBucket { .. } => "CreateBucket",
            Operation::UpdateBucket { .. } => "UpdateBucket",
            Operation::DeleteBucket { .. } => "DeleteBucket",
            Operation::Allocate { .. } => "Allocate",
            Operation::Deallocate { .. } => "Deallocate",
        }
    }

    /// The operation-specific fields, before fee, sequence and signer.
    pub fn fields(&self) -> Map<String, Value> {
        let value = match self {
            Operation::CreateProvider { capacity } => json!({ "capacity": capacity }),
            Operation::CreateBucket { name, size } => json!({ "name": name, "size": size }),
            Operation::UpdateBucket { name, magnet } => {
                json!({ "name": name, "magnet": magnet })
            }
            Operation::DeleteBucket { name } => json!({ "name": name }),
            Operation::Allocate {
                bucket_name,
                provider_id,
            }
            | Operation::Deallocate {
                bucket_name,
                provider_id,
            } => json!({ "bucketName": bucket_name, "providerID": provider_id }),
        };
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    /// Decode from an operation type tag and body.
    pub fn from_parts(kind: &str, body: &Map<String, Value>) -> Result<Self, serde_json::Error> {
        serde_json::from_value(json!({ "type": kind, "operation": body }))
    }
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}
