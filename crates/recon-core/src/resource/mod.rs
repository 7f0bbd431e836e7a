//! Typed resource model: DNS records and security groups
//!
//! Desired state is validated once at this boundary. The remote API
//! only ever sees a payload built from an already-validated record,
//! and observed state is re-derived from the remote response after
//! every successful call.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// DNS record type
///
/// Closed enumeration of the record types the remote DNS API accepts.
/// Construction from a string is case-insensitive; anything outside
/// the set is a validation error raised before any remote call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordType {
    A,
    Aaaa,
    Alias,
    Cname,
    Hinfo,
    Mx,
    Naptr,
    Ns,
    Pool,
    Spf,
    Srv,
    Sshfp,
    Txt,
    Url,
}

impl RecordType {
    /// All accepted record types, in wire order
    pub const ALL: [RecordType; 14] = [
        RecordType::A,
        RecordType::Aaaa,
        RecordType::Alias,
        RecordType::Cname,
        RecordType::Hinfo,
        RecordType::Mx,
        RecordType::Naptr,
        RecordType::Ns,
        RecordType::Pool,
        RecordType::Spf,
        RecordType::Srv,
        RecordType::Sshfp,
        RecordType::Txt,
        RecordType::Url,
    ];

    /// The uppercase wire form of the record type
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::A => "A",
            RecordType::Aaaa => "AAAA",
            RecordType::Alias => "ALIAS",
            RecordType::Cname => "CNAME",
            RecordType::Hinfo => "HINFO",
            RecordType::Mx => "MX",
            RecordType::Naptr => "NAPTR",
            RecordType::Ns => "NS",
            RecordType::Pool => "POOL",
            RecordType::Spf => "SPF",
            RecordType::Srv => "SRV",
            RecordType::Sshfp => "SSHFP",
            RecordType::Txt => "TXT",
            RecordType::Url => "URL",
        }
    }
}

impl FromStr for RecordType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let upper = s.to_ascii_uppercase();
        RecordType::ALL
            .iter()
            .copied()
            .find(|rt| rt.as_str() == upper)
            .ok_or_else(|| {
                Error::validation(format!(
                    "'{}' is not a valid record type (expected one of: {})",
                    s,
                    RecordType::ALL
                        .iter()
                        .map(|rt| rt.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                ))
            })
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for RecordType {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for RecordType {
    fn deserialize<D: Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(|e: Error| D::Error::custom(e.to_string()))
    }
}

/// The configuration-declared target attributes for a DNS record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesiredRecord {
    /// Parent zone name; immutable per record
    pub domain: String,

    /// Subdomain label; empty means the root record of the zone
    #[serde(default)]
    pub name: String,

    /// Record type, validated at construction
    pub record_type: RecordType,

    /// Record value
    pub content: String,

    /// Time-to-live; the remote system supplies a default when unset
    #[serde(default)]
    pub ttl: Option<i64>,

    /// Priority; the remote system supplies a default when unset
    #[serde(default)]
    pub prio: Option<i64>,
}

impl DesiredRecord {
    /// Validate required fields
    ///
    /// The record type is already a closed enum, so the only remaining
    /// checks are the required string fields.
    pub fn validate(&self) -> Result<()> {
        if self.domain.is_empty() {
            return Err(Error::validation("record domain cannot be empty"));
        }
        if self.content.is_empty() {
            return Err(Error::validation("record content cannot be empty"));
        }
        Ok(())
    }

    /// Build the outbound payload for a create call (no identifier)
    pub fn to_payload(&self) -> RecordPayload {
        RecordPayload {
            id: None,
            name: self.name.clone(),
            record_type: self.record_type,
            content: self.content.clone(),
            ttl: self.ttl,
            prio: self.prio,
        }
    }

    /// Build the outbound payload for an update call
    ///
    /// The remote system performs a full replace, so every field is
    /// carried at its desired value alongside the existing identifier.
    pub fn to_payload_with_id(&self, id: i64) -> RecordPayload {
        RecordPayload {
            id: Some(id),
            ..self.to_payload()
        }
    }
}

/// Outbound wire shape for record create/update calls
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordPayload {
    /// Remote identifier, present only on update (full replace)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub name: String,
    pub record_type: RecordType,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prio: Option<i64>,
}

/// A record as returned by the remote API
///
/// ttl and prio are always present here: the remote system fills in
/// defaults for fields the desired state left unset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordResponse {
    pub id: i64,
    pub name: String,
    pub record_type: RecordType,
    pub content: String,
    pub ttl: i64,
    pub prio: i64,
}

/// The attributes last confirmed present on the remote system
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservedRecord {
    /// Remote-assigned identifier
    pub id: i64,
    /// Parent zone name (local, never returned by the record API)
    pub domain: String,
    pub name: String,
    pub record_type: RecordType,
    pub content: String,
    pub ttl: i64,
    pub prio: i64,
    /// Derived, read-only: recomputed locally after every read/write
    pub hostname: String,
}

impl ObservedRecord {
    /// Project a remote response onto observed state
    ///
    /// Pure and idempotent: copies every remote field, then recomputes
    /// `hostname` from the now-current name/domain pair. Observed
    /// state always comes from the response, never from the input, so
    /// server-side normalization (TTL defaulting, etc.) is reflected
    /// locally.
    pub fn project(domain: &str, response: &RecordResponse) -> Self {
        Self {
            id: response.id,
            domain: domain.to_string(),
            name: response.name.clone(),
            record_type: response.record_type,
            content: response.content.clone(),
            ttl: response.ttl,
            prio: response.prio,
            hostname: hostname_for(&response.name, domain),
        }
    }

    /// True if the observed record already matches the desired one
    ///
    /// Unset desired ttl/prio defer to whatever the remote system
    /// chose, so they never count as drift.
    pub fn matches(&self, desired: &DesiredRecord) -> bool {
        self.name == desired.name
            && self.record_type == desired.record_type
            && self.content == desired.content
            && desired.ttl.is_none_or(|ttl| ttl == self.ttl)
            && desired.prio.is_none_or(|prio| prio == self.prio)
    }
}

/// Derive the fully qualified hostname from a record name and its zone
pub fn hostname_for(name: &str, domain: &str) -> String {
    if name.is_empty() {
        domain.to_string()
    } else {
        format!("{}.{}", name, domain)
    }
}

/// The configuration-declared target attributes for a security group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityGroupSpec {
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Rule tags attached at creation
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

impl SecurityGroupSpec {
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::validation("security group name cannot be empty"));
        }
        Ok(())
    }
}

/// A security group as confirmed present on the remote system
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservedSecurityGroup {
    /// Remote-assigned identifier
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub tags: HashMap<String, String>,
}
