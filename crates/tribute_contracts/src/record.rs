#![forbid(unsafe_code)]

use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};

use crate::common::{validate_required_text, ContractViolation, Validate};

const CLIENT_ID_MAX_LEN: usize = 128;
const TIMESTAMP_DISPLAY_FORMAT: &str = "%Y-%m-%d %H:%M UTC";

/// Any scalar a spreadsheet cell may come back as.
#[derive(Deserialize)]
#[serde(untagged)]
enum LenientScalar {
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
}

impl LenientScalar {
    fn into_text(self) -> String {
        match self {
            Self::Int(v) => v.to_string(),
            Self::Float(v) => match integral_f64(v) {
                Some(int) => int.to_string(),
                None => v.to_string(),
            },
            Self::Bool(v) => v.to_string(),
            Self::Text(v) => v,
        }
    }
}

fn integral_f64(v: f64) -> Option<i64> {
    if v.is_finite() && v.fract() == 0.0 && v.abs() < 9.0e15 {
        Some(v as i64)
    } else {
        None
    }
}

fn lenient_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<LenientScalar>::deserialize(deserializer)?
        .map(LenientScalar::into_text)
        .unwrap_or_default())
}

fn optional_record_id<'de, D>(deserializer: D) -> Result<Option<RecordId>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<LenientScalar>::deserialize(deserializer)?.and_then(RecordId::from_scalar))
}

fn optional_timestamp<'de, D>(deserializer: D) -> Result<Option<TributeTimestamp>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<LenientScalar>::deserialize(deserializer)?
        .and_then(TributeTimestamp::from_scalar))
}

/// Identifier assigned by the remote store. Sheets hand back row numbers, other
/// producers hand back strings; both are kept as received.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RecordId {
    Number(i64),
    Text(String),
}

impl RecordId {
    /// Operator input is kept as typed text; matching goes through `as_key`, so
    /// `"42"` still finds a numeric 42 and `"007"` only finds `"007"`.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(Self::Text(trimmed.to_string()))
    }

    fn from_scalar(scalar: LenientScalar) -> Option<Self> {
        match scalar {
            LenientScalar::Int(v) => Some(Self::Number(v)),
            LenientScalar::Float(v) => Some(match integral_f64(v) {
                Some(int) => Self::Number(int),
                None => Self::Text(v.to_string()),
            }),
            LenientScalar::Bool(_) => None,
            LenientScalar::Text(v) => {
                let trimmed = v.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(Self::Text(trimmed.to_string()))
                }
            }
        }
    }

    pub fn as_key(&self) -> String {
        match self {
            Self::Number(v) => v.to_string(),
            Self::Text(v) => v.clone(),
        }
    }

    /// `42` and `"42"` name the same row.
    pub fn same_record(&self, other: &RecordId) -> bool {
        self.as_key() == other.as_key()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(v) => write!(f, "{v}"),
            Self::Text(v) => f.write_str(v),
        }
    }
}

impl Serialize for RecordId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Number(v) => serializer.serialize_i64(*v),
            Self::Text(v) => serializer.serialize_str(v),
        }
    }
}

impl<'de> Deserialize<'de> for RecordId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let scalar = LenientScalar::deserialize(deserializer)?;
        Self::from_scalar(scalar).ok_or_else(|| de::Error::custom("tribute id must not be empty"))
    }
}

/// Creation time. Written as epoch millis; read from millis or ISO-8601 text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TributeTimestamp {
    EpochMillis(i64),
    Unparsed(String),
}

impl TributeTimestamp {
    pub fn now() -> Self {
        Self::EpochMillis(Utc::now().timestamp_millis())
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        if let Ok(ms) = trimmed.parse::<i64>() {
            return Some(Self::EpochMillis(ms));
        }
        if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
            return Some(Self::EpochMillis(dt.timestamp_millis()));
        }
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f") {
            return Some(Self::EpochMillis(naive.and_utc().timestamp_millis()));
        }
        Some(Self::Unparsed(trimmed.to_string()))
    }

    fn from_scalar(scalar: LenientScalar) -> Option<Self> {
        match scalar {
            LenientScalar::Int(v) => Some(Self::EpochMillis(v)),
            LenientScalar::Float(v) if v.is_finite() => Some(Self::EpochMillis(v as i64)),
            LenientScalar::Float(_) | LenientScalar::Bool(_) => None,
            LenientScalar::Text(v) => Self::parse(&v),
        }
    }

    pub fn epoch_millis(&self) -> Option<i64> {
        match self {
            Self::EpochMillis(v) => Some(*v),
            Self::Unparsed(_) => None,
        }
    }

    pub fn display_label(&self) -> String {
        match self {
            Self::EpochMillis(ms) => DateTime::<Utc>::from_timestamp_millis(*ms)
                .map(|dt| dt.format(TIMESTAMP_DISPLAY_FORMAT).to_string())
                .unwrap_or_else(|| ms.to_string()),
            Self::Unparsed(raw) => raw.clone(),
        }
    }
}

impl Serialize for TributeTimestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::EpochMillis(v) => serializer.serialize_i64(*v),
            Self::Unparsed(raw) => serializer.serialize_str(raw),
        }
    }
}

impl<'de> Deserialize<'de> for TributeTimestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let scalar = LenientScalar::deserialize(deserializer)?;
        Self::from_scalar(scalar).ok_or_else(|| de::Error::custom("unusable tribute timestamp"))
    }
}

/// Per-profile ownership marker. Not a credential.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(String);

impl ClientId {
    pub fn new(raw: impl Into<String>) -> Result<Self, ContractViolation> {
        let value = raw.into().trim().to_string();
        validate_required_text("client_id", &value, CLIENT_ID_MAX_LEN)?;
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TributeRecord {
    #[serde(
        default,
        deserialize_with = "optional_record_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<RecordId>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub uuid: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub relation: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub message: String,
    #[serde(
        default,
        deserialize_with = "optional_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub ts: Option<TributeTimestamp>,
}

impl TributeRecord {
    pub fn from_payload(id: RecordId, payload: NewTributePayload) -> Self {
        Self {
            id: Some(id),
            uuid: payload.uuid,
            name: payload.name,
            relation: payload.relation,
            message: payload.message,
            ts: Some(payload.ts),
        }
    }

    /// Records without a uuid belong to nobody.
    pub fn is_owned_by(&self, client: &ClientId) -> bool {
        !self.uuid.is_empty() && self.uuid == client.as_str()
    }

    pub fn has_id(&self, id: &RecordId) -> bool {
        self.id.as_ref().is_some_and(|own| own.same_record(id))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TributeDraft {
    pub name: String,
    pub relation: String,
    pub message: String,
}

impl TributeDraft {
    /// Trims every field; only the message is required.
    pub fn v1(name: &str, relation: &str, message: &str) -> Result<Self, ContractViolation> {
        let draft = Self {
            name: name.trim().to_string(),
            relation: relation.trim().to_string(),
            message: message.trim().to_string(),
        };
        draft.validate()?;
        Ok(draft)
    }

    pub fn into_payload(self, owner: &ClientId, ts: TributeTimestamp) -> NewTributePayload {
        NewTributePayload {
            name: self.name,
            relation: self.relation,
            message: self.message,
            uuid: owner.as_str().to_string(),
            ts,
        }
    }
}

impl Validate for TributeDraft {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.message.trim().is_empty() {
            return Err(ContractViolation::InvalidValue {
                field: "tribute_draft.message",
                reason: "must not be empty",
            });
        }
        Ok(())
    }
}

/// Body of the create call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTributePayload {
    pub name: String,
    pub relation: String,
    pub message: String,
    pub uuid: String,
    pub ts: TributeTimestamp,
}

/// Body of the delete call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteTributePayload {
    #[serde(rename = "deleteId")]
    pub delete_id: RecordId,
    pub uuid: String,
}
