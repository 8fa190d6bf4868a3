use chrono::serde::ts_seconds;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Projection of a user bound to a session, as produced by a `UserProjector`.
pub type UserSummary = serde_json::Map<String, serde_json::Value>;

/// The sibling access/update keys minted by one rotation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_key: String,
    #[serde(with = "ts_seconds")]
    pub access_expires_at: DateTime<Utc>,
    pub update_key: String,
    #[serde(with = "ts_seconds")]
    pub update_expires_at: DateTime<Utc>,
}

/// An identifier awaiting user binding and exchange for a token pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentifierRecord {
    #[serde(with = "ts_seconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "ts_seconds")]
    pub expires_at: DateTime<Utc>,
    pub key: String,
    /// Forward reference to the Main record, materialized on first rotation
    pub main_key: String,
    pub user: Option<UserSummary>,
}

/// An access or update token; both halves of a pair share this shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenRecord {
    #[serde(with = "ts_seconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "ts_seconds")]
    pub expires_at: DateTime<Utc>,
    pub key: String,
    pub main_key: String,
    pub token_pair: TokenPair,
    pub user: UserSummary,
}

/// Lineage anchor. Its expiry tracks the outer bound of the whole family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MainRecord {
    #[serde(with = "ts_seconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "ts_seconds")]
    pub expires_at: DateTime<Utc>,
    pub key: String,
    /// Self-referential for a lineage root; rewritten by a lineage merge
    pub main_key: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Access,
    Identifier,
    Main,
    Update,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RecordKind::Access => "access",
            RecordKind::Identifier => "identifier",
            RecordKind::Main => "main",
            RecordKind::Update => "update",
        };
        f.write_str(name)
    }
}

/// A session record, addressed in the store by its own key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SessionRecord {
    Access(TokenRecord),
    Identifier(IdentifierRecord),
    Main(MainRecord),
    Update(TokenRecord),
}

impl SessionRecord {
    pub fn kind(&self) -> RecordKind {
        match self {
            SessionRecord::Access(_) => RecordKind::Access,
            SessionRecord::Identifier(_) => RecordKind::Identifier,
            SessionRecord::Main(_) => RecordKind::Main,
            SessionRecord::Update(_) => RecordKind::Update,
        }
    }

    pub fn key(&self) -> &str {
        match self {
            SessionRecord::Access(r) | SessionRecord::Update(r) => &r.key,
            SessionRecord::Identifier(r) => &r.key,
            SessionRecord::Main(r) => &r.key,
        }
    }

    pub fn main_key(&self) -> &str {
        match self {
            SessionRecord::Access(r) | SessionRecord::Update(r) => &r.main_key,
            SessionRecord::Identifier(r) => &r.main_key,
            SessionRecord::Main(r) => &r.main_key,
        }
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        match self {
            SessionRecord::Access(r) | SessionRecord::Update(r) => r.created_at,
            SessionRecord::Identifier(r) => r.created_at,
            SessionRecord::Main(r) => r.created_at,
        }
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        match self {
            SessionRecord::Access(r) | SessionRecord::Update(r) => r.expires_at,
            SessionRecord::Identifier(r) => r.expires_at,
            SessionRecord::Main(r) => r.expires_at,
        }
    }

    /// The bound user, if any. Main records never carry one.
    pub fn user(&self) -> Option<&UserSummary> {
        match self {
            SessionRecord::Access(r) | SessionRecord::Update(r) => Some(&r.user),
            SessionRecord::Identifier(r) => r.user.as_ref(),
            SessionRecord::Main(_) => None,
        }
    }

    pub fn token_pair(&self) -> Option<&TokenPair> {
        match self {
            SessionRecord::Access(r) | SessionRecord::Update(r) => Some(&r.token_pair),
            SessionRecord::Identifier(_) | SessionRecord::Main(_) => None,
        }
    }

    pub fn set_expires_at(&mut self, expires_at: DateTime<Utc>) {
        match self {
            SessionRecord::Access(r) | SessionRecord::Update(r) => r.expires_at = expires_at,
            SessionRecord::Identifier(r) => r.expires_at = expires_at,
            SessionRecord::Main(r) => r.expires_at = expires_at,
        }
    }

    pub fn set_main_key(&mut self, main_key: String) {
        match self {
            SessionRecord::Access(r) | SessionRecord::Update(r) => r.main_key = main_key,
            SessionRecord::Identifier(r) => r.main_key = main_key,
            SessionRecord::Main(r) => r.main_key = main_key,
        }
    }

    /// Whether the record is past its expiry at `now`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at() < now
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{at, make_identifier, user};

    #[test]
    fn test_record_roundtrips_through_msgpack() {
        let record = make_identifier("id1", "m1", 145, Some(user(1)));
        let bytes = rmp_serde::to_vec_named(&record).unwrap();
        let decoded: SessionRecord = rmp_serde::from_slice(&bytes).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn test_kind_tag_in_json() {
        let record = SessionRecord::Main(MainRecord {
            created_at: at(100),
            expires_at: at(160),
            key: "m1".to_string(),
            main_key: "m1".to_string(),
        });
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["kind"], "main");
        assert_eq!(json["expires_at"], 160);
        assert!(record.user().is_none());
        assert!(record.token_pair().is_none());
    }

    #[test]
    fn test_set_main_key_keeps_other_fields() {
        let mut record = make_identifier("id1", "m2", 145, Some(user(1)));
        record.set_main_key("m1".to_string());
        assert_eq!(record.main_key(), "m1");
        assert_eq!(record.key(), "id1");
        assert_eq!(record.kind(), RecordKind::Identifier);
        assert_eq!(record.expires_at(), at(145));
        assert!(record.user().is_some());
    }
}
