use chrono::{DateTime, Utc};

use crate::config::TokenConfig;
use crate::storage::models::{MainRecord, SessionRecord, TokenPair, TokenRecord};
use crate::storage::{RecordStore, WriteOp};

use super::generator::KeyGenerator;
use super::identifier;
use super::{mint_key, SessionError, TokenBundle};

/// Exchange an identifier, update token or access token for a fresh
/// access/update pair.
///
/// The source record is single-use and is deleted. The previous access token,
/// if any, is left to expire on its own. The lineage's Main record is created
/// on first use and has its expiry moved to the new update expiry afterwards.
/// All writes land in one batch, so a failed rotation leaves the source usable.
pub fn rotate(
    store: &mut dyn RecordStore,
    keys: &dyn KeyGenerator,
    now: DateTime<Utc>,
    tokens: &TokenConfig,
    source_key: &str,
) -> Result<TokenBundle, SessionError> {
    let source = identifier::check(store, source_key, now, tokens.time_delta())?;
    let source_kind = source.kind();

    let (user, main_key) = match source {
        SessionRecord::Identifier(record) => {
            let user = record.user.ok_or(SessionError::NoUserBound)?;
            (user, record.main_key)
        }
        SessionRecord::Access(record) | SessionRecord::Update(record) => {
            (record.user, record.main_key)
        }
        SessionRecord::Main(_) => return Err(SessionError::NoUserBound),
    };

    let token_pair = TokenPair {
        access_key: mint_key(store, keys)?,
        access_expires_at: now + tokens.access_ttl(),
        update_key: mint_key(store, keys)?,
        update_expires_at: now + tokens.update_ttl(),
    };

    let access = TokenRecord {
        created_at: now,
        expires_at: token_pair.access_expires_at,
        key: token_pair.access_key.clone(),
        main_key: main_key.clone(),
        token_pair: token_pair.clone(),
        user: user.clone(),
    };
    let update = TokenRecord {
        created_at: now,
        expires_at: token_pair.update_expires_at,
        key: token_pair.update_key.clone(),
        main_key: main_key.clone(),
        token_pair: token_pair.clone(),
        user,
    };

    // The source is gone once the batch lands, so it cannot be its own anchor
    let existing_main = if main_key == source_key {
        None
    } else {
        store.get(&main_key)?
    };
    let main = upsert_main(existing_main, &main_key, now, token_pair.update_expires_at);

    store.apply(vec![
        WriteOp::Delete(source_key.to_string()),
        WriteOp::Put(SessionRecord::Access(access.clone())),
        WriteOp::Put(SessionRecord::Update(update)),
        WriteOp::Put(main),
    ])?;

    tracing::debug!(source = %source_kind, "Rotated token pair");

    Ok(TokenBundle {
        created_at: access.created_at,
        expires_at: access.expires_at,
        token_pair: access.token_pair,
        user: access.user,
    })
}

/// Extend the lineage anchor at `main_key`, or build it as a self-referential
/// root if it does not exist yet.
fn upsert_main(
    existing: Option<SessionRecord>,
    main_key: &str,
    now: DateTime<Utc>,
    expires_at: DateTime<Utc>,
) -> SessionRecord {
    match existing {
        Some(mut record) => {
            record.set_expires_at(expires_at);
            record
        }
        None => {
            tracing::debug!("Creating lineage main record");
            SessionRecord::Main(MainRecord {
                created_at: now,
                expires_at,
                key: main_key.to_string(),
                main_key: main_key.to_string(),
            })
        }
    }
}
