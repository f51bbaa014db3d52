use async_trait::async_trait;
use scylla::client::session::Session;
use scylla::client::session_builder::SessionBuilder;
use scylla::value::{CqlValue, Row};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::ScyllaConfig;
use crate::db_migrate::MigrationTool;
use crate::error::{AppError, Result};
use crate::models::Collection;
use crate::store::{
    field_matches, merge_patch, record_id, stamp_created, unique_key, CasOutcome, Created, EntityStore, PatchFn, Record,
};

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};


pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);

    let password_hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?
        .to_string();

    Ok(password_hash)
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| AppError::Internal(format!("Invalid password hash format: {}", e)))?;

    let result = Argon2::default().verify_password(password.as_bytes(), &parsed_hash).is_ok();

    Ok(result)
}

// Lightweight transactions retry a bounded number of times when the body
// they read was changed underneath them.
const MAX_CAS_ATTEMPTS: usize = 8;

enum KeyClaim {
    Claimed,
    HeldBy(String),
    Vacant,
}


/// Entity store backed by ScyllaDB.
///
/// Every record lives in `records` as JSON text keyed by (collection, id).
/// `unique_keys` maps a normalised key value to the owning record id and is
/// written with `IF NOT EXISTS`, which is what makes `create_unique` atomic.
#[derive(Debug, Clone)]
pub struct ScyllaStore {
    session: Arc<Session>,
    keyspace: String,
}

impl ScyllaStore {
    pub async fn connect(config: &ScyllaConfig) -> Result<Self> {
        let session = SessionBuilder::new()
            .known_nodes(&config.nodes)
            .user(&config.user, &config.password)
            .build()
            .await?;
        tracing::info!("Connected to Scylla nodes {:?}", config.nodes);

        let session = Arc::new(session);
        MigrationTool::new(config.keyspace.clone(), PathBuf::from(&config.schema_path))
            .migrate_to_version(&session, config.schema_version)
            .await?;

        Ok(Self {
            session,
            keyspace: config.keyspace.clone(),
        })
    }

    async fn select_body(&self, collection: Collection, id: &str) -> Result<Option<String>> {
        let rows = self.session
            .query_unpaged(
                format!("SELECT body FROM {}.records WHERE collection = ? AND id = ?", self.keyspace),
                (collection.as_str(), id),
            )
            .await?
            .into_rows_result()?;

        Ok(rows.maybe_first_row::<(String,)>()?.map(|(body,)| body))
    }

    /// Reads the `[applied]` column of a lightweight transaction result.
    fn applied(result: scylla::response::query_result::QueryResult) -> Result<bool> {
        let rows = result.into_rows_result()?;
        let row = rows.maybe_first_row::<Row>()?;
        row.and_then(|row| row.columns.into_iter().next().flatten())
            .and_then(|value| match value {
                CqlValue::Boolean(applied) => Some(applied),
                _ => None,
            })
            .ok_or_else(|| AppError::Internal("Missing [applied] column in LWT result".to_string()))
    }

    async fn insert_if_absent(&self, collection: Collection, id: &str, body: &str) -> Result<bool> {
        let result = self.session
            .query_unpaged(
                format!(
                    "INSERT INTO {}.records (collection, id, body) VALUES (?, ?, ?) IF NOT EXISTS",
                    self.keyspace
                ),
                (collection.as_str(), id, body),
            )
            .await?;
        Self::applied(result)
    }

    async fn replace_if_unchanged(&self, collection: Collection, id: &str, previous: &str, body: &str) -> Result<bool> {
        let result = self.session
            .query_unpaged(
                format!(
                    "UPDATE {}.records SET body = ? WHERE collection = ? AND id = ? IF body = ?",
                    self.keyspace
                ),
                (body, collection.as_str(), id, previous),
            )
            .await?;
        Self::applied(result)
    }

    /// Claims `key` for `id` in `unique_keys`, or reports the current holder.
    async fn claim_key(&self, collection: Collection, key_field: &str, key: &str, id: &str) -> Result<KeyClaim> {
        let claim = self.session
            .query_unpaged(
                format!(
                    "INSERT INTO {}.unique_keys (collection, key_field, key_value, id) VALUES (?, ?, ?, ?) IF NOT EXISTS",
                    self.keyspace
                ),
                (collection.as_str(), key_field, key, id),
            )
            .await?;
        if Self::applied(claim)? {
            return Ok(KeyClaim::Claimed);
        }

        let rows = self.session
            .query_unpaged(
                format!(
                    "SELECT id FROM {}.unique_keys WHERE collection = ? AND key_field = ? AND key_value = ?",
                    self.keyspace
                ),
                (collection.as_str(), key_field, key),
            )
            .await?
            .into_rows_result()?;
        match rows.maybe_first_row::<(String,)>()? {
            Some((owner,)) => Ok(KeyClaim::HeldBy(owner)),
            // released between the two statements
            None => Ok(KeyClaim::Vacant),
        }
    }

    /// Drops the claim on `key` only while `id` still holds it.
    async fn release_key(&self, collection: Collection, key_field: &str, key: &str, id: &str) -> Result<()> {
        self.session
            .query_unpaged(
                format!(
                    "DELETE FROM {}.unique_keys WHERE collection = ? AND key_field = ? AND key_value = ? IF id = ?",
                    self.keyspace
                ),
                (collection.as_str(), key_field, key, id),
            )
            .await?;
        Ok(())
    }

    fn parse_body(body: &str) -> Result<Record> {
        match serde_json::from_str::<Value>(body)? {
            Value::Object(map) => Ok(map),
            _ => Err(AppError::Internal("Stored record is not a JSON object".to_string())),
        }
    }
}

#[async_trait]
impl EntityStore for ScyllaStore {
    async fn get_all(&self, collection: Collection) -> Result<Vec<Record>> {
        let rows = self.session
            .query_unpaged(
                format!("SELECT body FROM {}.records WHERE collection = ?", self.keyspace),
                (collection.as_str(),),
            )
            .await?
            .into_rows_result()?;

        let mut records = Vec::new();
        for row in rows.rows::<(String,)>()? {
            let (body,) = row?;
            records.push(Self::parse_body(&body)?);
        }
        Ok(records)
    }

    async fn get(&self, collection: Collection, id: &str) -> Result<Option<Record>> {
        self.select_body(collection, id)
            .await?
            .map(|body| Self::parse_body(&body))
            .transpose()
    }

    async fn create(&self, collection: Collection, mut record: Record) -> Result<Record> {
        let id = record_id(&record)?.to_string();
        stamp_created(&mut record);
        let body = serde_json::to_string(&record)?;

        if !self.insert_if_absent(collection, &id, &body).await? {
            return Err(AppError::Conflict(format!("{} {} already exists", collection, id)));
        }
        Ok(record)
    }

    async fn update(&self, collection: Collection, patch: Record) -> Result<Record> {
        let id = record_id(&patch)?.to_string();

        for _ in 0..MAX_CAS_ATTEMPTS {
            let previous = self.select_body(collection, &id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("{} {} not found", collection, id)))?;
            let mut current = Self::parse_body(&previous)?;
            merge_patch(&mut current, patch.clone());
            let body = serde_json::to_string(&current)?;

            if self.replace_if_unchanged(collection, &id, &previous, &body).await? {
                return Ok(current);
            }
            tracing::debug!("Concurrent write on {} {}, retrying update", collection, id);
        }
        Err(AppError::Conflict(format!("{} {} is being modified concurrently", collection, id)))
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<()> {
        let result = self.session
            .query_unpaged(
                format!("DELETE FROM {}.records WHERE collection = ? AND id = ? IF EXISTS", self.keyspace),
                (collection.as_str(), id),
            )
            .await?;

        if Self::applied(result)? {
            Ok(())
        } else {
            Err(AppError::NotFound(format!("{} {} not found", collection, id)))
        }
    }

    async fn create_unique(&self, collection: Collection, key_field: &str, mut record: Record) -> Result<Created> {
        let id = record_id(&record)?.to_string();
        let key = unique_key(&record, key_field)?;

        for _ in 0..MAX_CAS_ATTEMPTS {
            match self.claim_key(collection, key_field, &key, &id).await? {
                KeyClaim::Claimed => {
                    stamp_created(&mut record);
                    let body = serde_json::to_string(&record)?;
                    match self.insert_if_absent(collection, &id, &body).await {
                        Ok(true) => return Ok(Created { record, inserted: true }),
                        Ok(false) => {
                            self.release_key(collection, key_field, &key, &id).await?;
                            return Err(AppError::Conflict(format!("{} {} already exists", collection, id)));
                        }
                        Err(e) => {
                            if let Err(release) = self.release_key(collection, key_field, &key, &id).await {
                                tracing::error!("Failed to release {} key {} after insert error: {}", key_field, key, release);
                            }
                            return Err(e);
                        }
                    }
                }
                KeyClaim::HeldBy(owner) => {
                    if let Some(existing) = self.get(collection, &owner).await? {
                        return Ok(Created { record: existing, inserted: false });
                    }
                    tracing::warn!("Dropping stale {} key {} held by missing {} {}", key_field, key, collection, owner);
                    self.release_key(collection, key_field, &key, &owner).await?;
                }
                KeyClaim::Vacant => {}
            }
        }
        Err(AppError::Conflict(format!("{} key {} is being claimed concurrently", key_field, key)))
    }

    async fn update_unique(&self, collection: Collection, key_field: &str, patch: Record) -> Result<Record> {
        let id = record_id(&patch)?.to_string();
        let key = unique_key(&patch, key_field)?;
        let previous_key = self.get(collection, &id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("{} {} not found", collection, id)))
            .map(|current| unique_key(&current, key_field).ok())?;

        // Some(true): newly claimed, Some(false): already ours
        let mut claimed = None;
        for _ in 0..MAX_CAS_ATTEMPTS {
            match self.claim_key(collection, key_field, &key, &id).await? {
                KeyClaim::Claimed => {
                    claimed = Some(true);
                    break;
                }
                KeyClaim::HeldBy(owner) if owner == id => {
                    claimed = Some(false);
                    break;
                }
                KeyClaim::HeldBy(owner) => {
                    if self.select_body(collection, &owner).await?.is_some() {
                        return Err(AppError::Conflict(format!("{} {} is already taken", key_field, key)));
                    }
                    tracing::warn!("Dropping stale {} key {} held by missing {} {}", key_field, key, collection, owner);
                    self.release_key(collection, key_field, &key, &owner).await?;
                }
                KeyClaim::Vacant => {}
            }
        }
        let Some(claimed) = claimed else {
            return Err(AppError::Conflict(format!("{} key {} is being claimed concurrently", key_field, key)));
        };

        let updated = match self.update(collection, patch).await {
            Ok(updated) => updated,
            Err(e) => {
                if claimed {
                    self.release_key(collection, key_field, &key, &id).await?;
                }
                return Err(e);
            }
        };
        if let Some(previous_key) = previous_key.filter(|previous| *previous != key) {
            self.release_key(collection, key_field, &previous_key, &id).await?;
        }
        Ok(updated)
    }

    async fn compare_and_set(
        &self,
        collection: Collection,
        id: &str,
        field: &str,
        expected: Option<&Value>,
        patch: PatchFn<'_>,
    ) -> Result<CasOutcome> {
        for _ in 0..MAX_CAS_ATTEMPTS {
            let previous = self.select_body(collection, id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("{} {} not found", collection, id)))?;
            let mut current = Self::parse_body(&previous)?;
            if !field_matches(&current, field, expected) {
                return Ok(CasOutcome::Mismatch(current));
            }

            let fields = patch(&current);
            merge_patch(&mut current, fields);
            let body = serde_json::to_string(&current)?;
            if self.replace_if_unchanged(collection, id, &previous, &body).await? {
                return Ok(CasOutcome::Applied(current));
            }
        }
        Err(AppError::Conflict(format!("{} {} is being modified concurrently", collection, id)))
    }
}
