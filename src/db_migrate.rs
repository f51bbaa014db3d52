use std::fs;
use std::path::{Path, PathBuf};
use scylla::client::session::Session;
use crate::error::{AppError, Result};

/// Applies versioned CQL scripts from `<schema_path>/<version>/`.
///
/// A fresh keyspace (version 0) gets `init_schema.cql` of the first version it
/// reaches; later versions apply `update_schema.cql`. `{}` inside a script is
/// replaced with the keyspace name.
pub struct MigrationTool {
    keyspace: String,
    schema_path: PathBuf,
}

impl MigrationTool {
    pub fn new(keyspace: String, schema_path: PathBuf) -> Self {
        tracing::debug!("Migration tool keyspace: {}", keyspace);
        Self {
            keyspace,
            schema_path,
        }
    }

    async fn ensure_keyspace(&self, session: &Session) -> Result<()> {
        let create_keyspace = format!(
            "CREATE KEYSPACE IF NOT EXISTS {} WITH REPLICATION = \
             {{'class': 'SimpleStrategy', 'replication_factor': 1}}",
            self.keyspace
        );
        session
            .query_unpaged(create_keyspace, &[])
            .await
            .map_err(|e| AppError::Internal(format!("Unable to create keyspace {}: {}", self.keyspace, e)))?;
        Ok(())
    }

    async fn ensure_migration_table(&self, session: &Session) -> Result<()> {
        let create_table = format!(
            "CREATE TABLE IF NOT EXISTS {}.schema_version (
                version int,
                applied_at timestamp,
                db int primary key
            )",
            self.keyspace
        );

        session
            .query_unpaged(create_table, &[])
            .await
            .map_err(|_| AppError::Internal("Unable to create schema_version table".to_string()))?;

        Ok(())
    }

    async fn get_current_version(&self, session: &Session) -> Result<i32> {
        let select = format!(
            "SELECT version FROM {}.schema_version LIMIT 1",
            self.keyspace
        );

        let rows = session.query_unpaged(select, &[]).await?.into_rows_result()?;

        // No row yet means an empty keyspace.
        Ok(rows.maybe_first_row::<(i32,)>()?.map(|(version,)| version).unwrap_or(0))
    }

    async fn set_version(&self, session: &Session, version: i32) -> Result<()> {
        let cql: String = format!(
            "INSERT INTO {}.schema_version (version, applied_at, db) VALUES (?, toTimestamp(now()), 0)",
            self.keyspace
        );
        session
            .query_unpaged(cql.clone(), (version,))
            .await
            .map_err(|e| AppError::Internal(format!("Failed to update schema_version with {}: {}", cql, e)))?;
        Ok(())
    }

    /// Statements are split on `;`, which is enough for plain DDL.
    async fn execute_cql_file(&self, session: &Session, file_path: &Path) -> Result<()> {
        let contents = fs::read_to_string(file_path)
            .map_err(|e| AppError::Internal(format!("Failed to read file {:?}: {}", file_path, e)))?;

        for statement in contents.split(';') {
            let stmt = statement.trim().replace("{}", &self.keyspace);
            if !stmt.is_empty() {
                session
                    .query_unpaged(stmt.clone(), &[])
                    .await
                    .map_err(|e| AppError::Internal(format!("Error executing CQL {}: {}", stmt, e)))?;
            }
        }

        Ok(())
    }

    fn available_versions(&self) -> Result<Vec<i32>> {
        let mut versions: Vec<i32> = fs::read_dir(&self.schema_path)
            .map_err(|_| AppError::Config(format!("Unable to read schema directory {:?}", self.schema_path)))?
            .filter_map(|entry| {
                let path = entry.ok()?.path();
                if !path.is_dir() {
                    return None;
                }
                path.file_name()?.to_string_lossy().parse::<i32>().ok()
            })
            .collect();

        versions.sort_unstable();
        Ok(versions)
    }

    pub async fn migrate_to_version(&self, session: &Session, target_version: i32) -> Result<()> {
        self.ensure_keyspace(session).await?;
        self.ensure_migration_table(session).await?;

        let mut current_version = self.get_current_version(session).await?;
        tracing::info!("Current schema version is {}", current_version);

        for v in self.available_versions()? {
            if v <= current_version || v > target_version {
                continue;
            }
            let version_path = self.schema_path.join(v.to_string());
            let script = if current_version == 0 {
                version_path.join("init_schema.cql")
            } else {
                version_path.join("update_schema.cql")
            };

            if script.exists() {
                tracing::info!("Applying {} for version {}", script.display(), v);
                self.execute_cql_file(session, &script).await?;
            } else {
                tracing::warn!("No migration script {} for version {}, skipping", script.display(), v);
            }

            self.set_version(session, v).await?;
            current_version = v;
        }

        if current_version < target_version {
            tracing::warn!(
                "No more migration scripts found, target_version={} > current_version={}",
                target_version, current_version
            );
        } else {
            tracing::info!("Schema is at version {}", current_version);
        }

        Ok(())
    }
}
