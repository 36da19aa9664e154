use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, params_from_iter, Connection, ErrorCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::db;
use crate::domain::EvidenceChunk;
use crate::error::AppError;

/// Entry in the policy picker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PolicyItem {
    pub id: String,
    pub name: String,
}

/// SQLite-backed source-of-truth store for chunk text and metadata.
///
/// The connection sits behind a mutex so one store can serve concurrent
/// pipeline invocations.
pub struct ChunkStore {
    conn: Mutex<Connection>,
}

impl ChunkStore {
    pub fn open(path: &Path) -> Result<Self, AppError> {
        let mut conn = db::open(path)?;
        db::migrate(&mut conn)?;
        Ok(Self::from_connection(conn))
    }

    pub fn open_in_memory() -> Result<Self, AppError> {
        let mut conn = db::open_in_memory()?;
        db::migrate(&mut conn)?;
        Ok(Self::from_connection(conn))
    }

    /// Wrap an already-migrated connection.
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, AppError> {
        self.conn.lock().map_err(|_| {
            AppError::new("DB_LOCK_POISONED", "Chunk store connection lock was poisoned")
        })
    }

    pub fn insert_chunk(&self, chunk: &EvidenceChunk) -> Result<(), AppError> {
        let metadata_json = if chunk.metadata.is_empty() {
            None
        } else {
            Some(serde_json::to_string(&chunk.metadata).map_err(|e| {
                AppError::new("DB_INSERT_FAILED", "Failed to encode chunk metadata")
                    .with_details(e.to_string())
            })?)
        };

        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO document_chunks(id, document_id, category, ordinal, text_content, metadata_json, embedding_id)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                chunk.id,
                chunk.document_id,
                chunk.category,
                chunk.ordinal,
                chunk.text,
                metadata_json,
                chunk.embedding_id,
            ],
        )
        .map_err(|e| {
            if e.sqlite_error_code() == Some(ErrorCode::ConstraintViolation) {
                AppError::new(
                    "DB_CHUNK_DUPLICATE",
                    "Chunk id or (document, category, ordinal) already exists",
                )
                .with_details(format!(
                    "id={}; document_id={}; category={}; ordinal={}",
                    chunk.id, chunk.document_id, chunk.category, chunk.ordinal
                ))
            } else {
                AppError::new("DB_INSERT_FAILED", "Failed to insert chunk").with_details(e.to_string())
            }
        })?;
        Ok(())
    }

    /// Resolve many chunk ids with a single query. Order of the result is
    /// unspecified and ids with no row are simply absent. A row that cannot be
    /// decoded is logged and left out; the rest of the batch still resolves.
    pub fn fetch_many(&self, ids: &[String]) -> Result<Vec<EvidenceChunk>, AppError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!(
            "SELECT id, document_id, category, ordinal, text_content, metadata_json, embedding_id \
             FROM document_chunks WHERE id IN ({placeholders})"
        );

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql).map_err(|e| {
            AppError::new("DB_QUERY_FAILED", "Failed to prepare chunk lookup").with_details(e.to_string())
        })?;

        let rows = stmt
            .query_map(params_from_iter(ids.iter()), |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, u32>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, Option<String>>(5)?,
                    row.get::<_, Option<String>>(6)?,
                ))
            })
            .map_err(|e| {
                AppError::new("DB_QUERY_FAILED", "Failed to run chunk lookup").with_details(e.to_string())
            })?;

        let mut out = Vec::with_capacity(ids.len());
        for r in rows {
            let (id, document_id, category, ordinal, text, metadata_json, embedding_id) = match r {
                Ok(row) => row,
                Err(e) => {
                    error!(error = %e, "skipping unreadable chunk row");
                    continue;
                }
            };
            let metadata = match metadata_json.as_deref() {
                None | Some("") => serde_json::Map::new(),
                Some(raw) => match serde_json::from_str(raw) {
                    Ok(m) => m,
                    Err(e) => {
                        error!(chunk_id = %id, error = %e, "skipping chunk with undecodable metadata");
                        continue;
                    }
                },
            };
            out.push(EvidenceChunk {
                id,
                category,
                document_id,
                ordinal,
                text,
                metadata,
                embedding_id,
            });
        }
        debug!(requested = ids.len(), found = out.len(), "resolved chunks");
        Ok(out)
    }

    pub fn insert_policy(&self, id: &str, name: &str, version: &str, text: &str) -> Result<(), AppError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO internal_policies(id, name, version, text_content) VALUES (?1, ?2, ?3, ?4)",
            params![id, name, version, text],
        )
        .map_err(|e| {
            AppError::new("DB_INSERT_FAILED", "Failed to insert policy")
                .with_details(format!("id={id}; err={e}"))
        })?;
        Ok(())
    }

    pub fn list_policies(&self) -> Result<Vec<PolicyItem>, AppError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT id, name FROM internal_policies ORDER BY name ASC, id ASC")
            .map_err(|e| {
                AppError::new("DB_QUERY_FAILED", "Failed to prepare policies query")
                    .with_details(e.to_string())
            })?;
        let rows = stmt
            .query_map([], |row| {
                Ok(PolicyItem {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            })
            .map_err(|e| {
                AppError::new("DB_QUERY_FAILED", "Failed to list policies").with_details(e.to_string())
            })?;

        rows.collect::<Result<Vec<_>, _>>().map_err(|e| {
            AppError::new("DB_QUERY_FAILED", "Failed to read policy row").with_details(e.to_string())
        })
    }
}
