use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};

use crate::errors::CopilotError;
use crate::ingest::Chunk;

use super::snapshot::{IndexEntry, IndexSnapshot};

/// SQLite-backed persistence for index snapshots: one provenance row plus
/// the entries in build order, embeddings as little-endian f32 blobs.
#[derive(Clone)]
pub struct IndexStore {
    pool: SqlitePool,
    db_path: PathBuf,
}

impl IndexStore {
    pub async fn open(db_path: impl Into<PathBuf>) -> Result<Self, CopilotError> {
        let db_path = db_path.into();
        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(CopilotError::storage)?;

        let store = Self { pool, db_path };
        store.init_schema().await?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    async fn init_schema(&self) -> Result<(), CopilotError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS index_meta (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                model_id TEXT NOT NULL,
                dimension INTEGER NOT NULL,
                chunk_count INTEGER NOT NULL,
                built_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(CopilotError::storage)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS index_entries (
                position INTEGER PRIMARY KEY,
                chunk_id TEXT NOT NULL,
                title TEXT NOT NULL,
                page INTEGER NOT NULL,
                text TEXT NOT NULL,
                embedding BLOB NOT NULL
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(CopilotError::storage)?;

        Ok(())
    }

    /// Persist a snapshot, replacing whatever was stored before. Clear and
    /// rewrite happen inside one transaction, so a failed save leaves the
    /// previous index intact and never a partial one.
    pub async fn save(&self, snapshot: &IndexSnapshot) -> Result<(), CopilotError> {
        let mut tx = self.pool.begin().await.map_err(CopilotError::storage)?;

        sqlx::query("DELETE FROM index_entries")
            .execute(&mut *tx)
            .await
            .map_err(CopilotError::storage)?;
        sqlx::query("DELETE FROM index_meta")
            .execute(&mut *tx)
            .await
            .map_err(CopilotError::storage)?;

        sqlx::query(
            "INSERT INTO index_meta (id, model_id, dimension, chunk_count, built_at)
             VALUES (1, ?1, ?2, ?3, ?4)",
        )
        .bind(&snapshot.model_id)
        .bind(snapshot.dimension as i64)
        .bind(snapshot.entries.len() as i64)
        .bind(snapshot.built_at.to_rfc3339())
        .execute(&mut *tx)
        .await
        .map_err(CopilotError::storage)?;

        for (position, entry) in snapshot.entries.iter().enumerate() {
            sqlx::query(
                "INSERT INTO index_entries (position, chunk_id, title, page, text, embedding)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )
            .bind(position as i64)
            .bind(&entry.chunk.chunk_id)
            .bind(&entry.chunk.title)
            .bind(i64::from(entry.chunk.page))
            .bind(&entry.chunk.text)
            .bind(serialize_embedding(&entry.embedding))
            .execute(&mut *tx)
            .await
            .map_err(CopilotError::storage)?;
        }

        tx.commit().await.map_err(CopilotError::storage)?;
        tracing::info!(
            chunks = snapshot.entries.len(),
            path = %self.db_path.display(),
            "index snapshot persisted"
        );
        Ok(())
    }

    /// Load the stored snapshot. `expected_model_id` is the configured
    /// provider's id; any difference from the stored provenance is fatal to
    /// this index and forces a rebuild.
    pub async fn load(&self, expected_model_id: &str) -> Result<IndexSnapshot, CopilotError> {
        let meta = sqlx::query(
            "SELECT model_id, dimension, chunk_count, built_at FROM index_meta WHERE id = 1",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(CopilotError::storage)?;

        let Some(meta) = meta else {
            return Err(CopilotError::IndexUnavailable);
        };

        let model_id: String = meta.get("model_id");
        if model_id != expected_model_id {
            return Err(CopilotError::EmbeddingVersionMismatch {
                expected: model_id,
                found: expected_model_id.to_string(),
            });
        }

        let dimension: i64 = meta.get("dimension");
        let chunk_count: i64 = meta.get("chunk_count");
        let built_at_raw: String = meta.get("built_at");
        let built_at = DateTime::parse_from_rfc3339(&built_at_raw)
            .map_err(|err| CopilotError::Storage(format!("bad built_at '{built_at_raw}': {err}")))?
            .with_timezone(&Utc);

        let rows = sqlx::query(
            "SELECT chunk_id, title, page, text, embedding FROM index_entries ORDER BY position",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(CopilotError::storage)?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            let blob: Vec<u8> = row.get("embedding");
            let page: i64 = row.get("page");
            let text: String = row.get("text");
            let char_len = text.chars().count();
            entries.push(IndexEntry {
                chunk: Chunk {
                    chunk_id: row.get("chunk_id"),
                    title: row.get("title"),
                    page: page as u32,
                    text,
                    char_len,
                },
                embedding: deserialize_embedding(&blob),
            });
        }

        if entries.len() as i64 != chunk_count {
            return Err(CopilotError::Storage(format!(
                "index corrupt: meta says {chunk_count} entries, found {}",
                entries.len()
            )));
        }

        Ok(IndexSnapshot {
            model_id,
            dimension: dimension as usize,
            built_at,
            entries,
        })
    }
}

fn serialize_embedding(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn deserialize_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, page: u32, embedding: Vec<f32>) -> IndexEntry {
        IndexEntry {
            chunk: Chunk {
                chunk_id: id.to_string(),
                title: "Operating_Procedures".to_string(),
                page,
                text: format!("passage {id}"),
                char_len: format!("passage {id}").chars().count(),
            },
            embedding,
        }
    }

    fn sample_snapshot() -> IndexSnapshot {
        IndexSnapshot {
            model_id: "hash-bow-v1/3".to_string(),
            dimension: 3,
            built_at: Utc::now(),
            entries: vec![
                entry("c1", 12, vec![1.0, 0.0, 0.0]),
                entry("c2", 13, vec![0.0, 1.0, 0.0]),
            ],
        }
    }

    async fn test_store() -> IndexStore {
        let db = std::env::temp_dir().join(format!("copilot-index-test-{}.db", uuid::Uuid::new_v4()));
        IndexStore::open(db).await.unwrap()
    }

    #[tokio::test]
    async fn round_trip_replays_identical_search_results() {
        let store = test_store().await;
        let snapshot = sample_snapshot();
        store.save(&snapshot).await.unwrap();

        let reloaded = store.load("hash-bow-v1/3").await.unwrap();

        assert_eq!(reloaded.model_id, snapshot.model_id);
        assert_eq!(reloaded.len(), snapshot.len());

        let query = [0.8, 0.2, 0.0];
        let before = snapshot.search(&query, 2);
        let after = reloaded.search(&query, 2);
        for (b, a) in before.iter().zip(after.iter()) {
            assert_eq!(b.chunk.chunk_id, a.chunk.chunk_id);
            assert_eq!(b.score, a.score);
        }
        assert_eq!(after[0].chunk.page, 12);
    }

    #[tokio::test]
    async fn load_without_save_reports_index_unavailable() {
        let store = test_store().await;
        let err = store.load("hash-bow-v1/3").await.unwrap_err();
        assert!(matches!(err, CopilotError::IndexUnavailable));
    }

    #[tokio::test]
    async fn model_mismatch_is_fatal_on_load() {
        let store = test_store().await;
        store.save(&sample_snapshot()).await.unwrap();

        let err = store.load("other-model/3").await.unwrap_err();
        match err {
            CopilotError::EmbeddingVersionMismatch { expected, found } => {
                assert_eq!(expected, "hash-bow-v1/3");
                assert_eq!(found, "other-model/3");
            }
            other => panic!("expected version mismatch, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn save_replaces_previous_snapshot_entirely() {
        let store = test_store().await;
        store.save(&sample_snapshot()).await.unwrap();

        let replacement = IndexSnapshot {
            model_id: "hash-bow-v1/3".to_string(),
            dimension: 3,
            built_at: Utc::now(),
            entries: vec![entry("c9", 1, vec![0.0, 0.0, 1.0])],
        };
        store.save(&replacement).await.unwrap();

        let reloaded = store.load("hash-bow-v1/3").await.unwrap();
        assert_eq!(reloaded.len(), 1);
        assert_eq!(reloaded.entries[0].chunk.chunk_id, "c9");
    }

    #[test]
    fn embedding_blob_codec_round_trips() {
        let original = vec![0.25f32, -1.5, 3.75];
        assert_eq!(deserialize_embedding(&serialize_embedding(&original)), original);
    }
}
