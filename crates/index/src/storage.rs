//! SQLite persistence for engine snapshots.
//!
//! One database per session holds the upload buffer, indexed documents,
//! their vectors, cached neighbour lists and a key/value `meta` table for
//! the model and counters. Saving replaces the whole content in a single
//! transaction. A session holds SQLite's write lock from the moment it
//! loads its state until it commits, see [`lock_store`].

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use simserver_core::{AppError, AppResult};
use std::path::Path;
use std::time::Duration;

use crate::cache::CacheExport;
use crate::manager::EngineSnapshot;
use crate::model::Model;
use crate::store::IndexedEntry;
use crate::types::{Document, Neighbor};

const META_MODEL: &str = "model";
const META_GENERATION: &str = "generation";
const META_CACHE_CAP: &str = "cache_cap";
const META_CACHE_GENERATION: &str = "cache_generation";
const META_LAST_TRAINED: &str = "last_trained_at";
const META_LAST_OPTIMIZED: &str = "last_optimized_at";

fn storage_err(context: &str) -> impl Fn(rusqlite::Error) -> AppError + '_ {
    move |e| AppError::Storage(format!("{}: {}", context, e))
}

/// How long to wait for another process holding the session's write lock.
pub const LOCK_TIMEOUT: Duration = Duration::from_secs(30);

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS buffer (
        position INTEGER PRIMARY KEY,
        document TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS documents (
        id TEXT PRIMARY KEY,
        document TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS vectors (
        id TEXT PRIMARY KEY,
        embedding BLOB NOT NULL,
        version INTEGER NOT NULL
    );

    CREATE TABLE IF NOT EXISTS neighbors (
        id TEXT PRIMARY KEY,
        neighbors TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS meta (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );
"#;

fn open_store(db_path: &Path) -> AppResult<Connection> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            AppError::Storage(format!("Failed to create session directory: {}", e))
        })?;
    }

    let conn = Connection::open(db_path).map_err(storage_err("Failed to open session database"))?;
    conn.busy_timeout(LOCK_TIMEOUT)
        .map_err(storage_err("Failed to set busy timeout"))?;
    Ok(conn)
}

/// Open (creating if needed) the session database inside an immediate
/// (write-locked) transaction.
///
/// Other connections wait up to [`LOCK_TIMEOUT`] to take the lock, so one
/// read-modify-write cycle cannot interleave with another. The caller ends
/// the transaction with [`commit`]; dropping the connection rolls it back.
pub fn lock_store(db_path: &Path) -> AppResult<Connection> {
    let conn = open_store(db_path)?;
    conn.execute_batch("BEGIN IMMEDIATE")
        .map_err(storage_err("Failed to lock session database"))?;
    conn.execute_batch(SCHEMA)
        .map_err(storage_err("Failed to create tables"))?;

    tracing::debug!("Locked session database at {:?}", db_path);
    Ok(conn)
}

/// Commit the transaction opened by [`lock_store`].
pub fn commit(conn: &Connection) -> AppResult<()> {
    conn.execute_batch("COMMIT")
        .map_err(storage_err("Failed to commit session"))
}

/// Replace the stored state with `snapshot` inside the transaction opened
/// by [`lock_store`].
pub fn write_snapshot(tx: &Connection, snapshot: &EngineSnapshot) -> AppResult<()> {
    tx.execute_batch(
        "DELETE FROM buffer; DELETE FROM documents; DELETE FROM vectors; \
         DELETE FROM neighbors; DELETE FROM meta;",
    )
    .map_err(storage_err("Failed to clear session tables"))?;

    for (position, doc) in snapshot.buffer.iter().enumerate() {
        tx.execute(
            "INSERT INTO buffer (position, document) VALUES (?1, ?2)",
            params![position as i64, serde_json::to_string(doc)?],
        )
        .map_err(storage_err("Failed to insert buffered document"))?;
    }

    for doc in &snapshot.documents {
        tx.execute(
            "INSERT OR REPLACE INTO documents (id, document) VALUES (?1, ?2)",
            params![doc.id, serde_json::to_string(doc)?],
        )
        .map_err(storage_err("Failed to insert document"))?;
    }

    for entry in &snapshot.entries {
        tx.execute(
            "INSERT OR REPLACE INTO vectors (id, embedding, version) VALUES (?1, ?2, ?3)",
            params![
                entry.id,
                embedding_to_bytes(&entry.vector),
                entry.version as i64
            ],
        )
        .map_err(storage_err("Failed to insert vector"))?;
    }

    let mut meta: Vec<(&str, String)> = vec![(META_GENERATION, snapshot.generation.to_string())];

    if let Some(model) = &snapshot.model {
        meta.push((META_MODEL, serde_json::to_string(model)?));
    }
    if let Some(at) = snapshot.last_trained_at {
        meta.push((META_LAST_TRAINED, at.to_rfc3339()));
    }
    if let Some(at) = snapshot.last_optimized_at {
        meta.push((META_LAST_OPTIMIZED, at.to_rfc3339()));
    }

    if let Some(cache) = &snapshot.cache {
        meta.push((META_CACHE_CAP, cache.cap.to_string()));
        meta.push((META_CACHE_GENERATION, cache.generation.to_string()));

        for (id, list) in &cache.lists {
            tx.execute(
                "INSERT OR REPLACE INTO neighbors (id, neighbors) VALUES (?1, ?2)",
                params![id, serde_json::to_string(list)?],
            )
            .map_err(storage_err("Failed to insert neighbour list"))?;
        }
    }

    for (key, value) in &meta {
        tx.execute(
            "INSERT OR REPLACE INTO meta (key, value) VALUES (?1, ?2)",
            params![key, value],
        )
        .map_err(storage_err("Failed to insert meta value"))?;
    }

    tracing::debug!(
        "Wrote session: {} buffered, {} indexed, cache {}",
        snapshot.buffer.len(),
        snapshot.entries.len(),
        if snapshot.cache.is_some() { "saved" } else { "absent" }
    );
    Ok(())
}

/// Read the stored state.
pub fn load_snapshot(conn: &Connection) -> AppResult<EngineSnapshot> {
    let buffer = load_json_column::<Document>(
        conn,
        "SELECT document FROM buffer ORDER BY position",
    )?;
    let documents = load_json_column::<Document>(conn, "SELECT document FROM documents")?;

    let mut stmt = conn
        .prepare("SELECT id, embedding, version FROM vectors ORDER BY id")
        .map_err(storage_err("Failed to prepare vector query"))?;
    let entries = stmt
        .query_map([], |row| {
            let bytes: Vec<u8> = row.get(1)?;
            Ok((row.get::<_, String>(0)?, bytes, row.get::<_, i64>(2)?))
        })
        .map_err(storage_err("Failed to query vectors"))?
        .map(|row| {
            let (id, bytes, version) = row.map_err(storage_err("Failed to read vector"))?;
            Ok(IndexedEntry::new(id, bytes_to_embedding(&bytes)?, version as u64))
        })
        .collect::<AppResult<Vec<_>>>()?;

    let model = get_meta(conn, META_MODEL)?
        .map(|json| serde_json::from_str::<Model>(&json))
        .transpose()?;

    let generation = parse_meta::<u64>(conn, META_GENERATION)?.unwrap_or(0);
    let last_trained_at = get_timestamp(conn, META_LAST_TRAINED)?;
    let last_optimized_at = get_timestamp(conn, META_LAST_OPTIMIZED)?;

    let cache = match (
        parse_meta::<usize>(conn, META_CACHE_CAP)?,
        parse_meta::<u64>(conn, META_CACHE_GENERATION)?,
    ) {
        (Some(cap), Some(cache_generation)) => {
            let mut stmt = conn
                .prepare("SELECT id, neighbors FROM neighbors ORDER BY id")
                .map_err(storage_err("Failed to prepare neighbour query"))?;
            let lists = stmt
                .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))
                .map_err(storage_err("Failed to query neighbour lists"))?
                .map(|row| {
                    let (id, json) = row.map_err(storage_err("Failed to read neighbour list"))?;
                    let list: Vec<Neighbor> = serde_json::from_str(&json)?;
                    Ok((id, list))
                })
                .collect::<AppResult<Vec<_>>>()?;

            Some(CacheExport {
                cap,
                generation: cache_generation,
                lists,
            })
        }
        _ => None,
    };

    tracing::debug!(
        "Loaded session: {} buffered, {} indexed, model {}",
        buffer.len(),
        entries.len(),
        if model.is_some() { "present" } else { "absent" }
    );

    Ok(EngineSnapshot {
        buffer,
        documents,
        entries,
        generation,
        model,
        cache,
        last_trained_at,
        last_optimized_at,
    })
}

fn load_json_column<T: serde::de::DeserializeOwned>(
    conn: &Connection,
    sql: &str,
) -> AppResult<Vec<T>> {
    let mut stmt = conn
        .prepare(sql)
        .map_err(storage_err("Failed to prepare query"))?;
    let rows = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .map_err(storage_err("Failed to run query"))?;

    rows.map(|row| {
        let json = row.map_err(storage_err("Failed to read row"))?;
        Ok(serde_json::from_str(&json)?)
    })
    .collect()
}

fn get_meta(conn: &Connection, key: &str) -> AppResult<Option<String>> {
    conn.query_row("SELECT value FROM meta WHERE key = ?1", [key], |row| {
        row.get(0)
    })
    .optional()
    .map_err(storage_err("Failed to read meta value"))
}

fn parse_meta<T: std::str::FromStr>(conn: &Connection, key: &str) -> AppResult<Option<T>> {
    get_meta(conn, key)?
        .map(|value| {
            value
                .parse()
                .map_err(|_| AppError::Storage(format!("Corrupt meta value for '{}'", key)))
        })
        .transpose()
}

fn get_timestamp(conn: &Connection, key: &str) -> AppResult<Option<DateTime<Utc>>> {
    get_meta(conn, key)?
        .map(|value| {
            DateTime::parse_from_rfc3339(&value)
                .map(|at| at.with_timezone(&Utc))
                .map_err(|e| AppError::Storage(format!("Corrupt timestamp for '{}': {}", key, e)))
        })
        .transpose()
}

/// Convert embedding vector to bytes for storage.
fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(embedding.len() * 4);
    for &value in embedding {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Convert bytes back to embedding vector.
fn bytes_to_embedding(bytes: &[u8]) -> AppResult<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(AppError::Storage(
            "Invalid embedding bytes length".to_string(),
        ));
    }

    let mut embedding = Vec::with_capacity(bytes.len() / 4);
    for chunk in bytes.chunks_exact(4) {
        embedding.push(f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
    }

    Ok(embedding)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::manager::IndexManager;
    use crate::tests::toy_corpus;
    use crate::types::{EngineState, FindOptions};
    use tempfile::NamedTempFile;

    #[test]
    fn test_lock_store_creates_tables() {
        let temp_file = NamedTempFile::new().unwrap();
        let conn = lock_store(temp_file.path()).unwrap();

        let table_count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table'",
                [],
                |row| row.get(0),
            )
            .unwrap();

        assert_eq!(table_count, 5);
    }

    #[test]
    fn test_lock_store_excludes_other_writers() {
        let temp_file = NamedTempFile::new().unwrap();
        let locked = lock_store(temp_file.path()).unwrap();

        let other = Connection::open(temp_file.path()).unwrap();
        other.busy_timeout(Duration::from_millis(50)).unwrap();
        assert!(other.execute_batch("BEGIN IMMEDIATE").is_err());

        commit(&locked).unwrap();
        other.execute_batch("BEGIN IMMEDIATE; COMMIT;").unwrap();
    }

    #[test]
    fn test_dropping_lock_rolls_back() {
        let temp_file = NamedTempFile::new().unwrap();
        commit(&lock_store(temp_file.path()).unwrap()).unwrap();

        {
            let locked = lock_store(temp_file.path()).unwrap();
            locked
                .execute("INSERT INTO meta (key, value) VALUES ('k', 'v')", [])
                .unwrap();
        }

        let conn = lock_store(temp_file.path()).unwrap();
        assert_eq!(get_meta(&conn, "k").unwrap(), None);
    }

    #[test]
    fn test_empty_database_loads_empty_snapshot() {
        let temp_file = NamedTempFile::new().unwrap();
        let conn = lock_store(temp_file.path()).unwrap();

        let snapshot = load_snapshot(&conn).unwrap();
        assert!(snapshot.model.is_none());
        assert!(snapshot.entries.is_empty());
        assert!(snapshot.cache.is_none());
        assert_eq!(snapshot.generation, 0);
    }

    #[test]
    fn test_embedding_bytes() {
        let vector = vec![1.5, -0.25, 0.0, f32::MIN_POSITIVE];
        assert_eq!(bytes_to_embedding(&embedding_to_bytes(&vector)).unwrap(), vector);
        assert!(bytes_to_embedding(&[0, 1, 2]).is_err());
    }

    #[test]
    fn test_save_and_load_engine() {
        let temp_file = NamedTempFile::new().unwrap();
        let conn = lock_store(temp_file.path()).unwrap();

        let manager = IndexManager::new(EngineConfig::default());
        manager.train(Some(toy_corpus()), Some("lsi")).unwrap();
        manager.index(Some(toy_corpus()[..3].to_vec())).unwrap();
        manager.optimize();
        manager.buffer(vec![Document::new("q", "pending")]);

        write_snapshot(&conn, &manager.snapshot()).unwrap();

        // Saving twice replaces rather than appends
        write_snapshot(&conn, &manager.snapshot()).unwrap();
        commit(&conn).unwrap();

        let snapshot = load_snapshot(&conn).unwrap();
        assert_eq!(snapshot.buffer.len(), 1);
        assert_eq!(snapshot.documents.len(), 3);
        assert_eq!(snapshot.entries.len(), 3);

        let restored = IndexManager::from_snapshot(EngineConfig::default(), snapshot).unwrap();
        let status = restored.status();
        assert_eq!(status.state, EngineState::Optimized);
        assert_eq!(status.generation, manager.status().generation);

        let restored_hits = restored.find_similar("en__0", FindOptions::default()).unwrap();
        let original_hits = manager.find_similar("en__0", FindOptions::default()).unwrap();
        assert_eq!(restored_hits.len(), original_hits.len());
        for (r, o) in restored_hits.iter().zip(&original_hits) {
            assert_eq!(r.id, o.id);
            assert!((r.score - o.score).abs() < 1e-6);
        }
    }
}
