//! Save files for persona memory.
//!
//! Each persona's [`MemoryBank`] is serialised to JSON and stored in SQLite
//! under the persona's name, next to a small key/value table for
//! simulation-wide state (the clock, the step counter):
//!
//! ```sql
//! CREATE TABLE IF NOT EXISTS memory_banks (
//!     persona    TEXT PRIMARY KEY,
//!     data       BLOB NOT NULL,
//!     updated_at TEXT NOT NULL,
//!     checksum   TEXT
//! );
//! CREATE TABLE IF NOT EXISTS sim_meta (
//!     key   TEXT PRIMARY KEY,
//!     value TEXT NOT NULL
//! );
//! ```
//!
//! Banks can also be exported to, and imported from, a directory of
//! `<persona>.json` files for inspection.

use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::Utc;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use tracing::{debug, info, warn};

use crate::config::PersistenceConfig;
use crate::error::{ReverieError, Result};
use crate::memory::MemoryBank;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS memory_banks (
        persona    TEXT PRIMARY KEY,
        data       BLOB NOT NULL,
        updated_at TEXT NOT NULL,
        checksum   TEXT
    );
    CREATE TABLE IF NOT EXISTS sim_meta (
        key   TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );";

// ---------------------------------------------------------------------------
// CRC-32
// ---------------------------------------------------------------------------

/// CRC-32 (ISO 3309) of `data` as lowercase hex.
fn crc32_hex(data: &[u8]) -> String {
    const POLY: u32 = 0xEDB8_8320;
    let mut crc: u32 = !0;
    for &byte in data {
        crc ^= u32::from(byte);
        for _ in 0..8 {
            crc = if crc & 1 == 1 { (crc >> 1) ^ POLY } else { crc >> 1 };
        }
    }
    format!("{:08x}", !crc)
}

fn to_json(bank: &MemoryBank) -> Result<Vec<u8>> {
    serde_json::to_vec(bank).map_err(|e| ReverieError::Serialization(e.to_string()))
}

fn from_json(data: &[u8]) -> Result<MemoryBank> {
    serde_json::from_slice(data).map_err(|e| ReverieError::Serialization(e.to_string()))
}

// ---------------------------------------------------------------------------
// PersistenceEngine
// ---------------------------------------------------------------------------

/// An open save database.
///
/// ```no_run
/// # use reverie_core::persistence::PersistenceEngine;
/// # use reverie_core::config::PersistenceConfig;
/// # use reverie_core::memory::{Identity, MemoryBank, Scratch};
/// let engine = PersistenceEngine::open("the_ville.db", &PersistenceConfig::default())?;
/// let bank = MemoryBank::new(Scratch::new(Identity { name: "Klaus Mueller".into(), ..Identity::default() }));
/// engine.save_bank(&bank)?;
/// let loaded = engine.load_bank("Klaus Mueller")?;
/// # Ok::<(), reverie_core::error::ReverieError>(())
/// ```
pub struct PersistenceEngine {
    conn: Connection,
    config: PersistenceConfig,
    db_path: PathBuf,
}

impl std::fmt::Debug for PersistenceEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistenceEngine")
            .field("db_path", &self.db_path)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl PersistenceEngine {
    /// Open (or create) a save database at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ReverieError::Database`] on SQLite failures.
    pub fn open<P: AsRef<Path>>(path: P, config: &PersistenceConfig) -> Result<Self> {
        let db_path = path.as_ref().to_path_buf();
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(&db_path, flags)?;

        if config.wal_mode {
            conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        }
        conn.execute_batch("PRAGMA synchronous = NORMAL; PRAGMA busy_timeout = 5000;")?;
        conn.execute_batch(SCHEMA)?;

        info!(path = %db_path.display(), wal = config.wal_mode, "Save database opened");
        Ok(Self {
            conn,
            config: config.clone(),
            db_path,
        })
    }

    /// Open a throwaway in-memory database.
    ///
    /// # Errors
    ///
    /// Returns [`ReverieError::Database`] on SQLite failures.
    pub fn open_in_memory(config: &PersistenceConfig) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn,
            config: config.clone(),
            db_path: PathBuf::from(":memory:"),
        })
    }

    // ------------------------------------------------------------------
    // Memory banks
    // ------------------------------------------------------------------

    /// Save (upsert) a persona's bank under its name.
    ///
    /// # Errors
    ///
    /// Returns [`ReverieError::Serialization`] if encoding fails, or
    /// [`ReverieError::Database`] on SQLite failures.
    pub fn save_bank(&self, bank: &MemoryBank) -> Result<()> {
        let start = Instant::now();
        let json = to_json(bank)?;
        let checksum = self.config.checksum_enabled.then(|| crc32_hex(&json));

        self.conn.execute(
            "INSERT INTO memory_banks (persona, data, updated_at, checksum)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(persona) DO UPDATE SET
                data = excluded.data,
                updated_at = excluded.updated_at,
                checksum = excluded.checksum",
            params![bank.name(), json, Utc::now().to_rfc3339(), checksum],
        )?;

        debug!(
            persona = %bank.name(),
            nodes = bank.total_count(),
            bytes = json.len(),
            elapsed_us = start.elapsed().as_micros() as u64,
            "Saved memory bank"
        );
        Ok(())
    }

    /// Load a persona's bank, `None` if it was never saved.
    ///
    /// A checksum mismatch is logged; the data is still returned.
    ///
    /// # Errors
    ///
    /// Returns [`ReverieError::Serialization`] if decoding fails, or
    /// [`ReverieError::Database`] on SQLite failures.
    pub fn load_bank(&self, persona: &str) -> Result<Option<MemoryBank>> {
        let start = Instant::now();
        let row: Option<(Vec<u8>, Option<String>)> = self
            .conn
            .prepare_cached("SELECT data, checksum FROM memory_banks WHERE persona = ?1")?
            .query_row(params![persona], |row| Ok((row.get(0)?, row.get(1)?)))
            .optional()?;

        let Some((data, stored)) = row else {
            return Ok(None);
        };

        if self.config.checksum_enabled {
            if let Some(expected) = stored {
                let actual = crc32_hex(&data);
                if expected != actual {
                    warn!(persona, %expected, %actual, "Checksum mismatch, save may be corrupt");
                }
            }
        }

        let bank = from_json(&data)?;
        debug!(
            persona,
            nodes = bank.total_count(),
            elapsed_us = start.elapsed().as_micros() as u64,
            "Loaded memory bank"
        );
        Ok(Some(bank))
    }

    /// Delete a persona's bank. Returns whether a row was removed.
    ///
    /// # Errors
    ///
    /// Returns [`ReverieError::Database`] on SQLite failures.
    pub fn delete_bank(&self, persona: &str) -> Result<bool> {
        let deleted = self
            .conn
            .execute("DELETE FROM memory_banks WHERE persona = ?1", params![persona])?;
        Ok(deleted > 0)
    }

    /// Names of every saved persona, sorted.
    ///
    /// # Errors
    ///
    /// Returns [`ReverieError::Database`] on SQLite failures.
    pub fn list_personas(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT persona FROM memory_banks ORDER BY persona")?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(names)
    }

    /// Number of saved personas.
    ///
    /// # Errors
    ///
    /// Returns [`ReverieError::Database`] on SQLite failures.
    pub fn persona_count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM memory_banks", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    // ------------------------------------------------------------------
    // Simulation metadata
    // ------------------------------------------------------------------

    /// Store a simulation-wide value.
    ///
    /// # Errors
    ///
    /// Returns [`ReverieError::Database`] on SQLite failures.
    pub fn save_meta(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO sim_meta (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    /// Read a simulation-wide value.
    ///
    /// # Errors
    ///
    /// Returns [`ReverieError::Database`] on SQLite failures.
    pub fn load_meta(&self, key: &str) -> Result<Option<String>> {
        Ok(self
            .conn
            .query_row("SELECT value FROM sim_meta WHERE key = ?1", params![key], |row| row.get(0))
            .optional()?)
    }

    // ------------------------------------------------------------------
    // JSON export / import
    // ------------------------------------------------------------------

    /// Write every saved bank to `<dir>/<persona>.json`. Returns the count.
    ///
    /// # Errors
    ///
    /// Returns [`ReverieError::Io`] if the directory is not writable.
    pub fn export_json<P: AsRef<Path>>(&self, dir: P) -> Result<usize> {
        std::fs::create_dir_all(dir.as_ref())?;
        let mut written = 0;
        for persona in self.list_personas()? {
            if let Some(bank) = self.load_bank(&persona)? {
                let pretty = serde_json::to_vec_pretty(&bank)
                    .map_err(|e| ReverieError::Serialization(e.to_string()))?;
                std::fs::write(dir.as_ref().join(format!("{persona}.json")), pretty)?;
                written += 1;
            }
        }
        info!(dir = %dir.as_ref().display(), banks = written, "Exported memory banks");
        Ok(written)
    }

    /// Load every `*.json` bank in `dir` into the database. Returns the count.
    ///
    /// # Errors
    ///
    /// Returns [`ReverieError::Io`] or [`ReverieError::Serialization`] for
    /// unreadable or malformed files.
    pub fn import_json<P: AsRef<Path>>(&self, dir: P) -> Result<usize> {
        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir.as_ref())?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
            .collect();
        paths.sort();
        for path in &paths {
            let bank = from_json(&std::fs::read(path)?)?;
            self.save_bank(&bank)?;
        }
        info!(dir = %dir.as_ref().display(), banks = paths.len(), "Imported memory banks");
        Ok(paths.len())
    }

    // ------------------------------------------------------------------
    // Backup
    // ------------------------------------------------------------------

    /// Copy the database to `dest_path` with SQLite's online-backup API.
    ///
    /// # Errors
    ///
    /// Returns [`ReverieError::Database`] on SQLite failures.
    pub fn backup<P: AsRef<Path>>(&self, dest_path: P) -> Result<()> {
        let start = Instant::now();
        let mut dest = Connection::open(dest_path.as_ref())?;
        let backup = rusqlite::backup::Backup::new(&self.conn, &mut dest)?;
        backup.run_to_completion(256, std::time::Duration::from_millis(50), None)?;
        info!(
            dest = %dest_path.as_ref().display(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Save backup completed"
        );
        Ok(())
    }

    /// Back up to `<db>.bak.1`, shifting older backups up and keeping at
    /// most `backup_count` of them. No-op for in-memory databases.
    ///
    /// # Errors
    ///
    /// Returns [`ReverieError::Database`] or [`ReverieError::Io`] on failure.
    pub fn create_rotating_backup(&self) -> Result<()> {
        let max = self.config.backup_count;
        if self.db_path.as_os_str() == ":memory:" || max == 0 {
            return Ok(());
        }
        let oldest = self.backup_path(max);
        if oldest.exists() {
            std::fs::remove_file(&oldest)?;
        }
        for i in (1..max).rev() {
            let src = self.backup_path(i);
            if src.exists() {
                std::fs::rename(&src, self.backup_path(i + 1))?;
            }
        }
        self.backup(self.backup_path(1))
    }

    fn backup_path(&self, n: u32) -> PathBuf {
        let mut name = self.db_path.as_os_str().to_os_string();
        name.push(format!(".bak.{n}"));
        PathBuf::from(name)
    }

    /// Database path, `:memory:` for in-memory databases.
    #[must_use]
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Run SQLite's integrity check.
    ///
    /// # Errors
    ///
    /// Returns [`ReverieError::Database`] if the check itself fails.
    pub fn integrity_check(&self) -> Result<bool> {
        let result: String = self
            .conn
            .query_row("PRAGMA integrity_check", [], |row| row.get(0))?;
        Ok(result == "ok")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{Identity, NodeDraft, Scratch};
    use crate::types::{Embedding, Triple};
    use chrono::NaiveDate;

    fn bank(name: &str) -> MemoryBank {
        let mut bank = MemoryBank::new(Scratch::new(Identity {
            name: name.to_string(),
            ..Identity::default()
        }));
        let at = NaiveDate::from_ymd_opt(2023, 2, 13)
            .and_then(|d| d.and_hms_opt(8, 30, 15))
            .expect("time");
        bank.associative.add_event(
            NodeDraft::new(
                at,
                Triple::new(name, "is", "reading"),
                format!("{name} is reading"),
                4,
                "reading",
                Embedding(vec![0.25, -0.5, 1.0]),
            )
            .with_keywords([name, "reading"]),
        );
        bank.spatial.learn("the Ville", Some("library"), Some("reading room"), Some("desk"));
        bank
    }

    #[test]
    fn round_trip_is_lossless() {
        let engine = PersistenceEngine::open_in_memory(&PersistenceConfig::default()).expect("open");
        let saved = bank("Klaus Mueller");
        engine.save_bank(&saved).expect("save");
        let loaded = engine.load_bank("Klaus Mueller").expect("load").expect("some");

        let before = saved.associative.seq_event().next().expect("event");
        let after = loaded.associative.seq_event().next().expect("event");
        assert_eq!(before.created, after.created);
        assert_eq!(before.keywords, after.keywords);
        assert_eq!(loaded.associative.embedding("reading"), saved.associative.embedding("reading"));
        assert_eq!(loaded.spatial, saved.spatial);
        assert_eq!(loaded.associative.keyword_strength_event("reading"), 1);
    }

    #[test]
    fn missing_persona_is_none() {
        let engine = PersistenceEngine::open_in_memory(&PersistenceConfig::default()).expect("open");
        assert!(engine.load_bank("nobody").expect("load").is_none());
    }

    #[test]
    fn list_count_and_delete() {
        let engine = PersistenceEngine::open_in_memory(&PersistenceConfig::default()).expect("open");
        for name in ["Maria Lopez", "Klaus Mueller"] {
            engine.save_bank(&bank(name)).expect("save");
        }
        engine.save_bank(&bank("Klaus Mueller")).expect("upsert");
        assert_eq!(engine.list_personas().expect("list"), vec!["Klaus Mueller", "Maria Lopez"]);
        assert_eq!(engine.persona_count().expect("count"), 2);
        assert!(engine.delete_bank("Maria Lopez").expect("delete"));
        assert!(!engine.delete_bank("Maria Lopez").expect("delete again"));
    }

    #[test]
    fn corrupted_checksum_still_loads() {
        let engine = PersistenceEngine::open_in_memory(&PersistenceConfig::default()).expect("open");
        engine.save_bank(&bank("Klaus Mueller")).expect("save");
        engine
            .conn
            .execute("UPDATE memory_banks SET checksum = 'deadbeef'", [])
            .expect("corrupt");
        assert!(engine.load_bank("Klaus Mueller").expect("load").is_some());
    }

    #[test]
    fn meta_values_upsert() {
        let engine = PersistenceEngine::open_in_memory(&PersistenceConfig::default()).expect("open");
        engine.save_meta("curr_time", "2023-02-13 08:00:00").expect("save");
        engine.save_meta("curr_time", "2023-02-13 08:00:10").expect("save");
        assert_eq!(
            engine.load_meta("curr_time").expect("load").as_deref(),
            Some("2023-02-13 08:00:10")
        );
        assert!(engine.load_meta("step").expect("load").is_none());
    }

    #[test]
    fn json_export_then_import() {
        let dir = tempfile::tempdir().expect("tempdir");
        let source = PersistenceEngine::open_in_memory(&PersistenceConfig::default()).expect("open");
        source.save_bank(&bank("Klaus Mueller")).expect("save");
        source.save_bank(&bank("Maria Lopez")).expect("save");
        assert_eq!(source.export_json(dir.path()).expect("export"), 2);
        assert!(dir.path().join("Klaus Mueller.json").exists());

        let target = PersistenceEngine::open_in_memory(&PersistenceConfig::default()).expect("open");
        assert_eq!(target.import_json(dir.path()).expect("import"), 2);
        assert_eq!(target.persona_count().expect("count"), 2);
    }

    #[test]
    fn rotating_backup_keeps_limit() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db_path = dir.path().join("ville.db");
        let config = PersistenceConfig {
            backup_count: 2,
            ..PersistenceConfig::default()
        };
        let engine = PersistenceEngine::open(&db_path, &config).expect("open");
        engine.save_bank(&bank("Klaus Mueller")).expect("save");
        for _ in 0..3 {
            engine.create_rotating_backup().expect("backup");
        }
        assert!(dir.path().join("ville.db.bak.1").exists());
        assert!(dir.path().join("ville.db.bak.2").exists());
        assert!(!dir.path().join("ville.db.bak.3").exists());

        let restored = PersistenceEngine::open(dir.path().join("ville.db.bak.1"), &config).expect("open");
        assert!(restored.load_bank("Klaus Mueller").expect("load").is_some());
    }

    #[test]
    fn crc32_known_vector() {
        assert_eq!(crc32_hex(b"123456789"), "cbf43926");
    }
}
