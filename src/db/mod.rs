use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::models::ConversationSnapshot;

pub const DEFAULT_SNAPSHOT_KEY: &str = "default";

/// Whole-snapshot store over SQLite. The snapshot key is a constructor
/// parameter so the single-operator setup is a configuration choice, not a
/// hidden global; today exactly one key ("default") is ever used.
///
/// `save` is a full replace with no locking: concurrent writers (two
/// browser tabs) race and the last write wins. That data-loss window is an
/// accepted part of the single-user design.
#[derive(Clone)]
pub struct Database {
    db_path: PathBuf,
    snapshot_key: String,
}

impl Database {
    pub fn new(db_path: PathBuf, snapshot_key: impl Into<String>) -> Result<Self, String> {
        let db = Self {
            db_path,
            snapshot_key: snapshot_key.into(),
        };
        db.migrate()?;
        Ok(db)
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    fn open(&self) -> Result<Connection, String> {
        Connection::open(&self.db_path).map_err(|e| format!("open db failed: {e}"))
    }

    fn migrate(&self) -> Result<(), String> {
        let conn = self.open()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS snapshots (
              key TEXT PRIMARY KEY,
              payload TEXT NOT NULL,
              updated_at TEXT NOT NULL
            );
            "#,
        )
        .map_err(|e| format!("migrate failed: {e}"))?;
        Ok(())
    }

    /// Loads the persisted snapshot. Nothing stored yet, or a payload that
    /// no longer decodes, yields the empty snapshot rather than an error so
    /// a session can always start.
    pub fn load(&self) -> Result<ConversationSnapshot, String> {
        let conn = self.open()?;
        let payload: Option<String> = conn
            .query_row(
                "SELECT payload FROM snapshots WHERE key = ?1",
                params![self.snapshot_key],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| format!("load snapshot failed: {e}"))?;

        let Some(payload) = payload else {
            return Ok(ConversationSnapshot::default());
        };

        match serde_json::from_str(&payload) {
            Ok(snapshot) => Ok(snapshot),
            Err(e) => {
                warn!(key = %self.snapshot_key, "stored snapshot failed to decode: {e}");
                Ok(ConversationSnapshot::default())
            }
        }
    }

    /// Idempotent full replace keyed by the configured snapshot key.
    pub fn save(&self, snapshot: &ConversationSnapshot) -> Result<(), String> {
        let payload = serde_json::to_string(snapshot)
            .map_err(|e| format!("encode snapshot failed: {e}"))?;

        let conn = self.open()?;
        conn.execute(
            r#"
            INSERT INTO snapshots (key, payload, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET
              payload = excluded.payload,
              updated_at = excluded.updated_at
            "#,
            params![self.snapshot_key, payload, Utc::now().to_rfc3339()],
        )
        .map_err(|e| format!("save snapshot failed: {e}"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Chat, Message, Project};

    fn temp_db(key: &str) -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path().join("test.sqlite"), key).unwrap();
        (dir, db)
    }

    fn sample_snapshot() -> ConversationSnapshot {
        let messages = vec![
            Message::user(
                "Plan a launch".to_string(),
                "Acme".to_string(),
                "Chat".to_string(),
            ),
            Message::assistant_text("Here is a plan.".to_string()),
        ];
        ConversationSnapshot {
            projects: vec![Project {
                id: "p1".to_string(),
                name: "Spring".to_string(),
                created_at: "2025-01-01T00:00:00Z".to_string(),
            }],
            chats: vec![Chat {
                id: "c1".to_string(),
                project_id: Some("p1".to_string()),
                title: "Plan a launch".to_string(),
                messages,
                created_at: "2025-01-01T00:00:00Z".to_string(),
            }],
        }
    }

    #[test]
    fn load_before_any_save_is_empty() {
        let (_dir, db) = temp_db(DEFAULT_SNAPSHOT_KEY);
        let snapshot = db.load().unwrap();
        assert!(snapshot.projects.is_empty());
        assert!(snapshot.chats.is_empty());
    }

    #[test]
    fn save_then_load_round_trips() {
        let (_dir, db) = temp_db(DEFAULT_SNAPSHOT_KEY);
        let snapshot = sample_snapshot();
        db.save(&snapshot).unwrap();

        let loaded = db.load().unwrap();
        assert_eq!(loaded.projects.len(), 1);
        assert_eq!(loaded.projects[0].id, "p1");
        assert_eq!(loaded.chats.len(), 1);
        assert_eq!(loaded.chats[0].messages.len(), 2);
        assert_eq!(
            loaded.chats[0].messages[0].meta.as_ref().unwrap().brand,
            "Acme"
        );
    }

    #[test]
    fn empty_snapshot_round_trips_too() {
        let (_dir, db) = temp_db(DEFAULT_SNAPSHOT_KEY);
        db.save(&ConversationSnapshot::default()).unwrap();
        let loaded = db.load().unwrap();
        assert!(loaded.projects.is_empty());
        assert!(loaded.chats.is_empty());
    }

    #[test]
    fn second_save_fully_replaces_the_first() {
        let (_dir, db) = temp_db(DEFAULT_SNAPSHOT_KEY);
        db.save(&sample_snapshot()).unwrap();

        let mut next = sample_snapshot();
        next.remove_project("p1");
        db.save(&next).unwrap();

        let loaded = db.load().unwrap();
        assert!(loaded.projects.is_empty());
        assert!(loaded.chats.is_empty());
    }

    #[test]
    fn keys_do_not_see_each_others_snapshots() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.sqlite");
        let a = Database::new(path.clone(), "a").unwrap();
        let b = Database::new(path, "b").unwrap();

        a.save(&sample_snapshot()).unwrap();
        assert!(b.load().unwrap().chats.is_empty());
        assert_eq!(a.load().unwrap().chats.len(), 1);
    }

    #[test]
    fn undecodable_payload_degrades_to_empty_snapshot() {
        let (_dir, db) = temp_db(DEFAULT_SNAPSHOT_KEY);
        let conn = Connection::open(db.path()).unwrap();
        conn.execute(
            "INSERT INTO snapshots (key, payload, updated_at) VALUES (?1, ?2, ?3)",
            params![DEFAULT_SNAPSHOT_KEY, "{not json", "2025-01-01T00:00:00Z"],
        )
        .unwrap();

        let loaded = db.load().unwrap();
        assert!(loaded.projects.is_empty());
        assert!(loaded.chats.is_empty());
    }
}
