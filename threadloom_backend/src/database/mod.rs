pub mod models;
pub mod repositories;

use crate::config::ThreadloomPaths;
use anyhow::{anyhow, Context, Result};
use rusqlite::Connection;
use std::sync::{Arc, Mutex};

pub(crate) const MIGRATIONS: &str = r#"
    PRAGMA journal_mode = WAL;
    PRAGMA foreign_keys = ON;

    CREATE TABLE IF NOT EXISTS settings (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS discussions (
        discussion_id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        insert_user_id INTEGER NOT NULL,
        date_inserted TEXT NOT NULL,
        count_comments INTEGER NOT NULL DEFAULT 0
    );

    CREATE TABLE IF NOT EXISTS comments (
        comment_id INTEGER PRIMARY KEY AUTOINCREMENT,
        discussion_id INTEGER NOT NULL,
        parent_comment_id INTEGER,
        insert_user_id INTEGER NOT NULL,
        body TEXT NOT NULL,
        date_inserted TEXT NOT NULL,
        date_updated TEXT,
        depth INTEGER NOT NULL DEFAULT 1,
        score INTEGER NOT NULL DEFAULT 0,
        score_child_comments INTEGER NOT NULL DEFAULT 0,
        count_child_comments INTEGER NOT NULL DEFAULT 0,
        FOREIGN KEY (discussion_id) REFERENCES discussions(discussion_id) ON DELETE CASCADE,
        FOREIGN KEY (parent_comment_id) REFERENCES comments(comment_id)
    );

    CREATE INDEX IF NOT EXISTS idx_comments_discussion ON comments(discussion_id);
    CREATE INDEX IF NOT EXISTS idx_comments_parent ON comments(parent_comment_id);

    CREATE TABLE IF NOT EXISTS comment_reactions (
        comment_id INTEGER NOT NULL,
        user_id INTEGER NOT NULL,
        reaction_type TEXT NOT NULL,
        date_inserted TEXT NOT NULL,
        PRIMARY KEY (comment_id, user_id, reaction_type),
        FOREIGN KEY (comment_id) REFERENCES comments(comment_id) ON DELETE CASCADE
    );

    CREATE INDEX IF NOT EXISTS idx_comment_reactions_comment ON comment_reactions(comment_id);
"#;

#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
    newly_created: bool,
}

impl Database {
    pub fn connect(paths: &ThreadloomPaths) -> Result<Self> {
        let newly_created = !paths.db_path.exists();
        let conn = Connection::open(&paths.db_path)
            .with_context(|| format!("failed to open {}", paths.db_path.display()))?;
        Ok(Self::from_connection(conn, newly_created))
    }

    pub fn from_connection(conn: Connection, newly_created: bool) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
            newly_created,
        }
    }

    /// Fresh, migrated in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self::from_connection(conn, true);
        db.ensure_migrations()?;
        Ok(db)
    }

    pub fn ensure_migrations(&self) -> Result<bool> {
        self.with_conn(|conn| {
            conn.execute_batch(MIGRATIONS)?;
            self.ensure_comment_aggregate_columns(conn)?;
            Ok(())
        })?;
        Ok(self.newly_created)
    }

    pub fn with_repositories<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(repositories::SqliteRepositories<'_>) -> Result<T>,
    {
        self.with_conn(|conn| {
            let repos = repositories::SqliteRepositories::new(conn);
            f(repos)
        })
    }

    /// Runs `f` inside a single transaction. Any error rolls back every write
    /// made through the repositories handed to `f`.
    pub fn with_transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(repositories::SqliteRepositories<'_>) -> Result<T>,
    {
        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;
            let value = f(repositories::SqliteRepositories::new(&tx))?;
            tx.commit()?;
            Ok(value)
        })
    }

    pub fn get_setting(&self, key: &str) -> Result<Option<String>> {
        use repositories::SettingRepository;
        self.with_repositories(|repos| {
            repos
                .settings()
                .get(key)
                .with_context(|| format!("failed to load setting {key}"))
        })
    }

    pub fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        use repositories::SettingRepository;
        self.with_repositories(|repos| repos.settings().set(key, value))
    }

    fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let guard = self
            .conn
            .lock()
            .map_err(|_| anyhow!("database mutex poisoned"))?;
        f(&guard)
    }

    /// Databases created before aggregates were tracked lack the roll-up
    /// columns. They start at zero; `threadloom_backend recalculate` fills them.
    fn ensure_comment_aggregate_columns(&self, conn: &Connection) -> Result<()> {
        let mut has_score_child = false;
        let mut has_count_child = false;
        {
            let mut stmt = conn.prepare("PRAGMA table_info(comments)")?;
            let rows = stmt.query_map([], |row| {
                let name: String = row.get(1)?;
                Ok(name)
            })?;
            for row in rows {
                let name = row?;
                if name.eq_ignore_ascii_case("score_child_comments") {
                    has_score_child = true;
                }
                if name.eq_ignore_ascii_case("count_child_comments") {
                    has_count_child = true;
                }
            }
        }
        if !has_score_child {
            conn.execute(
                "ALTER TABLE comments ADD COLUMN score_child_comments INTEGER NOT NULL DEFAULT 0",
                [],
            )?;
        }
        if !has_count_child {
            conn.execute(
                "ALTER TABLE comments ADD COLUMN count_child_comments INTEGER NOT NULL DEFAULT 0",
                [],
            )?;
        }
        Ok(())
    }
}
