//! Persistent moderator users and bans, backed by `SQLite`.
//!
//! Live room state never touches the database; only bans and users persist.

use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;

use anyhow::Context;
use rusqlite::params;
use rusqlite::Connection;
use rusqlite::OptionalExtension;

const BCRYPT_COST: u32 = 12;

/// How many rows `get_recent_bans` returns.
const RECENT_BANS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BanInfo {
    pub id: i64,
    pub ipid: String,
    pub hdid: String,
    /// When the ban was placed (unix seconds).
    pub time: i64,
    /// When the ban lapses (unix seconds); `-1` permanent, `0` nullified.
    pub duration: i64,
    pub reason: String,
    pub moderator: String,
}

impl BanInfo {
    pub fn is_active(&self, now: i64) -> bool {
        self.duration == -1 || self.duration > now
    }
}

#[derive(Debug, Clone, Copy)]
pub enum BanLookup {
    BanId,
    Ipid,
    Hdid,
}

#[derive(Debug, Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database {}", path.display()))?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn init_schema(conn: &Connection) -> anyhow::Result<()> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS bans (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                ipid TEXT NOT NULL,
                hdid TEXT NOT NULL,
                time INTEGER NOT NULL,
                duration INTEGER NOT NULL,
                reason TEXT NOT NULL,
                moderator TEXT NOT NULL
            )",
            [],
        )?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS users (
                username TEXT PRIMARY KEY,
                password TEXT NOT NULL,
                permissions TEXT NOT NULL
            )",
            [],
        )?;
        Ok(())
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().expect("db mutex poisoned")
    }

    // Users.

    pub fn user_exists(&self, username: &str) -> bool {
        self.conn()
            .query_row(
                "SELECT 1 FROM users WHERE username = ?1",
                params![username],
                |_| Ok(()),
            )
            .optional()
            .map(|r| r.is_some())
            .unwrap_or(false)
    }

    pub fn create_user(&self, username: &str, password: &[u8], perms: u64) -> anyhow::Result<()> {
        if username.trim().is_empty() || password.is_empty() {
            anyhow::bail!("empty username or password");
        }
        if self.user_exists(username) {
            anyhow::bail!("username already exists");
        }
        let hashed = bcrypt::hash(password, BCRYPT_COST).context("failed to hash password")?;
        self.conn().execute(
            "INSERT INTO users (username, password, permissions) VALUES (?1, ?2, ?3)",
            params![username, hashed, perms.to_string()],
        )?;
        Ok(())
    }

    pub fn remove_user(&self, username: &str) -> anyhow::Result<()> {
        let n = self
            .conn()
            .execute("DELETE FROM users WHERE username = ?1", params![username])?;
        if n == 0 {
            anyhow::bail!("user does not exist");
        }
        Ok(())
    }

    /// Check a username/password pair; on success returns the user's
    /// permission bitmask.
    pub fn authenticate(&self, username: &str, password: &[u8]) -> (bool, u64) {
        let row: Option<(String, String)> = self
            .conn()
            .query_row(
                "SELECT password, permissions FROM users WHERE username = ?1",
                params![username],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .optional()
            .unwrap_or(None);
        let Some((hash, perms)) = row else {
            return (false, 0);
        };
        if !bcrypt::verify(password, &hash).unwrap_or(false) {
            return (false, 0);
        }
        match perms.parse::<u64>() {
            Ok(p) => (true, p),
            Err(_) => (false, 0),
        }
    }

    pub fn change_permissions(&self, username: &str, perms: u64) -> anyhow::Result<()> {
        let n = self.conn().execute(
            "UPDATE users SET permissions = ?1 WHERE username = ?2",
            params![perms.to_string(), username],
        )?;
        if n == 0 {
            anyhow::bail!("user does not exist");
        }
        Ok(())
    }

    // Bans.

    pub fn add_ban(
        &self,
        ipid: &str,
        hdid: &str,
        time: i64,
        until: i64,
        reason: &str,
        moderator: &str,
    ) -> anyhow::Result<i64> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO bans (ipid, hdid, time, duration, reason, moderator)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![ipid, hdid, time, until, reason, moderator],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Nullify a ban by zeroing its duration.
    pub fn unban(&self, id: i64) -> anyhow::Result<()> {
        let n = self
            .conn()
            .execute("UPDATE bans SET duration = 0 WHERE id = ?1", params![id])?;
        if n == 0 {
            anyhow::bail!("no ban with id {id}");
        }
        Ok(())
    }

    pub fn update_duration(&self, id: i64, until: i64) -> anyhow::Result<()> {
        let n = self.conn().execute(
            "UPDATE bans SET duration = ?1 WHERE id = ?2",
            params![until, id],
        )?;
        if n == 0 {
            anyhow::bail!("no ban with id {id}");
        }
        Ok(())
    }

    pub fn update_reason(&self, id: i64, reason: &str) -> anyhow::Result<()> {
        let n = self.conn().execute(
            "UPDATE bans SET reason = ?1 WHERE id = ?2",
            params![reason, id],
        )?;
        if n == 0 {
            anyhow::bail!("no ban with id {id}");
        }
        Ok(())
    }

    pub fn get_ban(&self, by: BanLookup, value: &str) -> anyhow::Result<Vec<BanInfo>> {
        let sql = match by {
            BanLookup::BanId => "SELECT id, ipid, hdid, time, duration, reason, moderator FROM bans WHERE id = ?1",
            BanLookup::Ipid => "SELECT id, ipid, hdid, time, duration, reason, moderator FROM bans WHERE ipid = ?1",
            BanLookup::Hdid => "SELECT id, ipid, hdid, time, duration, reason, moderator FROM bans WHERE hdid = ?1",
        };
        let conn = self.conn();
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params![value], row_to_ban)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn get_recent_bans(&self) -> anyhow::Result<Vec<BanInfo>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, ipid, hdid, time, duration, reason, moderator
             FROM bans ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![RECENT_BANS], row_to_ban)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Look for an active ban on the given identifier.
    pub fn is_banned(&self, by: BanLookup, value: &str) -> anyhow::Result<Option<BanInfo>> {
        let now = chrono::Utc::now().timestamp();
        let bans = self.get_ban(by, value)?;
        Ok(bans.into_iter().find(|b| b.is_active(now)))
    }
}

/// Human form of a ban's end: a timestamp, `∞` for permanent, or `nullified`.
pub fn format_until(duration: i64) -> String {
    match duration {
        -1 => "∞".to_string(),
        0 => "nullified".to_string(),
        t => format_timestamp(t),
    }
}

pub fn format_timestamp(t: i64) -> String {
    match chrono::DateTime::from_timestamp(t, 0) {
        Some(dt) => dt.format("%d %b %Y %H:%M UTC").to_string(),
        None => t.to_string(),
    }
}

fn row_to_ban(row: &rusqlite::Row<'_>) -> rusqlite::Result<BanInfo> {
    Ok(BanInfo {
        id: row.get(0)?,
        ipid: row.get(1)?,
        hdid: row.get(2)?,
        time: row.get(3)?,
        duration: row.get(4)?,
        reason: row.get(5)?,
        moderator: row.get(6)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_lifecycle() {
        let db = Store::open_in_memory().unwrap();
        assert!(!db.user_exists("mango"));
        db.create_user("mango", b"hunter22", 0b111).unwrap();
        assert!(db.user_exists("mango"));
        assert!(db.create_user("mango", b"other", 0).is_err());

        let (ok, perms) = db.authenticate("mango", b"hunter22");
        assert!(ok);
        assert_eq!(perms, 0b111);

        let (ok, perms) = db.authenticate("mango", b"wrong");
        assert!(!ok);
        assert_eq!(perms, 0);

        db.change_permissions("mango", 1).unwrap();
        let (_, perms) = db.authenticate("mango", b"hunter22");
        assert_eq!(perms, 1);

        db.remove_user("mango").unwrap();
        assert!(!db.user_exists("mango"));
        assert!(db.remove_user("mango").is_err());
    }

    #[test]
    fn ban_lifecycle() {
        let db = Store::open_in_memory().unwrap();
        let now = chrono::Utc::now().timestamp();

        let id = db
            .add_ban("ipid1", "hdid1", now, -1, "spamming", "mango")
            .unwrap();
        assert!(db.is_banned(BanLookup::Ipid, "ipid1").unwrap().is_some());
        assert!(db.is_banned(BanLookup::Hdid, "hdid1").unwrap().is_some());
        assert!(db.is_banned(BanLookup::Ipid, "other").unwrap().is_none());

        db.update_reason(id, "flooding").unwrap();
        let bans = db.get_ban(BanLookup::BanId, &id.to_string()).unwrap();
        assert_eq!(bans[0].reason, "flooding");

        db.unban(id).unwrap();
        assert!(db.is_banned(BanLookup::Ipid, "ipid1").unwrap().is_none());
    }

    #[test]
    fn expired_bans_are_inactive() {
        let db = Store::open_in_memory().unwrap();
        let now = chrono::Utc::now().timestamp();

        db.add_ban("ipid2", "hdid2", now - 100, now - 10, "old", "mango")
            .unwrap();
        assert!(db.is_banned(BanLookup::Ipid, "ipid2").unwrap().is_none());

        db.add_ban("ipid2", "hdid2", now, now + 3600, "new", "mango")
            .unwrap();
        let b = db.is_banned(BanLookup::Ipid, "ipid2").unwrap().unwrap();
        assert_eq!(b.reason, "new");
    }

    #[test]
    fn recent_bans_are_bounded_and_newest_first() {
        let db = Store::open_in_memory().unwrap();
        for i in 0..8 {
            db.add_ban(&format!("ip{i}"), "hd", 0, -1, "r", "m").unwrap();
        }
        let recent = db.get_recent_bans().unwrap();
        assert_eq!(recent.len(), 5);
        assert_eq!(recent[0].ipid, "ip7");
        assert_eq!(recent[4].ipid, "ip3");
    }
}
