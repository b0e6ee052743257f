//! Message Storage
//! Mission: Persist contact messages and serve the admin inbox

use crate::db::{self, SharedConnection};
use crate::messages::models::{Message, NewMessage};
use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use rusqlite::{params, OptionalExtension, Row};
use std::path::Path;
use tracing::debug;
use uuid::Uuid;

const MESSAGE_COLUMNS: &str = "id, name, email, message, device, read, created_at";

pub struct MessageStore {
    conn: SharedConnection,
}

impl MessageStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_connection(db::open(path)?)
    }

    pub fn in_memory() -> Result<Self> {
        Self::from_connection(db::open_in_memory()?)
    }

    fn from_connection(conn: SharedConnection) -> Result<Self> {
        let store = Self { conn };
        store.init_db()?;
        Ok(store)
    }

    fn init_db(&self) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS messages (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                email TEXT NOT NULL,
                message TEXT NOT NULL,
                device TEXT,
                read INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_messages_created_at ON messages(created_at);",
        )?;
        Ok(())
    }

    pub fn create(&self, new: NewMessage) -> Result<Message> {
        let message = Message {
            id: Uuid::new_v4(),
            name: new.name,
            email: new.email,
            message: new.message,
            device: new.device,
            read: false,
            created_at: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
        };

        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO messages (id, name, email, message, device, read, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6)",
            params![
                message.id.to_string(),
                message.name,
                message.email,
                message.message,
                message.device,
                message.created_at,
            ],
        )
        .context("Failed to insert message")?;

        debug!("Stored message {} from {}", message.id, message.email);
        Ok(message)
    }

    /// All messages, newest first
    pub fn list(&self) -> Result<Vec<Message>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM messages ORDER BY created_at DESC, rowid DESC",
            MESSAGE_COLUMNS
        ))?;
        let messages = stmt
            .query_map([], row_to_message)?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to list messages")?;
        Ok(messages)
    }

    pub fn count_unread(&self) -> Result<u64> {
        let conn = self.conn.lock();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM messages WHERE read = 0", [], |row| {
                row.get(0)
            })
            .context("Failed to count unread messages")?;
        Ok(count as u64)
    }

    pub fn get(&self, id: &Uuid) -> Result<Option<Message>> {
        let conn = self.conn.lock();
        let message = conn
            .query_row(
                &format!("SELECT {} FROM messages WHERE id = ?1", MESSAGE_COLUMNS),
                params![id.to_string()],
                row_to_message,
            )
            .optional()
            .context("Failed to load message")?;
        Ok(message)
    }

    /// Flag a message as read. `None` if it does not exist.
    pub fn mark_read(&self, id: &Uuid) -> Result<Option<Message>> {
        let updated = {
            let conn = self.conn.lock();
            conn.execute(
                "UPDATE messages SET read = 1 WHERE id = ?1",
                params![id.to_string()],
            )
            .context("Failed to mark message read")?
        };
        if updated == 0 {
            return Ok(None);
        }
        self.get(id)
    }

    /// Returns false when there was nothing to delete
    pub fn delete(&self, id: &Uuid) -> Result<bool> {
        let conn = self.conn.lock();
        let deleted = conn
            .execute("DELETE FROM messages WHERE id = ?1", params![id.to_string()])
            .context("Failed to delete message")?;
        Ok(deleted > 0)
    }
}

fn row_to_message(row: &Row<'_>) -> rusqlite::Result<Message> {
    let id: String = row.get(0)?;
    let id = Uuid::parse_str(&id).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(Message {
        id,
        name: row.get(1)?,
        email: row.get(2)?,
        message: row.get(3)?,
        device: row.get(4)?,
        read: row.get(5)?,
        created_at: row.get(6)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_message(name: &str) -> NewMessage {
        NewMessage {
            name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase()),
            message: "Hello there".to_string(),
            device: Some("Mozilla/5.0".to_string()),
        }
    }

    #[test]
    fn test_create_and_list_newest_first() {
        let store = MessageStore::in_memory().unwrap();

        store.create(new_message("First")).unwrap();
        store.create(new_message("Second")).unwrap();
        store.create(new_message("Third")).unwrap();

        let names: Vec<_> = store.list().unwrap().into_iter().map(|m| m.name).collect();
        assert_eq!(names, vec!["Third", "Second", "First"]);
    }

    #[test]
    fn test_unread_count_and_mark_read() {
        let store = MessageStore::in_memory().unwrap();
        let first = store.create(new_message("First")).unwrap();
        store.create(new_message("Second")).unwrap();
        assert_eq!(store.count_unread().unwrap(), 2);

        let updated = store.mark_read(&first.id).unwrap().unwrap();
        assert!(updated.read);
        assert_eq!(store.count_unread().unwrap(), 1);

        // Marking twice is harmless
        assert!(store.mark_read(&first.id).unwrap().is_some());
        assert_eq!(store.count_unread().unwrap(), 1);

        assert!(store.mark_read(&Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn test_delete() {
        let store = MessageStore::in_memory().unwrap();
        let message = store.create(new_message("First")).unwrap();

        assert!(store.delete(&message.id).unwrap());
        assert!(!store.delete(&message.id).unwrap());
        assert!(store.get(&message.id).unwrap().is_none());
    }
}
