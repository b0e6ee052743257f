//! Memory Storage
//! Mission: Keep the gallery catalogue in SQLite

use crate::db::{self, SharedConnection};
use crate::memories::models::{MediaType, Memory, NewMemory, UPLOAD_DIR};
use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use rusqlite::{params, OptionalExtension, Row};
use std::fmt;
use std::path::Path;
use uuid::Uuid;

const MEMORY_COLUMNS: &str =
    "id, title, media_type, filename, originalname, mimetype, size, path, thumbnail_path, created_at";

pub struct MemoryStore {
    conn: SharedConnection,
}

/// A batch named a stored file that is already catalogued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateFilename(pub String);

impl fmt::Display for DuplicateFilename {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "File {} is already registered", self.0)
    }
}

impl std::error::Error for DuplicateFilename {}

/// One page of the catalogue plus the total matching the filter
#[derive(Debug)]
pub struct MemoryPage {
    pub memories: Vec<Memory>,
    pub total: u64,
}

impl MemoryStore {
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
            "CREATE TABLE IF NOT EXISTS memories (
                id TEXT PRIMARY KEY,
                title TEXT,
                media_type TEXT NOT NULL,
                filename TEXT UNIQUE NOT NULL,
                originalname TEXT NOT NULL,
                mimetype TEXT NOT NULL,
                size INTEGER NOT NULL,
                path TEXT NOT NULL,
                thumbnail_path TEXT,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_memories_created_at ON memories(created_at);
            CREATE INDEX IF NOT EXISTS idx_memories_media_type ON memories(media_type);",
        )?;
        Ok(())
    }

    /// Insert a batch atomically: either every memory is stored or none is.
    pub fn create_many(&self, batch: Vec<NewMemory>) -> Result<Vec<Memory>> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let mut created = Vec::with_capacity(batch.len());

        for new in batch {
            let memory = Memory {
                id: Uuid::new_v4(),
                url: Memory::public_url(&new.filename),
                thumbnail_url: new.thumbnail_path.as_deref().map(Memory::thumbnail_url_for),
                path: format!("{}/{}", UPLOAD_DIR, new.filename),
                title: new.title,
                media_type: new.media_type,
                filename: new.filename,
                originalname: new.originalname,
                mimetype: new.mimetype,
                size: new.size,
                thumbnail_path: new.thumbnail_path,
                created_at: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
            };

            tx.execute(
                "INSERT INTO memories (id, title, media_type, filename, originalname, mimetype,
                                       size, path, thumbnail_path, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    memory.id.to_string(),
                    memory.title,
                    memory.media_type.as_str(),
                    memory.filename,
                    memory.originalname,
                    memory.mimetype,
                    memory.size as i64,
                    memory.path,
                    memory.thumbnail_path,
                    memory.created_at,
                ],
            )
            .with_context(|| format!("Failed to insert memory {}", memory.filename))
            .map_err(|err| {
                if db::is_unique_violation(&err) {
                    anyhow::Error::new(DuplicateFilename(memory.filename.clone()))
                } else {
                    err
                }
            })?;

            created.push(memory);
        }

        tx.commit().context("Failed to commit memories")?;
        Ok(created)
    }

    /// Newest first. `page` is 1-based.
    pub fn list(&self, media_type: Option<MediaType>, page: u32, limit: u32) -> Result<MemoryPage> {
        let conn = self.conn.lock();
        let filter = media_type.map(|t| t.as_str().to_string());
        let offset = i64::from(page.saturating_sub(1)) * i64::from(limit);

        let total: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM memories WHERE (?1 IS NULL OR media_type = ?1)",
                params![filter],
                |row| row.get(0),
            )
            .context("Failed to count memories")?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM memories
             WHERE (?1 IS NULL OR media_type = ?1)
             ORDER BY created_at DESC, rowid DESC
             LIMIT ?2 OFFSET ?3",
            MEMORY_COLUMNS
        ))?;
        let memories = stmt
            .query_map(params![filter, i64::from(limit), offset], row_to_memory)?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to list memories")?;

        Ok(MemoryPage {
            memories,
            total: total as u64,
        })
    }

    pub fn get(&self, id: &Uuid) -> Result<Option<Memory>> {
        let conn = self.conn.lock();
        let memory = conn
            .query_row(
                &format!("SELECT {} FROM memories WHERE id = ?1", MEMORY_COLUMNS),
                params![id.to_string()],
                row_to_memory,
            )
            .optional()
            .context("Failed to load memory")?;
        Ok(memory)
    }

    pub fn update_title(&self, id: &Uuid, title: Option<&str>) -> Result<Option<Memory>> {
        let updated = {
            let conn = self.conn.lock();
            conn.execute(
                "UPDATE memories SET title = ?1 WHERE id = ?2",
                params![title, id.to_string()],
            )
            .context("Failed to update memory title")?
        };
        if updated == 0 {
            return Ok(None);
        }
        self.get(id)
    }

    /// Remove the record and hand it back so the caller can clean up files.
    pub fn delete(&self, id: &Uuid) -> Result<Option<Memory>> {
        let Some(memory) = self.get(id)? else {
            return Ok(None);
        };
        let conn = self.conn.lock();
        conn.execute("DELETE FROM memories WHERE id = ?1", params![id.to_string()])
            .context("Failed to delete memory")?;
        Ok(Some(memory))
    }
}

fn row_to_memory(row: &Row<'_>) -> rusqlite::Result<Memory> {
    let id: String = row.get(0)?;
    let id = Uuid::parse_str(&id).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let media_type: String = row.get(2)?;
    let media_type = MediaType::parse(&media_type).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            2,
            rusqlite::types::Type::Text,
            format!("unknown media type {}", media_type).into(),
        )
    })?;
    let filename: String = row.get(3)?;
    let thumbnail_path: Option<String> = row.get(8)?;
    let size: i64 = row.get(6)?;

    Ok(Memory {
        id,
        title: row.get(1)?,
        media_type,
        url: Memory::public_url(&filename),
        thumbnail_url: thumbnail_path.as_deref().map(Memory::thumbnail_url_for),
        filename,
        originalname: row.get(4)?,
        mimetype: row.get(5)?,
        size: size.max(0) as u64,
        path: row.get(7)?,
        thumbnail_path,
        created_at: row.get(9)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_memory(filename: &str, media_type: MediaType) -> NewMemory {
        NewMemory {
            title: None,
            media_type,
            filename: filename.to_string(),
            originalname: format!("orig-{}", filename),
            mimetype: match media_type {
                MediaType::Image => "image/jpeg".to_string(),
                MediaType::Video => "video/mp4".to_string(),
            },
            size: 1024,
            thumbnail_path: match media_type {
                MediaType::Image => Some(filename.to_string()),
                MediaType::Video => None,
            },
        }
    }

    #[test]
    fn test_create_sets_paths_and_urls() {
        let store = MemoryStore::in_memory().unwrap();
        let created = store
            .create_many(vec![new_memory("a.jpg", MediaType::Image)])
            .unwrap();

        let memory = &created[0];
        assert_eq!(memory.path, "uploads/memories/a.jpg");
        assert_eq!(memory.url, "/uploads/memories/a.jpg");
        assert_eq!(
            memory.thumbnail_url.as_deref(),
            Some("/uploads/memories/thumbnails/a.jpg")
        );

        let loaded = store.get(&memory.id).unwrap().unwrap();
        assert_eq!(&loaded, memory);
    }

    #[test]
    fn test_batch_is_atomic() {
        let store = MemoryStore::in_memory().unwrap();
        store
            .create_many(vec![new_memory("a.jpg", MediaType::Image)])
            .unwrap();

        // Second file collides on the unique filename
        let result = store.create_many(vec![
            new_memory("b.jpg", MediaType::Image),
            new_memory("a.jpg", MediaType::Image),
        ]);
        let err = result.unwrap_err();
        assert_eq!(
            err.downcast_ref::<DuplicateFilename>(),
            Some(&DuplicateFilename("a.jpg".to_string()))
        );

        let page = store.list(None, 1, 20).unwrap();
        assert_eq!(page.total, 1);
    }

    #[test]
    fn test_duplicate_inside_one_batch() {
        let store = MemoryStore::in_memory().unwrap();
        let err = store
            .create_many(vec![
                new_memory("same.jpg", MediaType::Image),
                new_memory("same.jpg", MediaType::Image),
            ])
            .unwrap_err();

        assert!(err.downcast_ref::<DuplicateFilename>().is_some());
        assert_eq!(store.list(None, 1, 20).unwrap().total, 0);
    }

    #[test]
    fn test_list_filters_and_paginates() {
        let store = MemoryStore::in_memory().unwrap();
        let batch: Vec<_> = (0..5)
            .map(|i| new_memory(&format!("img{}.jpg", i), MediaType::Image))
            .chain((0..3).map(|i| new_memory(&format!("vid{}.mp4", i), MediaType::Video)))
            .collect();
        store.create_many(batch).unwrap();

        let all = store.list(None, 1, 20).unwrap();
        assert_eq!(all.total, 8);
        assert_eq!(all.memories[0].filename, "vid2.mp4");

        let images = store.list(Some(MediaType::Image), 1, 2).unwrap();
        assert_eq!(images.total, 5);
        assert_eq!(images.memories.len(), 2);
        assert_eq!(images.memories[0].filename, "img4.jpg");

        let last_page = store.list(Some(MediaType::Image), 3, 2).unwrap();
        assert_eq!(last_page.memories.len(), 1);
        assert_eq!(last_page.memories[0].filename, "img0.jpg");
    }

    #[test]
    fn test_update_title_and_delete() {
        let store = MemoryStore::in_memory().unwrap();
        let created = store
            .create_many(vec![new_memory("a.jpg", MediaType::Image)])
            .unwrap();
        let id = created[0].id;

        let updated = store.update_title(&id, Some("Sunset")).unwrap().unwrap();
        assert_eq!(updated.title.as_deref(), Some("Sunset"));

        let deleted = store.delete(&id).unwrap().unwrap();
        assert_eq!(deleted.id, id);
        assert!(store.delete(&id).unwrap().is_none());
        assert!(store.update_title(&id, Some("x")).unwrap().is_none());
    }
}
