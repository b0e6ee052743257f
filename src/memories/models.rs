use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const UPLOAD_DIR: &str = "uploads/memories";
pub const MAX_FILES_PER_UPLOAD: usize = 10;
pub const MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Image,
    Video,
}

impl MediaType {
    pub fn as_str(&self) -> &str {
        match self {
            MediaType::Image => "image",
            MediaType::Video => "video",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "image" => Some(MediaType::Image),
            "video" => Some(MediaType::Video),
            _ => None,
        }
    }

    /// Media type implied by a MIME type; `None` for anything else.
    pub fn from_mime(mimetype: &str) -> Option<Self> {
        if mimetype.starts_with("image/") {
            Some(MediaType::Image)
        } else if mimetype.starts_with("video/") {
            Some(MediaType::Video)
        } else {
            None
        }
    }
}

/// A gallery entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Memory {
    pub id: Uuid,
    pub title: Option<String>,
    #[serde(rename = "type")]
    pub media_type: MediaType,
    pub filename: String,
    pub originalname: String,
    pub mimetype: String,
    pub size: u64,
    pub path: String,
    pub thumbnail_path: Option<String>,
    pub created_at: String,
    pub url: String,
    pub thumbnail_url: Option<String>,
}

impl Memory {
    pub fn public_url(filename: &str) -> String {
        format!("/{}/{}", UPLOAD_DIR, filename)
    }

    pub fn thumbnail_url_for(thumbnail: &str) -> String {
        format!("/{}/thumbnails/{}", UPLOAD_DIR, thumbnail)
    }
}

/// One stored file being registered
#[derive(Debug, Clone, Deserialize)]
pub struct UploadedFile {
    pub filename: String,
    pub originalname: String,
    pub mimetype: String,
    pub size: u64,
    #[serde(default)]
    pub thumbnail: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateMemoriesRequest {
    #[serde(default)]
    pub files: Vec<UploadedFile>,
    #[serde(default)]
    pub title: Option<String>,
}

/// Validated input for the store
#[derive(Debug, Clone)]
pub struct NewMemory {
    pub title: Option<String>,
    pub media_type: MediaType,
    pub filename: String,
    pub originalname: String,
    pub mimetype: String,
    pub size: u64,
    pub thumbnail_path: Option<String>,
}

impl CreateMemoriesRequest {
    pub fn validate(self) -> Result<Vec<NewMemory>, String> {
        if self.files.is_empty() {
            return Err("Please upload at least one file".to_string());
        }
        if self.files.len() > MAX_FILES_PER_UPLOAD {
            return Err(format!(
                "Too many files; at most {} per upload",
                MAX_FILES_PER_UPLOAD
            ));
        }

        let title = self
            .title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());

        self.files
            .into_iter()
            .map(|file| {
                let media_type = MediaType::from_mime(&file.mimetype).ok_or_else(|| {
                    "Not an image or video! Please upload only images or videos.".to_string()
                })?;
                if file.size > MAX_FILE_SIZE {
                    return Err(format!("{} exceeds the 50MB limit", file.originalname));
                }
                if !is_safe_name(&file.filename) {
                    return Err(format!("Invalid stored filename: {}", file.filename));
                }
                // Only images get thumbnails
                let thumbnail_path = match media_type {
                    MediaType::Image => file.thumbnail.filter(|t| is_safe_name(t)),
                    MediaType::Video => None,
                };
                Ok(NewMemory {
                    title: title.clone(),
                    media_type,
                    filename: file.filename,
                    originalname: file.originalname,
                    mimetype: file.mimetype,
                    size: file.size,
                    thumbnail_path,
                })
            })
            .collect()
    }
}

/// A bare file name: no separators, no parent references.
fn is_safe_name(name: &str) -> bool {
    !name.is_empty() && !name.contains(['/', '\\']) && name != "." && name != ".."
}

#[derive(Debug, Deserialize)]
pub struct ListMemoriesQuery {
    #[serde(rename = "type")]
    pub media_type: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateMemoryRequest {
    pub title: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(mimetype: &str, size: u64) -> UploadedFile {
        UploadedFile {
            filename: "0b7c.jpg".to_string(),
            originalname: "beach.jpg".to_string(),
            mimetype: mimetype.to_string(),
            size,
            thumbnail: Some("0b7c.jpg".to_string()),
        }
    }

    #[test]
    fn test_media_type_from_mime() {
        assert_eq!(MediaType::from_mime("image/png"), Some(MediaType::Image));
        assert_eq!(MediaType::from_mime("video/mp4"), Some(MediaType::Video));
        assert_eq!(MediaType::from_mime("application/pdf"), None);
    }

    #[test]
    fn test_validate_accepts_images_and_videos() {
        let request = CreateMemoriesRequest {
            files: vec![file("image/jpeg", 1024), file("video/mp4", 2048)],
            title: Some("  Summer  ".to_string()),
        };

        let memories = request.validate().unwrap();
        assert_eq!(memories.len(), 2);
        assert_eq!(memories[0].media_type, MediaType::Image);
        assert_eq!(memories[0].thumbnail_path.as_deref(), Some("0b7c.jpg"));
        assert_eq!(memories[1].media_type, MediaType::Video);
        assert_eq!(memories[1].thumbnail_path, None);
        assert_eq!(memories[1].title.as_deref(), Some("Summer"));
    }

    #[test]
    fn test_validate_rejects_bad_uploads() {
        let empty = CreateMemoriesRequest {
            files: vec![],
            title: None,
        };
        assert_eq!(
            empty.validate().unwrap_err(),
            "Please upload at least one file"
        );

        let too_many = CreateMemoriesRequest {
            files: vec![file("image/png", 1); MAX_FILES_PER_UPLOAD + 1],
            title: None,
        };
        assert!(too_many.validate().is_err());

        let pdf = CreateMemoriesRequest {
            files: vec![file("application/pdf", 1)],
            title: None,
        };
        assert!(pdf.validate().is_err());

        let huge = CreateMemoriesRequest {
            files: vec![file("video/mp4", MAX_FILE_SIZE + 1)],
            title: None,
        };
        assert!(huge.validate().is_err());

        let mut sneaky = file("image/png", 1);
        sneaky.filename = "../../etc/passwd".to_string();
        let traversal = CreateMemoriesRequest {
            files: vec![sneaky],
            title: None,
        };
        assert!(traversal.validate().is_err());
    }

    #[test]
    fn test_urls() {
        assert_eq!(Memory::public_url("a.jpg"), "/uploads/memories/a.jpg");
        assert_eq!(
            Memory::thumbnail_url_for("a.jpg"),
            "/uploads/memories/thumbnails/a.jpg"
        );
    }
}
