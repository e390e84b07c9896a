use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::pagination::Page;

/// One entry in a user's diagnostic chat history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSummary {
    #[serde(alias = "_id", alias = "id")]
    pub chat_id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub last_message: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl ChatSummary {
    pub fn label(&self) -> &str {
        self.title
            .as_deref()
            .or(self.last_message.as_deref())
            .unwrap_or("(untitled)")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    #[serde(default)]
    pub has_more: bool,
    #[serde(default)]
    pub next_cursor: Option<String>,
    #[serde(default)]
    pub total_docs: u64,
}

/// `GET /chats/users/{uid}` payload
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatPage {
    #[serde(default)]
    pub chats: Vec<ChatSummary>,
    #[serde(default)]
    pub pagination: Pagination,
}

impl From<ChatPage> for Page<ChatSummary> {
    fn from(page: ChatPage) -> Self {
        Page {
            items: page.chats,
            has_more: page.pagination.has_more,
            next_cursor: page.pagination.next_cursor,
            total: page.pagination.total_docs,
        }
    }
}

/// `POST /chats/{uid}/message` payload
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosisResponse {
    pub ia_response: IaResponse,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IaResponse {
    pub chat_id: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A crop photo to send along with a diagnosis request
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub mime_type: String,
}

impl ImageUpload {
    pub fn new(bytes: Vec<u8>, file_name: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes,
            file_name: file_name.into(),
            mime_type: mime_type.into(),
        }
    }

    /// Read an image from disk, guessing the MIME type from its extension
    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read image {}", path.display()))?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("photo.jpg")
            .to_string();
        let mime_type = Self::guess_mime(path).to_string();
        Ok(Self {
            bytes,
            file_name,
            mime_type,
        })
    }

    fn guess_mime(path: &Path) -> &'static str {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("png") => "image/png",
            Some("webp") => "image/webp",
            Some("heic") => "image/heic",
            _ => "image/jpeg",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_chat_page() {
        let json = r#"{"chats": [{"_id": "c1", "title": "Leaf rust", "createdAt": "2024-05-02T10:00:00Z"}, {"chatId": "c2", "lastMessage": "Yellow spots"}], "pagination": {"hasMore": true, "nextCursor": "c2", "totalDocs": 14}}"#;
        let page: ChatPage = serde_json::from_str(json).expect("Failed to parse chat page JSON");
        assert_eq!(page.chats.len(), 2);
        assert_eq!(page.chats[0].chat_id, "c1");
        assert_eq!(page.chats[0].label(), "Leaf rust");
        assert_eq!(page.chats[1].label(), "Yellow spots");

        let page: Page<ChatSummary> = page.into();
        assert!(page.has_more);
        assert_eq!(page.next_cursor.as_deref(), Some("c2"));
        assert_eq!(page.total, 14);
    }

    #[test]
    fn test_parse_chat_page_missing_pagination() {
        let page: ChatPage = serde_json::from_str(r#"{"chats": []}"#).unwrap();
        assert_eq!(page.pagination, Pagination::default());
    }

    #[test]
    fn test_parse_diagnosis_response() {
        let json = r#"{"iaResponse": {"chatId": "abc", "answer": "Likely early blight"}}"#;
        let resp: DiagnosisResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.ia_response.chat_id, "abc");
    }

    #[test]
    fn test_image_upload_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("leaf.PNG");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(b"\x89PNG").unwrap();

        let upload = ImageUpload::from_path(&path).unwrap();
        assert_eq!(upload.file_name, "leaf.PNG");
        assert_eq!(upload.mime_type, "image/png");
        assert_eq!(upload.bytes, b"\x89PNG");
    }
}
