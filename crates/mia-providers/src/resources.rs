//! Demo resource store: a system log, a logo image and optional text documents

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use mia_mcp::ProviderError;
use mia_mcp::ResourceProvider;
use mia_mcp::protocol::{Resource, ResourceContents, ResourceTemplate};

pub const SYSTEM_LOG_URI: &str = "file:///logs/system.log";
pub const LOGO_URI: &str = "file:///images/logo.png";

/// PNG signature followed by placeholder bytes
const LOGO_PNG: &[u8] = b"\x89PNG\r\n\x1a\nPNG binary data...";

/// A `*.txt` file served as a text resource
#[derive(Debug, Clone)]
struct Document {
    uri: String,
    name: String,
    path: PathBuf,
}

pub struct ResourceStore {
    started_at: DateTime<Utc>,
    documents: Vec<Document>,
}

impl ResourceStore {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            documents: Vec::new(),
        }
    }

    /// Also serve every `*.txt` file directly inside `dir`
    pub fn with_documents(mut self, dir: &Path) -> Result<Self> {
        let dir = dir
            .canonicalize()
            .with_context(|| format!("Documents directory does not exist: {}", dir.display()))?;

        let mut documents = Vec::new();
        for entry in std::fs::read_dir(&dir).with_context(|| format!("Failed to read {}", dir.display()))? {
            let path = entry?.path();
            if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some("txt") {
                continue;
            }
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            documents.push(Document {
                uri: format!("file://{}", path.display()),
                name,
                path,
            });
        }
        documents.sort_by(|a, b| a.uri.cmp(&b.uri));

        info!("Serving {} documents from {}", documents.len(), dir.display());
        self.documents = documents;
        Ok(self)
    }

    fn system_log(&self) -> String {
        format!("[INFO] System started at {}", self.started_at.to_rfc3339())
    }
}

impl Default for ResourceStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ResourceProvider for ResourceStore {
    fn list_resources(&self) -> Vec<Resource> {
        let mut resources = vec![
            Resource {
                uri: SYSTEM_LOG_URI.to_string(),
                name: "System Logs".to_string(),
                description: Some("System log file containing application events".to_string()),
                mime_type: Some("text/plain".to_string()),
            },
            Resource {
                uri: LOGO_URI.to_string(),
                name: "Company Logo".to_string(),
                description: Some("Company logo image in PNG format".to_string()),
                mime_type: Some("image/png".to_string()),
            },
        ];
        resources.extend(self.documents.iter().map(|doc| Resource {
            uri: doc.uri.clone(),
            name: doc.name.clone(),
            description: Some(format!("Text document {}", doc.name)),
            mime_type: Some("text/plain".to_string()),
        }));
        resources
    }

    fn list_templates(&self) -> Vec<ResourceTemplate> {
        vec![
            ResourceTemplate {
                uri_template: "file:///logs/{log_name}.log".to_string(),
                name: "Log File Template".to_string(),
                description: Some("Template for accessing log files".to_string()),
                mime_type: Some("text/plain".to_string()),
            },
            ResourceTemplate {
                uri_template: "file:///images/{image_name}.{format}".to_string(),
                name: "Image File Template".to_string(),
                description: Some("Template for accessing image files".to_string()),
                mime_type: Some("image/*".to_string()),
            },
        ]
    }

    async fn read(&self, uri: &str) -> Result<Vec<ResourceContents>, ProviderError> {
        debug!("Reading resource {}", uri);
        match uri {
            SYSTEM_LOG_URI => Ok(vec![ResourceContents::text(uri, "text/plain", self.system_log())]),
            LOGO_URI => Ok(vec![ResourceContents::blob(uri, "image/png", STANDARD.encode(LOGO_PNG))]),
            _ => {
                let doc = self
                    .documents
                    .iter()
                    .find(|d| d.uri == uri)
                    .ok_or_else(|| ProviderError::NotFound(uri.to_string()))?;
                let text = tokio::fs::read_to_string(&doc.path)
                    .await
                    .with_context(|| format!("Failed to read {}", doc.path.display()))?;
                Ok(vec![ResourceContents::text(uri, "text/plain", text)])
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_builtin_resources() {
        let store = ResourceStore::new();
        let uris: Vec<String> = store.list_resources().into_iter().map(|r| r.uri).collect();
        assert_eq!(uris, vec![SYSTEM_LOG_URI, LOGO_URI]);

        let log = store.read(SYSTEM_LOG_URI).await.unwrap();
        assert!(log[0].text.as_deref().unwrap().starts_with("[INFO] System started at "));

        let logo = store.read(LOGO_URI).await.unwrap();
        let bytes = STANDARD.decode(logo[0].blob.as_deref().unwrap()).unwrap();
        assert_eq!(bytes, LOGO_PNG);
        assert_eq!(logo[0].mime_type.as_deref(), Some("image/png"));
    }

    #[tokio::test]
    async fn test_unknown_resource_not_found() {
        let err = ResourceStore::new().read("file:///logs/other.log").await.unwrap_err();
        assert!(matches!(err, ProviderError::NotFound(_)));
    }

    #[test]
    fn test_templates() {
        let templates = ResourceStore::new().list_templates();
        assert_eq!(templates.len(), 2);
        assert_eq!(templates[1].uri_template, "file:///images/{image_name}.{format}");
    }

    #[tokio::test]
    async fn test_documents_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("sales.txt"), "Q1: 120 units").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "remember the milk").unwrap();
        std::fs::write(dir.path().join("image.png"), b"not text").unwrap();
        std::fs::create_dir(dir.path().join("nested.txt")).unwrap();

        let store = ResourceStore::new().with_documents(dir.path()).unwrap();
        let resources = store.list_resources();
        assert_eq!(resources.len(), 4);
        assert_eq!(resources[2].name, "notes.txt");
        assert_eq!(resources[3].name, "sales.txt");
        assert!(store.contains(&resources[3].uri));

        let contents = store.read(&resources[3].uri).await.unwrap();
        assert_eq!(contents[0].text.as_deref(), Some("Q1: 120 units"));
    }

    #[test]
    fn test_missing_documents_directory() {
        let result = ResourceStore::new().with_documents(Path::new("/nonexistent/docs"));
        assert!(result.is_err());
    }
}
