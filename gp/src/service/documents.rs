//! Document storage endpoints
//!
//! The assistant answers chat questions from uploaded PDFs. This client only
//! lists names, uploads a file and deletes by name.

use std::path::Path;

use reqwest::Method;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tracing::debug;

use super::http::decode_reply;
use super::{HttpPlanService, ServiceError};

#[derive(Debug, Deserialize)]
struct ListReply {
    data: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct MessageReply {
    #[serde(default)]
    message: String,
}

/// Client for the service's document store
#[derive(Debug, Clone)]
pub struct DocumentClient {
    service: HttpPlanService,
}

impl DocumentClient {
    pub fn new(service: HttpPlanService) -> Self {
        Self { service }
    }

    /// Names of stored documents
    pub async fn list(&self) -> Result<Vec<String>, ServiceError> {
        debug!("DocumentClient::list: called");
        let response = self
            .service
            .http()
            .request(Method::GET, self.service.url("/get_documents/"))
            .send()
            .await?;
        let reply: ListReply = decode_reply(response).await?;
        Ok(reply.data)
    }

    /// Upload a PDF; returns the service's confirmation message
    pub async fn upload(&self, path: &Path) -> Result<String, ServiceError> {
        debug!(path = %path.display(), "DocumentClient::upload: called");
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| ServiceError::InvalidResponse(format!("Failed to read {}: {}", path.display(), e)))?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document.pdf".to_string());
        let part = Part::bytes(bytes)
            .file_name(filename)
            .mime_str("application/pdf")?;
        let form = Form::new().part("file", part);
        let response = self
            .service
            .http()
            .post(self.service.url("/upload_pdf/"))
            .multipart(form)
            .send()
            .await?;
        let reply: MessageReply = decode_reply(response).await?;
        Ok(reply.message)
    }

    /// Delete one stored document by name
    pub async fn delete(&self, filename: &str) -> Result<String, ServiceError> {
        debug!(%filename, "DocumentClient::delete: called");
        let response = self
            .service
            .http()
            .delete(self.service.url(&format!("/delete_document/{}", filename)))
            .send()
            .await?;
        let reply: MessageReply = decode_reply(response).await?;
        Ok(reply.message)
    }
}
