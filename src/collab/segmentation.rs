use crate::collab::{build_client, post_json};
use crate::editor::error::{EditError, Operation};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentRequest {
    pub image_url: String,
    pub prompt: String,
}

/// Reply of the segmentation endpoint. `result` is left untyped: its
/// outputs nest embedded images under workflow-specific keys.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SegmentReply {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub details: Option<String>,
}

pub trait SegmentationService: Send + Sync {
    fn segment(&self, request: &SegmentRequest) -> Result<SegmentReply, EditError>;
}

pub struct HttpSegmentationService {
    client: Client,
    endpoint: String,
}

impl HttpSegmentationService {
    pub fn new(endpoint: impl Into<String>) -> anyhow::Result<Self> {
        Ok(Self {
            client: build_client()?,
            endpoint: endpoint.into(),
        })
    }
}

impl SegmentationService for HttpSegmentationService {
    fn segment(&self, request: &SegmentRequest) -> Result<SegmentReply, EditError> {
        tracing::debug!(endpoint = %self.endpoint, prompt = %request.prompt, "segmentation request");
        post_json(&self.client, &self.endpoint, request, Operation::Segmentation)
    }
}
