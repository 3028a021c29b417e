use crate::collab::{build_client, post_json};
use crate::editor::error::{EditError, Operation};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerateRequest {
    pub prompt: String,
    /// Mask as a `data:` URL; `None` when nothing is painted.
    pub mask: Option<String>,
    /// Source image as a `data:` URL.
    pub image: Option<String>,
    pub model: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateReply {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub image_data: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub details: Option<String>,
}

pub trait GenerationService: Send + Sync {
    fn generate(&self, request: &GenerateRequest) -> Result<GenerateReply, EditError>;
}

pub struct HttpGenerationService {
    client: Client,
    endpoint: String,
}

impl HttpGenerationService {
    pub fn new(endpoint: impl Into<String>) -> anyhow::Result<Self> {
        Ok(Self {
            client: build_client()?,
            endpoint: endpoint.into(),
        })
    }
}

impl GenerationService for HttpGenerationService {
    fn generate(&self, request: &GenerateRequest) -> Result<GenerateReply, EditError> {
        tracing::debug!(
            endpoint = %self.endpoint,
            model = %request.model,
            has_mask = request.mask.is_some(),
            "generation request"
        );
        post_json(&self.client, &self.endpoint, request, Operation::Generation)
    }
}
