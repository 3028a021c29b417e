//! External collaborators the editor talks to: the segmentation and
//! generation services, durable image storage, the image record store and
//! the source image fetcher. Each is a trait so sessions can be wired to
//! HTTP/file backed implementations or to in-memory fakes.

pub mod fetch;
pub mod generation;
pub mod records;
pub mod segmentation;
pub mod storage;

use crate::editor::error::{EditError, Operation};
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use fetch::{HttpImageFetcher, ImageFetcher};
pub use generation::{GenerateReply, GenerateRequest, GenerationService, HttpGenerationService};
pub use records::{ImageRecord, JsonRecordStore, NewImageRecord, RecordSource, RecordStore, RecordUpdate};
pub use segmentation::{HttpSegmentationService, SegmentReply, SegmentRequest, SegmentationService};
pub use storage::{AssetStore, LocalAssetStore};

const USER_AGENT: &str = "mask-editor";
const RAW_PREVIEW_CHARS: usize = 100;

/// Requests are never timed out here; a service that never answers keeps
/// its operation pending.
pub(crate) fn build_client() -> anyhow::Result<Client> {
    Ok(Client::builder()
        .user_agent(USER_AGENT)
        .timeout(None::<Duration>)
        .build()?)
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    details: Option<String>,
}

/// POST `body` as JSON and parse the reply. Connection errors and non-2xx
/// statuses are transport failures; a 2xx body that is not the expected
/// JSON is a malformed response.
pub(crate) fn post_json<B, R>(
    client: &Client,
    endpoint: &str,
    body: &B,
    operation: Operation,
) -> Result<R, EditError>
where
    B: Serialize,
    R: DeserializeOwned,
{
    let transport = |detail: String| EditError::TransportFailure { operation, detail };

    let payload = serde_json::to_vec(body).map_err(|err| transport(format!("encode request: {err}")))?;
    let resp = client
        .post(endpoint)
        .header(CONTENT_TYPE, "application/json")
        .body(payload)
        .send()
        .map_err(|err| transport(err.to_string()))?;

    let status = resp.status();
    let text = resp.text().map_err(|err| transport(err.to_string()))?;

    if !status.is_success() {
        let detail = serde_json::from_str::<ErrorBody>(&text)
            .ok()
            .and_then(|body| body.details.or(body.error))
            .unwrap_or_else(|| preview(&text));
        return Err(transport(format!("{status}: {detail}")));
    }

    serde_json::from_str(&text).map_err(|err| EditError::MalformedResponse {
        operation,
        detail: format!("{err}; raw: {}", preview(&text)),
    })
}

fn preview(text: &str) -> String {
    let mut out: String = text.chars().take(RAW_PREVIEW_CHARS).collect();
    if text.chars().count() > RAW_PREVIEW_CHARS {
        out.push_str("...");
    }
    out
}

/// First non-empty of `details`, `error`, falling back to a generic message.
pub(crate) fn failure_message(details: Option<String>, error: Option<String>) -> String {
    details
        .into_iter()
        .chain(error)
        .find(|msg| !msg.trim().is_empty())
        .unwrap_or_else(|| "Unknown error".to_string())
}
