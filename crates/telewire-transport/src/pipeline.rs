//! The request pipeline: one remote call, JSON or multipart.
//!
//! Calls without attachments go out as a plain JSON body. As soon as one
//! parameter is an [`Attachment`], the call becomes a multipart form: every
//! attachment is written into a private staging directory and streamed from
//! there as its own part, every other parameter becomes a text field. The
//! staging directory is removed on every exit path, including failed sends
//! and timeouts.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client, ClientBuilder, RequestBuilder};
use serde_json::{Map, Value};
use tempfile::TempDir;
use tokio_util::io::ReaderStream;
use tracing::{debug, trace, warn};

use telewire_core::{TransportError, TransportResult};

use crate::params::{Attachment, Params, form_text};
use crate::response::ApiResponse;

/// Default Bot API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.telegram.org";

/// Default per-call timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Executes remote calls on behalf of a credential.
///
/// This is the seam between the runtime and the network. The runtime only
/// holds an `Arc<dyn ApiTransport>`, so tests can script responses without a
/// server.
#[async_trait]
pub trait ApiTransport: Send + Sync {
    /// Executes `method` with `params`.
    ///
    /// `timeout` of `None` applies the transport's default. A body that is not
    /// JSON is returned as [`ApiResponse::Raw`], never as an error.
    async fn execute(
        &self,
        credential: &str,
        method: &str,
        params: Params,
        timeout: Option<Duration>,
    ) -> TransportResult<ApiResponse>;
}

/// Settings for a [`RequestPipeline`].
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Scheme and host of the Bot API, without the `/bot<token>` part.
    pub base_url: String,
    /// Timeout applied when a call does not specify one.
    pub default_timeout: Duration,
    /// Parent directory for staging directories. `None` uses the system
    /// temporary directory.
    pub staging_dir: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            default_timeout: DEFAULT_TIMEOUT,
            staging_dir: None,
        }
    }
}

/// HTTP implementation of [`ApiTransport`].
#[derive(Debug, Clone)]
pub struct RequestPipeline {
    client: Client,
    config: PipelineConfig,
}

impl RequestPipeline {
    /// Creates a pipeline with its own HTTP client.
    pub fn new(config: PipelineConfig) -> TransportResult<Self> {
        let client = ClientBuilder::new()
            .build()
            .map_err(|e| TransportError::Connection(e.without_url().to_string()))?;
        Ok(Self::with_client(client, config))
    }

    /// Creates a pipeline around an existing client.
    pub fn with_client(client: Client, config: PipelineConfig) -> Self {
        Self { client, config }
    }

    /// The pipeline settings.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// The URL for `method` under `credential`.
    pub fn endpoint(&self, credential: &str, method: &str) -> String {
        format!(
            "{}/bot{}/{}",
            self.config.base_url.trim_end_matches('/'),
            credential,
            method
        )
    }

    fn staging_area(&self) -> TransportResult<TempDir> {
        let builder = {
            let mut b = tempfile::Builder::new();
            b.prefix("telewire-upload-");
            b
        };
        let dir = match &self.config.staging_dir {
            Some(root) => builder.tempdir_in(root)?,
            None => builder.tempdir()?,
        };
        trace!(path = %dir.path().display(), "Created staging directory");
        Ok(dir)
    }

    async fn send(&self, method: &str, request: RequestBuilder) -> TransportResult<ApiResponse> {
        let response = request.send().await.map_err(|e| classify(method, e))?;
        let status = response.status();
        let body = response.text().await.map_err(|e| classify(method, e))?;
        let parsed = ApiResponse::parse(&body);

        if !status.is_success() {
            // The Bot API still answers with an envelope on most errors.
            if matches!(parsed, ApiResponse::Json(Value::Object(_))) {
                debug!(method, status = status.as_u16(), "Non-success status with JSON body");
                return Ok(parsed);
            }
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(parsed)
    }
}

#[async_trait]
impl ApiTransport for RequestPipeline {
    async fn execute(
        &self,
        credential: &str,
        method: &str,
        params: Params,
        timeout: Option<Duration>,
    ) -> TransportResult<ApiResponse> {
        let timeout = timeout.unwrap_or(self.config.default_timeout);
        let url = self.endpoint(credential, method);
        let (values, attachments) = params.partition();

        if attachments.is_empty() {
            debug!(method, fields = values.len(), "Executing JSON call");
            let request = self.client.post(&url).timeout(timeout).json(&values);
            return self.send(method, request).await;
        }

        debug!(
            method,
            fields = values.len(),
            attachments = attachments.len(),
            "Executing multipart call"
        );

        // Dropping `staging` on an early return removes it as well.
        let staging = self.staging_area()?;
        let form = build_form(staging.path(), values, attachments).await?;
        let request = self.client.post(&url).timeout(timeout).multipart(form);
        let outcome = self.send(method, request).await;

        let path = staging.path().to_path_buf();
        if let Err(e) = staging.close() {
            warn!(method, path = %path.display(), error = %e, "Failed to remove staging directory");
        }

        outcome
    }
}

async fn build_form(
    dir: &Path,
    values: Map<String, Value>,
    attachments: Vec<(String, Attachment)>,
) -> TransportResult<Form> {
    let mut form = Form::new();

    for (key, value) in values {
        if let Some(text) = form_text(&value) {
            form = form.text(key, text);
        }
    }

    for (index, (key, attachment)) in attachments.into_iter().enumerate() {
        let path = dir.join(format!("{index}_{}", staged_name(&key)));
        tokio::fs::write(&path, attachment.data()).await?;
        let file = tokio::fs::File::open(&path).await?;
        trace!(field = %key, bytes = attachment.len(), "Staged attachment");

        let file_name = attachment.file_name().unwrap_or(&key).to_string();
        let part = Part::stream_with_length(
            Body::wrap_stream(ReaderStream::new(file)),
            attachment.len() as u64,
        )
        .file_name(file_name);
        form = form.part(key, part);
    }

    Ok(form)
}

/// Field names come from callers; keep only characters safe in a file name.
fn staged_name(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Maps a client error. The URL embeds the credential, so it is stripped.
fn classify(method: &str, err: reqwest::Error) -> TransportError {
    let err = err.without_url();
    if err.is_timeout() {
        TransportError::Timeout {
            method: method.to_string(),
        }
    } else if err.is_builder() {
        TransportError::Encode(err.to_string())
    } else {
        TransportError::Connection(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_layout() {
        let pipeline = RequestPipeline::with_client(
            Client::new(),
            PipelineConfig {
                base_url: "http://localhost:8081/".to_string(),
                ..PipelineConfig::default()
            },
        );
        assert_eq!(
            pipeline.endpoint("123:abc", "getUpdates"),
            "http://localhost:8081/bot123:abc/getUpdates"
        );
    }

    #[test]
    fn test_staged_name_is_sanitized() {
        assert_eq!(staged_name("photo"), "photo");
        assert_eq!(staged_name("../../etc/passwd"), "______etc_passwd");
        assert_eq!(staged_name("thumb-1"), "thumb-1");
    }

    #[test]
    fn test_staging_area_lives_under_configured_root() {
        let root = tempfile::tempdir().unwrap();
        let pipeline = RequestPipeline::with_client(
            Client::new(),
            PipelineConfig {
                staging_dir: Some(root.path().to_path_buf()),
                ..PipelineConfig::default()
            },
        );

        let staging = pipeline.staging_area().unwrap();
        assert!(staging.path().starts_with(root.path()));
        staging.close().unwrap();
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }
}
