//! # Telewire Transport
//!
//! Outbound calls to the Bot API.
//!
//! [`RequestPipeline`] executes one remote operation for one credential. A
//! call whose [`Params`] contain an [`Attachment`] is sent as a multipart
//! form with the attachment staged through a per-call temporary directory;
//! anything else goes out as a JSON body. Response bodies come back as an
//! [`ApiResponse`], which is raw text when the body is not JSON.
//!
//! The runtime talks to the network only through the [`ApiTransport`] trait.
//!
//! ```rust,ignore
//! use telewire_transport::{ApiTransport, Attachment, Params, PipelineConfig, RequestPipeline};
//!
//! let pipeline = RequestPipeline::new(PipelineConfig::default())?;
//! let params = Params::new()
//!     .with("chat_id", 42)
//!     .with("photo", Attachment::new(bytes).with_file_name("cat.png"));
//! let response = pipeline.execute(token, "sendPhoto", params, None).await?;
//! ```

pub mod params;
pub mod pipeline;
pub mod response;

pub use params::{Attachment, Param, Params};
pub use pipeline::{
    ApiTransport, DEFAULT_BASE_URL, DEFAULT_TIMEOUT, PipelineConfig, RequestPipeline,
};
pub use response::ApiResponse;
