//! # KVS client for Rust
//!
//! Async client for the Kingsoft Cloud KVS video processing API. Every call
//! names an action (`CreateTask`, `GetTaskList`, ...), is signed with AWS
//! Signature V4 and comes back either as the parsed JSON body or as a typed
//! [`KvsError`].
//!
//! ## Quick start
//!
//! ```no_run
//! use ksyun_kvs::{Client, ClientConfig};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> ksyun_kvs::Result<()> {
//!     let client = Client::new(ClientConfig::new("2017-01-01", "AKLT...", "secret"))?;
//!
//!     // GET actions carry params in the query string.
//!     let task = client
//!         .call("GetTaskByTaskID", Some(json!({ "TaskID": "t-123" })))
//!         .await?;
//!     println!("{task}");
//!
//!     // POST actions carry params as a JSON body.
//!     client
//!         .call("CreateTask", Some(json!({ "Preset": "hls-720p", "SrcInfo": [] })))
//!         .await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Error handling
//!
//! ```no_run
//! use ksyun_kvs::{Client, ErrorKind};
//!
//! # async fn example(client: Client) {
//! match client.call("GetPresetList", None).await {
//!     Ok(body) => println!("{body}"),
//!     Err(e) if e.kind() == ErrorKind::Application => {
//!         eprintln!("service refused ({:?}): {e}", e.status());
//!     }
//!     Err(e) => eprintln!("request failed: {e}"),
//! }
//! # }
//! ```

mod action;
mod client;
mod errors;
mod models;
mod signer;

pub use action::{resolve, Action, ActionDescriptor};
pub use client::{Client, ClientBuilder, ClientConfig};
pub use errors::{
    ErrorKind, KvsError, Result, APPLICATION_FAILURE_STATUS, STATUS_ABORTED,
    TRANSPORT_FAILURE_STATUS,
};
pub use models::{RawResponse, Reply, RequestOptions, SignedRequest};
pub use signer::{sign, sign_at, Credentials, RequestSpec};
