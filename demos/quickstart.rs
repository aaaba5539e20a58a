//! Quick-start examples for the KVS Rust client.
//!
//! Run with:
//!   KVS_API_VERSION=2017-01-01 KVS_ACCESS_KEY_ID=AKLT... KVS_SECRET_ACCESS_KEY=... \
//!     cargo run --example quickstart

use ksyun_kvs::{ClientBuilder, ErrorKind, RequestOptions};
use serde_json::json;

#[tokio::main]
async fn main() -> ksyun_kvs::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Create a client from KVS_* environment variables
    // -----------------------------------------------------------------------
    let client = ClientBuilder::from_env().build()?;

    // -----------------------------------------------------------------------
    // 2. Read actions: params go into the query string
    // -----------------------------------------------------------------------
    let presets = client.call("GetPresetList", None).await?;
    println!("Presets: {presets:#}");

    let tasks = client
        .call("GetTaskList", Some(json!({ "Limit": 10 })))
        .await?;
    println!("Tasks: {tasks:#}");
    println!();

    // -----------------------------------------------------------------------
    // 3. Write actions: params become the JSON body
    // -----------------------------------------------------------------------
    let created = client
        .call(
            "CreateTask",
            Some(json!({
                "Preset": "demo-hls",
                "SrcInfo": [{ "path": "/bucket/input.mp4", "type": "file" }],
                "DstBucket": "bucket",
                "DstDir": "output/",
            })),
        )
        .await;

    match created {
        Ok(body) => println!("Created: {body}"),
        Err(e) if e.kind() == ErrorKind::Application => {
            println!("Service rejected the task ({:?}): {e}", e.status());
        }
        Err(e) => return Err(e),
    }
    println!();

    // -----------------------------------------------------------------------
    // 4. Inspect the raw response, e.g. for request ids
    // -----------------------------------------------------------------------
    let reply = client
        .request(
            "QueryPipeline",
            None,
            Some(RequestOptions::new().raw(true)),
        )
        .await?;
    if let Some(raw) = reply.into_raw() {
        println!("HTTP {} {}", raw.status, raw.status_text);
        println!("{}", raw.body);
    }

    Ok(())
}
