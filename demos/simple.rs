//! Connects with a PSK, says hello, posts a JSON record, reads desired state, then observes it
//! for half a minute.
//!
//! ```text
//! COAP_PSK_ID=device-1@project COAP_PSK=secret RUST_LOG=debug cargo run --example simple
//! ```

use std::time::Duration;

use coap_dtls::{Client, ClientConfig};

const TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let endpoint = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "coap.golioth.io:5684".to_string());
    let client = Client::connect(ClientConfig::builder(endpoint).build()).await?;

    // Verify connection.
    let res = client.get("/hello", TIMEOUT).await?;
    println!("{}", String::from_utf8_lossy(&res.body));

    // Send data.
    let res = client
        .post("/.s", "application/json", r#"{"hello": "world"}"#, TIMEOUT)
        .await?;
    println!("{}", res.code);

    // Read desired state.
    let res = client.get("/.u/desired", TIMEOUT).await?;
    println!("{}", String::from_utf8_lossy(&res.body));

    // Watch it change.
    if let Some(mut notifications) = client.take_notifications() {
        tokio::spawn(async move { while notifications.dispatch_next().await {} });
    }
    let status = client
        .observe_and_wait("/.u/desired", Duration::from_secs(30), |n| {
            println!("{} {}", n.code, String::from_utf8_lossy(&n.body));
        })
        .await?;
    println!("observation ended: {:?}", status.cancellation);

    client.close().await?;
    Ok(())
}
