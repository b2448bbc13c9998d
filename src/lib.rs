#![deny(missing_docs)]
#![warn(missing_debug_implementations)]

//! A CoAP client secured with DTLS, authenticating with a pre-shared key or an ECDSA
//! certificate.
//!
//! The client issues confirmable `GET`, `PUT`, `POST` and `DELETE` requests and registers
//! time-bounded observations whose notifications are delivered in arrival order through a
//! [`NotificationConsumer`].
//!
//! # Examples
//!
//! ```no_run
//! use coap_dtls::{Client, ClientConfig};
//! use std::time::Duration;
//!
//! # async fn some_function() -> Result<(), Box<dyn std::error::Error>> {
//! // PSK identity and secret are read from COAP_PSK_ID and COAP_PSK
//! let config = ClientConfig::builder("coap.example.org:5684").build();
//! let client = Client::connect(config).await?;
//!
//! let hello = client.get("/hello", Duration::from_secs(10)).await?;
//! println!("{}: {}", hello.code, String::from_utf8_lossy(&hello.body));
//!
//! client
//!     .put("/state", "application/json", br#"{"on":true}"#.to_vec(), Duration::from_secs(10))
//!     .await?;
//!
//! // notifications are drained by whichever task owns the consumer
//! let mut notifications = client.take_notifications().expect("first take");
//! let observation = client
//!     .observe_with("/state", Duration::from_secs(60), |n| {
//!         println!("{}: {}", n.code, String::from_utf8_lossy(&n.body));
//!     })
//!     .await?;
//! tokio::spawn(async move { while notifications.dispatch_next().await {} });
//!
//! observation.wait().await;
//! client.close().await?;
//! # Ok(())
//! # }
//! ```

mod client;
mod config;
pub mod constants;
pub mod credentials;
mod error;
pub mod message;
pub mod observe;
mod session;
pub mod transport;

mod observability;
mod prelude;

pub use client::Client;
pub use config::{ClientConfig, ClientConfigBuilder};
pub use error::{CancellationError, ClientError, CloseError, RequestError, SubscriptionError};
pub use message::{EncodingError, MediaType, Method, Notification, Request, Response};
pub use observe::{
    Delivery, Listener, NotificationConsumer, ObservationHandle, ObservationId, ObservationState,
    ObservationStatus,
};
