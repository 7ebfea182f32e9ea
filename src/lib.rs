//! Asterisk Manager Interface (AMI) client for Rust
//!
//! This crate provides an async client for the Asterisk Manager Interface:
//! it connects over TCP, logs in with a username and secret, and delivers
//! the server's packets to registered handlers until the session ends.
//!
//! # Architecture
//!
//! The pipeline runs leaves first:
//! - [`FrameReader`] splits the byte stream on the `\r\n\r\n` packet terminator
//! - [`decode`] turns one raw packet into an ordered [`Packet`] map
//! - [`SessionState`] and [`classify`] track login, failure and Goodbye
//! - [`AmiClient`] owns it all and hands [`Notification`]s to subscribers
//!
//! A background task does the reading. It never calls application code;
//! handlers run on whichever task owns the [`AmiClient`], when that task
//! drives dispatch.
//!
//! # Example
//!
//! ```rust,no_run
//! use asterisk_ami_tokio::{AmiClient, DEFAULT_AMI_PORT};
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut client = AmiClient::new("admin", "secret", "pbx.example.com", DEFAULT_AMI_PORT);
//!
//!     client.on_login_success(|| println!("logged in"));
//!     client.on_login_failed(|| println!("check your username and secret"));
//!     client.on_event(|packet| {
//!         for (key, value) in packet.iter() {
//!             println!("{key}: {value}");
//!         }
//!     });
//!
//!     if !client.connect().await || !client.login_with_stored_credentials().await {
//!         eprintln!("could not reach the manager interface");
//!         return;
//!     }
//!
//!     client.run_until_disconnected().await;
//! }
//! ```
//!
//! ## Custom actions
//!
//! Actions beyond Login/Logoff are sent fire-and-forget; their responses
//! arrive as ordinary events.
//!
//! ```rust,no_run
//! # async fn example(client: &mut asterisk_ami_tokio::AmiClient) -> Result<(), asterisk_ami_tokio::AmiError> {
//! use asterisk_ami_tokio::ActionBuilder;
//!
//! client
//!     .send_action(ActionBuilder::new("Ping").header("ActionID", "1")?)
//!     .await?;
//! # Ok(())
//! # }
//! ```

#[macro_use]
mod macros;

pub mod action;
pub mod connection;
pub mod constants;
pub mod dispatch;
pub mod error;
pub mod framing;
pub mod headers;
pub mod packet;
pub mod session;

pub(crate) mod buffer;

pub use action::{ActionBuilder, AmiAction};
pub use connection::{AmiClient, AmiConnectOptions, DisconnectReason};
pub use constants::DEFAULT_AMI_PORT;
pub use dispatch::{EventCategory, Notification, SubscriptionId};
pub use error::{AmiError, AmiResult};
pub use framing::FrameReader;
pub use headers::{PacketHeader, ParsePacketHeaderError};
pub use packet::{decode, Packet};
pub use session::{classify, Lifecycle, PacketKind, SessionConfig, SessionState};
