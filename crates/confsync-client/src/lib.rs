#![doc = include_str!("../README.md")]

mod cache;
mod client;
mod config;
mod endpoints;
mod error;
mod notifier;
mod puller;
mod push;
mod reconciler;
mod servers;
mod store;
mod supervisor;

pub use client::ConfigClient;
pub use config::ClientConfig;
pub use error::{ClientError, ClientResult};
pub use notifier::{ChangeListener, SubscriptionId};
pub use puller::PullOutcome;
pub use push::{FrameSink, FrameStream, PushConnector, PushRequest, WsConnector};
pub use servers::{SelectionCursor, ServerList};
pub use store::FingerprintAlgorithm;

pub use confsync_types::{ActionKind, ChangeEvent, ConfigItem, ConnectionState};
