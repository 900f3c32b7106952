//! Alert dispatch - from candidate alert to delivered notification
//!
//! A trigger moves through a fixed sequence:
//!
//! ```text
//! Received -> PreferenceChecked -> Suppressed
//!                               -> Persisted -> FannedOut
//!                                            -> PartiallyFailed
//! ```
//!
//! - **policy** - preference filtering and anomaly alert selection
//! - **dedup** - lookback-window suppression keyed by alert kind + subject
//! - **triggers** - builders turning pacing/goal/anomaly results into triggers
//! - **dispatcher** - the orchestrator
//! - **fanout** - bounded async delivery queue
//! - **render** / **channels** - message rendering and transports
//!
//! ## Usage
//!
//! ```rust,ignore
//! use beacon_core::notify::{AlertDispatcher, FanoutQueue, FanoutConfig};
//!
//! let fanout = FanoutQueue::start(transports, FanoutConfig::default());
//! let dispatcher = AlertDispatcher::new(log, prefs, fanout);
//! let outcome = dispatcher.dispatch(trigger)?;
//! ```

pub mod channels;
pub mod dedup;
pub mod dispatcher;
pub mod fanout;
pub mod policy;
pub mod render;
pub mod triggers;

pub use channels::{ChannelTransport, LogChannel, MockChannel, WebhookChannel};
pub use dedup::{DedupGate, DedupWindows};
pub use dispatcher::{AlertDispatcher, DispatchOutcome, SuppressReason};
pub use fanout::{Delivery, DeliveryStats, DeliveryStatsSnapshot, FanoutConfig, FanoutQueue};
pub use policy::{preference_allows, select_anomalies, AnomalyAlertPolicy};
pub use render::{PlainTextRenderer, RenderedMessage, Renderer};
