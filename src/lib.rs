//! Mirror of an MPD daemon's queue and playback state for any number of viewers.
//!
//! The [`controller::StateBroadcaster`] samples the daemon every period and
//! publishes queue and state snapshots on a [`controller::BroadcastHub`];
//! [`controller::QueueView`] serves paginated reads and queue mutations;
//! [`model::ExclusionStore`] keeps the persisted cover exclusion list.

pub mod config;
pub mod controller;
pub mod error;
pub mod logging;
pub mod model;

pub use error::{Result, SyncError};
