//! Network layer for talking to remote clusters.
//!
//! This module provides:
//! - A shared, connection-pooled HTTP client for frames sent to peers
//! - Per-peer connectivity tracking fed by the ping pipeline

mod client;
mod connectivity;

pub use client::{endpoint_url, RemoteClusterClient};
pub use connectivity::{ConnectivityState, PeerConnectivity, PeerStatus};
