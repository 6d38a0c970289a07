//! Data models exchanged with remote clusters.
//!
//! These types are the JSON wire format shared with peers, plus the
//! [`Response`] envelope every peer replies with.

mod message;
mod remote_cluster;
mod response;

pub use message::*;
pub use remote_cluster::*;
pub use response::*;

/// Generate a new unique id (32 lowercase hex characters).
pub fn new_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Current wall-clock time in epoch milliseconds.
pub fn get_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
