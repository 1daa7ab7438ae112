//! Multi-device session management.
//!
//! Sessions live in per-user shards: each user id maps to one
//! mutex-guarded shard, so all mutations against one user are serially
//! ordered while different users proceed concurrently. Listing a user's
//! sessions reads only that user's shard.

pub mod device;
pub mod record;
pub mod store;

pub use device::{device_fingerprint, device_name_from_user_agent};
pub use record::{NewSession, SessionRecord};
pub use store::SessionStore;
