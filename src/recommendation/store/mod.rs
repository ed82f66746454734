//! Provider implementations

pub mod memory;
pub mod postgres;

pub use memory::InMemorySocialGraph;
pub use postgres::PgSocialStore;

/// Provider names used in errors, logs and outage simulation
pub const FRIENDSHIP_PROVIDER: &str = "friendship";
pub const CONVERSATION_PROVIDER: &str = "conversation";
pub const COMMENT_LIKE_PROVIDER: &str = "comment_like";
pub const PROFILE_PROVIDER: &str = "profile";
