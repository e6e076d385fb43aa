//! Origin lookup service and the client the proxy uses to reach it

mod client;
mod server;

pub use self::client::{Origin, OriginClient};
pub use self::server::OriginServer;

/// Reply for a key with no catalog row. A normal response, not an error.
pub const NOT_FOUND: &str = "Video not found";

/// Reply when the catalog cannot be opened or queried
pub const DATABASE_ERROR: &str = "database error";
