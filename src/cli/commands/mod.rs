mod config;
mod nearest;
mod status;
mod sync;

pub use config::{handle_config, ConfigCommand};
pub use nearest::{handle_match, MatchArgs};
pub use status::handle_status;
pub use sync::{handle_sync, SyncArgs};
