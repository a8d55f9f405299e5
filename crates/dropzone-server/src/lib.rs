pub mod config;
pub mod handlers;
pub mod logging;
pub mod state;

pub use config::DropzoneConfig;
pub use handlers::router;
pub use logging::{LogFormat, init_logging};
pub use state::AppState;
