pub mod api;
pub mod config;

pub use config::format_diagnostics;
pub use config::Config;
pub use config::Diagnostic;
pub use config::LogLevel;
