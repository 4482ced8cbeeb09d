pub mod error;
pub mod mode;
pub mod options;
pub mod validated;

pub use error::ConfigError;
pub use mode::LoadMode;
pub use options::TaskOptions;
pub use validated::{TaskConfig, Timeouts};
