//! Command implementations.

pub mod config;
pub mod init;
pub mod search;
pub mod status;
pub mod validate;

pub use self::config::execute_config;
pub use self::init::execute_init;
pub use self::search::{execute_search, save_response};
pub use self::status::execute_status;
pub use self::validate::execute_validate;
