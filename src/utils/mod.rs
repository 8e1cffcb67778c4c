pub mod executor;
pub mod logging;
pub mod paths;
