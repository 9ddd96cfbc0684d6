pub mod bannerbear;
pub mod cli;
pub mod fetch;
pub mod firefly;
pub mod load_config;
pub mod logging;
pub mod storage;

pub use cli::{run, Cli, Commands};
