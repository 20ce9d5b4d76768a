pub mod cli;
pub mod config;
pub mod constants;
pub mod drivers;
pub mod pipeline;
