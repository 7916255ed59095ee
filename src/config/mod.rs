pub mod cli;
mod impls;
mod resolve;
mod structs;

pub use resolve::resolve_config;
pub use structs::*;
