mod config;
mod destroy;
mod prepare;
mod run;
mod shell;
mod status;

pub use config::*;
pub use destroy::*;
pub use prepare::*;
pub use run::*;
pub use shell::*;
pub use status::*;
