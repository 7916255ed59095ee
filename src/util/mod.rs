mod kernel;
mod mount;
mod mounts;
mod output;
#[cfg(test)]
mod recording_kernel;

pub use kernel::*;
pub use mount::*;
pub use mounts::*;
pub use output::*;
#[cfg(test)]
pub use recording_kernel::*;
