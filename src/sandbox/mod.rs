mod destroy;
mod exec;
mod layout;
mod prepare;
mod sandbox_struct;
mod state;
mod switch_user;

pub use layout::*;
pub use sandbox_struct::*;
pub use state::*;
