mod identity;
mod mount_record;

pub use identity::*;
pub use mount_record::*;
