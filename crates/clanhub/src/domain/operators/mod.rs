mod directory;
mod password;

pub use directory::*;
pub use password::*;
