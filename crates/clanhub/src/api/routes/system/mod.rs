mod health_check;
mod media;

pub use health_check::*;
pub use media::*;
