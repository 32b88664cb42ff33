mod bounty_routes;
mod settings_routes;
mod submission_routes;

pub use bounty_routes::*;
pub use settings_routes::*;
pub use submission_routes::*;
