mod clan_routes;

pub use clan_routes::*;
