mod bingo_routes;

pub use bingo_routes::*;
