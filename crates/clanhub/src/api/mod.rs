pub mod extractors;
pub mod routes;
pub mod uploads;
