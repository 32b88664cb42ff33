pub mod blob;
pub mod db;
pub mod file_utils;
pub mod stats;
pub mod webhook;

#[cfg(test)]
pub mod mocks;
