//! clanhub-core: ranking and bingo rules shared by the clanhub server
//!
//! Everything in this crate is pure logic with no I/O, so it can be exercised directly in tests.

pub mod bingo;
pub mod errors;
pub mod rank;
pub mod types;
pub mod validation;

pub use bingo::*;
pub use errors::*;
pub use rank::*;
pub use types::*;
pub use validation::*;
