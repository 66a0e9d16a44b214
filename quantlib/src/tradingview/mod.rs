pub mod objects;

pub mod helpers;

pub mod scanner_api;
pub use scanner_api::*;
