pub mod classification;
pub mod instrument;
pub mod matrix;
pub mod row_result;

pub use classification::*;
pub use instrument::*;
pub use matrix::*;
pub use row_result::*;
