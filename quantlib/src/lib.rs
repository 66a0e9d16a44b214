pub mod engine;
pub mod errors;
pub mod logging;
pub mod models;
pub mod tradingview;
pub mod util;
