#![forbid(unsafe_code)]

pub mod annotate;
pub mod keys;
pub mod model;
pub mod time;

pub use keys::RecordKey;
pub use time::Clock;
