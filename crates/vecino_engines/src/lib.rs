#![forbid(unsafe_code)]

pub mod benefits;
pub mod credentials;
pub mod directory;
pub mod loyalty;
pub mod points;
