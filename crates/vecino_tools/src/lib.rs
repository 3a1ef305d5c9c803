#![forbid(unsafe_code)]

pub mod loyalty_cli;
