#![forbid(unsafe_code)]

pub mod wall_cli;
