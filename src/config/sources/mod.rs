//! Configuration sources, in precedence order (lowest first).

pub mod env;
pub mod global_file;
pub mod local_file;
