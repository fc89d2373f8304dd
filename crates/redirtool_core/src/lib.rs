pub mod config;
pub mod export;
pub mod model;
pub mod path;
pub mod rewrite;
pub mod runtime;
pub mod validate;
