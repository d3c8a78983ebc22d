// src/config/mod.rs
pub mod consts;
pub mod options;

pub use options::{
    AppOptions, EnrichOptions, EnrichScope, ExportFormat, ExportOptions, FetchOptions,
    PagePolicy, SessionOptions,
};
