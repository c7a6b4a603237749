pub(crate) mod config;
pub(crate) mod core;
pub(crate) mod error;
pub(crate) mod retry;
pub(crate) mod service;
