//! HTTP routes served by crawlgate.

pub mod edge;
pub mod relay;
pub mod shell;

pub(crate) const HTML_CONTENT_TYPE: &str = "text/html; charset=utf-8";
