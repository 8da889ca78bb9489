//! Handlers 模块
//!
//! HTTP 请求处理程序。

pub mod cache_handler;
pub mod search_handler;

pub use cache_handler::*;
pub use search_handler::*;
