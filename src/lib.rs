//! Szkolnik - 学校目录搜索服务
//!
//! 面向家长的学校目录搜索后端：规范化查询参数、进程内结果缓存、
//! 存储谓词编译、距离与评分富化、派生字段排序，以及每日搜索配额。

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod observability;
pub mod search;
pub mod security;
pub mod storage;
