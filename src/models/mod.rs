//! 核心数据模型模块
//!
//! 定义 Szkolnik 的核心数据结构：SchoolRecord 及其嵌套实体。

pub mod school;

pub use school::*;
