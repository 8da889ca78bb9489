//! 存储层模块
//!
//! 定义搜索核心依赖的外部协作接口（学校仓储、收藏、搜索分析），
//! 并提供 SurrealDB 与内存两种实现。内存实现直接对谓词求值，
//! 供测试与无数据库的开发模式使用。

pub mod memory;
pub mod repository;

#[cfg(feature = "surrealdb")]
pub mod surreal_repository;

#[cfg(feature = "surrealdb")]
pub mod surrealdb;
