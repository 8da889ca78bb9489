//! 搜索核心模块
//!
//! 归一化 → 缓存 → 谓词编译 → 存储查询 → 富化 → 排序 → 响应组装。

pub mod enrich;
pub mod filter;
pub mod query;
pub mod rank;
pub mod service;

pub use enrich::EnrichedResult;
pub use query::{RawSearchParams, SearchQuery, SortBy, SortOrder};
pub use service::{CacheOutcome, SearchOutcome, SearchService, create_search_service};
