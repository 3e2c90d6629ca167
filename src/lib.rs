//! # PACS
//!
//! RIS工作列表检索的统一入口，重新导出各子模块。

pub use pacs_core as core;
pub use pacs_worklist as worklist;
