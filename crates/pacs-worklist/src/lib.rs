//! # PACS工作列表检索模块
//!
//! 提供RIS工作列表项检索的执行策略，包括：
//! - 检索条件：按患者档案、申请单、检查项目、检查步骤组织的条件
//! - 检索执行策略：决定查询的拆分、执行顺序和结果合并，并估算结果数
//! - 工作列表项代理：内存中的检索上下文实现
//! - 文本检索：将用户输入转换为检索条件，先估算再检索

pub mod broker;
pub mod config;
pub mod criteria;
pub mod search;
pub mod strategy;
pub mod text_query;

// 重新导出主要类型
pub use broker::{BrokerSearchContext, WorklistItemBroker};
pub use config::WorklistSearchSettings;
pub use criteria::{
    patient_criteria_only, OrderCriteria, PatientProfileCriteria, ProcedureCriteria,
    ProcedureStepCriteria, StaffCriteria, StringCondition, TimeRange, WorklistItemSearchCriteria,
};
pub use search::{
    combine_estimate, SearchResultsEstimate, WorklistItemSearchArgs, WorklistItemSearchContext,
};
pub use strategy::{
    CriteriaPartition, DefaultSearchExecutionStrategy, OptimizedSearchExecutionStrategy,
    SearchExecutionStrategy, SearchStrategyKind,
};
pub use text_query::{
    TextQueryOptions, TextQueryResponse, WorklistItemSearchFields, WorklistItemTextQueryHelper,
    WorklistItemTextQueryRequest,
};
