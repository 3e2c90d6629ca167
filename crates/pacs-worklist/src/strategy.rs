//! 检索执行策略
//!
//! 决定对检索上下文发起哪些查询、以什么顺序发起，以及如何合并结果。
//! 完整工作列表项为主结果，退化检查项目和退化患者项按需追加，
//! 标识冲突时保留先得到的项。

use crate::criteria::WorklistItemSearchCriteria;
use crate::search::{combine_estimate, SearchResultsEstimate, WorklistItemSearchContext};
use pacs_core::{union_merge, PacsError, Result, WorklistItem};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// 检索执行策略
pub trait SearchExecutionStrategy: Send + Sync {
    /// 执行检索并返回合并后的结果
    fn get_search_results(&self, ctx: &dyn WorklistItemSearchContext) -> Result<Vec<WorklistItem>>;

    /// 估算检索结果数，判断是否在阈值之内
    fn estimate_search_results_count(
        &self,
        ctx: &dyn WorklistItemSearchContext,
    ) -> Result<SearchResultsEstimate>;
}

/// 默认策略：所有条件作为一个整体查询
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultSearchExecutionStrategy;

impl SearchExecutionStrategy for DefaultSearchExecutionStrategy {
    fn get_search_results(&self, ctx: &dyn WorklistItemSearchContext) -> Result<Vec<WorklistItem>> {
        let criteria = ctx.search_criteria();
        let mut results: Vec<WorklistItem> = Vec::new();

        results = union_merge(
            &results,
            &ctx.find_worklist_items(criteria)?,
            WorklistItem::procedure_identity,
        );

        if ctx.include_degenerate_procedure_items() {
            results = union_merge(
                &results,
                &ctx.find_procedures(criteria)?,
                WorklistItem::procedure_identity,
            );
        }

        if ctx.include_degenerate_patient_items() {
            results = union_merge(
                &results,
                &ctx.find_patients(criteria)?,
                WorklistItem::patient_identity,
            );
        }

        tracing::info!("Search returned {} items ({} criteria)", results.len(), criteria.len());
        Ok(results)
    }

    fn estimate_search_results_count(
        &self,
        ctx: &dyn WorklistItemSearchContext,
    ) -> Result<SearchResultsEstimate> {
        let criteria = ctx.search_criteria();
        let threshold = ctx.threshold();

        // 不含退化项时只有一类查询，直接精确计数
        if !ctx.include_degenerate_procedure_items() && !ctx.include_degenerate_patient_items() {
            let count = ctx.count_worklist_items(criteria)?;
            return Ok(SearchResultsEstimate::against(count, threshold));
        }

        let mut num_patients = 0;
        if ctx.include_degenerate_patient_items() {
            num_patients = ctx.count_patients(criteria)?;
            if num_patients > threshold {
                tracing::debug!("Patient count {} exceeds threshold {}", num_patients, threshold);
                return Ok(SearchResultsEstimate::exceeded(num_patients));
            }
        }

        let mut num_procedures = 0;
        if ctx.include_degenerate_procedure_items() {
            num_procedures = ctx.count_procedures(criteria)?;
            if num_procedures > threshold {
                tracing::debug!("Procedure count {} exceeds threshold {}", num_procedures, threshold);
                return Ok(SearchResultsEstimate::exceeded(num_procedures));
            }
        }

        let count = combine_estimate(num_patients, num_procedures);
        tracing::debug!(
            "Estimated {} results from {} patients and {} procedures",
            count,
            num_patients,
            num_procedures
        );
        Ok(SearchResultsEstimate::against(count, threshold))
    }
}

/// 按是否含患者档案条件拆分的条件集合
///
/// 两个子集互不相交，合起来恰好是原条件数组，各自保持原有顺序。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CriteriaPartition {
    pub with_patient_conditions: Vec<WorklistItemSearchCriteria>,
    pub without_patient_conditions: Vec<WorklistItemSearchCriteria>,
}

impl CriteriaPartition {
    pub fn new(criteria: &[WorklistItemSearchCriteria]) -> Self {
        let (with_patient_conditions, without_patient_conditions) = criteria
            .iter()
            .cloned()
            .partition(WorklistItemSearchCriteria::has_patient_conditions);

        Self {
            with_patient_conditions,
            without_patient_conditions,
        }
    }

    /// 非空子集，患者条件子集在前
    pub fn non_empty_subsets(&self) -> impl Iterator<Item = &[WorklistItemSearchCriteria]> {
        [
            self.with_patient_conditions.as_slice(),
            self.without_patient_conditions.as_slice(),
        ]
        .into_iter()
        .filter(|subset| !subset.is_empty())
    }
}

/// 优化策略
///
/// 同时含患者和申请单条件的查询在数据库中往往得到很差的执行计划，
/// 因此逐条按是否含患者档案条件拆分后分别查询。
/// 退化患者项只针对含患者条件的子集查询。
#[derive(Debug, Clone, Copy, Default)]
pub struct OptimizedSearchExecutionStrategy;

impl OptimizedSearchExecutionStrategy {
    /// 各子集计数之和，累计值一旦超过阈值立即返回
    fn count_partitioned<F>(
        partition: &CriteriaPartition,
        threshold: usize,
        mut count: F,
    ) -> Result<std::result::Result<usize, usize>>
    where
        F: FnMut(&[WorklistItemSearchCriteria]) -> Result<usize>,
    {
        let mut total = 0;
        for subset in partition.non_empty_subsets() {
            total += count(subset)?;
            if total > threshold {
                return Ok(Err(total));
            }
        }
        Ok(Ok(total))
    }
}

impl SearchExecutionStrategy for OptimizedSearchExecutionStrategy {
    fn get_search_results(&self, ctx: &dyn WorklistItemSearchContext) -> Result<Vec<WorklistItem>> {
        let partition = CriteriaPartition::new(ctx.search_criteria());
        let mut results: Vec<WorklistItem> = Vec::new();

        for subset in partition.non_empty_subsets() {
            results = union_merge(
                &results,
                &ctx.find_worklist_items(subset)?,
                WorklistItem::procedure_identity,
            );
        }

        if ctx.include_degenerate_procedure_items() {
            for subset in partition.non_empty_subsets() {
                results = union_merge(
                    &results,
                    &ctx.find_procedures(subset)?,
                    WorklistItem::procedure_identity,
                );
            }
        }

        if ctx.include_degenerate_patient_items() && !partition.with_patient_conditions.is_empty() {
            results = union_merge(
                &results,
                &ctx.find_patients(&partition.with_patient_conditions)?,
                WorklistItem::patient_identity,
            );
        }

        tracing::info!(
            "Search returned {} items ({} patient criteria, {} other criteria)",
            results.len(),
            partition.with_patient_conditions.len(),
            partition.without_patient_conditions.len()
        );
        Ok(results)
    }

    fn estimate_search_results_count(
        &self,
        ctx: &dyn WorklistItemSearchContext,
    ) -> Result<SearchResultsEstimate> {
        let threshold = ctx.threshold();

        // 不含退化项时精确计数，不拆分子集以免重复计数
        if !ctx.include_degenerate_procedure_items() && !ctx.include_degenerate_patient_items() {
            let count = ctx.count_worklist_items(ctx.search_criteria())?;
            return Ok(SearchResultsEstimate::against(count, threshold));
        }

        let partition = CriteriaPartition::new(ctx.search_criteria());
        let mut num_patients = 0;
        if ctx.include_degenerate_patient_items() && !partition.with_patient_conditions.is_empty() {
            num_patients = ctx.count_patients(&partition.with_patient_conditions)?;
            if num_patients > threshold {
                tracing::debug!("Patient count {} exceeds threshold {}", num_patients, threshold);
                return Ok(SearchResultsEstimate::exceeded(num_patients));
            }
        }

        let mut num_procedures = 0;
        if ctx.include_degenerate_procedure_items() {
            match Self::count_partitioned(&partition, threshold, |subset| ctx.count_procedures(subset))? {
                Ok(count) => num_procedures = count,
                Err(count) => {
                    tracing::debug!("Procedure count {} exceeds threshold {}", count, threshold);
                    return Ok(SearchResultsEstimate::exceeded(count));
                }
            }
        }

        let count = combine_estimate(num_patients, num_procedures);
        tracing::debug!(
            "Estimated {} results from {} patients and {} procedures",
            count,
            num_patients,
            num_procedures
        );
        Ok(SearchResultsEstimate::against(count, threshold))
    }
}

/// 策略选择
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchStrategyKind {
    Default,
    #[default]
    Optimized,
}

impl SearchStrategyKind {
    pub fn strategy(&self) -> &'static dyn SearchExecutionStrategy {
        match self {
            SearchStrategyKind::Default => &DefaultSearchExecutionStrategy,
            SearchStrategyKind::Optimized => &OptimizedSearchExecutionStrategy,
        }
    }
}

impl FromStr for SearchStrategyKind {
    type Err = PacsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "default" => Ok(SearchStrategyKind::Default),
            "optimized" => Ok(SearchStrategyKind::Optimized),
            other => Err(PacsError::Validation(format!("Unknown search strategy: {}", other))),
        }
    }
}
