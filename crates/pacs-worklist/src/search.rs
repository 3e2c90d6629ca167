//! 工作列表检索上下文
//!
//! 检索执行策略通过此接口发起各粒度的查询，不关心查询如何执行。

use crate::criteria::WorklistItemSearchCriteria;
use pacs_core::{ProcedureStepKind, Result, WorklistItem};
use serde::{Deserialize, Serialize};

/// 检索上下文
///
/// 每个查询返回匹配任一条件的结果。空条件数组表示不匹配任何结果，
/// 策略在条件子集为空时直接跳过对应查询。
pub trait WorklistItemSearchContext {
    /// 检索条件
    fn search_criteria(&self) -> &[WorklistItemSearchCriteria];

    /// 是否包含退化检查项目
    fn include_degenerate_procedure_items(&self) -> bool;

    /// 是否包含退化患者项
    fn include_degenerate_patient_items(&self) -> bool;

    /// 可接受的最大命中数
    fn threshold(&self) -> usize;

    fn find_worklist_items(&self, criteria: &[WorklistItemSearchCriteria]) -> Result<Vec<WorklistItem>>;

    fn count_worklist_items(&self, criteria: &[WorklistItemSearchCriteria]) -> Result<usize>;

    fn find_procedures(&self, criteria: &[WorklistItemSearchCriteria]) -> Result<Vec<WorklistItem>>;

    fn count_procedures(&self, criteria: &[WorklistItemSearchCriteria]) -> Result<usize>;

    fn find_patients(&self, criteria: &[WorklistItemSearchCriteria]) -> Result<Vec<WorklistItem>>;

    fn count_patients(&self, criteria: &[WorklistItemSearchCriteria]) -> Result<usize>;
}

/// 检索参数
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorklistItemSearchArgs {
    pub procedure_step_kinds: Vec<ProcedureStepKind>,
    pub search_criteria: Vec<WorklistItemSearchCriteria>,
    pub include_degenerate_patient_items: bool,
    pub include_degenerate_procedure_items: bool,
    pub threshold: usize,
}

impl WorklistItemSearchArgs {
    pub fn new(
        procedure_step_kinds: Vec<ProcedureStepKind>,
        search_criteria: Vec<WorklistItemSearchCriteria>,
        include_degenerate_patient_items: bool,
        include_degenerate_procedure_items: bool,
        threshold: usize,
    ) -> Self {
        Self {
            procedure_step_kinds,
            search_criteria,
            include_degenerate_patient_items,
            include_degenerate_procedure_items,
            threshold,
        }
    }
}

/// 结果数估算
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResultsEstimate {
    pub within_threshold: bool,
    pub count: usize,
}

impl SearchResultsEstimate {
    /// 超出阈值，停止进一步估算
    pub(crate) fn exceeded(count: usize) -> Self {
        Self {
            within_threshold: false,
            count,
        }
    }

    pub(crate) fn against(count: usize, threshold: usize) -> Self {
        Self {
            within_threshold: count <= threshold,
            count,
        }
    }
}

/// 合并患者数与检查项目数的估算值
///
/// 取两者上下界 `max(p, q)` 与 `p + q` 的平均值。
pub fn combine_estimate(num_patients: usize, num_procedures: usize) -> usize {
    (num_patients.max(num_procedures) + num_patients + num_procedures) / 2
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_combine_estimate() {
        assert_eq!(combine_estimate(3, 6), 7);
        assert_eq!(combine_estimate(15, 0), 15);
        assert_eq!(combine_estimate(0, 0), 0);
        assert_eq!(combine_estimate(4, 4), 6);
    }

    #[test]
    fn test_estimate_against_threshold() {
        assert!(SearchResultsEstimate::against(10, 10).within_threshold);
        assert!(!SearchResultsEstimate::against(11, 10).within_threshold);
        assert!(!SearchResultsEstimate::exceeded(3).within_threshold);
    }

    proptest! {
        #[test]
        fn prop_estimate_within_bounds(p in 0usize..100_000, q in 0usize..100_000) {
            let estimate = combine_estimate(p, q);
            prop_assert!(p.max(q) <= estimate);
            prop_assert!(estimate <= p + q);
        }
    }
}
