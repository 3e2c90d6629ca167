//! 工作列表文本检索
//!
//! 将用户输入的文本或高级检索字段转换为检索条件，先估算结果数，
//! 结果数在阈值之内才执行完整检索。

use crate::broker::WorklistItemBroker;
use crate::criteria::{StaffCriteria, StringCondition, TimeRange, WorklistItemSearchCriteria};
use crate::search::WorklistItemSearchArgs;
use chrono::NaiveDate;
use pacs_core::{PacsError, ProcedureStepKind, Result, WorklistItem};
use serde::{Deserialize, Serialize};

/// 文本检索选项
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextQueryOptions {
    /// 按患者和申请单检索
    pub patient_order: bool,
    /// 按检查步骤执行人检索
    pub procedure_step_staff: bool,
    /// 只检索停机恢复模式录入的检查项目
    pub downtime_recovery: bool,
    /// 标识符允许前缀匹配
    pub partial_matching_on_identifiers: bool,
}

/// 高级检索字段
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorklistItemSearchFields {
    pub mrn: Option<String>,
    pub healthcard_number: Option<String>,
    pub family_name: Option<String>,
    pub given_name: Option<String>,
    pub accession_number: Option<String>,
    pub procedure_type: Option<String>,
    pub from_date: Option<NaiveDate>,
    pub until_date: Option<NaiveDate>,
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl WorklistItemSearchFields {
    pub fn is_empty(&self) -> bool {
        self.is_patient_fields_empty() && self.is_non_patient_fields_empty()
    }

    pub fn is_patient_fields_empty(&self) -> bool {
        non_blank(&self.mrn).is_none()
            && non_blank(&self.healthcard_number).is_none()
            && non_blank(&self.family_name).is_none()
            && non_blank(&self.given_name).is_none()
    }

    pub fn is_non_patient_fields_empty(&self) -> bool {
        non_blank(&self.accession_number).is_none()
            && non_blank(&self.procedure_type).is_none()
            && self.from_date.is_none()
            && self.until_date.is_none()
    }
}

/// 文本检索请求
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorklistItemTextQueryRequest {
    pub text_query: Option<String>,
    pub use_advanced_search: bool,
    pub search_fields: Option<WorklistItemSearchFields>,
}

impl WorklistItemTextQueryRequest {
    pub fn text(query: &str) -> Self {
        Self {
            text_query: Some(query.to_string()),
            ..Default::default()
        }
    }

    pub fn advanced(fields: WorklistItemSearchFields) -> Self {
        Self {
            text_query: None,
            use_advanced_search: true,
            search_fields: Some(fields),
        }
    }
}

/// 文本检索响应
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TextQueryResponse {
    /// 结果数超过阈值，需要用户缩小检索范围
    pub too_many_matches: bool,
    pub matches: Vec<WorklistItem>,
}

/// 人名
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonName {
    pub family_name: String,
    pub given_name: Option<String>,
}

/// 按空白和逗号切分出的全部词
pub fn parse_terms(query: &str) -> Vec<String> {
    query
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// 含数字的词视为标识符
pub fn parse_identifiers(query: &str) -> Vec<String> {
    parse_terms(query)
        .into_iter()
        .filter(|t| t.chars().any(|c| c.is_ascii_digit()))
        .collect()
}

/// 解析人名，格式为 "姓, 名" 或只有姓
///
/// 含数字的词不参与人名解析。
pub fn parse_person_names(query: &str) -> Vec<PersonName> {
    let text = query
        .split_whitespace()
        .filter(|t| !t.chars().any(|c| c.is_ascii_digit()))
        .collect::<Vec<_>>()
        .join(" ");

    let (family, given) = match text.split_once(',') {
        Some((family, given)) => (family.trim(), Some(given.trim())),
        None => (text.trim(), None),
    };

    if family.is_empty() {
        return Vec::new();
    }

    vec![PersonName {
        family_name: family.to_string(),
        given_name: given.filter(|g| !g.is_empty()).map(str::to_string),
    }]
}

/// 工作列表文本检索帮助类
#[derive(Debug)]
pub struct WorklistItemTextQueryHelper<'a> {
    broker: &'a WorklistItemBroker,
    procedure_step_kinds: Vec<ProcedureStepKind>,
    options: TextQueryOptions,
    threshold: usize,
    min_query_length: usize,
}

impl<'a> WorklistItemTextQueryHelper<'a> {
    pub fn new(
        broker: &'a WorklistItemBroker,
        procedure_step_kinds: Vec<ProcedureStepKind>,
        options: TextQueryOptions,
    ) -> Self {
        Self {
            broker,
            procedure_step_kinds,
            options,
            threshold: 100,
            min_query_length: 2,
        }
    }

    pub fn with_threshold(mut self, threshold: usize) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_min_query_length(mut self, min_query_length: usize) -> Self {
        self.min_query_length = min_query_length;
        self
    }

    /// 执行文本检索
    pub fn query(&self, request: &WorklistItemTextQueryRequest) -> Result<TextQueryResponse> {
        self.validate_request(request)?;

        let criteria = self.build_criteria(request)?;
        if criteria.is_empty() {
            return Ok(TextQueryResponse::default());
        }

        let args = WorklistItemSearchArgs::new(
            self.procedure_step_kinds.clone(),
            criteria,
            self.should_include_degenerate_patient_items(request),
            self.should_include_degenerate_procedure_items(),
            self.threshold,
        );

        let estimate = self.broker.estimate_search_results_count(&args)?;
        if !estimate.within_threshold {
            tracing::info!(
                "Text query too broad: ~{} matches exceeds threshold {}",
                estimate.count,
                self.threshold
            );
            return Ok(TextQueryResponse {
                too_many_matches: true,
                matches: Vec::new(),
            });
        }

        let matches = self.broker.get_search_results(&args)?;
        Ok(TextQueryResponse {
            too_many_matches: false,
            matches,
        })
    }

    fn validate_request(&self, request: &WorklistItemTextQueryRequest) -> Result<()> {
        if request.use_advanced_search {
            let has_fields = request.search_fields.as_ref().is_some_and(|f| !f.is_empty());
            if !has_fields {
                return Err(PacsError::Validation(
                    "Advanced search requires at least one search field".to_string(),
                ));
            }
            return Ok(());
        }

        let length = request
            .text_query
            .as_deref()
            .map(|q| q.trim().chars().count())
            .unwrap_or(0);
        if length < self.min_query_length {
            return Err(PacsError::Validation(format!(
                "Search text must be at least {} characters",
                self.min_query_length
            )));
        }
        Ok(())
    }

    /// 根据请求构造检索条件
    pub fn build_criteria(&self, request: &WorklistItemTextQueryRequest) -> Result<Vec<WorklistItemSearchCriteria>> {
        let mut criteria = Vec::new();

        if self.options.patient_order {
            criteria.extend(self.build_procedure_search_criteria(request));
        }

        if self.options.procedure_step_staff {
            if request.use_advanced_search {
                return Err(PacsError::Validation(
                    "Advanced search is not supported for staff queries".to_string(),
                ));
            }
            criteria.extend(self.build_staff_search_criteria(request));
        }

        for c in criteria.iter_mut() {
            c.procedure.downtime_recovery_mode = Some(self.options.downtime_recovery);
        }

        Ok(criteria)
    }

    fn build_procedure_search_criteria(&self, request: &WorklistItemTextQueryRequest) -> Vec<WorklistItemSearchCriteria> {
        match (&request.search_fields, request.use_advanced_search) {
            (Some(fields), true) => self.build_advanced_procedure_search_criteria(fields),
            _ => self.build_text_procedure_search_criteria(request.text_query.as_deref().unwrap_or("")),
        }
    }

    fn build_advanced_procedure_search_criteria(
        &self,
        fields: &WorklistItemSearchFields,
    ) -> Vec<WorklistItemSearchCriteria> {
        let exact = self.exact_identifiers();
        let mut criteria = WorklistItemSearchCriteria::default();

        criteria.patient_profile.mrn = non_blank(&fields.mrn).map(|v| StringCondition::new(v, exact));
        criteria.patient_profile.healthcard =
            non_blank(&fields.healthcard_number).map(|v| StringCondition::new(v, exact));
        criteria.patient_profile.family_name =
            non_blank(&fields.family_name).map(|v| StringCondition::StartsWith(v.to_string()));
        criteria.patient_profile.given_name =
            non_blank(&fields.given_name).map(|v| StringCondition::StartsWith(v.to_string()));
        criteria.order.accession_number =
            non_blank(&fields.accession_number).map(|v| StringCondition::new(v, exact));
        criteria.procedure.procedure_type =
            non_blank(&fields.procedure_type).map(|v| StringCondition::Equal(v.to_string()));

        if fields.from_date.is_none() && fields.until_date.is_none() {
            return vec![criteria];
        }

        // 日期范围分别作用于预约、开始和结束时间
        let range = TimeRange::for_days(fields.from_date, fields.until_date);

        let mut scheduled = criteria.clone();
        scheduled.procedure.scheduled_start_time = Some(range.clone());

        let mut started = criteria.clone();
        started.procedure.start_time = Some(range.clone());

        let mut ended = criteria;
        ended.procedure.end_time = Some(range);

        vec![scheduled, started, ended]
    }

    fn build_text_procedure_search_criteria(&self, query: &str) -> Vec<WorklistItemSearchCriteria> {
        let exact = self.exact_identifiers();
        let mut criteria = Vec::new();

        for name in parse_person_names(query) {
            let mut c = WorklistItemSearchCriteria::default();
            c.patient_profile.family_name = Some(StringCondition::StartsWith(name.family_name));
            c.patient_profile.given_name = name.given_name.map(StringCondition::StartsWith);
            criteria.push(c);
        }

        let ids = parse_identifiers(query);

        criteria.extend(ids.iter().map(|id| {
            let mut c = WorklistItemSearchCriteria::default();
            c.patient_profile.mrn = Some(StringCondition::new(id, exact));
            c
        }));

        criteria.extend(ids.iter().map(|id| {
            let mut c = WorklistItemSearchCriteria::default();
            c.patient_profile.healthcard = Some(StringCondition::new(id, exact));
            c
        }));

        criteria.extend(ids.iter().map(|id| {
            let mut c = WorklistItemSearchCriteria::default();
            c.order.accession_number = Some(StringCondition::new(id, exact));
            c
        }));

        criteria
    }

    fn build_staff_search_criteria(&self, request: &WorklistItemTextQueryRequest) -> Vec<WorklistItemSearchCriteria> {
        let query = request.text_query.as_deref().unwrap_or("");
        let exact = self.exact_identifiers();
        let names = parse_person_names(query);
        // 工号可能只含字母，因此用全部词而不只是标识符
        let terms = parse_terms(query);

        let by_name = |name: &PersonName| StaffCriteria {
            family_name: Some(StringCondition::StartsWith(name.family_name.clone())),
            given_name: name.given_name.clone().map(StringCondition::StartsWith),
            ..Default::default()
        };
        let by_id = |id: &String| StaffCriteria {
            staff_id: Some(StringCondition::new(id, exact)),
            ..Default::default()
        };

        let mut criteria = Vec::new();
        for name in &names {
            let mut c = WorklistItemSearchCriteria::default();
            c.procedure_step.scheduled_performer = by_name(name);
            criteria.push(c);
        }
        for name in &names {
            let mut c = WorklistItemSearchCriteria::default();
            c.procedure_step.performer = by_name(name);
            criteria.push(c);
        }
        for id in &terms {
            let mut c = WorklistItemSearchCriteria::default();
            c.procedure_step.scheduled_performer = by_id(id);
            criteria.push(c);
        }
        for id in &terms {
            let mut c = WorklistItemSearchCriteria::default();
            c.procedure_step.performer = by_id(id);
            criteria.push(c);
        }
        criteria
    }

    /// 检索患者或申请单时才包含退化检查项目，否则可能变成对全库的开放查询
    fn should_include_degenerate_procedure_items(&self) -> bool {
        self.options.patient_order
    }

    /// 高级检索中有非患者字段时不包含退化患者项
    fn should_include_degenerate_patient_items(&self, request: &WorklistItemTextQueryRequest) -> bool {
        self.should_include_degenerate_procedure_items()
            && (!request.use_advanced_search
                || request
                    .search_fields
                    .as_ref()
                    .map_or(true, WorklistItemSearchFields::is_non_patient_fields_empty))
    }

    fn exact_identifiers(&self) -> bool {
        !self.options.partial_matching_on_identifiers
    }
}
