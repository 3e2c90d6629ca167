//! 工作列表检索条件
//!
//! 检索条件按患者档案、申请单、检查项目、检查步骤四部分组织，
//! 每部分由若干可选条件组成。一组条件数组之间是逻辑"或"的关系。

use chrono::{DateTime, Duration, NaiveDate, Utc};
use pacs_core::{Order, Patient, Procedure, ProcedureStep, Staff};
use serde::{Deserialize, Serialize};

/// 字符串条件（不区分大小写）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StringCondition {
    Equal(String),
    StartsWith(String),
}

impl StringCondition {
    /// 根据是否精确匹配创建条件
    pub fn new(value: &str, exact: bool) -> Self {
        if exact {
            StringCondition::Equal(value.to_string())
        } else {
            StringCondition::StartsWith(value.to_string())
        }
    }

    pub fn matches(&self, value: &str) -> bool {
        let value = value.to_lowercase();
        match self {
            StringCondition::Equal(expected) => value == expected.to_lowercase(),
            StringCondition::StartsWith(prefix) => value.starts_with(&prefix.to_lowercase()),
        }
    }
}

fn string_condition_matches(condition: &Option<StringCondition>, value: Option<&str>) -> bool {
    match (condition, value) {
        (None, _) => true,
        (Some(c), Some(v)) => c.matches(v),
        (Some(_), None) => false,
    }
}

/// 时间范围，起点包含、终点不包含
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub from: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl TimeRange {
    /// 按天精度构造范围，`until` 当天包含在内
    pub fn for_days(from: Option<NaiveDate>, until: Option<NaiveDate>) -> Self {
        Self {
            from: from.and_then(|d| d.and_hms_opt(0, 0, 0)).map(|t| t.and_utc()),
            until: until
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|t| t.and_utc() + Duration::days(1)),
        }
    }

    pub fn contains(&self, time: Option<DateTime<Utc>>) -> bool {
        let Some(time) = time else {
            return false;
        };
        self.from.map_or(true, |from| time >= from) && self.until.map_or(true, |until| time < until)
    }
}

fn time_condition_matches(condition: &Option<TimeRange>, value: Option<DateTime<Utc>>) -> bool {
    condition.as_ref().map_or(true, |range| range.contains(value))
}

/// 患者档案条件
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientProfileCriteria {
    pub mrn: Option<StringCondition>,
    pub healthcard: Option<StringCondition>,
    pub family_name: Option<StringCondition>,
    pub given_name: Option<StringCondition>,
}

impl PatientProfileCriteria {
    pub fn is_empty(&self) -> bool {
        self.mrn.is_none()
            && self.healthcard.is_none()
            && self.family_name.is_none()
            && self.given_name.is_none()
    }

    pub fn matches(&self, patient: &Patient) -> bool {
        string_condition_matches(&self.mrn, Some(&patient.mrn))
            && string_condition_matches(&self.healthcard, patient.healthcard.as_deref())
            && string_condition_matches(&self.family_name, Some(&patient.family_name))
            && string_condition_matches(&self.given_name, Some(&patient.given_name))
    }
}

/// 申请单条件
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCriteria {
    pub accession_number: Option<StringCondition>,
    pub ordering_practitioner: Option<StringCondition>,
    pub diagnostic_service: Option<StringCondition>,
}

impl OrderCriteria {
    pub fn is_empty(&self) -> bool {
        self.accession_number.is_none()
            && self.ordering_practitioner.is_none()
            && self.diagnostic_service.is_none()
    }

    pub fn matches(&self, order: &Order) -> bool {
        string_condition_matches(&self.accession_number, Some(&order.accession_number))
            && string_condition_matches(
                &self.ordering_practitioner,
                order.ordering_practitioner.as_deref(),
            )
            && string_condition_matches(&self.diagnostic_service, order.diagnostic_service.as_deref())
    }
}

/// 检查项目条件
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcedureCriteria {
    pub procedure_type: Option<StringCondition>,
    pub scheduled_start_time: Option<TimeRange>,
    pub start_time: Option<TimeRange>,
    pub end_time: Option<TimeRange>,
    pub downtime_recovery_mode: Option<bool>,
}

impl ProcedureCriteria {
    pub fn is_empty(&self) -> bool {
        self.procedure_type.is_none()
            && self.scheduled_start_time.is_none()
            && self.start_time.is_none()
            && self.end_time.is_none()
            && self.downtime_recovery_mode.is_none()
    }

    pub fn matches(&self, procedure: &Procedure) -> bool {
        string_condition_matches(&self.procedure_type, Some(&procedure.procedure_type))
            && time_condition_matches(&self.scheduled_start_time, procedure.scheduled_start_time)
            && time_condition_matches(&self.start_time, procedure.start_time)
            && time_condition_matches(&self.end_time, procedure.end_time)
            && self
                .downtime_recovery_mode
                .map_or(true, |mode| mode == procedure.downtime_recovery_mode)
    }
}

/// 工作人员条件
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaffCriteria {
    pub staff_id: Option<StringCondition>,
    pub family_name: Option<StringCondition>,
    pub given_name: Option<StringCondition>,
}

impl StaffCriteria {
    pub fn is_empty(&self) -> bool {
        self.staff_id.is_none() && self.family_name.is_none() && self.given_name.is_none()
    }

    pub fn matches(&self, staff: Option<&Staff>) -> bool {
        if self.is_empty() {
            return true;
        }
        let Some(staff) = staff else {
            return false;
        };
        string_condition_matches(&self.staff_id, Some(&staff.staff_id))
            && string_condition_matches(&self.family_name, Some(&staff.family_name))
            && string_condition_matches(&self.given_name, Some(&staff.given_name))
    }
}

/// 检查步骤条件
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcedureStepCriteria {
    pub scheduled_performer: StaffCriteria,
    pub performer: StaffCriteria,
}

impl ProcedureStepCriteria {
    pub fn is_empty(&self) -> bool {
        self.scheduled_performer.is_empty() && self.performer.is_empty()
    }

    pub fn matches(&self, step: &ProcedureStep) -> bool {
        self.scheduled_performer.matches(step.scheduled_performer.as_ref())
            && self.performer.matches(step.performer.as_ref())
    }
}

/// 工作列表检索条件
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorklistItemSearchCriteria {
    pub patient_profile: PatientProfileCriteria,
    pub order: OrderCriteria,
    pub procedure: ProcedureCriteria,
    pub procedure_step: ProcedureStepCriteria,
}

impl WorklistItemSearchCriteria {
    pub fn is_empty(&self) -> bool {
        self.patient_profile.is_empty()
            && self.order.is_empty()
            && self.procedure.is_empty()
            && self.procedure_step.is_empty()
    }

    /// 是否包含患者档案条件
    pub fn has_patient_conditions(&self) -> bool {
        !self.patient_profile.is_empty()
    }

    /// 是否包含申请单或检查项目条件
    pub fn has_non_patient_conditions(&self) -> bool {
        !self.order.is_empty() || !self.procedure.is_empty() || !self.procedure_step.is_empty()
    }

    pub fn has_procedure_step_conditions(&self) -> bool {
        !self.procedure_step.is_empty()
    }

    /// 仅保留患者档案条件的副本
    pub fn clone_patient_criteria_only(&self) -> Self {
        Self {
            patient_profile: self.patient_profile.clone(),
            ..Default::default()
        }
    }

    /// 在患者粒度上匹配，只评估患者档案条件
    pub fn matches_patient(&self, patient: &Patient) -> bool {
        self.has_patient_conditions() && self.patient_profile.matches(patient)
    }

    /// 在检查项目粒度上匹配。带检查步骤条件的条件在此粒度上无法满足。
    pub fn matches_procedure(&self, patient: &Patient, order: &Order, procedure: &Procedure) -> bool {
        !self.is_empty()
            && !self.has_procedure_step_conditions()
            && self.patient_profile.matches(patient)
            && self.order.matches(order)
            && self.procedure.matches(procedure)
    }

    /// 在完整工作列表项粒度上匹配
    pub fn matches_procedure_step(
        &self,
        patient: &Patient,
        order: &Order,
        procedure: &Procedure,
        step: &ProcedureStep,
    ) -> bool {
        !self.is_empty()
            && self.patient_profile.matches(patient)
            && self.order.matches(order)
            && self.procedure.matches(procedure)
            && self.procedure_step.matches(step)
    }
}

/// 生成只含患者档案条件的副本并去掉空条件
pub fn patient_criteria_only(criteria: &[WorklistItemSearchCriteria]) -> Vec<WorklistItemSearchCriteria> {
    criteria
        .iter()
        .map(WorklistItemSearchCriteria::clone_patient_criteria_only)
        .filter(|c| !c.is_empty())
        .collect()
}
