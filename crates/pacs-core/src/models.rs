//! 核心数据模型定义

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// 实体引用，持久化实体的逻辑标识
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityRef(Uuid);

impl EntityRef {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for EntityRef {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for EntityRef {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 性别枚举
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sex {
    Male,
    Female,
    Other,
}

/// 患者档案
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    pub id: EntityRef,
    pub mrn: String,                           // 病历号
    pub healthcard: Option<String>,            // 医保卡号
    pub family_name: String,
    pub given_name: String,
    pub sex: Option<Sex>,
    pub birth_date: Option<NaiveDate>,
}

impl Patient {
    pub fn new(mrn: &str, family_name: &str, given_name: &str) -> Self {
        Self {
            id: EntityRef::new(),
            mrn: mrn.to_string(),
            healthcard: None,
            family_name: family_name.to_string(),
            given_name: given_name.to_string(),
            sex: None,
            birth_date: None,
        }
    }

    /// 显示用姓名，格式为 "姓, 名"
    pub fn display_name(&self) -> String {
        format!("{}, {}", self.family_name, self.given_name)
    }
}

/// 检查申请单
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: EntityRef,
    pub patient: EntityRef,
    pub accession_number: String,              // 检查号
    pub ordering_practitioner: Option<String>, // 申请医生
    pub diagnostic_service: Option<String>,    // 诊断服务
}

impl Order {
    pub fn new(patient: EntityRef, accession_number: &str) -> Self {
        Self {
            id: EntityRef::new(),
            patient,
            accession_number: accession_number.to_string(),
            ordering_practitioner: None,
            diagnostic_service: None,
        }
    }
}

/// 检查项目
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Procedure {
    pub id: EntityRef,
    pub order: EntityRef,
    pub procedure_type: String,
    pub scheduled_start_time: Option<DateTime<Utc>>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub downtime_recovery_mode: bool, // 停机恢复模式录入
}

impl Procedure {
    pub fn new(order: EntityRef, procedure_type: &str) -> Self {
        Self {
            id: EntityRef::new(),
            order,
            procedure_type: procedure_type.to_string(),
            scheduled_start_time: None,
            start_time: None,
            end_time: None,
            downtime_recovery_mode: false,
        }
    }
}

/// 工作人员
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Staff {
    pub staff_id: String,
    pub family_name: String,
    pub given_name: String,
}

/// 检查步骤类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProcedureStepKind {
    Registration,   // 登记
    Modality,       // 设备检查
    Protocol,       // 扫描方案
    Interpretation, // 阅片
    Verification,   // 审核
    Transcription,  // 转录
}

/// 检查步骤状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActivityStatus {
    Scheduled,   // 已预约
    InProgress,  // 进行中
    Suspended,   // 暂停
    Completed,   // 已完成
    Discontinued, // 已中止
}

impl ActivityStatus {
    /// 是否为活跃状态
    pub fn is_active(&self) -> bool {
        matches!(self, ActivityStatus::Scheduled | ActivityStatus::InProgress)
    }
}

/// 检查步骤
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcedureStep {
    pub id: EntityRef,
    pub procedure: EntityRef,
    pub kind: ProcedureStepKind,
    pub state: ActivityStatus,
    pub scheduled_performer: Option<Staff>,
    pub performer: Option<Staff>,
}

impl ProcedureStep {
    pub fn new(procedure: EntityRef, kind: ProcedureStepKind) -> Self {
        Self {
            id: EntityRef::new(),
            procedure,
            kind,
            state: ActivityStatus::Scheduled,
            scheduled_performer: None,
            performer: None,
        }
    }
}

/// 工作列表项粒度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorklistItemLevel {
    ProcedureStep, // 完整工作列表项
    Procedure,     // 退化检查项目（无活跃步骤）
    Patient,       // 退化患者项（无申请单/检查项目）
}

/// 工作列表项
///
/// 检索结果行。退化项的下层字段为空。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorklistItem {
    pub level: WorklistItemLevel,
    pub patient_ref: Option<EntityRef>,
    pub order_ref: Option<EntityRef>,
    pub procedure_ref: Option<EntityRef>,
    pub procedure_step_ref: Option<EntityRef>,
    pub mrn: String,
    pub patient_name: String,
    pub accession_number: Option<String>,
    pub procedure_type: Option<String>,
    pub scheduled_start_time: Option<DateTime<Utc>>,
    pub procedure_step_kind: Option<ProcedureStepKind>,
}

impl WorklistItem {
    /// 按检查项目去重时使用的标识
    pub fn procedure_identity(&self) -> Option<EntityRef> {
        self.procedure_ref
    }

    /// 按患者去重时使用的标识
    pub fn patient_identity(&self) -> Option<EntityRef> {
        self.patient_ref
    }

    pub fn for_patient(patient: &Patient) -> Self {
        Self {
            level: WorklistItemLevel::Patient,
            patient_ref: Some(patient.id),
            order_ref: None,
            procedure_ref: None,
            procedure_step_ref: None,
            mrn: patient.mrn.clone(),
            patient_name: patient.display_name(),
            accession_number: None,
            procedure_type: None,
            scheduled_start_time: None,
            procedure_step_kind: None,
        }
    }

    pub fn for_procedure(patient: &Patient, order: &Order, procedure: &Procedure) -> Self {
        Self {
            level: WorklistItemLevel::Procedure,
            order_ref: Some(order.id),
            procedure_ref: Some(procedure.id),
            accession_number: Some(order.accession_number.clone()),
            procedure_type: Some(procedure.procedure_type.clone()),
            scheduled_start_time: procedure.scheduled_start_time,
            ..Self::for_patient(patient)
        }
    }

    pub fn for_procedure_step(
        patient: &Patient,
        order: &Order,
        procedure: &Procedure,
        step: &ProcedureStep,
    ) -> Self {
        Self {
            level: WorklistItemLevel::ProcedureStep,
            procedure_step_ref: Some(step.id),
            procedure_step_kind: Some(step.kind),
            ..Self::for_procedure(patient, order, procedure)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_degenerate_items_leave_lower_levels_empty() {
        let patient = Patient::new("MRN001", "Wang", "Li");
        let order = Order::new(patient.id, "ACC001");
        let procedure = Procedure::new(order.id, "CT Chest");

        let patient_item = WorklistItem::for_patient(&patient);
        assert_eq!(patient_item.level, WorklistItemLevel::Patient);
        assert_eq!(patient_item.patient_identity(), Some(patient.id));
        assert!(patient_item.procedure_identity().is_none());

        let procedure_item = WorklistItem::for_procedure(&patient, &order, &procedure);
        assert_eq!(procedure_item.procedure_identity(), Some(procedure.id));
        assert!(procedure_item.procedure_step_ref.is_none());
        assert_eq!(procedure_item.accession_number.as_deref(), Some("ACC001"));
    }

    #[test]
    fn test_full_item_carries_step() {
        let patient = Patient::new("MRN002", "Zhao", "Min");
        let order = Order::new(patient.id, "ACC002");
        let procedure = Procedure::new(order.id, "MR Brain");
        let step = ProcedureStep::new(procedure.id, ProcedureStepKind::Modality);

        let item = WorklistItem::for_procedure_step(&patient, &order, &procedure, &step);
        assert_eq!(item.level, WorklistItemLevel::ProcedureStep);
        assert_eq!(item.procedure_step_ref, Some(step.id));
        assert_eq!(item.patient_name, "Zhao, Min");
    }
}
