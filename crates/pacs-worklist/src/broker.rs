//! 工作列表项代理
//!
//! 内存中的患者、申请单、检查项目和检查步骤存储，为检索执行策略提供检索上下文。

use crate::criteria::{patient_criteria_only, WorklistItemSearchCriteria};
use crate::search::{SearchResultsEstimate, WorklistItemSearchArgs, WorklistItemSearchContext};
use crate::strategy::SearchStrategyKind;
use pacs_core::{
    ActivityStatus, EntityRef, Order, PacsError, Patient, Procedure, ProcedureStep, Result,
    WorklistItem,
};
use std::collections::HashMap;

/// 工作列表项代理
#[derive(Debug, Default)]
pub struct WorklistItemBroker {
    patients: HashMap<EntityRef, Patient>,
    orders: HashMap<EntityRef, Order>,
    procedures: HashMap<EntityRef, Procedure>,
    procedure_steps: HashMap<EntityRef, ProcedureStep>,
    strategy: SearchStrategyKind,
}

impl WorklistItemBroker {
    /// 创建新的代理，使用优化检索策略
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_strategy(mut self, strategy: SearchStrategyKind) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn strategy(&self) -> SearchStrategyKind {
        self.strategy
    }

    /// 登记患者
    pub fn add_patient(&mut self, patient: Patient) -> EntityRef {
        let id = patient.id;
        self.patients.insert(id, patient);
        tracing::debug!("Registered patient {}", id);
        id
    }

    /// 登记申请单
    pub fn add_order(&mut self, order: Order) -> Result<EntityRef> {
        if !self.patients.contains_key(&order.patient) {
            return Err(PacsError::NotFound(format!("Patient {} not found", order.patient)));
        }
        let id = order.id;
        self.orders.insert(id, order);
        tracing::debug!("Registered order {}", id);
        Ok(id)
    }

    /// 登记检查项目
    pub fn add_procedure(&mut self, procedure: Procedure) -> Result<EntityRef> {
        if !self.orders.contains_key(&procedure.order) {
            return Err(PacsError::NotFound(format!("Order {} not found", procedure.order)));
        }
        let id = procedure.id;
        self.procedures.insert(id, procedure);
        tracing::debug!("Registered procedure {}", id);
        Ok(id)
    }

    /// 登记检查步骤
    pub fn add_procedure_step(&mut self, step: ProcedureStep) -> Result<EntityRef> {
        if !self.procedures.contains_key(&step.procedure) {
            return Err(PacsError::NotFound(format!("Procedure {} not found", step.procedure)));
        }
        let id = step.id;
        self.procedure_steps.insert(id, step);
        tracing::debug!("Registered procedure step {}", id);
        Ok(id)
    }

    /// 更新检查步骤状态
    pub fn update_procedure_step_state(&mut self, step_id: EntityRef, state: ActivityStatus) -> Result<()> {
        if let Some(step) = self.procedure_steps.get_mut(&step_id) {
            let old_state = step.state;
            step.state = state;
            tracing::info!(
                "Updated procedure step {} state from {:?} to {:?}",
                step_id,
                old_state,
                state
            );
            Ok(())
        } else {
            Err(PacsError::NotFound(format!("Procedure step {} not found", step_id)))
        }
    }

    /// 为一次检索创建上下文
    pub fn search_context<'a>(&'a self, args: &'a WorklistItemSearchArgs) -> BrokerSearchContext<'a> {
        BrokerSearchContext { broker: self, args }
    }

    /// 按检索参数执行检索
    pub fn get_search_results(&self, args: &WorklistItemSearchArgs) -> Result<Vec<WorklistItem>> {
        let ctx = self.search_context(args);
        self.strategy.strategy().get_search_results(&ctx)
    }

    /// 估算检索结果数
    pub fn estimate_search_results_count(&self, args: &WorklistItemSearchArgs) -> Result<SearchResultsEstimate> {
        let ctx = self.search_context(args);
        let estimate = self.strategy.strategy().estimate_search_results_count(&ctx)?;
        tracing::info!(
            "Estimated {} results (threshold {}, within: {})",
            estimate.count,
            args.threshold,
            estimate.within_threshold
        );
        Ok(estimate)
    }

    fn order_and_patient(&self, procedure: &Procedure) -> Result<(&Order, &Patient)> {
        let order = self
            .orders
            .get(&procedure.order)
            .ok_or_else(|| PacsError::Internal(format!("Dangling order reference {}", procedure.order)))?;
        let patient = self
            .patients
            .get(&order.patient)
            .ok_or_else(|| PacsError::Internal(format!("Dangling patient reference {}", order.patient)))?;
        Ok((order, patient))
    }

    fn procedure(&self, id: &EntityRef) -> Result<&Procedure> {
        self.procedures
            .get(id)
            .ok_or_else(|| PacsError::Internal(format!("Dangling procedure reference {}", id)))
    }
}

/// 按预约时间、病历号排序，最后按实体引用排序，使结果顺序稳定
fn sort_items(items: &mut [WorklistItem]) {
    items.sort_by(|a, b| {
        a.scheduled_start_time
            .cmp(&b.scheduled_start_time)
            .then_with(|| a.mrn.cmp(&b.mrn))
            .then_with(|| a.accession_number.cmp(&b.accession_number))
            .then_with(|| a.procedure_ref.cmp(&b.procedure_ref))
            .then_with(|| a.procedure_step_ref.cmp(&b.procedure_step_ref))
    });
}

/// 代理上的检索上下文
#[derive(Debug, Clone, Copy)]
pub struct BrokerSearchContext<'a> {
    broker: &'a WorklistItemBroker,
    args: &'a WorklistItemSearchArgs,
}

impl BrokerSearchContext<'_> {
    fn step_kind_requested(&self, step: &ProcedureStep) -> bool {
        self.args.procedure_step_kinds.is_empty() || self.args.procedure_step_kinds.contains(&step.kind)
    }
}

impl WorklistItemSearchContext for BrokerSearchContext<'_> {
    fn search_criteria(&self) -> &[WorklistItemSearchCriteria] {
        &self.args.search_criteria
    }

    fn include_degenerate_procedure_items(&self) -> bool {
        self.args.include_degenerate_procedure_items
    }

    fn include_degenerate_patient_items(&self) -> bool {
        self.args.include_degenerate_patient_items
    }

    fn threshold(&self) -> usize {
        self.args.threshold
    }

    fn find_worklist_items(&self, criteria: &[WorklistItemSearchCriteria]) -> Result<Vec<WorklistItem>> {
        tracing::debug!("Finding worklist items for {} criteria", criteria.len());
        let mut items = Vec::new();
        if criteria.is_empty() {
            return Ok(items);
        }

        for step in self.broker.procedure_steps.values() {
            if !step.state.is_active() || !self.step_kind_requested(step) {
                continue;
            }
            let procedure = self.broker.procedure(&step.procedure)?;
            let (order, patient) = self.broker.order_and_patient(procedure)?;

            if criteria
                .iter()
                .any(|c| c.matches_procedure_step(patient, order, procedure, step))
            {
                items.push(WorklistItem::for_procedure_step(patient, order, procedure, step));
            }
        }

        sort_items(&mut items);
        Ok(items)
    }

    fn count_worklist_items(&self, criteria: &[WorklistItemSearchCriteria]) -> Result<usize> {
        Ok(self.find_worklist_items(criteria)?.len())
    }

    fn find_procedures(&self, criteria: &[WorklistItemSearchCriteria]) -> Result<Vec<WorklistItem>> {
        tracing::debug!("Finding procedures for {} criteria", criteria.len());
        let mut items = Vec::new();
        if criteria.is_empty() {
            return Ok(items);
        }

        for procedure in self.broker.procedures.values() {
            let (order, patient) = self.broker.order_and_patient(procedure)?;
            if criteria.iter().any(|c| c.matches_procedure(patient, order, procedure)) {
                items.push(WorklistItem::for_procedure(patient, order, procedure));
            }
        }

        sort_items(&mut items);
        Ok(items)
    }

    fn count_procedures(&self, criteria: &[WorklistItemSearchCriteria]) -> Result<usize> {
        Ok(self.find_procedures(criteria)?.len())
    }

    fn find_patients(&self, criteria: &[WorklistItemSearchCriteria]) -> Result<Vec<WorklistItem>> {
        let criteria = patient_criteria_only(criteria);
        tracing::debug!("Finding patients for {} patient criteria", criteria.len());
        if criteria.is_empty() {
            return Ok(Vec::new());
        }

        let mut items: Vec<WorklistItem> = self
            .broker
            .patients
            .values()
            .filter(|patient| criteria.iter().any(|c| c.matches_patient(patient)))
            .map(WorklistItem::for_patient)
            .collect();

        sort_items(&mut items);
        Ok(items)
    }

    fn count_patients(&self, criteria: &[WorklistItemSearchCriteria]) -> Result<usize> {
        Ok(self.find_patients(criteria)?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::criteria::StringCondition;
    use pacs_core::{ProcedureStepKind, WorklistItemLevel};
    use std::collections::HashSet;

    struct Fixture {
        broker: WorklistItemBroker,
        chen: EntityRef,
        lin: EntityRef,
        chen_ct: EntityRef,
        chen_xray: EntityRef,
    }

    /// 陈：一个有活跃步骤的CT、一个步骤已完成的X光；林：无申请单
    fn fixture() -> Fixture {
        let mut broker = WorklistItemBroker::new();

        let chen = broker.add_patient(Patient::new("MRN100", "Chen", "Wei"));
        let lin = broker.add_patient(Patient::new("MRN200", "Lin", "Fang"));

        let order = broker.add_order(Order::new(chen, "ACC100")).unwrap();
        let chen_ct = broker.add_procedure(Procedure::new(order, "CT Chest")).unwrap();
        let chen_xray = broker.add_procedure(Procedure::new(order, "XR Hand")).unwrap();

        broker
            .add_procedure_step(ProcedureStep::new(chen_ct, ProcedureStepKind::Modality))
            .unwrap();
        let done = broker
            .add_procedure_step(ProcedureStep::new(chen_xray, ProcedureStepKind::Modality))
            .unwrap();
        broker
            .update_procedure_step_state(done, ActivityStatus::Completed)
            .unwrap();

        Fixture {
            broker,
            chen,
            lin,
            chen_ct,
            chen_xray,
        }
    }

    fn family_name(name: &str) -> WorklistItemSearchCriteria {
        let mut c = WorklistItemSearchCriteria::default();
        c.patient_profile.family_name = Some(StringCondition::StartsWith(name.to_string()));
        c
    }

    fn accession(number: &str) -> WorklistItemSearchCriteria {
        let mut c = WorklistItemSearchCriteria::default();
        c.order.accession_number = Some(StringCondition::Equal(number.to_string()));
        c
    }

    fn args(criteria: Vec<WorklistItemSearchCriteria>, procedures: bool, patients: bool) -> WorklistItemSearchArgs {
        WorklistItemSearchArgs::new(vec![ProcedureStepKind::Modality], criteria, patients, procedures, 50)
    }

    #[test]
    fn test_dangling_references_rejected() {
        let mut broker = WorklistItemBroker::new();
        let result = broker.add_order(Order::new(EntityRef::new(), "ACC1"));
        assert!(matches!(result, Err(PacsError::NotFound(_))));

        let result = broker.update_procedure_step_state(EntityRef::new(), ActivityStatus::InProgress);
        assert!(result.is_err());
    }

    #[test]
    fn test_worklist_items_only_for_active_steps() {
        let f = fixture();
        let args = args(vec![family_name("Chen")], false, false);

        let items = f.broker.get_search_results(&args).unwrap();

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].procedure_ref, Some(f.chen_ct));
        assert_eq!(items[0].level, WorklistItemLevel::ProcedureStep);
    }

    #[test]
    fn test_step_kind_filter() {
        let f = fixture();
        let mut args = args(vec![family_name("Chen")], false, false);
        args.procedure_step_kinds = vec![ProcedureStepKind::Interpretation];

        assert!(f.broker.get_search_results(&args).unwrap().is_empty());
    }

    #[test]
    fn test_degenerate_items_fill_gaps() {
        let f = fixture();
        let args = args(vec![family_name("Chen"), family_name("Lin")], true, true);

        let items = f.broker.get_search_results(&args).unwrap();

        // CT完整项、X光退化项、陈的退化患者项不重复、林的退化患者项
        assert_eq!(items.len(), 3);
        let ct = items.iter().find(|i| i.procedure_ref == Some(f.chen_ct)).unwrap();
        assert_eq!(ct.level, WorklistItemLevel::ProcedureStep);
        let xray = items.iter().find(|i| i.procedure_ref == Some(f.chen_xray)).unwrap();
        assert_eq!(xray.level, WorklistItemLevel::Procedure);
        let lin = items.iter().find(|i| i.patient_ref == Some(f.lin)).unwrap();
        assert_eq!(lin.level, WorklistItemLevel::Patient);
        assert!(!items
            .iter()
            .any(|i| i.patient_ref == Some(f.chen) && i.level == WorklistItemLevel::Patient));
    }

    #[test]
    fn test_strategies_agree_on_result_set() {
        let f = fixture();
        let args = args(vec![family_name("Chen"), accession("ACC100"), family_name("Lin")], true, true);

        let identities = |kind: SearchStrategyKind| -> HashSet<(Option<EntityRef>, Option<EntityRef>)> {
            let ctx = f.broker.search_context(&args);
            kind.strategy()
                .get_search_results(&ctx)
                .unwrap()
                .iter()
                .map(|i| (i.patient_ref, i.procedure_ref))
                .collect()
        };

        assert_eq!(
            identities(SearchStrategyKind::Default),
            identities(SearchStrategyKind::Optimized)
        );
    }

    #[test]
    fn test_patient_search_ignores_order_criteria() {
        let f = fixture();
        let ctx_args = args(vec![accession("ACC100")], false, true);
        let ctx = f.broker.search_context(&ctx_args);

        assert!(ctx.find_patients(&[accession("ACC100")]).unwrap().is_empty());
        assert_eq!(ctx.count_patients(&[family_name("L")]).unwrap(), 1);
    }

    #[test]
    fn test_counts_match_finds() {
        let f = fixture();
        let args = args(vec![family_name("Chen")], true, true);
        let ctx = f.broker.search_context(&args);
        let criteria = ctx.search_criteria();

        assert_eq!(ctx.count_worklist_items(criteria).unwrap(), 1);
        assert_eq!(ctx.count_procedures(criteria).unwrap(), 2);
        assert_eq!(ctx.count_patients(criteria).unwrap(), 1);
        assert_eq!(ctx.count_procedures(&[]).unwrap(), 0);
    }

    #[test]
    fn test_estimate_through_broker() {
        let f = fixture();
        let mut args = args(vec![family_name("Chen"), family_name("Lin")], true, true);

        // 患者 2，检查项目 2 => (2 + 2 + 2) / 2 = 3
        let estimate = f.broker.estimate_search_results_count(&args).unwrap();
        assert_eq!(estimate, SearchResultsEstimate { within_threshold: true, count: 3 });

        args.threshold = 1;
        let estimate = f.broker.estimate_search_results_count(&args).unwrap();
        assert!(!estimate.within_threshold);
        assert_eq!(estimate.count, 2);
    }

    #[test]
    fn test_procedure_order_is_stable_on_ties() {
        let f = fixture();
        let args = args(vec![family_name("Chen")], true, false);
        let ctx = f.broker.search_context(&args);

        // 同一申请单、均无预约时间，只能按检查项目引用区分
        let procedures: Vec<_> = ctx
            .find_procedures(ctx.search_criteria())
            .unwrap()
            .iter()
            .map(|i| i.procedure_ref)
            .collect();
        let mut expected = vec![Some(f.chen_ct), Some(f.chen_xray)];
        expected.sort();
        assert_eq!(procedures, expected);
    }

    #[test]
    fn test_optimized_estimate_does_not_double_count() {
        let f = fixture();
        let mut args = args(vec![family_name("Chen"), accession("ACC100")], false, false);
        args.threshold = 1;

        // 两个条件命中同一个CT步骤
        let estimate = f.broker.estimate_search_results_count(&args).unwrap();
        assert_eq!(estimate, SearchResultsEstimate { within_threshold: true, count: 1 });
        assert_eq!(f.broker.get_search_results(&args).unwrap().len(), 1);
    }
}
