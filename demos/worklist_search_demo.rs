//! 工作列表检索演示程序
//!
//! 构造内存中的患者和检查数据，执行一次文本检索：先估算结果数，
//! 在阈值之内再执行完整检索，并以JSON输出结果。

use anyhow::Result;
use chrono::{Duration, Utc};
use clap::Parser;
use pacs_core::{
    ActivityStatus, Order, Patient, Procedure, ProcedureStep, ProcedureStepKind, Staff,
};
use pacs_worklist::{
    SearchStrategyKind, WorklistItemBroker, WorklistItemTextQueryHelper,
    WorklistItemTextQueryRequest, WorklistSearchSettings,
};
use tracing::info;

/// 工作列表检索演示命令行参数
#[derive(Parser, Debug)]
#[command(name = "worklist-search-demo")]
#[command(about = "RIS工作列表检索演示")]
struct Args {
    /// 检索文本，如 "Chen" 或 "Chen, Wei" 或检查号
    #[arg(short, long, default_value = "Chen")]
    query: String,

    /// 可接受的最大命中数，覆盖配置文件
    #[arg(short, long)]
    threshold: Option<usize>,

    /// 检索执行策略 (default | optimized)，覆盖配置文件
    #[arg(short, long)]
    strategy: Option<SearchStrategyKind>,

    /// 配置文件路径
    #[arg(short, long)]
    config: Option<String>,

    /// 日志级别
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(&args.log_level)
        .init();

    let mut settings = WorklistSearchSettings::load(args.config.as_deref())?;
    if let Some(threshold) = args.threshold {
        settings.threshold = threshold;
    }
    if let Some(strategy) = args.strategy {
        settings.strategy = strategy;
    }
    settings.validate()?;

    info!("检索配置:");
    info!("  检索策略: {:?}", settings.strategy);
    info!("  命中阈值: {}", settings.threshold);

    let broker = seed_broker(settings.strategy)?;
    println!("✅ 示例数据准备完成");

    let helper = WorklistItemTextQueryHelper::new(
        &broker,
        vec![ProcedureStepKind::Modality, ProcedureStepKind::Interpretation],
        settings.text_query,
    )
    .with_threshold(settings.threshold)
    .with_min_query_length(settings.min_query_length);

    println!("🔍 检索: {}", args.query);
    let response = helper.query(&WorklistItemTextQueryRequest::text(&args.query))?;

    if response.too_many_matches {
        println!("⚠️  命中数超过阈值 {}，请缩小检索范围", settings.threshold);
        return Ok(());
    }

    println!("📋 共 {} 条结果:", response.matches.len());
    println!("{}", serde_json::to_string_pretty(&response.matches)?);

    Ok(())
}

/// 构造示例数据
fn seed_broker(strategy: SearchStrategyKind) -> pacs_core::Result<WorklistItemBroker> {
    let mut broker = WorklistItemBroker::new().with_strategy(strategy);
    let now = Utc::now();

    let chen = broker.add_patient(Patient::new("MRN10001", "Chen", "Wei"));
    let zhang = broker.add_patient(Patient::new("MRN10002", "Zhang", "Min"));
    // 只有档案，没有申请单
    broker.add_patient(Patient::new("MRN10003", "Cheng", "Hao"));

    let radiographer = Staff {
        staff_id: "RT042".to_string(),
        family_name: "Gao".to_string(),
        given_name: "Jun".to_string(),
    };

    let order = broker.add_order(Order::new(chen, "A20240001"))?;

    let mut ct = Procedure::new(order, "CT Chest");
    ct.scheduled_start_time = Some(now + Duration::hours(2));
    let ct = broker.add_procedure(ct)?;
    let mut ct_step = ProcedureStep::new(ct, ProcedureStepKind::Modality);
    ct_step.scheduled_performer = Some(radiographer.clone());
    broker.add_procedure_step(ct_step)?;

    // 设备检查已完成，不再有活跃步骤
    let mut xray = Procedure::new(order, "XR Chest PA");
    xray.scheduled_start_time = Some(now - Duration::days(1));
    let xray = broker.add_procedure(xray)?;
    let xray_step = broker.add_procedure_step(ProcedureStep::new(xray, ProcedureStepKind::Modality))?;
    broker.update_procedure_step_state(xray_step, ActivityStatus::Completed)?;

    let order = broker.add_order(Order::new(zhang, "A20240002"))?;
    let mr = broker.add_procedure(Procedure::new(order, "MR Knee"))?;
    let mut read = ProcedureStep::new(mr, ProcedureStepKind::Interpretation);
    read.state = ActivityStatus::InProgress;
    broker.add_procedure_step(read)?;

    Ok(broker)
}
