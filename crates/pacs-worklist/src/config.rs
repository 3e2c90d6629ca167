//! 检索配置
//!
//! 从配置文件和环境变量加载工作列表检索参数

use crate::strategy::SearchStrategyKind;
use crate::text_query::TextQueryOptions;
use anyhow::{bail, Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use tracing::info;

/// 工作列表检索配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorklistSearchSettings {
    /// 可接受的最大命中数
    pub threshold: usize,
    /// 检索执行策略
    pub strategy: SearchStrategyKind,
    /// 文本检索最短长度
    pub min_query_length: usize,
    /// 默认文本检索选项
    pub text_query: TextQueryOptions,
}

impl Default for WorklistSearchSettings {
    fn default() -> Self {
        Self {
            threshold: 100,
            strategy: SearchStrategyKind::Optimized,
            min_query_length: 2,
            text_query: TextQueryOptions {
                patient_order: true,
                ..Default::default()
            },
        }
    }
}

impl WorklistSearchSettings {
    /// 加载配置，文件可选，环境变量前缀为 `PACS_WORKLIST`
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(false));
        }
        let settings = builder
            .add_source(Environment::with_prefix("PACS_WORKLIST").separator("__"))
            .build()
            .context("Failed to build worklist search configuration")?;

        let loaded: WorklistSearchSettings = settings
            .try_deserialize()
            .context("Failed to deserialize worklist search configuration")?;
        loaded.validate()?;

        info!(
            "Worklist search configuration loaded (strategy: {:?}, threshold: {})",
            loaded.strategy, loaded.threshold
        );
        Ok(loaded)
    }

    /// 验证配置
    pub fn validate(&self) -> Result<()> {
        if self.threshold == 0 {
            bail!("threshold must be greater than zero");
        }
        if self.min_query_length == 0 {
            bail!("min_query_length must be greater than zero");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let settings = WorklistSearchSettings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.strategy, SearchStrategyKind::Optimized);
        assert!(settings.text_query.patient_order);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "threshold = 25\nstrategy = \"default\"\n\n[text_query]\nprocedure_step_staff = true"
        )
        .unwrap();

        let settings = WorklistSearchSettings::load(file.path().to_str()).unwrap();

        assert_eq!(settings.threshold, 25);
        assert_eq!(settings.strategy, SearchStrategyKind::Default);
        assert_eq!(settings.min_query_length, 2);
        assert!(settings.text_query.procedure_step_staff);
        assert!(!settings.text_query.patient_order);
    }

    #[test]
    fn test_zero_threshold_rejected() {
        let settings = WorklistSearchSettings {
            threshold: 0,
            ..Default::default()
        };
        assert!(settings.validate().is_err());
    }
}
