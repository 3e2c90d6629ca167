//! 错误定义模块

use thiserror::Error;

/// PACS系统统一错误类型
#[derive(Error, Debug)]
pub enum PacsError {
    #[error("数据库错误: {0}")]
    Database(String),

    #[error("验证错误: {0}")]
    Validation(String),

    #[error("系统内部错误: {0}")]
    Internal(String),

    #[error("资源未找到: {0}")]
    NotFound(String),
}

/// PACS系统统一结果类型
pub type Result<T> = std::result::Result<T, PacsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = PacsError::NotFound("Patient 42 not found".to_string());
        assert_eq!(err.to_string(), "资源未找到: Patient 42 not found");

        let err = PacsError::Database("connection reset".to_string());
        assert_eq!(err.to_string(), "数据库错误: connection reset");
    }
}
