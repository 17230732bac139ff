//! 匿名消息服务错误类型定义

use thiserror::Error;

/// 匿名消息服务错误类型
#[derive(Debug, Error)]
pub enum DisclosureError {
    /// 参数非法（延迟超出范围、匿名标记与延迟不匹配等），不会落库
    #[error("Validation error: {0}")]
    Validation(String),

    /// 权限不足（非互相关注、非消息参与方）
    #[error("Authorization error: {0}")]
    Authorization(String),

    /// 当前状态不允许该状态迁移
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// 试图修改受保护字段
    #[error("Forbidden field: {0}")]
    ForbiddenField(String),

    /// 消息不存在
    #[error("Message not found: {0}")]
    NotFound(String),

    /// 存储等基础设施错误
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl DisclosureError {
    /// 对外稳定的错误码
    pub fn code(&self) -> &'static str {
        match self {
            DisclosureError::Validation(_) => "VALIDATION_ERROR",
            DisclosureError::Authorization(_) => "AUTHORIZATION_ERROR",
            DisclosureError::InvalidState(_) => "INVALID_STATE_ERROR",
            DisclosureError::ForbiddenField(_) => "FORBIDDEN_FIELD_ERROR",
            DisclosureError::NotFound(_) => "NOT_FOUND",
            DisclosureError::Store(_) => "STORE_ERROR",
        }
    }

    /// 是否为调用方可修正的请求错误（区别于基础设施故障）
    pub fn is_client_error(&self) -> bool {
        !matches!(self, DisclosureError::Store(_))
    }
}

/// 匿名消息服务结果类型
pub type DisclosureResult<T> = Result<T, DisclosureError>;
