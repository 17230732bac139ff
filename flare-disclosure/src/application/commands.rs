//! # 匿名消息命令定义
//!
//! 包含通用修改请求的字段白名单校验（请求校验层）

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::domain::model::{FieldValue, FieldWrite, MessageColumn, NewMessage};
use crate::error::{DisclosureError, DisclosureResult};

/// 生命周期字段及不可变字段，任何调用方都不能通过通用修改写入
pub const PROTECTED_FIELDS: &[&str] = &[
    "id",
    "sender_id",
    "recipient_id",
    "is_anonymous",
    "reveal_delay",
    "reveal_delay_seconds",
    "created_at",
    "opened_at",
    "reveal_at",
    "sender_revealed_at",
    "status",
];

/// 创建消息命令
#[derive(Debug, Clone, Deserialize)]
pub struct CreateMessageCommand {
    pub sender_id: String,
    pub recipient_id: String,
    pub content: String,
    #[serde(default)]
    pub is_anonymous: bool,
    #[serde(default)]
    pub reveal_delay_seconds: Option<i64>,
}

impl From<CreateMessageCommand> for NewMessage {
    fn from(command: CreateMessageCommand) -> Self {
        NewMessage {
            sender_id: command.sender_id,
            recipient_id: command.recipient_id,
            content: command.content,
            is_anonymous: command.is_anonymous,
            reveal_delay_seconds: command.reveal_delay_seconds,
        }
    }
}

/// 打开消息命令
#[derive(Debug, Clone, Deserialize)]
pub struct OpenMessageCommand {
    pub message_id: String,
    pub viewer_id: String,
}

/// 通用修改命令，fields 为调用方提交的原始 JSON 对象
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateMessageCommand {
    pub message_id: String,
    pub viewer_id: String,
    pub fields: Map<String, Value>,
}

/// 通过白名单校验后的修改请求
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateMessageRequest {
    pub content: Option<String>,
}

impl UpdateMessageRequest {
    /// 解析并校验字段
    ///
    /// 受保护字段返回 ForbiddenField，其它未知字段返回 Validation
    pub fn parse(fields: &Map<String, Value>) -> DisclosureResult<Self> {
        if let Some(field) = fields
            .keys()
            .find(|key| PROTECTED_FIELDS.contains(&key.as_str()))
        {
            return Err(DisclosureError::ForbiddenField(field.clone()));
        }

        let request: UpdateMessageRequest =
            serde_json::from_value(Value::Object(fields.clone())).map_err(|e| {
                DisclosureError::Validation(format!("invalid update request: {}", e))
            })?;

        if request.content.is_none() {
            return Err(DisclosureError::Validation(
                "update contains no editable fields".to_string(),
            ));
        }
        Ok(request)
    }

    pub fn into_writes(self) -> Vec<FieldWrite> {
        let mut writes = Vec::new();
        if let Some(content) = self.content {
            writes.push(FieldWrite::new(
                MessageColumn::Content,
                FieldValue::Text(content),
            ));
        }
        writes
    }
}
