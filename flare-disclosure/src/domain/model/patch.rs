//! 条件更新的前置条件与字段补丁

use std::fmt;

use chrono::{DateTime, Utc};

use super::{DisclosureStatus, Message};

/// 消息表字段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageColumn {
    Id,
    SenderId,
    RecipientId,
    Content,
    IsAnonymous,
    RevealDelay,
    CreatedAt,
    OpenedAt,
    RevealAt,
    SenderRevealedAt,
    Status,
}

impl MessageColumn {
    pub const ALL: [MessageColumn; 11] = [
        MessageColumn::Id,
        MessageColumn::SenderId,
        MessageColumn::RecipientId,
        MessageColumn::Content,
        MessageColumn::IsAnonymous,
        MessageColumn::RevealDelay,
        MessageColumn::CreatedAt,
        MessageColumn::OpenedAt,
        MessageColumn::RevealAt,
        MessageColumn::SenderRevealedAt,
        MessageColumn::Status,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MessageColumn::Id => "id",
            MessageColumn::SenderId => "sender_id",
            MessageColumn::RecipientId => "recipient_id",
            MessageColumn::Content => "content",
            MessageColumn::IsAnonymous => "is_anonymous",
            MessageColumn::RevealDelay => "reveal_delay",
            MessageColumn::CreatedAt => "created_at",
            MessageColumn::OpenedAt => "opened_at",
            MessageColumn::RevealAt => "reveal_at",
            MessageColumn::SenderRevealedAt => "sender_revealed_at",
            MessageColumn::Status => "status",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|column| column.as_str() == name)
    }
}

impl fmt::Display for MessageColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 字段值
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    Bool(bool),
    Seconds(i64),
    Timestamp(DateTime<Utc>),
    Status(DisclosureStatus),
}

/// 单个字段写入
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldWrite {
    pub column: MessageColumn,
    pub value: FieldValue,
}

impl FieldWrite {
    pub fn new(column: MessageColumn, value: FieldValue) -> Self {
        Self { column, value }
    }
}

/// 条件更新的前置条件
///
/// 存储层在同一个原子操作中检查前置条件并写入，检查失败时不写入并返回 false
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precondition {
    /// opened_at IS NULL
    Unopened,
    /// status = opened_pending_reveal AND sender_revealed_at IS NULL AND reveal_at <= now
    RevealDue { now: DateTime<Utc> },
}

impl Precondition {
    /// 前置条件在给定记录上是否成立
    pub fn holds(&self, message: &Message) -> bool {
        match self {
            Precondition::Unopened => message.opened_at.is_none(),
            Precondition::RevealDue { now } => message.is_reveal_due(*now),
        }
    }
}

/// 生命周期迁移补丁
///
/// 生命周期字段只能通过 `Open` 和 `CommitReveal` 两种受认可的迁移写入。
/// 通用字段修改不使用该类型，走 `MessageStore::update_fields`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessagePatch {
    /// 接收方打开消息；reveal_at 与 status 由存储层在同一更新中推导
    Open { opened_at: DateTime<Utc> },
    /// 提交身份揭示
    CommitReveal { revealed_at: DateTime<Utc> },
}

impl MessagePatch {
    /// 补丁实际写入的字段
    pub fn columns(&self) -> Vec<MessageColumn> {
        match self {
            MessagePatch::Open { .. } => vec![
                MessageColumn::OpenedAt,
                MessageColumn::RevealAt,
                MessageColumn::Status,
            ],
            MessagePatch::CommitReveal { .. } => {
                vec![MessageColumn::SenderRevealedAt, MessageColumn::Status]
            }
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            MessagePatch::Open { .. } => "open",
            MessagePatch::CommitReveal { .. } => "commit_reveal",
        }
    }
}
