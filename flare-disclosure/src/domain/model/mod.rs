//! 领域模型定义
//!
//! Message 是唯一的聚合根，记录匿名消息从创建、打开到身份揭示的生命周期字段

mod patch;
mod view;

pub use patch::{FieldValue, FieldWrite, MessageColumn, MessagePatch, Precondition};
pub use view::{ANONYMOUS_SENDER, MessageView, ViewerRole};

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DisclosureError;

/// 揭示延迟上限：72 小时
pub const MAX_REVEAL_DELAY_SECONDS: i64 = 72 * 3600;

/// 消息正文最大字符数
pub const MAX_CONTENT_CHARS: usize = 4096;

/// 消息披露状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisclosureStatus {
    /// 未打开
    Unopened,
    /// 已打开（非匿名消息，无需揭示）
    Opened,
    /// 已打开，等待揭示发送方身份
    OpenedPendingReveal,
    /// 发送方身份已揭示
    Revealed,
}

impl DisclosureStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisclosureStatus::Unopened => "unopened",
            DisclosureStatus::Opened => "opened",
            DisclosureStatus::OpenedPendingReveal => "opened_pending_reveal",
            DisclosureStatus::Revealed => "revealed",
        }
    }
}

impl fmt::Display for DisclosureStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DisclosureStatus {
    type Err = DisclosureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unopened" => Ok(DisclosureStatus::Unopened),
            "opened" => Ok(DisclosureStatus::Opened),
            "opened_pending_reveal" => Ok(DisclosureStatus::OpenedPendingReveal),
            "revealed" => Ok(DisclosureStatus::Revealed),
            other => Err(DisclosureError::Validation(format!(
                "unknown disclosure status: {}",
                other
            ))),
        }
    }
}

/// 揭示延迟（值对象）
///
/// 以秒为单位，构造时保证位于 [0, 72h] 区间
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct RevealDelay(i64);

impl RevealDelay {
    /// 零延迟：打开即到期
    pub const ZERO: RevealDelay = RevealDelay(0);
    /// 最大延迟
    pub const MAX: RevealDelay = RevealDelay(MAX_REVEAL_DELAY_SECONDS);

    pub fn from_seconds(seconds: i64) -> Result<Self, DisclosureError> {
        if !(0..=MAX_REVEAL_DELAY_SECONDS).contains(&seconds) {
            return Err(DisclosureError::Validation(format!(
                "reveal_delay must be within [0, {}] seconds, got {}",
                MAX_REVEAL_DELAY_SECONDS, seconds
            )));
        }
        Ok(Self(seconds))
    }

    pub fn seconds(&self) -> i64 {
        self.0
    }

    pub fn as_duration(&self) -> Duration {
        Duration::seconds(self.0)
    }
}

impl TryFrom<i64> for RevealDelay {
    type Error = DisclosureError;

    fn try_from(seconds: i64) -> Result<Self, Self::Error> {
        Self::from_seconds(seconds)
    }
}

impl From<RevealDelay> for i64 {
    fn from(delay: RevealDelay) -> Self {
        delay.0
    }
}

/// 创建消息的输入（未经校验）
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub sender_id: String,
    pub recipient_id: String,
    pub content: String,
    pub is_anonymous: bool,
    /// 揭示延迟（秒），仅匿名消息允许且必须提供
    pub reveal_delay_seconds: Option<i64>,
}

/// 消息聚合根
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub sender_id: String,
    pub recipient_id: String,
    pub content: String,
    /// 创建后不可变
    pub is_anonymous: bool,
    /// 当且仅当匿名时存在
    pub reveal_delay: Option<RevealDelay>,
    pub created_at: DateTime<Utc>,
    /// 接收方打开时间，只设置一次
    pub opened_at: Option<DateTime<Utc>>,
    /// 恒等于 opened_at + reveal_delay
    pub reveal_at: Option<DateTime<Utc>>,
    /// 调度器提交揭示的时间，只设置一次
    pub sender_revealed_at: Option<DateTime<Utc>>,
    pub status: DisclosureStatus,
}

impl Message {
    /// 查看者在消息中的角色，第三方返回 None
    pub fn role_of(&self, viewer_id: &str) -> Option<ViewerRole> {
        if viewer_id == self.sender_id {
            Some(ViewerRole::Sender)
        } else if viewer_id == self.recipient_id {
            Some(ViewerRole::Recipient)
        } else {
            None
        }
    }

    /// 是否已到达揭示时间（未打开或非匿名时为 false）
    pub fn is_reveal_due(&self, now: DateTime<Utc>) -> bool {
        self.status == DisclosureStatus::OpenedPendingReveal
            && self.sender_revealed_at.is_none()
            && self.reveal_at.is_some_and(|reveal_at| now >= reveal_at)
    }

    /// 校验数据模型不变式
    pub fn check_invariants(&self) -> Result<(), DisclosureError> {
        if self.is_anonymous != self.reveal_delay.is_some() {
            return Err(DisclosureError::InvalidState(format!(
                "message {}: is_anonymous and reveal_delay disagree",
                self.id
            )));
        }
        if self.opened_at.is_none()
            && (self.reveal_at.is_some() || self.sender_revealed_at.is_some())
        {
            return Err(DisclosureError::InvalidState(format!(
                "message {}: reveal fields set before opening",
                self.id
            )));
        }
        if let (Some(opened_at), Some(delay)) = (self.opened_at, self.reveal_delay) {
            if self.reveal_at != Some(opened_at + delay.as_duration()) {
                return Err(DisclosureError::InvalidState(format!(
                    "message {}: reveal_at does not match opened_at + reveal_delay",
                    self.id
                )));
            }
        }
        if let Some(revealed_at) = self.sender_revealed_at {
            if self.reveal_at.is_none_or(|reveal_at| revealed_at < reveal_at) {
                return Err(DisclosureError::InvalidState(format!(
                    "message {}: sender revealed before reveal_at",
                    self.id
                )));
            }
        }
        Ok(())
    }
}
