//! 身份披露状态机（纯逻辑，无 I/O）
//!
//! 匿名消息：Unopened → OpenedPendingReveal → Revealed
//! 非匿名消息：Unopened → Opened

use chrono::{DateTime, Utc};

use crate::domain::model::{
    DisclosureStatus, MAX_CONTENT_CHARS, Message, NewMessage, RevealDelay,
};
use crate::error::{DisclosureError, DisclosureResult};

/// 揭示提交结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevealOutcome {
    /// 本次调用完成了揭示
    Committed,
    /// 已揭示过，静默跳过
    AlreadyRevealed,
}

/// 身份披露状态机
pub struct DisclosureStateMachine;

impl DisclosureStateMachine {
    /// 创建消息
    ///
    /// # 业务规则
    /// - 匿名消息必须提供揭示延迟，且位于 [0, 72h]
    /// - 非匿名消息不允许提供揭示延迟
    /// - 互相关注校验需要 I/O，由领域服务在调用前完成
    pub fn create(
        id: String,
        input: NewMessage,
        now: DateTime<Utc>,
    ) -> DisclosureResult<Message> {
        if input.sender_id.trim().is_empty() || input.recipient_id.trim().is_empty() {
            return Err(DisclosureError::Validation(
                "sender_id and recipient_id are required".to_string(),
            ));
        }
        if input.sender_id == input.recipient_id {
            return Err(DisclosureError::Validation(
                "sender and recipient must be different parties".to_string(),
            ));
        }
        Self::validate_content(&input.content)?;

        let reveal_delay = match (input.is_anonymous, input.reveal_delay_seconds) {
            (true, Some(seconds)) => Some(RevealDelay::from_seconds(seconds)?),
            (true, None) => {
                return Err(DisclosureError::Validation(
                    "reveal_delay is required for anonymous messages".to_string(),
                ));
            }
            (false, Some(_)) => {
                return Err(DisclosureError::Validation(
                    "reveal_delay is only allowed for anonymous messages".to_string(),
                ));
            }
            (false, None) => None,
        };

        Ok(Message {
            id,
            sender_id: input.sender_id,
            recipient_id: input.recipient_id,
            content: input.content,
            is_anonymous: input.is_anonymous,
            reveal_delay,
            created_at: now,
            opened_at: None,
            reveal_at: None,
            sender_revealed_at: None,
            status: DisclosureStatus::Unopened,
        })
    }

    /// 接收方打开消息
    ///
    /// 只能从 Unopened 迁移一次；reveal_at 只在此处由 opened_at 推导
    pub fn open(message: &mut Message, now: DateTime<Utc>) -> DisclosureResult<()> {
        if message.opened_at.is_some() || message.status != DisclosureStatus::Unopened {
            return Err(DisclosureError::InvalidState(format!(
                "message {} has already been opened",
                message.id
            )));
        }

        message.opened_at = Some(now);
        match message.reveal_delay {
            Some(delay) if message.is_anonymous => {
                message.reveal_at = Some(Self::reveal_deadline(now, delay));
                message.status = DisclosureStatus::OpenedPendingReveal;
            }
            _ => {
                message.status = DisclosureStatus::Opened;
            }
        }
        Ok(())
    }

    /// 提交身份揭示
    ///
    /// 已揭示时为静默空操作（调度器幂等性依赖于此）
    pub fn commit_reveal(
        message: &mut Message,
        now: DateTime<Utc>,
    ) -> DisclosureResult<RevealOutcome> {
        if message.sender_revealed_at.is_some() {
            return Ok(RevealOutcome::AlreadyRevealed);
        }
        if message.status != DisclosureStatus::OpenedPendingReveal {
            return Err(DisclosureError::InvalidState(format!(
                "message {} is {}, reveal requires {}",
                message.id,
                message.status,
                DisclosureStatus::OpenedPendingReveal
            )));
        }
        let reveal_at = message.reveal_at.ok_or_else(|| {
            DisclosureError::InvalidState(format!("message {} has no reveal_at", message.id))
        })?;
        if now < reveal_at {
            return Err(DisclosureError::InvalidState(format!(
                "message {} is not due for reveal until {}",
                message.id, reveal_at
            )));
        }

        message.sender_revealed_at = Some(now);
        message.status = DisclosureStatus::Revealed;
        Ok(RevealOutcome::Committed)
    }

    /// 发送方修改正文，只允许在未打开时进行
    pub fn edit_content(message: &mut Message, content: String) -> DisclosureResult<()> {
        if message.opened_at.is_some() {
            return Err(DisclosureError::InvalidState(format!(
                "message {} can no longer be edited after it was opened",
                message.id
            )));
        }
        Self::validate_content(&content)?;
        message.content = content;
        Ok(())
    }

    /// 揭示截止时间
    pub fn reveal_deadline(opened_at: DateTime<Utc>, delay: RevealDelay) -> DateTime<Utc> {
        opened_at + delay.as_duration()
    }

    /// 校验正文
    pub fn validate_content(content: &str) -> DisclosureResult<()> {
        if content.trim().is_empty() {
            return Err(DisclosureError::Validation("content must not be empty".to_string()));
        }
        let chars = content.chars().count();
        if chars > MAX_CONTENT_CHARS {
            return Err(DisclosureError::Validation(format!(
                "content exceeds {} characters ({})",
                MAX_CONTENT_CHARS, chars
            )));
        }
        Ok(())
    }
}
