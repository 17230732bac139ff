//! 存储层访问规则
//!
//! 独立于请求校验层：即使上层校验被绕过，也拒绝对受保护字段的写入，
//! 并要求生命周期迁移必须携带对应的条件守卫

use std::collections::HashSet;

use crate::domain::model::{FieldWrite, MessageColumn, MessagePatch, Precondition};
use crate::error::{DisclosureError, DisclosureResult};

/// 通用修改允许写入的字段
pub const EDITABLE_COLUMNS: &[MessageColumn] = &[MessageColumn::Content];

/// 存储访问规则
pub struct StorageAccessRules;

impl StorageAccessRules {
    /// 校验一次生命周期迁移是否携带了匹配的条件守卫
    pub fn authorize(precondition: &Precondition, patch: &MessagePatch) -> DisclosureResult<()> {
        match patch {
            MessagePatch::Open { .. } => {
                if !matches!(precondition, Precondition::Unopened) {
                    return Err(DisclosureError::InvalidState(
                        "open must be guarded by opened_at IS NULL".to_string(),
                    ));
                }
            }
            MessagePatch::CommitReveal { revealed_at } => match precondition {
                Precondition::RevealDue { now } if now == revealed_at => {}
                _ => {
                    return Err(DisclosureError::InvalidState(
                        "reveal must be guarded by sender_revealed_at IS NULL and reveal_at <= now"
                            .to_string(),
                    ));
                }
            },
        }
        Ok(())
    }

    /// 校验一次通用字段修改
    ///
    /// 非可编辑字段返回 ForbiddenField；空修改或同一字段重复写入返回 Validation
    pub fn authorize_edit(writes: &[FieldWrite]) -> DisclosureResult<()> {
        if writes.is_empty() {
            return Err(DisclosureError::Validation(
                "update contains no fields".to_string(),
            ));
        }
        if let Some(write) = writes
            .iter()
            .find(|w| !EDITABLE_COLUMNS.contains(&w.column))
        {
            return Err(DisclosureError::ForbiddenField(write.column.to_string()));
        }

        let mut seen = HashSet::new();
        if let Some(write) = writes.iter().find(|w| !seen.insert(w.column)) {
            return Err(DisclosureError::Validation(format!(
                "field {} is written more than once",
                write.column
            )));
        }
        Ok(())
    }
}
