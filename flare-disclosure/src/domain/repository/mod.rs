//! 仓储接口定义（Port）

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::model::{FieldWrite, Message, MessagePatch, Precondition};
use crate::error::DisclosureResult;

/// 消息存储接口
///
/// 身份揭示的正确性完全依赖 `conditional_update` 的比较并设置语义：
/// 前置条件检查与字段写入必须在同一个原子操作中完成（单条
/// `UPDATE ... WHERE sender_revealed_at IS NULL`）。
/// 多个调度器实例并发运行时不需要分布式锁或选主；
/// 换成先读后写会重新引入重复揭示的竞争。
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// 插入新消息，返回消息 ID
    async fn insert(&self, message: &Message) -> DisclosureResult<String>;

    /// 按 ID 获取消息
    async fn get_by_id(&self, id: &str) -> DisclosureResult<Option<Message>>;

    /// 生命周期迁移的条件更新（仅用于打开与揭示）
    ///
    /// 写入前必须经过存储访问规则校验，违规时返回错误且不写入；
    /// 前置条件不成立时返回 `Ok(false)`
    async fn conditional_update(
        &self,
        id: &str,
        precondition: &Precondition,
        patch: &MessagePatch,
    ) -> DisclosureResult<bool>;

    /// 通用字段修改
    ///
    /// 只接受可编辑字段，每个字段最多写一次，整体作为一条带
    /// `opened_at IS NULL` 条件的原子更新执行；消息已打开时返回 `Ok(false)`
    async fn update_fields(&self, id: &str, writes: &[FieldWrite]) -> DisclosureResult<bool>;

    /// 查询已到期待揭示的消息（按 reveal_at 升序，最多 limit 条）
    async fn query_due(&self, now: DateTime<Utc>, limit: usize) -> DisclosureResult<Vec<Message>>;
}

/// 好友关系查询接口（外部能力）
#[async_trait]
pub trait ConnectionOracle: Send + Sync {
    /// 两方是否互相关注
    async fn is_mutually_connected(&self, party_a: &str, party_b: &str) -> Result<bool>;
}

/// 服务端权威时钟
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}
