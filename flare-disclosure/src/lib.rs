//! # Flare Disclosure
//!
//! 匿名消息身份延迟揭示服务：发送方可以匿名给互相关注的好友发消息，
//! 接收方打开消息后开始计时，到达揭示时间后发送方身份对接收方可见。
//!
//! ## 核心职责
//!
//! - **状态机**：Unopened → Opened / OpenedPendingReveal → Revealed
//! - **访问策略**：按查看者角色与服务端时间对发送方身份打码
//! - **字段保护**：请求校验层与存储访问规则两道独立的写入保护
//! - **揭示调度**：周期性、幂等地提交到期的身份揭示
//!
//! ## 架构设计
//!
//! - **domain层**：领域模型、仓储接口、状态机与领域服务
//! - **application层**：命令/查询与处理器
//! - **infrastructure层**：内存与 PostgreSQL 存储、好友关系、时钟
//! - **interface层**：揭示调度器
//! - **service层**：应用启动和依赖注入

pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod interface;
pub mod service;

pub use config::DisclosureConfig;
pub use domain::model::{DisclosureStatus, Message, MessageView, NewMessage, RevealDelay};
pub use error::{DisclosureError, DisclosureResult};
pub use service::ApplicationBootstrap;
