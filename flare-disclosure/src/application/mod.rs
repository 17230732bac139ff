//! # 匿名消息应用层
//!
//! 提供创建、打开、查看与修改消息的命令/查询接口

pub mod commands;
pub mod handlers;
pub mod queries;

pub use commands::{
    CreateMessageCommand, OpenMessageCommand, UpdateMessageCommand, UpdateMessageRequest,
};
pub use handlers::{DisclosureCommandHandler, DisclosureQueryHandler};
pub use queries::ViewMessageQuery;
