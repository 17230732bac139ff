use serde::Deserialize;

/// 查看消息查询
#[derive(Debug, Clone, Deserialize)]
pub struct ViewMessageQuery {
    pub message_id: String,
    pub viewer_id: String,
}
