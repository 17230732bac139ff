//! # 匿名消息命令处理器（编排层）
//!
//! 负责处理命令，调用领域服务并记录指标

use std::sync::Arc;

use flare_im_core::metrics::DisclosureMetrics;
use tracing::{instrument, warn};

use crate::application::commands::{
    CreateMessageCommand, OpenMessageCommand, UpdateMessageCommand, UpdateMessageRequest,
};
use crate::domain::model::{MessageView, ViewerRole};
use crate::domain::service::{AccessPolicy, AnonymousMessageDomainService};
use crate::error::{DisclosureError, DisclosureResult};

/// 匿名消息命令处理器（编排层）
pub struct DisclosureCommandHandler {
    domain_service: Arc<AnonymousMessageDomainService>,
    metrics: Arc<DisclosureMetrics>,
}

impl DisclosureCommandHandler {
    pub fn new(
        domain_service: Arc<AnonymousMessageDomainService>,
        metrics: Arc<DisclosureMetrics>,
    ) -> Self {
        Self {
            domain_service,
            metrics,
        }
    }

    /// 处理创建消息命令，返回发送方视图
    #[instrument(skip(self, command), fields(sender_id = %command.sender_id))]
    pub async fn handle_create_message(
        &self,
        command: CreateMessageCommand,
    ) -> DisclosureResult<MessageView> {
        let result = self.domain_service.create_message(command.into()).await;
        let message = self.observe(result)?;

        self.metrics
            .messages_created_total
            .with_label_values(&[anonymous_label(message.is_anonymous)])
            .inc();
        Ok(AccessPolicy::mask(
            &message,
            ViewerRole::Sender,
            message.created_at,
        ))
    }

    /// 处理打开消息命令，返回接收方视图
    #[instrument(skip(self, command), fields(message_id = %command.message_id))]
    pub async fn handle_open_message(
        &self,
        command: OpenMessageCommand,
    ) -> DisclosureResult<MessageView> {
        let result = self
            .domain_service
            .open_message(&command.message_id, &command.viewer_id)
            .await;
        let view = self.observe(result)?;

        self.metrics
            .messages_opened_total
            .with_label_values(&[anonymous_label(view.is_anonymous)])
            .inc();
        Ok(view)
    }

    /// 处理通用修改命令
    ///
    /// 请求字段先经过白名单校验，受保护字段在触达存储之前就被拒绝
    #[instrument(skip(self, command), fields(message_id = %command.message_id))]
    pub async fn handle_update_message(
        &self,
        command: UpdateMessageCommand,
    ) -> DisclosureResult<MessageView> {
        let request = match UpdateMessageRequest::parse(&command.fields) {
            Ok(request) => request,
            Err(err) => return self.observe(Err(err)),
        };

        let result = self
            .domain_service
            .update_message(&command.message_id, &command.viewer_id, request.into_writes())
            .await;
        self.observe(result)
    }

    fn observe<T>(&self, result: DisclosureResult<T>) -> DisclosureResult<T> {
        if let Err(err) = &result {
            record_rejection(&self.metrics, err);
        }
        result
    }
}

pub(crate) fn anonymous_label(is_anonymous: bool) -> &'static str {
    if is_anonymous { "true" } else { "false" }
}

pub(crate) fn record_rejection(metrics: &DisclosureMetrics, err: &DisclosureError) {
    metrics
        .requests_rejected_total
        .with_label_values(&[err.code()])
        .inc();
    if err.is_client_error() {
        warn!(code = err.code(), error = %err, "Request rejected");
    } else {
        tracing::error!(code = err.code(), error = %err, "Request failed");
    }
}
