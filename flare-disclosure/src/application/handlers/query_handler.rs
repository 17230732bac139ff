//! # 匿名消息查询处理器

use std::sync::Arc;

use flare_im_core::metrics::DisclosureMetrics;
use tracing::instrument;

use crate::application::handlers::command_handler::record_rejection;
use crate::application::queries::ViewMessageQuery;
use crate::domain::model::MessageView;
use crate::domain::service::AnonymousMessageDomainService;
use crate::error::DisclosureResult;

pub struct DisclosureQueryHandler {
    domain_service: Arc<AnonymousMessageDomainService>,
    metrics: Arc<DisclosureMetrics>,
}

impl DisclosureQueryHandler {
    pub fn new(
        domain_service: Arc<AnonymousMessageDomainService>,
        metrics: Arc<DisclosureMetrics>,
    ) -> Self {
        Self {
            domain_service,
            metrics,
        }
    }

    /// 查看消息，按查看者身份打码
    #[instrument(skip(self, query), fields(message_id = %query.message_id))]
    pub async fn handle_view_message(&self, query: ViewMessageQuery) -> DisclosureResult<MessageView> {
        let result = self
            .domain_service
            .view_message(&query.message_id, &query.viewer_id)
            .await;
        if let Err(err) = &result {
            record_rejection(&self.metrics, err);
        }
        result
    }
}
