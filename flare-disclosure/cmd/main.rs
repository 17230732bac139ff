use flare_disclosure::service::ApplicationBootstrap;
use flare_im_core::load_config;
use flare_im_core::tracing::init_tracing;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::var("FLARE_CONFIG").ok();
    let app_config = load_config(config_path.as_deref());

    init_tracing("flare-disclosure", Some(app_config.logging()));

    info!("Starting flare-disclosure service");

    ApplicationBootstrap::run(app_config).await
}
