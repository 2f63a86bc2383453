use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use parcelbot_bot::{BotService, ServiceOptions};
use parcelbot_core::config::{AppConfig, ConfigError, LoadOptions};
use parcelbot_crm::{CrmGateway, GatewayError};
use parcelbot_session::{RedisBackend, StoreError};

pub struct Application {
    pub config: AppConfig,
    pub bot: Arc<BotService<CrmGateway, RedisBackend>>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("CRM gateway setup failed: {0}")]
    Gateway(#[source] GatewayError),
    #[error("session store connection failed: {0}")]
    SessionStore(#[source] StoreError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(event_name = "system.bootstrap.start", "starting application bootstrap");

    let crm = CrmGateway::new(&config.crm).map_err(BootstrapError::Gateway)?;
    info!(
        event_name = "system.bootstrap.crm_gateway_ready",
        base_url = %config.crm.base_url,
        "CRM gateway constructed"
    );

    let backend = RedisBackend::connect(&config.session.redis_url)
        .await
        .map_err(BootstrapError::SessionStore)?;
    info!(event_name = "system.bootstrap.session_store_connected", "session store reachable");

    let bot = Arc::new(BotService::new(
        Arc::new(crm),
        Arc::new(backend),
        ServiceOptions::from(&config),
    ));

    Ok(Application { config, bot })
}

#[cfg(test)]
mod tests {
    use parcelbot_core::config::{ConfigOverrides, LoadOptions};

    use super::{bootstrap, BootstrapError};

    #[tokio::test]
    async fn bootstrap_fails_fast_without_crm_credentials() {
        let result = bootstrap(LoadOptions {
            config_path: Some("/nonexistent/parcelbot.toml".into()),
            overrides: ConfigOverrides {
                crm_base_url: Some("https://acme.retailcrm.example".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .await;

        let error = result.err().expect("bootstrap should fail");
        assert!(matches!(error, BootstrapError::Config(_)));
        assert!(error.to_string().contains("api_key"));
    }
}
