pub mod api;
pub mod config;
pub mod errors;
pub mod form;
pub mod handler;
pub mod healthcheck;
pub mod metrics_defs;
pub mod request;
pub mod resolver;

use config::Config;
use errors::ResponderError;
use handler::ResponseHandler;
use healthcheck::{HealthReport, sheet_healthcheck};
use shared::admin_service::AdminService;
use shared::http::run_http_service;
use sheets::{GoogleSheetsProvider, StoreProvider};
use std::sync::Arc;

fn provider(config: &Config) -> Result<Arc<dyn StoreProvider>, ResponderError> {
    let spreadsheet = &config.spreadsheet;
    let provider = GoogleSheetsProvider::new(
        &spreadsheet.spreadsheet_id,
        &spreadsheet.api_base_url,
        spreadsheet.credential_source(),
    )?;
    Ok(Arc::new(provider))
}

/// Serves the response endpoint and the admin probes until either fails.
pub async fn run(config: Config) -> Result<(), ResponderError> {
    config.validate()?;
    shared::metrics_defs::describe_all(metrics_defs::ALL_METRICS);

    let provider = provider(&config)?;
    if !provider.credentials_available() {
        tracing::warn!(
            var = %config.spreadsheet.credentials_env,
            "service account credentials are not available yet"
        );
    }

    let handler = ResponseHandler::new(
        config.spreadsheet.clone(),
        config.responses.clone(),
        provider.clone(),
    );

    let api_task = api::serve(config.listener.clone(), handler);

    let admin_service: AdminService<_, ResponderError> =
        AdminService::new(move || provider.credentials_available());
    let admin_task = run_http_service(
        &config.admin_listener.host,
        config.admin_listener.port,
        admin_service,
    );

    tokio::try_join!(api_task, admin_task)?;
    Ok(())
}

/// Reads the configured sheet once and reports what was found.
pub async fn healthcheck(config: &Config) -> Result<HealthReport, ResponderError> {
    config.spreadsheet.validate()?;
    let provider = provider(config)?;
    Ok(sheet_healthcheck(provider.as_ref(), &config.spreadsheet.read_range()).await)
}
