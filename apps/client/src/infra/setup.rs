use std::fs::File;
use std::sync::Arc;

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    adapters::{
        http::{ApiClient, HttpCatalogService, HttpIdentityService},
        persistence::FileSessionStorage,
    },
    application::use_cases::{
        access_gate::AccessGate,
        catalog::CatalogStore,
        dashboard::DashboardUseCases,
        lifecycle::LifecycleManager,
        session::{AuthUseCases, IdentityStore, SessionVerifier},
        session_expiry::SessionExpiringCatalog,
    },
    infra::{config::AppConfig, dummy_payment_gateway::DummyPaymentGateway, http_client},
};

/// Everything a front end needs, wired against the real collaborators.
#[derive(Clone)]
pub struct ClientState {
    pub config: Arc<AppConfig>,
    pub identity: Arc<IdentityStore>,
    pub auth: AuthUseCases,
    pub verifier: SessionVerifier,
    pub gate: AccessGate,
    pub catalog: CatalogStore,
    pub lifecycle: LifecycleManager,
    pub dashboard: DashboardUseCases,
}

pub fn init_client_state(config: AppConfig) -> anyhow::Result<ClientState> {
    let api = ApiClient::new(http_client::build_client()?, config.api_base_url.clone());
    let identity_service = Arc::new(HttpIdentityService::new(api.clone()));
    let storage = Arc::new(FileSessionStorage::new(config.session_file.clone()));

    let identity = Arc::new(IdentityStore::new(storage));
    let verifier = SessionVerifier::new(
        identity_service.clone(),
        identity.clone(),
        config.verifier_settings(),
    );
    let auth = AuthUseCases::new(identity_service, identity.clone());
    let gate = AccessGate::new(verifier.clone(), identity.clone());

    let catalog_service = SessionExpiringCatalog::new(
        Arc::new(HttpCatalogService::new(api)),
        identity.clone(),
    );
    let catalog = CatalogStore::new(Arc::new(catalog_service));
    let lifecycle = LifecycleManager::new(catalog.clone(), Arc::new(DummyPaymentGateway::new()));
    let dashboard = DashboardUseCases::new(catalog.clone());

    Ok(ClientState {
        config: Arc::new(config),
        identity,
        auth,
        verifier,
        gate,
        catalog,
        lifecycle,
        dashboard,
    })
}

pub fn init_tracing(config: &AppConfig) -> anyhow::Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| "suscridash_client=info".into());

    // Console (pretty logs)
    let console_layer = fmt::layer()
        .with_target(false)
        .with_level(true)
        .pretty();

    // File (structured JSON logs), only when asked for
    let json_layer = match &config.log_file {
        Some(path) => {
            let file = File::create(path)?;
            Some(
                fmt::layer()
                    .json()
                    .with_writer(file)
                    .with_current_span(true)
                    .with_span_list(true),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(json_layer)
        .try_init()
        .ok();
    Ok(())
}
