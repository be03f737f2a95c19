use dotenvy::dotenv;
use tracing::{info, warn};

use suscridash_client::{
    infra::{
        catalog_refresh::run_catalog_refresh_loop,
        config::AppConfig,
        setup::{init_client_state, init_tracing},
    },
    use_cases::access_gate::Decision,
};

/// Usage: `suscridash-client [PATH] [--watch]`
///
/// Restores the persisted session, verifies it and prints where a
/// navigation to PATH ends up. With `--watch`, keeps the catalog cache
/// refreshed until the session ends.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let config = AppConfig::from_env();
    init_tracing(&config)?;
    let state = init_client_state(config)?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    let watch = args.iter().any(|a| a == "--watch");
    let destination = args
        .iter()
        .find(|a| !a.starts_with("--"))
        .map(String::as_str)
        .unwrap_or("/");

    let navigation = match state.gate.navigate(destination).await {
        Ok(navigation) => navigation,
        Err(e) if e.is_retryable() => {
            warn!(error = %e, "Could not verify the session");
            println!("retry: {}", e);
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    match navigation.decision {
        Decision::Admit => match &navigation.principal {
            Some(principal) => println!("admit {} as {}", destination, principal.role),
            None => println!("admit {}", destination),
        },
        Decision::Redirect { to, reason } => println!("redirect {} ({:?})", to, reason),
    }

    if watch && navigation.principal.is_some() {
        let exit = run_catalog_refresh_loop(
            state.identity.clone(),
            state.catalog.clone(),
            state.config.catalog_refresh_interval,
        )
        .await;
        info!(?exit, "Catalog refresh ended");
    }

    Ok(())
}
