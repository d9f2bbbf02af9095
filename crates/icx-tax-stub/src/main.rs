//! Tax-validation API stub server, standalone development binary.
//!
//! Environment:
//! - `ICX_STUB_REGISTRY`: vendor registry JSON (empty registry when unset)
//! - `ICX_STUB_PORT`: listen port (default 8080)
//! - `ICX_STUB_API_KEY`: required `X-API-Key` value (unchecked when unset)

use std::net::SocketAddr;

use icx_client::{StaticTaxAuthority, VendorRegistry};
use icx_tax_stub::{router, AppState};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let registry = match std::env::var("ICX_STUB_REGISTRY") {
        Ok(path) => match VendorRegistry::load(&path) {
            Ok(registry) => registry,
            Err(e) => {
                tracing::error!("{e}");
                std::process::exit(1);
            }
        },
        Err(_) => VendorRegistry::default(),
    };
    let port: u16 = std::env::var("ICX_STUB_PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(8080);
    let api_key = std::env::var("ICX_STUB_API_KEY").ok();

    let state = AppState::new(StaticTaxAuthority::new(registry), api_key);
    tracing::info!(vendors = state.vendor_count(), "vendor registry loaded");
    let app = router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("icx-tax-stub listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind listener");
    axum::serve(listener, app.into_make_service())
        .await
        .expect("server error");
}
