use std::sync::Arc;
use tokio::net::{TcpListener, TcpSocket};
use tokio::signal;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

use wagate::api::{self, ApiState};
use wagate::credentials::FileCredentialStore;
use wagate::pairing::{PairingStore, QrSvgRenderer};
use wagate::protocol::LoopbackConnector;
use wagate::{Config, SessionRegistry};

// -----------------------------------------------------------------------------
// ----- Constants -------------------------------------------------------------

const APP_NAME: &str = "wagate";

// -----------------------------------------------------------------------------
// ----- Main ------------------------------------------------------------------

#[tokio::main]
async fn main() -> std::io::Result<()> {
    setup().await;
    run_forever().await
}

// -----------------------------------------------------------------------------
// ----- Setup -----------------------------------------------------------------

async fn setup() {
    // This has to be the first thing we do, because it initializes the config
    Config::init().await;

    init_tracing();
}

fn init_tracing() {
    let config = Config::snapshot();
    let filter = EnvFilter::try_new(config.log_level.as_str())
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}

fn build_registry(config: &Config) -> SessionRegistry {
    let credentials = Arc::new(FileCredentialStore::new(&config.sessions_dir));
    let pairing = PairingStore::new(Arc::new(QrSvgRenderer::new(&config.sessions_dir)));
    let connector = Arc::new(LoopbackConnector::new(
        config.client.name.clone(),
        config.sessions.pair_after,
    ));

    SessionRegistry::new(connector, credentials, pairing, config.registry_settings())
}

// -----------------------------------------------------------------------------
// ----- Run -------------------------------------------------------------------

async fn run_forever() -> std::io::Result<()> {
    let config = Config::snapshot();

    tokio::fs::create_dir_all(&config.sessions_dir).await?;

    let registry = build_registry(&config);
    let state = ApiState::new(registry, &config.api, config.listen_addr.port());
    let app = api::router(state);

    let socket = if config.listen_addr.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };

    socket.set_reuseaddr(true)?;
    socket.bind(config.listen_addr)?;

    let listener: TcpListener = socket.listen(1024)?;

    info!("{APP_NAME} listening on http://{}", config.listen_addr);
    info!("tenants are selected with the X-API-Key header");
    info!("session data under {}", config.sessions_dir.display());

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = signal::ctrl_c().await;
            info!("{APP_NAME} shutting down");
        })
        .await
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
