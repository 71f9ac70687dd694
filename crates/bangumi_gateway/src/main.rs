// Bangumi Gateway Server
//
// Serves the browser client's API: Bangumi OAuth login, bearer sessions
// and catalog search/detail proxying.
//
// Usage: bangumi-gateway [host] [port]

use bangumi_gateway::{start_server, GatewayConfig};
use std::env;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("bangumi_gateway=info,tower_http=info")),
        )
        .init();

    let mut config = GatewayConfig::from_env()?;

    // Positional arguments override the environment
    let args: Vec<String> = env::args().collect();
    if let Some(host) = args.get(1) {
        config.host = host.clone();
    }
    if let Some(port) = args.get(2) {
        config.port = port
            .parse::<u16>()
            .map_err(|_| anyhow::anyhow!("Invalid port: {}", port))?;
    }

    tracing::info!("[OK] Bangumi OAuth client: {}", display_or_unset(&config.oauth.client_id));
    tracing::info!("[OK] Catalog API: {}", config.api_base_url);
    if let Some(base) = &config.public_base_url {
        tracing::info!("[OK] Public base URL: {}", base);
    }
    tracing::info!("[INFO] Available endpoints:");
    tracing::info!("  GET    /api/search?q=&type=          - Catalog search");
    tracing::info!("  GET    /api/anime/:id                - Anime detail");
    tracing::info!("  GET    /api/subject/:id              - Raw subject detail");
    tracing::info!("  GET    /api/auth/bangumi/authorize   - Start Bangumi login");
    tracing::info!("  POST   /api/auth/bangumi/callback    - Complete Bangumi login");
    tracing::info!("  GET    /api/auth/me                  - Current user");
    tracing::info!("  POST   /api/auth/logout              - End session");
    tracing::info!("  GET    /api/health                   - Health check");

    start_server(config).await?;

    Ok(())
}

fn display_or_unset(value: &str) -> &str {
    if value.is_empty() {
        "(unset)"
    } else {
        value
    }
}
