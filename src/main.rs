/// Helpdesk account service binary
use helpdesk_accounts::{
    config::LoggingConfig, error::HelpdeskResult, server, AppContext, ServerConfig,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> HelpdeskResult<()> {
    // Load configuration
    let config = ServerConfig::from_env()?;

    // Initialize logging
    init_logging(&config.logging);

    print_banner();

    // Create application context
    let ctx = AppContext::new(config).await?;

    server::serve(ctx).await?;

    Ok(())
}

fn init_logging(config: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let registry = tracing_subscriber::registry().with(filter);

    if config.json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

fn print_banner() {
    println!(
        r#"
    Helpdesk Account Service v{}
        "#,
        env!("CARGO_PKG_VERSION")
    );
}
