use anyhow::Context;
use light::{server::start_server, GoogleConfig, LightConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "light=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = envy::from_env::<LightConfig>().context("failed getting envs of Light.")?;

    let google_config = match envy::prefixed("GOOGLE_").from_env::<GoogleConfig>() {
        Ok(google_config) => Some(google_config),
        Err(err) => {
            tracing::warn!("Google login disabled: {}", err);
            None
        }
    };

    start_server(config, google_config).await?;

    Ok(())
}
