/// Campus Dashboard - smart campus sensor dashboard server
///
/// Serves account management, sessions and live sensor data from the
/// campus time-series database.
use campus_dashboard::{server, AppContext, DashboardConfig, DashboardResult};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> DashboardResult<()> {
    // Load configuration (also reads .env)
    let config = DashboardConfig::from_env()?;

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.logging.level.clone().into());
    if config.logging.json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    print_banner();

    let ctx = AppContext::new(config)?;

    server::serve(ctx).await?;

    Ok(())
}

fn print_banner() {
    println!(
        r#"
   ______                                    ____             __    __                         __
  / ____/___ _____ ___  ____  __  _______   / __ \____ ______/ /_  / /_  ____  ____ __________/ /
 / /   / __ `/ __ `__ \/ __ \/ / / / ___/  / / / / __ `/ ___/ __ \/ __ \/ __ \/ __ `/ ___/ __  /
/ /___/ /_/ / / / / / / /_/ / /_/ (__  )  / /_/ / /_/ (__  ) / / / /_/ / /_/ / /_/ / /  / /_/ /
\____/\__,_/_/ /_/ /_/ .___/\__,_/____/  /_____/\__,_/____/_/ /_/_.___/\____/\__,_/_/   \__,_/
                    /_/
        Smart Campus Sensor Dashboard v{}
        "#,
        env!("CARGO_PKG_VERSION")
    );
}
