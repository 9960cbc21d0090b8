//! Push registration runner - main entry point.

use anyhow::{Context, Result};
use push_registration::{
    Environment, RegistrationClient, RegistrationController, RegistrationEvent, ReqwestTransport,
};
use push_registration_cli::{Config, StateFile};
use std::sync::Arc;
use tokio::signal;
use tokio_stream::StreamExt;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::load().context("Failed to load configuration")?;

    // Initialize logging
    init_logging(&config.client.log_level);

    let platform_token = config.platform_token_bytes()?;
    let environment = Environment::from_sandbox(config.client.sandbox);

    let store = StateFile::new(&config.client.state_path);
    let state = store.load().await?;
    info!(
        "Loaded state from {} (checkin={}, installation={})",
        store.path().display(),
        state.checkin.is_some(),
        state.installation.is_some()
    );

    let transport =
        ReqwestTransport::new(config.client.timeout).context("Failed to create HTTP client")?;
    let controller =
        RegistrationController::new(config.service.clone(), environment, Arc::new(transport))
            .with_system_info(config.device.clone())
            .with_endpoints(config.endpoints.clone())
            .with_state(state);

    let client = RegistrationClient::spawn(controller);
    let events = client.events();
    tokio::pin!(events);

    info!("Starting registration ({:?})", environment);
    client.register(platform_token.clone())?;

    let deadline = tokio::time::sleep(config.client.handshake_timeout);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            Some(event) = events.next() => {
                // Persist after every stage so the next run resumes from here
                let snapshot = client.snapshot().await?;
                store.save(&snapshot).await?;

                match event {
                    RegistrationEvent::CheckinUpdated(checkin) => {
                        info!("Checked in as device {}", checkin.device_id);
                    }
                    RegistrationEvent::InstallationUpdated(installation) => {
                        info!("Installation {} ready", installation.app_instance_id);
                    }
                    RegistrationEvent::PushTokenUpdated { push_token, platform_token: used } => {
                        if used == platform_token {
                            println!("{}", push_token);
                            break;
                        }
                        warn!("Registered a superseded platform token, waiting");
                    }
                }
            }
            _ = &mut deadline => {
                // Failed stages leave invalidated state behind; keep it
                let snapshot = client.snapshot().await?;
                store.save(&snapshot).await?;
                error!("Handshake did not complete within {:?}", config.client.handshake_timeout);
                anyhow::bail!("Registration timed out");
            }
            _ = signal::ctrl_c() => {
                info!("Shutdown signal received");
                let snapshot = client.snapshot().await?;
                store.save(&snapshot).await?;
                break;
            }
        }
    }

    info!("Shutting down...");
    Ok(())
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
