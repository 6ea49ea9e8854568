use anyhow::Result;
use irrigation_core::config::ControllerConfig;
use irrigation_core::controller::Controller;

fn init_tracing() -> Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,irrigation_core=info".into());
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .try_init()
        .map_err(|err| anyhow::anyhow!(err.to_string()))?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = ControllerConfig::from_env()?;
    init_tracing()?;

    tracing::info!(
        greenhouse_id = %config.greenhouse_id,
        backend_url = %config.backend_url,
        "starting irrigation control loop"
    );

    let controller = Controller::new(config.backend_url.clone(), None);
    controller.configure(config.to_greenhouse_config()).await?;

    if config.fetch_config_from_backend {
        match controller.reload_config(&config.greenhouse_id).await {
            Ok(reloaded) => {
                tracing::info!(plant_type = %reloaded.plant_type, "loaded plant config from backend");
            }
            Err(err) => {
                tracing::warn!(error = %err, "could not fetch plant config from backend, using env defaults");
            }
        }
    }

    controller.start_supervisor();

    if config.auto_start_monitor {
        controller.start_monitoring(&config.greenhouse_id, None).await?;
        tracing::info!(greenhouse_id = %config.greenhouse_id, "monitoring started");
    }

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received");
        }
    }

    controller.stop_monitoring(None).await?;
    Ok(())
}
