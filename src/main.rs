use anyhow::{Context, Result};
use clap::Parser;
use mirrorpub_core::config::AppConfig;
use mirrorpub_core::types::TemplateConfig;
use mirrorpub_discovery::{event_channel, MdnsDeviceDiscovery, StaticDeviceSource};
use mirrorpub_publisher::{
    refresh_once, spawn_refresh, PublishingRegistry, RegistrySettings, TemplateProvider,
};
use mirrorpub_resources::ResourceSource;
use mirrorpub_upload::HttpTransport;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};

mod logging;
mod quotes;

use quotes::QuoteProvider;

/// mirrorpub - publishes web views to mirror display devices
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/config.yaml")]
    config: PathBuf,

    /// Override the configured log level
    #[arg(long, env = "MIRRORPUB_LOG_LEVEL")]
    log_level: Option<String>,

    /// Publish to the static mirrors once and exit
    #[arg(long)]
    once: bool,
}

/// Configured template pages plus the optional quote of the day.
struct Pages {
    configured: Vec<TemplateConfig>,
    quotes: Option<QuoteProvider>,
}

impl TemplateProvider for Pages {
    fn templates(&self) -> mirrorpub_core::Result<Vec<TemplateConfig>> {
        let mut pages = self.configured.clone();
        if let Some(quotes) = &self.quotes {
            pages.extend(quotes.templates()?);
        }
        Ok(pages)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Load configuration file with environment overrides
    let config = AppConfig::from_config_builder(&args.config)
        .with_context(|| format!("Failed to load config file: {:?}", args.config))?;
    config.validate().context("Invalid configuration")?;

    logging::init(&config.logging, args.log_level.as_deref())?;

    info!("Starting mirrorpub");
    info!("Configuration loaded from {:?}", args.config);

    let resources = Arc::new(ResourceSource::from_config(&config.package.roots));
    let transport = HttpTransport::from_config(&config.upload)?;
    let registry = Arc::new(PublishingRegistry::new(
        RegistrySettings::from_config(&config)?,
        resources,
        Arc::new(transport),
    ));

    let pages = Pages {
        configured: config.template_configs()?,
        quotes: config
            .refresh
            .quotes
            .as_ref()
            .map(QuoteProvider::from_config)
            .transpose()?,
    };

    let static_mirrors = StaticDeviceSource::new(
        config.discovery.static_mirrors.clone(),
        config.discovery.mirror_profile.clone(),
    );

    if args.once {
        return publish_once(&registry, &pages, &static_mirrors).await;
    }

    let (event_tx, event_rx) = event_channel(config.discovery.channel_capacity);
    let registry_task = tokio::spawn(Arc::clone(&registry).run(event_rx));

    let refresh = spawn_refresh(
        Arc::clone(&registry),
        Arc::new(pages),
        config.refresh.interval(),
    );

    let announced = static_mirrors.announce(&event_tx).await?;
    info!("Announced {} static mirror(s)", announced);

    let discovery = if config.discovery.enabled {
        match start_discovery(&config, event_tx.clone()) {
            Ok(discovery) => Some(discovery),
            Err(e) => {
                warn!(error = %e, "mDNS discovery unavailable, using static mirrors only");
                None
            }
        }
    } else {
        info!("mDNS discovery disabled in configuration");
        None
    };
    drop(event_tx);

    signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("Shutdown requested");

    refresh.stop().await;
    if let Some(discovery) = discovery {
        if let Err(e) = discovery.stop() {
            error!(error = %e, "Failed to stop discovery");
        }
    }

    if tokio::time::timeout(Duration::from_secs(5), registry_task)
        .await
        .is_err()
    {
        warn!("Registry did not stop in time");
    }

    info!("mirrorpub stopped");
    Ok(())
}

fn start_discovery(
    config: &AppConfig,
    event_tx: async_channel::Sender<mirrorpub_discovery::DeviceEvent>,
) -> mirrorpub_discovery::Result<MdnsDeviceDiscovery> {
    let discovery = MdnsDeviceDiscovery::with_sender(config.discovery.clone(), event_tx)?;
    discovery.start()?;
    Ok(discovery)
}

/// Registers the current pages, publishes to every static mirror and
/// reports whether all of them were reached.
async fn publish_once(
    registry: &PublishingRegistry,
    pages: &Pages,
    static_mirrors: &StaticDeviceSource,
) -> Result<()> {
    let registered = refresh_once(registry, pages).await;
    info!("Registered {} template page(s)", registered);

    let mut failed = 0;
    for device in static_mirrors.devices() {
        let id = device.id.clone();
        match registry.device_added(device).await {
            Ok(()) => info!(mirror = %id, state = %registry.mirror_state(&id), "Mirror done"),
            Err(e) => {
                error!(mirror = %id, error = %e, "Publishing failed");
                failed += 1;
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{} mirror(s) could not be published", failed);
    }
    Ok(())
}
