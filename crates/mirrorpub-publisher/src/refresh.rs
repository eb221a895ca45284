//! Periodic refresh of dynamic template pages

use crate::registry::PublishingRegistry;
use mirrorpub_core::error::Result;
use mirrorpub_core::types::TemplateConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Supplies the current version of dynamic pages on every refresh.
pub trait TemplateProvider: Send + Sync {
    fn templates(&self) -> Result<Vec<TemplateConfig>>;
}

impl<F> TemplateProvider for F
where
    F: Fn() -> Result<Vec<TemplateConfig>> + Send + Sync,
{
    fn templates(&self) -> Result<Vec<TemplateConfig>> {
        self()
    }
}

/// Provider returning the same configured pages every time.
#[derive(Debug, Clone, Default)]
pub struct StaticTemplates(Vec<TemplateConfig>);

impl StaticTemplates {
    pub fn new(templates: Vec<TemplateConfig>) -> Self {
        Self(templates)
    }
}

impl TemplateProvider for StaticTemplates {
    fn templates(&self) -> Result<Vec<TemplateConfig>> {
        Ok(self.0.clone())
    }
}

/// Pushes every template the provider yields through the registry and
/// returns how many were registered.
pub async fn refresh_once(registry: &PublishingRegistry, provider: &dyn TemplateProvider) -> usize {
    let templates = match provider.templates() {
        Ok(templates) => templates,
        Err(e) => {
            warn!(error = %e, "Template provider failed, skipping refresh");
            return 0;
        }
    };

    let count = templates.len();
    for template in templates {
        let target = template.target_path().to_string();
        match registry.update_template_page(template).await {
            Ok(fan_out) => debug!(
                target = %target,
                delivered = fan_out.delivered,
                failed = fan_out.failed,
                "Template refreshed"
            ),
            Err(e) => warn!(target = %target, error = %e, "Template refresh failed"),
        }
    }
    count
}

/// Handle to a running refresh task.
#[derive(Debug)]
pub struct RefreshHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl RefreshHandle {
    /// Requests the task to stop before its next run.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Cancels the task and waits for a run in progress to finish.
    pub async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            warn!(error = %e, "Refresh task ended abnormally");
        }
    }
}

/// Runs `provider` through the registry every `interval`, starting
/// immediately. Cancellation takes effect between runs only.
pub fn spawn_refresh(
    registry: Arc<PublishingRegistry>,
    provider: Arc<dyn TemplateProvider>,
    interval: Duration,
) -> RefreshHandle {
    let cancel = CancellationToken::new();
    let token = cancel.clone();

    let task = tokio::spawn(async move {
        info!(interval_secs = interval.as_secs(), "Template refresh started");

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => {}
            }
            refresh_once(&registry, provider.as_ref()).await;
        }

        info!("Template refresh stopped");
    });

    RefreshHandle { cancel, task }
}
