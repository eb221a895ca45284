//! Publishing registry
//!
//! Tracks every mirror-class device, owns one [`ResourceUploader`] per
//! mirror that currently has a valid API URL, and keeps the set of dynamic
//! template pages that every mirror must carry.
//!
//! Per mirror the registry moves through three states:
//!
//! ```text
//! Unknown ──(valid API URL)──▶ AddressKnown ──(package + templates)──▶ Published
//!    ▲                              │                                     │
//!    └────────(URL cleared, device removed)───────────────────────────────┘
//! ```
//!
//! All bookkeeping lives in one state container behind a single lock that
//! is never held across an upload. Every lifecycle event bumps the
//! mirror's generation; a publish that finishes for an older generation is
//! discarded instead of installing its uploader.
//!
//! Template registration, template fan-out and the template replay of a
//! publish run one at a time under an async fan-out guard, so a mirror
//! always ends up holding the most recently registered version of a page.

use async_channel::Receiver;
use mirrorpub_core::config::AppConfig;
use mirrorpub_core::error::{PublishError, Result};
use mirrorpub_core::types::{
    Device, DeviceId, MirrorState, ResourcePackageConfig, ResourceRegistrationConfig,
    TemplateConfig, MIRROR_PROFILE,
};
use mirrorpub_discovery::DeviceEvent;
use mirrorpub_resources::{ResourceSource, TemplateRenderer};
use mirrorpub_upload::{ResourceUploader, UploadEndpoint, UploadTransport};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io;
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, error, info};

/// Identity and package published to every mirror.
#[derive(Debug, Clone)]
pub struct RegistrySettings {
    pub app_id: String,
    pub user_id: String,
    pub package: ResourcePackageConfig,
    /// Prefix of every package target path on the mirror webserver
    pub url_base_path: String,
    /// Profile tag identifying mirror-class devices
    pub mirror_profile: String,
}

impl RegistrySettings {
    pub fn new(
        app_id: impl Into<String>,
        user_id: impl Into<String>,
        package: ResourcePackageConfig,
    ) -> Self {
        Self {
            app_id: app_id.into(),
            user_id: user_id.into(),
            package,
            url_base_path: String::new(),
            mirror_profile: MIRROR_PROFILE.to_string(),
        }
    }

    pub fn with_url_base_path(mut self, url_base_path: impl Into<String>) -> Self {
        self.url_base_path = url_base_path.into();
        self
    }

    pub fn with_mirror_profile(mut self, profile: impl Into<String>) -> Self {
        self.mirror_profile = profile.into();
        self
    }

    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Ok(Self::new(
            config.app.app_id.clone(),
            config.app.user_id.clone(),
            config.package_config()?,
        )
        .with_url_base_path(config.package.url_base_path.clone())
        .with_mirror_profile(config.discovery.mirror_profile.clone()))
    }
}

/// Outcome of pushing one template to the live mirrors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanOut {
    pub delivered: usize,
    pub failed: usize,
}

#[derive(Debug)]
struct MirrorEntry {
    name: String,
    api_url: Option<String>,
    state: MirrorState,
    generation: u64,
}

#[derive(Debug, Default)]
struct RegistryState {
    mirrors: HashMap<DeviceId, MirrorEntry>,
    uploaders: HashMap<DeviceId, Arc<ResourceUploader>>,
    templates: HashMap<String, TemplateConfig>,
    next_generation: u64,
}

impl RegistryState {
    fn next_generation(&mut self) -> u64 {
        self.next_generation += 1;
        self.next_generation
    }

    fn is_current(&self, device_id: &DeviceId, generation: u64) -> bool {
        self.mirrors
            .get(device_id)
            .map_or(false, |entry| entry.generation == generation)
    }
}

/// Work handed from the synchronous state change to the network publish.
#[derive(Debug)]
struct PublishTicket {
    device_id: DeviceId,
    name: String,
    generation: u64,
    uploader: Arc<ResourceUploader>,
}

/// Keeps every reachable mirror supplied with the static package and all
/// registered template pages.
pub struct PublishingRegistry {
    settings: RegistrySettings,
    resources: Arc<ResourceSource>,
    renderer: TemplateRenderer,
    transport: Arc<dyn UploadTransport>,
    state: Mutex<RegistryState>,
    /// Held across template insert and fan-out, and across replay
    template_guard: AsyncMutex<()>,
}

impl PublishingRegistry {
    pub fn new(
        settings: RegistrySettings,
        resources: Arc<ResourceSource>,
        transport: Arc<dyn UploadTransport>,
    ) -> Self {
        Self {
            renderer: TemplateRenderer::new(Arc::clone(&resources)),
            settings,
            resources,
            transport,
            state: Mutex::new(RegistryState::default()),
            template_guard: AsyncMutex::new(()),
        }
    }

    pub fn settings(&self) -> &RegistrySettings {
        &self.settings
    }

    /// Starts observing `device` if it is a mirror and publishes to it
    /// right away when its API URL is already known.
    pub async fn device_added(&self, device: Device) -> Result<()> {
        match self.observe(device)? {
            Some(ticket) => self.publish(ticket).await,
            None => Ok(()),
        }
    }

    /// Forgets the device and drops its uploader. Idempotent.
    pub fn device_removed(&self, device_id: &DeviceId) {
        let mut state = self.state.lock();
        let had_uploader = state.uploaders.remove(device_id).is_some();
        if let Some(entry) = state.mirrors.remove(device_id) {
            info!(
                mirror = %device_id,
                name = %entry.name,
                had_uploader,
                "Mirror removed"
            );
        }
    }

    /// Applies a new API URL. `None` drops the uploader; a URL (re)creates
    /// it and republishes the package and every registered template.
    pub async fn api_url_changed(
        &self,
        device_id: &DeviceId,
        api_url: Option<String>,
    ) -> Result<()> {
        match self.change_address(device_id, api_url)? {
            Some(ticket) => self.publish(ticket).await,
            None => Ok(()),
        }
    }

    /// Dispatches a device event and waits for any resulting publish.
    pub async fn handle_event(&self, event: DeviceEvent) -> Result<()> {
        match self.apply(event)? {
            Some(ticket) => self.publish(ticket).await,
            None => Ok(()),
        }
    }

    /// Consumes device events until the channel closes.
    ///
    /// State changes are applied in arrival order; each publish runs on its
    /// own task so a slow mirror never holds up events for the others.
    pub async fn run(self: Arc<Self>, events: Receiver<DeviceEvent>) {
        info!("Publishing registry listening for device events");

        while let Ok(event) = events.recv().await {
            match self.apply(event) {
                Ok(Some(ticket)) => {
                    let registry = Arc::clone(&self);
                    tokio::spawn(async move {
                        let _ = registry.publish(ticket).await;
                    });
                }
                Ok(None) => {}
                Err(e) => debug!(error = %e, "Device event not applied"),
            }
        }

        info!("Device event channel closed, registry stopped");
    }

    /// Registers `template`, replacing any template with the same target
    /// path, and uploads it to every live mirror.
    ///
    /// Upload failures are logged per mirror and counted; a template that
    /// cannot be rendered stays registered and the error is returned.
    /// Concurrent calls, and replays to newly published mirrors, are
    /// serialized so the last registered version is the last one uploaded.
    pub async fn update_template_page(&self, template: TemplateConfig) -> Result<FanOut> {
        let _templates = self.template_guard.lock().await;

        let uploaders: Vec<(DeviceId, Arc<ResourceUploader>)> = {
            let mut state = self.state.lock();
            state
                .templates
                .insert(template.target_path().to_string(), template.clone());
            state
                .uploaders
                .iter()
                .map(|(id, uploader)| (id.clone(), Arc::clone(uploader)))
                .collect()
        };

        let page = self.render(&template).await.map_err(|e| {
            error!(
                template = %template.resource_path(),
                target = %template.target_path(),
                error = %e,
                "Failed to render template"
            );
            e
        })?;
        let registration = template_registration(&template)?;

        let mut fan_out = FanOut::default();
        for (device_id, uploader) in uploaders {
            match uploader
                .upload_bytes(page.clone(), template.target_path(), registration.as_ref())
                .await
            {
                Ok(served) => {
                    debug!(mirror = %device_id, target = %template.target_path(), served = %served, "Template uploaded");
                    fan_out.delivered += 1;
                }
                Err(e) => {
                    error!(
                        mirror = %device_id,
                        url = %uploader.endpoint().api_url(),
                        target = %template.target_path(),
                        error = %e,
                        "Template upload failed"
                    );
                    fan_out.failed += 1;
                }
            }
        }

        Ok(fan_out)
    }

    /// Current state of a mirror; `Unknown` for devices never seen.
    pub fn mirror_state(&self, device_id: &DeviceId) -> MirrorState {
        self.state
            .lock()
            .mirrors
            .get(device_id)
            .map_or(MirrorState::Unknown, |entry| entry.state)
    }

    /// API URL the mirror is currently published under, if any.
    pub fn mirror_api_url(&self, device_id: &DeviceId) -> Option<String> {
        self.state
            .lock()
            .mirrors
            .get(device_id)
            .and_then(|entry| entry.api_url.clone())
    }

    /// Registered templates, ordered by target path.
    pub fn registered_templates(&self) -> Vec<TemplateConfig> {
        let state = self.state.lock();
        let mut templates: Vec<TemplateConfig> = state.templates.values().cloned().collect();
        templates.sort_by(|a, b| a.target_path().cmp(b.target_path()));
        templates
    }

    /// Mirrors holding a live uploader, ordered by id.
    pub fn live_mirrors(&self) -> Vec<DeviceId> {
        let state = self.state.lock();
        let mut ids: Vec<DeviceId> = state.uploaders.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Mirrors currently observed, whatever their state.
    pub fn observed_mirrors(&self) -> Vec<DeviceId> {
        let state = self.state.lock();
        let mut ids: Vec<DeviceId> = state.mirrors.keys().cloned().collect();
        ids.sort();
        ids
    }

    fn apply(&self, event: DeviceEvent) -> Result<Option<PublishTicket>> {
        match event {
            DeviceEvent::DeviceAdded(device) => self.observe(device),
            DeviceEvent::DeviceRemoved(device_id) => {
                self.device_removed(&device_id);
                Ok(None)
            }
            DeviceEvent::AddressChanged { device_id, api_url } => {
                self.change_address(&device_id, api_url)
            }
        }
    }

    fn observe(&self, device: Device) -> Result<Option<PublishTicket>> {
        if !device.has_profile(&self.settings.mirror_profile) {
            debug!(device = %device.id, profile = %device.profile, "Ignoring non-mirror device");
            return Ok(None);
        }

        debug!(
            mirror = %device.id,
            name = %device.name,
            url = ?device.api_url,
            "New mirror detected"
        );

        let mut state = self.state.lock();
        let generation = state.next_generation();
        state.uploaders.remove(&device.id);
        state.mirrors.insert(
            device.id.clone(),
            MirrorEntry {
                name: device.name.clone(),
                api_url: None,
                state: MirrorState::Unknown,
                generation,
            },
        );

        match device.api_url {
            Some(api_url) => self.assign_address(&mut state, &device.id, api_url, generation),
            None => Ok(None),
        }
    }

    fn change_address(
        &self,
        device_id: &DeviceId,
        api_url: Option<String>,
    ) -> Result<Option<PublishTicket>> {
        let mut state = self.state.lock();
        if !state.mirrors.contains_key(device_id) {
            debug!(device = %device_id, "Address change for unobserved device ignored");
            return Ok(None);
        }

        let generation = state.next_generation();
        state.uploaders.remove(device_id);

        match api_url {
            Some(api_url) => {
                info!(mirror = %device_id, url = %api_url, "Mirror API URL changed");
                self.assign_address(&mut state, device_id, api_url, generation)
            }
            None => {
                if let Some(entry) = state.mirrors.get_mut(device_id) {
                    entry.api_url = None;
                    entry.state = MirrorState::Unknown;
                    entry.generation = generation;
                }
                info!(mirror = %device_id, "Mirror no longer controllable, uploader removed");
                Ok(None)
            }
        }
    }

    fn assign_address(
        &self,
        state: &mut RegistryState,
        device_id: &DeviceId,
        api_url: String,
        generation: u64,
    ) -> Result<Option<PublishTicket>> {
        let Some(entry) = state.mirrors.get_mut(device_id) else {
            return Ok(None);
        };
        entry.generation = generation;

        let endpoint = UploadEndpoint::builder()
            .mirror_api_url(api_url.as_str())
            .app_id(self.settings.app_id.as_str())
            .user_id(self.settings.user_id.as_str())
            .build();

        match endpoint {
            Ok(endpoint) => {
                entry.api_url = Some(api_url);
                entry.state = MirrorState::AddressKnown;
                let uploader = ResourceUploader::new(
                    endpoint,
                    Arc::clone(&self.transport),
                    Arc::clone(&self.resources),
                );
                Ok(Some(PublishTicket {
                    device_id: device_id.clone(),
                    name: entry.name.clone(),
                    generation,
                    uploader: Arc::new(uploader),
                }))
            }
            Err(e) => {
                entry.api_url = None;
                entry.state = MirrorState::Unknown;
                error!(
                    mirror = %device_id,
                    url = %api_url,
                    error = %e,
                    "Mirror API URL is invalid, value ignored"
                );
                Err(e)
            }
        }
    }

    /// Uploads the package, installs the uploader and replays every
    /// registered template.
    async fn publish(&self, ticket: PublishTicket) -> Result<()> {
        let PublishTicket {
            device_id,
            name,
            generation,
            uploader,
        } = ticket;
        let package = &self.settings.package;

        if let Err(e) = uploader
            .upload_package_to(
                package.base_path(),
                &self.settings.url_base_path,
                package.main_pages(),
                package.icons(),
            )
            .await
        {
            error!(
                mirror = %device_id,
                url = %uploader.endpoint().api_url(),
                package = %package.base_path(),
                error = %e,
                "Upload to mirror failed"
            );
            return Err(e);
        }

        let _templates = self.template_guard.lock().await;

        let targets: Vec<String> = {
            let mut state = self.state.lock();
            if !state.is_current(&device_id, generation) {
                debug!(mirror = %device_id, "Publish superseded by a newer event, discarded");
                return Ok(());
            }
            state.uploaders.insert(device_id.clone(), Arc::clone(&uploader));
            state.templates.keys().cloned().collect()
        };

        debug!(mirror = %device_id, name = %name, "Static resources uploaded to mirror");

        let mut replay_failed = false;
        for target in targets {
            let registered = self.state.lock().templates.get(&target).cloned();
            let Some(template) = registered else {
                continue;
            };
            if let Err(e) = self.upload_template(&uploader, &template).await {
                error!(
                    mirror = %device_id,
                    url = %uploader.endpoint().api_url(),
                    target = %template.target_path(),
                    error = %e,
                    "Template replay failed"
                );
                replay_failed = true;
            }
        }

        let mut state = self.state.lock();
        if let Some(entry) = state.mirrors.get_mut(&device_id) {
            if entry.generation == generation && !replay_failed {
                entry.state = MirrorState::Published;
                info!(mirror = %device_id, name = %name, "Mirror published");
            }
        }
        Ok(())
    }

    async fn upload_template(
        &self,
        uploader: &ResourceUploader,
        template: &TemplateConfig,
    ) -> Result<String> {
        let page = self.render(template).await?;
        let registration = template_registration(template)?;
        uploader
            .upload_bytes(page, template.target_path(), registration.as_ref())
            .await
    }

    async fn render(&self, template: &TemplateConfig) -> Result<Vec<u8>> {
        let renderer = self.renderer.clone();
        let template = template.clone();
        tokio::task::spawn_blocking(move || renderer.render_config(&template))
            .await
            .map_err(|e| PublishError::Io(io::Error::new(io::ErrorKind::Other, e)))?
    }
}

/// Template pages with a view are registered as that view's main page.
fn template_registration(template: &TemplateConfig) -> Result<Option<ResourceRegistrationConfig>> {
    template
        .view_id()
        .map(ResourceRegistrationConfig::main_page)
        .transpose()
}
