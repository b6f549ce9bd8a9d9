//! Host backed by a JSON manifest describing the installed components.
//!
//! The manifest stands in for a package manager: it lists every component the
//! host would report, plus the components that live in the host's own process.
//! Messages handed to any endpoint are only logged.
use std::collections::{BTreeSet, HashSet};
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use dconnect_core::connection::{MessageEndpoint, ServiceBinder, ServiceMonitor, TransportError};
use dconnect_core::kernel::constants;
use dconnect_core::message::Message;
use dconnect_core::plugin_system::{ComponentCandidate, ComponentName, HostBridge, PluginDetectionError};
use dconnect_core::storage::{StorageProvider, StorageResult, StorageSystemError};

/// Manifest file looked up next to the configuration
pub const MANIFEST_FILE_NAME: &str = "host.json";

const DEFAULT_HOST_PACKAGE: &str = "org.deviceconnect.manager";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostManifest {
    #[serde(default)]
    pub host_package: Option<String>,
    #[serde(default)]
    pub components: Vec<ComponentCandidate>,
    /// Flattened names (`package/class`) of components running in-process
    #[serde(default)]
    pub local_components: Vec<String>,
}

impl HostManifest {
    /// Read the manifest, or an empty one when the file does not exist
    pub fn load<P: StorageProvider + ?Sized>(provider: &P, path: &Path) -> StorageResult<Self> {
        if !provider.is_file(path) {
            log::info!("No host manifest at {}, starting without plugins", path.display());
            return Ok(Self::default());
        }
        let content = provider.read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| StorageSystemError::DeserializationError {
            format: "json".to_string(),
            source: Box::new(e),
        })
    }
}

#[derive(Debug)]
pub struct ManifestHost {
    host_package: String,
    components: Vec<ComponentCandidate>,
    local: HashSet<ComponentName>,
    binder: Arc<LoggingBinder>,
}

impl ManifestHost {
    pub fn new(manifest: HostManifest) -> Self {
        let mut local = HashSet::new();
        for flat in &manifest.local_components {
            match ComponentName::unflatten(flat) {
                Some(name) => {
                    local.insert(name);
                }
                None => log::warn!("Ignoring malformed local component '{}'", flat),
            }
        }
        Self {
            host_package: manifest
                .host_package
                .unwrap_or_else(|| DEFAULT_HOST_PACKAGE.to_string()),
            components: manifest.components,
            local,
            binder: Arc::new(LoggingBinder),
        }
    }
}

#[async_trait]
impl HostBridge for ManifestHost {
    fn host_package(&self) -> &str {
        &self.host_package
    }

    async fn installed_packages(&self) -> Result<Vec<String>, PluginDetectionError> {
        let packages: BTreeSet<_> = self.components.iter().map(|c| c.name.package.clone()).collect();
        Ok(packages.into_iter().collect())
    }

    async fn components(&self, package: &str) -> Result<Vec<ComponentCandidate>, PluginDetectionError> {
        Ok(self
            .components
            .iter()
            .filter(|c| c.name.package == package)
            .cloned()
            .collect())
    }

    fn local_endpoint(&self, component: &ComponentName) -> Option<Arc<dyn MessageEndpoint>> {
        self.local
            .contains(component)
            .then(|| Arc::new(LoggingEndpoint::new(component.clone())) as Arc<dyn MessageEndpoint>)
    }

    fn broadcast_endpoint(&self, component: &ComponentName) -> Arc<dyn MessageEndpoint> {
        Arc::new(LoggingEndpoint::new(component.clone()))
    }

    fn service_binder(&self) -> Arc<dyn ServiceBinder> {
        self.binder.clone()
    }
}

/// Endpoint that accepts everything and answers nothing
#[derive(Debug)]
pub struct LoggingEndpoint {
    component: ComponentName,
}

impl LoggingEndpoint {
    pub fn new(component: ComponentName) -> Self {
        Self { component }
    }
}

#[async_trait]
impl MessageEndpoint for LoggingEndpoint {
    async fn deliver(&self, message: &Message) -> Result<Option<Message>, TransportError> {
        log::info!("{} <- {:?} {}", self.component, message.action, message.path);
        Ok(None)
    }
}

#[derive(Debug)]
struct LoggingBinder;

#[async_trait]
impl ServiceBinder for LoggingBinder {
    async fn bind(
        &self,
        component: &ComponentName,
        _monitor: ServiceMonitor,
    ) -> Result<Arc<dyn MessageEndpoint>, TransportError> {
        log::debug!("Binding {} for {}", component, constants::APP_NAME);
        Ok(Arc::new(LoggingEndpoint::new(component.clone())))
    }

    async fn unbind(&self, component: &ComponentName) {
        log::debug!("Unbinding {}", component);
    }
}
