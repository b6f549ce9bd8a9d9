//! The host environment as seen by the plugin manager.
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::connection::{MessageEndpoint, ServiceBinder};
use crate::plugin_system::error::PluginDetectionError;

/// Fully qualified identity of a component: owning package plus class
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ComponentName {
    pub package: String,
    pub class: String,
}

impl ComponentName {
    pub fn new(package: impl Into<String>, class: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            class: class.into(),
        }
    }

    /// `package/class`
    pub fn flatten_to_string(&self) -> String {
        format!("{}/{}", self.package, self.class)
    }

    pub fn unflatten(text: &str) -> Option<Self> {
        let (package, class) = text.split_once('/')?;
        if package.is_empty() || class.is_empty() {
            return None;
        }
        Some(Self::new(package, class))
    }
}

impl fmt::Display for ComponentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.package, self.class)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKind {
    Service,
    Receiver,
}

/// A component the host reports for a package. It becomes a plugin only if it
/// carries the plugin metadata key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentCandidate {
    pub name: ComponentName,
    pub kind: ComponentKind,
    #[serde(default = "default_exported")]
    pub exported: bool,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(default)]
    pub icon: Option<String>,
    pub app_name: String,
    pub version: String,
}

fn default_exported() -> bool {
    true
}

/// Everything the plugin manager needs from the host it runs in
#[async_trait]
pub trait HostBridge: Send + Sync + fmt::Debug {
    /// Package identity of the host itself
    fn host_package(&self) -> &str;

    async fn installed_packages(&self) -> Result<Vec<String>, PluginDetectionError>;

    async fn components(&self, package: &str) -> Result<Vec<ComponentCandidate>, PluginDetectionError>;

    /// Endpoint for a component living in the host's own process, if there is one
    fn local_endpoint(&self, component: &ComponentName) -> Option<Arc<dyn MessageEndpoint>>;

    fn broadcast_endpoint(&self, component: &ComponentName) -> Arc<dyn MessageEndpoint>;

    fn service_binder(&self) -> Arc<dyn ServiceBinder>;
}
