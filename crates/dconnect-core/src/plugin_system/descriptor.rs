use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::connection::ConnectionType;
use crate::plugin_system::error::PluginSystemError;
use crate::plugin_system::host::{ComponentCandidate, ComponentName};

/// Capability document a component publishes under the plugin metadata key
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilityDescriptor {
    pub profiles: Vec<String>,
    #[serde(default)]
    pub sdk_version: Option<String>,
}

impl CapabilityDescriptor {
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

/// Immutable description of a discovered plugin
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginDescriptor {
    pub plugin_id: String,
    pub component: ComponentName,
    pub name: String,
    pub version: String,
    pub profiles: BTreeSet<String>,
    pub sdk_version: Option<String>,
    pub icon: Option<String>,
    pub connection_type: ConnectionType,
}

impl PluginDescriptor {
    /// Build from a host candidate whose metadata carries a capability document
    /// under `metadata_key`. `Ok(None)` when the candidate is not a plugin.
    pub fn from_candidate(
        candidate: &ComponentCandidate,
        metadata_key: &str,
        connection_type: ConnectionType,
    ) -> Result<Option<Self>, PluginSystemError> {
        let Some(raw) = candidate.metadata.get(metadata_key) else {
            return Ok(None);
        };
        let capabilities =
            CapabilityDescriptor::parse(raw).map_err(|e| PluginSystemError::InvalidDescriptor {
                component: candidate.name.to_string(),
                message: e.to_string(),
            })?;

        Ok(Some(Self {
            plugin_id: plugin_id(&candidate.name.package, &candidate.name.class),
            component: candidate.name.clone(),
            name: candidate.app_name.clone(),
            version: candidate.version.clone(),
            profiles: capabilities.profiles.into_iter().collect(),
            sdk_version: capabilities.sdk_version,
            icon: candidate.icon.clone(),
            connection_type,
        }))
    }

    pub fn package(&self) -> &str {
        &self.component.package
    }

    pub fn supports_profile(&self, profile: &str) -> bool {
        self.profiles.iter().any(|p| p.eq_ignore_ascii_case(profile))
    }
}

/// Hex of the first 16 bytes of SHA-256 over the flattened component name,
/// `package/class`. The separator keeps `("ab", "c")` and `("a", "bc")` apart.
pub fn plugin_id(package: &str, class: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(package.as_bytes());
    hasher.update(b"/");
    hasher.update(class.as_bytes());
    let digest = hasher.finalize();
    hex::encode(&digest[..16])
}
