//! Bit-exact rewriting of the addressing tokens exchanged with applications.
//!
//! * service id: `<serviceId>.<pluginId>.<domain>`, or `<pluginId>.<domain>` for
//!   the plugin itself
//! * session key: `<sessionKey>.<pluginId>[@<package/class>]`

use crate::plugin_system::host::ComponentName;

/// Split form of a rewritten session key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionKeyParts {
    pub session_key: String,
    pub plugin_id: String,
    /// Flattened component name of the application receiving events
    pub receiver: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressCodec {
    domain: String,
}

impl AddressCodec {
    pub fn new(domain: impl Into<String>) -> Self {
        Self { domain: domain.into() }
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    fn plugin_suffix(&self, plugin_id: &str) -> String {
        format!("{}.{}", plugin_id, self.domain)
    }

    /// Application-facing form of a plugin-local service id
    pub fn append_service_id(&self, plugin_id: &str, service_id: Option<&str>) -> String {
        match service_id {
            Some(service_id) => format!("{}.{}", service_id, self.plugin_suffix(plugin_id)),
            None => self.plugin_suffix(plugin_id),
        }
    }

    /// Inverse of [`append_service_id`](Self::append_service_id). `None` when the id
    /// addresses the plugin itself. An id without this plugin's suffix comes back as is.
    pub fn split_plugin_id_to_service_id(&self, plugin_id: &str, service_id: &str) -> Option<String> {
        let suffix = self.plugin_suffix(plugin_id);
        if service_id == suffix {
            return None;
        }
        let stripped = service_id
            .strip_suffix(suffix.as_str())
            .and_then(|rest| rest.strip_suffix('.'));
        Some(stripped.unwrap_or(service_id).to_string())
    }

    /// Plugin id named by an application-facing service id, `None` without the domain suffix
    pub fn plugin_id_from_service_id<'a>(&self, service_id: &'a str) -> Option<&'a str> {
        let rest = service_id.strip_suffix(self.domain.as_str())?.strip_suffix('.')?;
        let plugin_id = rest.rsplit('.').next()?;
        (!plugin_id.is_empty()).then_some(plugin_id)
    }

    /// `<sessionKey>.<pluginId>[@<receiver>]`
    pub fn append_session_key(session_key: &str, plugin_id: &str, receiver: Option<&str>) -> String {
        match receiver {
            Some(receiver) => format!("{}.{}@{}", session_key, plugin_id, receiver),
            None => format!("{}.{}", session_key, plugin_id),
        }
    }

    /// Inverse of [`append_session_key`](Self::append_session_key).
    ///
    /// The text after the last `@` is taken as the receiver only when it is a
    /// flattened component name, so session keys may themselves contain `@`.
    /// When both readings are possible the one with a receiver wins; use
    /// [`parse_session_key_candidates`](Self::parse_session_key_candidates) to
    /// pick by plugin id instead.
    pub fn parse_session_key(text: &str) -> Option<SessionKeyParts> {
        Self::parse_session_key_candidates(text).into_iter().next()
    }

    /// Every way `text` can be split, the reading with a receiver first
    pub fn parse_session_key_candidates(text: &str) -> Vec<SessionKeyParts> {
        let mut candidates = Vec::with_capacity(2);
        if let Some((body, receiver)) = text.rsplit_once('@') {
            if ComponentName::unflatten(receiver).is_some() {
                candidates.extend(split_plugin_id(body, Some(receiver)));
            }
        }
        candidates.extend(split_plugin_id(text, None));
        candidates
    }
}

fn split_plugin_id(body: &str, receiver: Option<&str>) -> Option<SessionKeyParts> {
    let (session_key, plugin_id) = body.rsplit_once('.')?;
    if plugin_id.is_empty() {
        return None;
    }
    Some(SessionKeyParts {
        session_key: session_key.to_string(),
        plugin_id: plugin_id.to_string(),
        receiver: receiver.map(str::to_string),
    })
}
