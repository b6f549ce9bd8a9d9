#![cfg(test)]

use std::sync::Arc;

use crate::connection::{ConnectionState, ConnectionType, MessagingReason, TransportError};
use crate::kernel::config::CoreConfig;
use crate::message::{Message, MessageAction};
use crate::plugin_system::{PluginSystemError, plugin_id};
use crate::storage::SettingsStore;
use crate::storage::settings::KEY_ENABLED;

use super::common::{Observed, manual_plugin, service_candidate, setup, setup_with_config, MockEndpoint};

#[tokio::test]
async fn test_single_gpio_candidate_becomes_enabled_plugin() {
    let env = setup();
    env.host.install(service_candidate("com.example.gpio", &["gpio"], "1.0.0"));

    let found = env.manager.discover_plugins().await.expect("discovery failed");
    env.manager.flush_events().await.unwrap();

    assert_eq!(found.len(), 1);
    let plugin = &found[0];
    assert_eq!(plugin.plugin_id(), plugin_id("com.example.gpio", "PluginService"));
    assert!(plugin.descriptor().profiles.contains("gpio"));
    assert!(plugin.supports_profile("gpio"));
    assert!(plugin.is_enabled(), "Plugins are enabled by default");
    assert_eq!(plugin.descriptor().connection_type, ConnectionType::BoundService);
    assert_eq!(plugin.state(), ConnectionState::Disconnected);
    assert_eq!(env.manager.device_plugins().len(), 1);
    assert_eq!(env.listener.events(), vec![Observed::Found(plugin.plugin_id().to_string())]);
}

#[tokio::test]
async fn test_disabling_connected_plugin_disconnects_and_persists() {
    let env = setup();
    env.host.install(service_candidate("com.example.gpio", &["gpio"], "1.0.0"));
    let plugin = env.manager.discover_plugins().await.unwrap().remove(0);

    plugin.apply().await.expect("connect failed");
    assert_eq!(plugin.state(), ConnectionState::Connected);

    plugin.disable().await;

    assert_eq!(plugin.state(), ConnectionState::Disconnected);
    assert!(!plugin.is_enabled());
    let document = env.store.load(plugin.plugin_id()).unwrap();
    assert_eq!(document.get::<bool>(KEY_ENABLED), Some(false));
    assert_eq!(env.host.binder.unbind_calls(), 1);

    // The plugin heard about it while still connected
    let delivered = env.host.binder.endpoint.delivered();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].action, MessageAction::PluginDisabled);

    env.manager.flush_events().await.unwrap();
    assert_eq!(
        env.listener.states_of(plugin.plugin_id()),
        vec![ConnectionState::Connecting, ConnectionState::Connected, ConnectionState::Disconnected]
    );
}

#[tokio::test]
async fn test_send_on_suspended_plugin_retries_then_fails() {
    let env = setup();
    env.host.install(service_candidate("com.example.gpio", &["gpio"], "1.0.0"));
    let plugin = env.manager.discover_plugins().await.unwrap().remove(0);

    env.host.binder.fail_binds(Some(TransportError::Timeout));
    assert!(plugin.apply().await.is_err());
    assert_eq!(plugin.state(), ConnectionState::Suspended);
    let after_apply = env.host.binder.bind_calls();
    assert_eq!(after_apply, 5);

    let error = plugin.send(&Message::request("/gpio/digital")).await.unwrap_err();
    assert_eq!(error.reason, MessagingReason::ConnectionSuspended);
    assert_eq!(env.host.binder.bind_calls() - after_apply, 5, "One bounded retry sequence");
    assert_eq!(plugin.state(), ConnectionState::Suspended);
}

#[tokio::test]
async fn test_rediscovery_with_new_version_overwrites_entry() {
    let env = setup();
    env.host.install(service_candidate("com.example.gpio", &["gpio"], "1.0.0"));
    let first = env.manager.discover_plugins().await.unwrap().remove(0);
    first.apply().await.unwrap();

    env.host.install(service_candidate("com.example.gpio", &["gpio", "light"], "2.0.0"));
    let second = env.manager.discover_plugins().await.unwrap().remove(0);
    env.manager.flush_events().await.unwrap();

    assert_eq!(first.plugin_id(), second.plugin_id());
    assert_eq!(env.manager.device_plugins().len(), 1);
    let current = env.manager.device_plugin(first.plugin_id()).unwrap();
    assert!(Arc::ptr_eq(&current, &second));
    assert_eq!(current.descriptor().version, "2.0.0");
    assert!(!Arc::ptr_eq(first.connection(), second.connection()), "Connections are never reused");
    assert_eq!(first.state(), ConnectionState::Disconnected);
    assert_eq!(second.state(), ConnectionState::Disconnected);

    assert_eq!(env.listener.overwrites(), 1);
    assert!(env.listener.events().contains(&Observed::Overwritten {
        plugin_id: first.plugin_id().to_string(),
        previous_version: "1.0.0".to_string(),
        current_version: "2.0.0".to_string(),
    }));
}

#[tokio::test]
async fn test_service_id_resolution_by_domain() {
    let env = setup_with_config(CoreConfig::default().with_domain("mydomain"));
    let plugin = manual_plugin("pluginid123", MockEndpoint::new(), env.store.clone() as Arc<dyn SettingsStore>);
    env.manager.registry().insert(plugin.clone());

    let resolved = env.manager.get_device_plugins("abc.pluginid123.mydomain").expect("should resolve");
    assert_eq!(resolved.len(), 1);
    assert!(Arc::ptr_eq(&resolved[0], &plugin));

    assert!(env.manager.get_device_plugins("nodomainhere").is_none());
    assert!(env.manager.get_device_plugins("abc.unknown.mydomain").is_none());
    assert!(env.manager.get_device_plugins("pluginid123.mydomain").is_some());
}

#[tokio::test]
async fn test_send_to_unknown_service_id() {
    let env = setup();
    let message = Message::request("/battery").with_service_id("x.deadbeef.localhost.deviceconnect.org");
    assert!(matches!(
        env.manager.send(&message).await,
        Err(PluginSystemError::PluginNotFound(id)) if id == "deadbeef"
    ));

    let message = Message::request("/battery").with_service_id("nodomain");
    assert!(matches!(
        env.manager.send(&message).await,
        Err(PluginSystemError::UnknownServiceId(_))
    ));
}
