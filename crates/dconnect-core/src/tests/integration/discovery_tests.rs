#![cfg(test)]

use std::collections::HashMap;

use crate::connection::{ConnectionState, ConnectionType};
use crate::kernel::constants::PLUGIN_METADATA_KEY;
use crate::plugin_system::{ComponentName, DetectionReason, PluginDetectionError, PluginSystemError};
use crate::storage::SettingsStore;

use super::common::{
    HOST_PACKAGE, MockEndpoint, Observed, candidate, receiver_candidate, service_candidate, setup,
};
use crate::plugin_system::ComponentKind;

#[tokio::test]
async fn test_components_without_metadata_key_are_ignored() {
    let env = setup();
    let mut plain = service_candidate("com.example.plain", &["gpio"], "1.0.0");
    plain.metadata = HashMap::new();
    env.host.install(plain);

    let found = env.manager.discover_plugins().await.unwrap();
    assert!(found.is_empty());
    assert!(env.manager.registry().is_empty());
}

#[tokio::test]
async fn test_invalid_capability_descriptor_is_skipped() {
    let env = setup();
    let mut broken = service_candidate("com.example.broken", &[], "1.0.0");
    broken
        .metadata
        .insert(PLUGIN_METADATA_KEY.to_string(), "{ not json".to_string());
    env.host.install(broken);
    env.host.install(service_candidate("com.example.good", &["light"], "1.0.0"));

    let found = env.manager.discover_plugins().await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].descriptor().package(), "com.example.good");
}

#[tokio::test]
async fn test_transport_classification() {
    let env = setup();
    env.host.install(receiver_candidate("com.example.rx", &["notification"], "1.0.0"));
    env.host.install(service_candidate("com.example.svc", &["gpio"], "1.0.0"));
    env.host
        .install(candidate(HOST_PACKAGE, "LocalService", ComponentKind::Service, &["host"], "1.0.0"));
    env.host
        .install(candidate(HOST_PACKAGE, "OtherService", ComponentKind::Service, &["host"], "1.0.0"));
    env.host
        .add_local_endpoint(ComponentName::new(HOST_PACKAGE, "LocalService"), MockEndpoint::new());

    env.manager.discover_plugins().await.unwrap();
    let type_of = |package: &str, class: &str| {
        env.manager
            .device_plugin(&crate::plugin_system::plugin_id(package, class))
            .map(|p| p.descriptor().connection_type)
    };
    assert_eq!(type_of("com.example.rx", "PluginReceiver"), Some(ConnectionType::Broadcast));
    assert_eq!(type_of("com.example.svc", "PluginService"), Some(ConnectionType::BoundService));
    assert_eq!(type_of(HOST_PACKAGE, "LocalService"), Some(ConnectionType::InProcess));
    assert_eq!(type_of(HOST_PACKAGE, "OtherService"), Some(ConnectionType::BoundService));

    let receiver = env
        .manager
        .device_plugin(&crate::plugin_system::plugin_id("com.example.rx", "PluginReceiver"))
        .unwrap();
    assert_eq!(receiver.state(), ConnectionState::Connected, "Broadcast connections are always connected");
}

#[tokio::test]
async fn test_unexported_components_of_other_packages_are_skipped() {
    let env = setup();
    let mut hidden = service_candidate("com.example.hidden", &["gpio"], "1.0.0");
    hidden.exported = false;
    env.host.install(hidden);
    let mut own = candidate(HOST_PACKAGE, "InternalService", ComponentKind::Service, &["gpio"], "1.0.0");
    own.exported = false;
    env.host.install(own);

    let found = env.manager.discover_plugins().await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].descriptor().package(), HOST_PACKAGE);
}

#[tokio::test]
async fn test_listing_failure_propagates() {
    let env = setup();
    env.host.fail_listing(Some(PluginDetectionError::new(
        DetectionReason::TooManyPackages,
        "package manager refused",
    )));

    match env.manager.discover_plugins().await {
        Err(PluginSystemError::Detection(e)) => assert_eq!(e.reason, DetectionReason::TooManyPackages),
        other => panic!("Expected detection error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_partial_discovery_keeps_earlier_results() {
    let env = setup();
    env.host.install(service_candidate("com.a.first", &["gpio"], "1.0.0"));
    env.host.install(service_candidate("com.b.second", &["light"], "1.0.0"));
    env.host.fail_components_of("com.b.second");

    let result = env.manager.discover_plugins().await;
    assert!(matches!(result, Err(PluginSystemError::Detection(_))));
    let registered = env.manager.device_plugins();
    assert_eq!(registered.len(), 1);
    assert_eq!(registered[0].descriptor().package(), "com.a.first");
}

#[tokio::test]
async fn test_discovery_is_additive() {
    let env = setup();
    env.host.install(service_candidate("com.example.gpio", &["gpio"], "1.0.0"));
    env.manager.discover_plugins().await.unwrap();

    env.host.uninstall("com.example.gpio");
    env.manager.discover_plugins().await.unwrap();
    assert_eq!(env.manager.device_plugins().len(), 1, "Only remove_plugin drops entries");
}

#[tokio::test]
async fn test_add_plugin_registers_and_connects() {
    let env = setup();
    env.host.install(service_candidate("com.example.new", &["camera"], "1.0.0"));

    let added = env.manager.add_plugin("com.example.new").await.unwrap();
    env.manager.flush_events().await.unwrap();

    assert_eq!(added.len(), 1);
    assert_eq!(added[0].state(), ConnectionState::Connected);
    assert_eq!(env.host.binder.bind_calls(), 1);
    let id = added[0].plugin_id().to_string();
    assert_eq!(
        env.listener.events(),
        vec![
            Observed::Found(id.clone()),
            Observed::State(id.clone(), ConnectionState::Connecting),
            Observed::State(id, ConnectionState::Connected),
        ]
    );
}

#[tokio::test]
async fn test_remove_plugin_disposes_entry() {
    let env = setup();
    env.host.install(service_candidate("com.example.gone", &["gpio"], "1.0.0"));
    let plugin = env.manager.add_plugin("com.example.gone").await.unwrap().remove(0);
    plugin.add_baud_rate("/gpio", 12);
    assert!(!env.store.load(plugin.plugin_id()).unwrap().is_empty());

    let removed = env.manager.remove_plugin("com.example.gone").await;
    env.manager.flush_events().await.unwrap();

    assert_eq!(removed.len(), 1);
    assert!(env.manager.registry().is_empty());
    assert_eq!(plugin.state(), ConnectionState::Disconnected);
    assert!(env.store.load(plugin.plugin_id()).unwrap().is_empty(), "Settings are cleared");
    assert_eq!(env.host.binder.unbind_calls(), 1);
    assert_eq!(
        env.listener.events().last(),
        Some(&Observed::Lost(plugin.plugin_id().to_string()))
    );

    assert!(env.manager.remove_plugin("com.example.gone").await.is_empty());
}

#[tokio::test]
async fn test_queries() {
    let env = setup();
    env.host.install(service_candidate("com.example.gpio", &["gpio"], "1.0.0"));
    env.host.install(service_candidate("com.example.light", &["light", "GPIO"], "1.0.0"));
    env.host.install(receiver_candidate("com.example.battery", &["battery"], "1.0.0"));
    env.manager.discover_plugins().await.unwrap();

    assert_eq!(env.manager.device_plugins().len(), 3);
    assert_eq!(env.manager.device_plugins_by_profile("gpio").len(), 2);
    assert!(env.manager.device_plugins_by_profile("camera").is_empty());

    let light = env
        .manager
        .device_plugin(&crate::plugin_system::plugin_id("com.example.light", "PluginService"))
        .unwrap();
    light.disable().await;
    let enabled = env.manager.enabled_device_plugins();
    assert_eq!(enabled.len(), 2);
    assert!(enabled.iter().all(|p| p.plugin_id() != light.plugin_id()));
}
