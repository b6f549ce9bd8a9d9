#![cfg(test)]

use std::sync::Arc;

use crate::connection::{ConnectionState, TransportError};
use crate::kernel::bootstrap::Application;
use crate::kernel::config::CoreConfig;
use crate::kernel::error::{Error, KernelLifecyclePhase};
use crate::plugin_system::{DetectionReason, DevicePluginManager, PluginDetectionError, plugin_id};
use crate::storage::settings::KEY_ENABLED;
use crate::storage::{MemorySettingsStore, SettingsStore};

use super::common::{MockHost, receiver_candidate, service_candidate};

fn application(host: Arc<MockHost>, store: Arc<MemorySettingsStore>) -> Application {
    Application::new(host, store as Arc<dyn SettingsStore>, CoreConfig::default())
}

#[tokio::test]
async fn test_startup_discovers_and_connects() {
    let host = MockHost::new();
    host.install(service_candidate("com.example.gpio", &["gpio"], "1.0.0"));
    host.install(receiver_candidate("com.example.rx", &["notification"], "1.0.0"));
    let mut app = application(host.clone(), Arc::new(MemorySettingsStore::new()));
    assert!(!app.is_initialized());

    app.startup().await.expect("startup failed");
    assert!(app.is_initialized());
    assert_eq!(app.registry().len(), 2);
    let gpio = app.registry().get(&plugin_id("com.example.gpio", "PluginService")).unwrap();
    assert_eq!(gpio.state(), ConnectionState::Connected);
    assert!(app.get_component::<DevicePluginManager>().is_some());

    app.shutdown().await.expect("shutdown failed");
    assert!(!app.is_initialized());
    assert_eq!(gpio.state(), ConnectionState::Disconnected);
    assert!(gpio.is_enabled(), "Shutdown does not touch the enabled flag");
}

#[tokio::test]
async fn test_startup_twice_fails() {
    let mut app = application(MockHost::new(), Arc::new(MemorySettingsStore::new()));
    app.startup().await.unwrap();
    match app.startup().await {
        Err(Error::KernelLifecycleError { phase, .. }) => assert_eq!(phase, KernelLifecyclePhase::Bootstrap),
        other => panic!("Expected lifecycle error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_disabled_plugin_stays_disconnected_on_start() {
    let host = MockHost::new();
    host.install(service_candidate("com.example.gpio", &["gpio"], "1.0.0"));
    let store = Arc::new(MemorySettingsStore::new());
    let id = plugin_id("com.example.gpio", "PluginService");
    store
        .update(&id, &mut |data: &mut crate::storage::ConfigData| data.set(KEY_ENABLED, false))
        .unwrap();

    let mut app = application(host.clone(), store);
    app.startup().await.unwrap();

    let plugin = app.registry().get(&id).unwrap();
    assert!(!plugin.is_enabled());
    assert_eq!(plugin.state(), ConnectionState::Disconnected);
    assert_eq!(host.binder.bind_calls(), 0);
}

#[tokio::test]
async fn test_connect_failures_do_not_abort_startup() {
    let host = MockHost::new();
    host.install(service_candidate("com.example.gpio", &["gpio"], "1.0.0"));
    host.binder.fail_binds(Some(TransportError::PermissionDenied));

    let mut app = application(host.clone(), Arc::new(MemorySettingsStore::new()));
    app.startup().await.unwrap();

    let plugin = app.registry().all().remove(0);
    assert_eq!(plugin.state(), ConnectionState::Suspended);
    assert_eq!(
        plugin.connection().current_connection_error(),
        Some(crate::connection::ConnectionError::NotPermitted)
    );
}

#[tokio::test]
async fn test_discovery_failure_is_an_initialize_error() {
    let host = MockHost::new();
    host.fail_listing(Some(PluginDetectionError::new(DetectionReason::Other, "binder died")));
    let mut app = application(host, Arc::new(MemorySettingsStore::new()));

    match app.startup().await {
        Err(Error::KernelLifecycleError {
            phase,
            component_name,
            source,
            ..
        }) => {
            assert_eq!(phase, KernelLifecyclePhase::Initialize);
            assert_eq!(component_name.as_deref(), Some("DevicePluginManager"));
            assert!(matches!(source.as_deref(), Some(Error::PluginSystem(_))));
        }
        other => panic!("Expected lifecycle error, got {:?}", other),
    }
    assert!(!app.is_initialized());
}
