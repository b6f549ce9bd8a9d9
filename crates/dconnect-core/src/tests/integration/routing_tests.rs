#![cfg(test)]

use std::sync::Arc;
use std::time::Duration;

use crate::connection::{MessagingReason, TransportError};
use crate::kernel::config::CoreConfig;
use crate::message::Message;
use crate::plugin_system::{ComponentKind, ComponentName, DevicePlugin, PluginSystemError};

use super::common::{
    HOST_PACKAGE, MockEndpoint, TestEnvironment, candidate, receiver_candidate, setup, setup_with_config,
};

const DOMAIN: &str = "localhost.deviceconnect.org";

async fn in_process_plugin(env: &TestEnvironment) -> (Arc<DevicePlugin>, Arc<MockEndpoint>) {
    let endpoint = MockEndpoint::responding();
    env.host
        .install(candidate(HOST_PACKAGE, "HostDevice", ComponentKind::Service, &["battery"], "1.0.0"));
    env.host
        .add_local_endpoint(ComponentName::new(HOST_PACKAGE, "HostDevice"), endpoint.clone());
    let plugin = env.manager.discover_plugins().await.unwrap().remove(0);
    plugin.apply().await.unwrap();
    (plugin, endpoint)
}

async fn broadcast_plugin(env: &TestEnvironment) -> Arc<DevicePlugin> {
    env.host.install(receiver_candidate("com.example.rx", &["notification"], "1.0.0"));
    env.manager.discover_plugins().await.unwrap().remove(0)
}

#[tokio::test]
async fn test_send_rewrites_addresses_and_records_round_trip() {
    let env = setup();
    let (plugin, endpoint) = in_process_plugin(&env).await;
    let pid = plugin.plugin_id().to_string();

    let request = Message::request("/battery/level")
        .with_service_id(format!("sensor1.{}.{}", pid, DOMAIN))
        .with_session_key("session42")
        .with_origin("com.example.app/.EventReceiver")
        .with_request_code(77);
    let response = env.manager.send(&request).await.unwrap().expect("inline response");

    let delivered = endpoint.delivered();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].service_id.as_deref(), Some("sensor1"));
    assert_eq!(
        delivered[0].session_key.as_deref(),
        Some(format!("session42.{}@com.example.app/.EventReceiver", pid).as_str())
    );
    assert_ne!(delivered[0].request_code, Some(77), "Manager assigns its own request codes");

    assert_eq!(response.service_id, Some(format!("sensor1.{}.{}", pid, DOMAIN)));
    assert_eq!(response.request_code, Some(77));
    assert_eq!(env.manager.pending_request_count(), 0);

    let report = plugin.report();
    assert_eq!(report.responded.len(), 1);
    assert_eq!(report.responded[0].service_id.as_deref(), Some("sensor1"));
    assert_eq!(report.responded[0].path, "/battery/level");
    assert!(report.average_baud_rate.is_some());
    assert_eq!(report.worst_baud_rate_request.as_deref(), Some("/battery/level"));
}

#[tokio::test]
async fn test_send_to_plugin_addresses_plugin_itself() {
    let env = setup();
    let (plugin, endpoint) = in_process_plugin(&env).await;

    let response = env
        .manager
        .send_to_plugin(plugin.plugin_id(), &Message::request("/system"))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(endpoint.delivered()[0].service_id, None);
    assert_eq!(response.service_id, Some(format!("{}.{}", plugin.plugin_id(), DOMAIN)));
    assert_eq!(plugin.history().responded()[0].service_id, None);

    assert!(matches!(
        env.manager.send_to_plugin("missing", &Message::request("/system")).await,
        Err(PluginSystemError::PluginNotFound(_))
    ));
}

#[tokio::test]
async fn test_deferred_response_is_matched_by_request_code() {
    let env = setup();
    let plugin = broadcast_plugin(&env).await;
    let pid = plugin.plugin_id().to_string();

    let request = Message::request("/notification/notify")
        .with_service_id(format!("phone.{}.{}", pid, DOMAIN))
        .with_request_code(5);
    assert_eq!(env.manager.send(&request).await.unwrap(), None);
    assert_eq!(env.manager.pending_request_count(), 1);

    let code = env.host.broadcast.delivered()[0].request_code.unwrap();
    let reply = Message::response("/notification/notify").with_request_code(code);

    // Only the plugin the request went to may answer it
    assert!(matches!(
        env.manager.deliver_response("someone-else", reply.clone()),
        Err(PluginSystemError::UnknownRequest(c)) if c == code
    ));

    let routed = env.manager.deliver_response(&pid, reply.clone()).unwrap();
    assert_eq!(routed.service_id, Some(format!("phone.{}.{}", pid, DOMAIN)));
    assert_eq!(routed.request_code, Some(5));
    assert_eq!(env.manager.pending_request_count(), 0);
    assert_eq!(plugin.history().responded().len(), 1);

    assert!(matches!(
        env.manager.deliver_response(&pid, reply),
        Err(PluginSystemError::UnknownRequest(_))
    ));
    assert!(matches!(
        env.manager.deliver_response(&pid, Message::response("/x")),
        Err(PluginSystemError::MissingRequestCode { .. })
    ));
}

#[tokio::test]
async fn test_expired_requests_are_recorded_as_timeouts() {
    let env = setup();
    let plugin = broadcast_plugin(&env).await;
    let pid = plugin.plugin_id().to_string();

    let request = Message::request("/slow").with_service_id(format!("dev.{}.{}", pid, DOMAIN));
    env.manager.send(&request).await.unwrap();
    assert_eq!(env.manager.expire_requests(Duration::from_secs(3600)), 0);
    assert_eq!(env.manager.expire_requests(Duration::ZERO), 1);

    let timeouts = plugin.history().not_responded();
    assert_eq!(timeouts.len(), 1);
    assert!(timeouts[0].is_timeout());
    assert_eq!(timeouts[0].service_id.as_deref(), Some("dev"));
    assert_eq!(env.manager.pending_request_count(), 0);
}

#[tokio::test]
async fn test_deliver_event_restores_session_key() {
    let env = setup();
    let plugin = broadcast_plugin(&env).await;
    let pid = plugin.plugin_id().to_string();

    let event = Message::event("/gpio/onchange")
        .with_service_id("pin7")
        .with_session_key(format!("abc@def.{}@com.example.app/.Receiver", pid));
    let routed = env.manager.deliver_event(event).unwrap();

    assert_eq!(routed.plugin_id, pid);
    assert_eq!(routed.receiver.as_deref(), Some("com.example.app/.Receiver"));
    assert_eq!(routed.message.session_key.as_deref(), Some("abc@def"));
    assert_eq!(routed.message.service_id, Some(format!("pin7.{}.{}", pid, DOMAIN)));

    let no_receiver = Message::event("/x").with_session_key(format!("key.{}", pid));
    let routed = env.manager.deliver_event(no_receiver).unwrap();
    assert_eq!(routed.receiver, None);
    assert_eq!(routed.message.session_key.as_deref(), Some("key"));

    assert!(matches!(
        env.manager.deliver_event(Message::event("/x").with_session_key("nodots")),
        Err(PluginSystemError::InvalidSessionKey(_))
    ));
    assert!(matches!(
        env.manager.deliver_event(Message::event("/x").with_session_key("key.unknownplugin")),
        Err(PluginSystemError::PluginNotFound(_))
    ));
    assert!(matches!(
        env.manager.deliver_event(Message::event("/x")),
        Err(PluginSystemError::MissingSessionKey { .. })
    ));
}

#[tokio::test]
async fn test_send_failures_leave_no_pending_request() {
    let env = setup();
    let (plugin, endpoint) = in_process_plugin(&env).await;
    let service_id = format!("s.{}.{}", plugin.plugin_id(), DOMAIN);

    endpoint.fail_deliveries(Some(TransportError::RemoteDied));
    match env.manager.send(&Message::request("/a").with_service_id(service_id.clone())).await {
        Err(PluginSystemError::Messaging { source, .. }) => {
            assert_eq!(source.reason, MessagingReason::NotConnected);
            assert_eq!(source.source, Some(TransportError::RemoteDied));
        }
        other => panic!("Expected messaging error, got {:?}", other),
    }
    assert_eq!(env.manager.pending_request_count(), 0);

    endpoint.fail_deliveries(None);
    plugin.disable().await;
    match env.manager.send(&Message::request("/a").with_service_id(service_id)).await {
        Err(PluginSystemError::Messaging { source, .. }) => assert_eq!(source.reason, MessagingReason::NotEnabled),
        other => panic!("Expected messaging error, got {:?}", other),
    }
    assert_eq!(env.manager.pending_request_count(), 0);
}

#[tokio::test]
async fn test_origin_that_is_not_a_component_is_dropped() {
    let env = setup();
    let (plugin, endpoint) = in_process_plugin(&env).await;
    let pid = plugin.plugin_id().to_string();

    let request = Message::request("/battery/level")
        .with_service_id(format!("sensor1.{}.{}", pid, DOMAIN))
        .with_session_key("session42")
        .with_origin("not-a-component");
    env.manager.send(&request).await.unwrap();

    let sent = endpoint.delivered()[0].session_key.clone().unwrap();
    assert_eq!(sent, format!("session42.{}", pid));
    let routed = env.manager.deliver_event(Message::event("/x").with_session_key(sent)).unwrap();
    assert_eq!(routed.message.session_key.as_deref(), Some("session42"));
    assert_eq!(routed.receiver, None);
}

#[tokio::test]
async fn test_session_keys_survive_the_round_trip() {
    let env = setup();
    let (plugin, endpoint) = in_process_plugin(&env).await;
    let pid = plugin.plugin_id().to_string();
    let service_id = format!("sensor1.{}.{}", pid, DOMAIN);

    let cases = [
        ("user@host/x", None),
        ("user@host/x", Some("com.example.app/.Receiver")),
        ("a.b@c/d", None),
        ("plain", Some("com.example.app/.Receiver")),
    ];
    for (index, (key, origin)) in cases.iter().enumerate() {
        let mut request = Message::request("/battery/level")
            .with_service_id(service_id.clone())
            .with_session_key(*key);
        if let Some(origin) = origin {
            request = request.with_origin(*origin);
        }
        env.manager.send(&request).await.unwrap();

        let sent = endpoint.delivered()[index].session_key.clone().unwrap();
        let routed = env
            .manager
            .deliver_event(Message::event("/battery/onchange").with_session_key(sent))
            .unwrap();
        assert_eq!(routed.plugin_id, pid);
        assert_eq!(routed.message.session_key.as_deref(), Some(*key));
        assert_eq!(routed.receiver.as_deref(), *origin);
    }
}

#[tokio::test]
async fn test_unanswered_broadcasts_stay_bounded() {
    let env = setup_with_config(CoreConfig::default().with_max_pending_requests(16));
    let plugin = broadcast_plugin(&env).await;
    let pid = plugin.plugin_id().to_string();
    let service_id = format!("phone.{}.{}", pid, DOMAIN);

    for n in 0..1000 {
        let request = Message::request(format!("/notification/{}", n)).with_service_id(service_id.clone());
        assert_eq!(env.manager.send(&request).await.unwrap(), None);
        assert!(env.manager.pending_request_count() <= 16);
    }
    assert_eq!(env.manager.pending_request_count(), 16);

    // Dropped requests count as unanswered
    let timeouts = plugin.history().not_responded();
    assert_eq!(timeouts.len(), plugin.history().capacity());
    assert!(timeouts.iter().all(|record| record.is_timeout()));

    // The most recent request can still be answered
    let code = env.host.broadcast.delivered().last().unwrap().request_code.unwrap();
    let reply = Message::response("/notification/999").with_request_code(code);
    env.manager.deliver_response(&pid, reply).unwrap();
    assert_eq!(env.manager.pending_request_count(), 15);

    env.manager.remove_plugin("com.example.rx").await;
    assert_eq!(env.manager.pending_request_count(), 0);
}
