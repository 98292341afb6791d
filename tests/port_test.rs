//! Port, stream and sub-object integration tests

use rust_ixe::adapters::MockTclAdapter;
use rust_ixe::api::ApiHandle;
use rust_ixe::hardware::{IxePort, LinkState};
use rust_ixe::parameter::{MacAddress, MemberValue};
use rust_ixe::{CapFileFormat, IxeError};

async fn connected_port(mock: &MockTclAdapter) -> IxePort {
    let api = ApiHandle::new(Box::new(mock.clone()));
    api.connect().await.expect("connect failed");
    IxePort::new("1/1/1", api)
}

/// Unknown profile types are rejected before anything is sent
#[tokio::test]
async fn test_load_config_unknown_suffix() {
    let mock = MockTclAdapter::new();
    let mut port = connected_port(&mock).await;

    let err = port.load_config("x.unknown").await.unwrap_err();
    assert!(matches!(err, IxeError::UnsupportedFormat(ref ext) if ext == ".unknown"));
    assert!(mock.call_log().is_empty());
}

#[tokio::test]
async fn test_load_stream_config() {
    let mock = MockTclAdapter::new().with_stream_count("1 1 1", 3);
    let mut port = connected_port(&mock).await;

    tokio_test::assert_ok!(port.load_config("C:\\cfg\\streams.str").await);
    assert_eq!(
        mock.call_log(),
        vec![
            "port reset 1 1 1",
            "stream import {C:/cfg/streams.str} 1 1 1",
            "port write 1 1 1",
            "port getStreamCount 1 1 1",
        ]
    );
    assert_eq!(port.streams().keys().copied().collect::<Vec<_>>(), vec![1, 2, 3]);
}

#[tokio::test]
async fn test_load_port_config() {
    let mock = MockTclAdapter::new();
    let mut port = connected_port(&mock).await;

    tokio_test::assert_ok!(port.load_config("/cfg/port.prt").await);
    assert_eq!(mock.call_log()[0], "port import {/cfg/port.prt} 1 1 1");
    assert_eq!(mock.count_calls("port reset"), 0);
    assert!(port.streams().is_empty());
}

/// Profile paths stay one Tcl word whatever characters they hold
#[tokio::test]
async fn test_load_config_path_with_spaces() {
    let mock = MockTclAdapter::new();
    let mut port = connected_port(&mock).await;

    tokio_test::assert_ok!(port.load_config("/my cfg/a [1].prt").await);
    assert_eq!(mock.call_log()[0], "port import {/my cfg/a [1].prt} 1 1 1");

    tokio_test::assert_ok!(port.load_config("/cfg/odd}.prt").await);
    assert_eq!(mock.count_calls(r"port import /cfg/odd\}.prt 1 1 1"), 1);
}

#[tokio::test]
async fn test_add_stream_names_after_address() {
    let mock = MockTclAdapter::new().with_stream_count("1 1 1", 2);
    let mut port = connected_port(&mock).await;

    let stream = port.add_stream(None).await.expect("add failed");
    assert_eq!(stream.id(), 3);
    assert_eq!(stream.name(), Some("1/1/1/3"));
    assert_eq!(
        mock.call_log(),
        vec![
            "port getStreamCount 1 1 1",
            "stream setDefault",
            "stream set 1 1 1 3",
            "stream config -name {1/1/1/3}",
            "stream set 1 1 1 3",
        ]
    );

    port.add_stream(Some("udp flow")).await.expect("add failed");
    assert_eq!(
        mock.stored_value("stream", "1 1 1 4", "name").as_deref(),
        Some("udp flow")
    );
    assert_eq!(port.streams().len(), 2);

    port.discover().await.expect("discover failed");
    assert_eq!(port.streams().len(), 4);
    assert_eq!(
        port.stream_mut(4).and_then(|s| s.name().map(String::from)),
        Some("udp flow".to_string())
    );
}

#[tokio::test]
async fn test_stream_attribute_round_trip() {
    let mock = MockTclAdapter::new().with_stream_count("1 1 1", 1);
    let mut port = connected_port(&mock).await;
    port.discover().await.expect("discover failed");
    let stream = port.stream_mut(1).expect("stream 1");

    stream.set("enable", true).await.expect("set failed");
    stream.set("framesize", 512i64).await.expect("set failed");
    stream
        .set("da", "00:de:bb:00:00:01")
        .await
        .expect("set failed");
    assert_eq!(mock.count_calls("stream config -enable true"), 1);
    assert_eq!(mock.count_calls("stream config -da {00 de bb 00 00 01}"), 1);

    let da = stream.get_value("da", true).await.expect("get failed");
    let expected: MacAddress = "00:de:bb:00:00:01".parse().expect("mac");
    assert_eq!(da, MemberValue::Mac(expected));
    assert_eq!(
        stream.get_value("enable", true).await.expect("get failed"),
        MemberValue::Bool(true)
    );
    assert_eq!(
        stream.get_value("framesize", false).await.expect("get failed"),
        MemberValue::Int(512)
    );

    let err = stream.set("packetView", "x").await.unwrap_err();
    assert!(err.is_validation());
}

#[tokio::test]
async fn test_read_only_port_attribute() {
    let mock = MockTclAdapter::new().with_value("port", "1 1 1", "linkState", "1");
    let mut port = connected_port(&mock).await;

    let err = port.set("linkState", 0i64).await.unwrap_err();
    assert!(matches!(err, IxeError::ReadOnlyAttribute(_)));
    assert!(mock.call_log().is_empty());

    assert_eq!(port.link_state().await.expect("link state"), LinkState::Up);
}

#[tokio::test]
async fn test_supported_speeds() {
    let mock = MockTclAdapter::new().with_feature("ethernetLineRate", "{10 100 1000}");
    let port = connected_port(&mock).await;

    let speeds = port.supported_speeds().await.expect("speeds");
    assert_eq!(speeds, vec![10, 100, 1000]);
    assert_eq!(mock.call_log(), vec!["port getFeature 1 1 1 ethernetLineRate"]);
}

/// Sub-object refresh reads the port before the sub-object
#[tokio::test]
async fn test_data_integrity_refresh_order() {
    let mock = MockTclAdapter::new();
    let mut port = connected_port(&mock).await;

    port.data_integrity()
        .await
        .expect("attach failed")
        .set("signatureOffset", 40i64)
        .await
        .expect("set failed");
    assert_eq!(
        mock.call_log(),
        vec![
            "dataIntegrity setDefault",
            "dataIntegrity setRx 1 1 1",
            "dataIntegrity config -signatureOffset 40",
            "dataIntegrity setRx 1 1 1",
        ]
    );
    mock.clear_log();

    let sub = port
        .refresh_data_integrity(Some("signatureOffset"), true)
        .await
        .expect("refresh failed");
    assert_eq!(sub.cached("signatureOffset"), Some(&MemberValue::Int(40)));

    let log = mock.call_log();
    let port_get = log.iter().position(|c| c == "port get 1 1 1");
    let sub_get = log.iter().position(|c| c == "dataIntegrity getRx 1 1 1");
    assert!(port_get.is_some() && sub_get.is_some());
    assert!(port_get < sub_get);
    assert_eq!(log.last().map(String::as_str), Some("dataIntegrity cget -signatureOffset"));
}

#[tokio::test]
async fn test_packet_group_created_once() {
    let mock = MockTclAdapter::new();
    let mut port = connected_port(&mock).await;

    port.packet_group().await.expect("attach failed");
    port.packet_group()
        .await
        .expect("attach failed")
        .set("groupId", 7i64)
        .await
        .expect("set failed");
    assert_eq!(mock.count_calls("packetGroup setDefault"), 1);
    assert_eq!(
        mock.stored_value("packetGroup", "1 1 1", "groupId").as_deref(),
        Some("7")
    );

    port.refresh_packet_group(None, false)
        .await
        .expect("refresh failed");
    assert_eq!(mock.count_calls("port get 1 1 1"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_single_port_capture_without_frames() {
    let mock = MockTclAdapter::new();
    let port = connected_port(&mock).await;

    tokio_test::assert_ok!(port.start_capture().await);
    let file = port
        .stop_capture("cap", CapFileFormat::Txt)
        .await
        .expect("stop failed");
    assert_eq!(file, None);
    assert_eq!(mock.count_calls("ixStartCapture pl_1_1_1"), 1);
    assert_eq!(mock.count_calls("ixStopCapture pl_1_1_1"), 1);
    assert_eq!(mock.count_calls("set pl_1_1_1"), 1);
}

#[tokio::test]
async fn test_port_maintenance_commands() {
    let mock = MockTclAdapter::new().with_stream_count("1 1 1", 5);
    let port = connected_port(&mock).await;

    tokio_test::assert_ok!(port.set_factory_defaults().await);
    tokio_test::assert_ok!(port.set_phy_mode("portPhyModeFiber").await);
    assert_eq!(port.stream_count().await.expect("count"), 5);
    tokio_test::assert_ok!(port.release().await);
    assert_eq!(
        mock.call_log(),
        vec![
            "port setFactoryDefaults 1 1 1",
            "port setPhyMode portPhyModeFiber 1 1 1",
            "port getStreamCount 1 1 1",
            "ixPortClearOwnership 1 1 1",
        ]
    );
}

#[tokio::test]
async fn test_remote_failure_keeps_cache() {
    let mock = MockTclAdapter::new();
    let mut port = connected_port(&mock).await;
    mock.fail_on("port set 1 1 1", "port is owned by another user");

    let err = port.set("speed", 1000i64).await.unwrap_err();
    assert!(matches!(err, IxeError::Remote { ref command, .. } if command == "port set 1 1 1"));
    assert_eq!(port.object().cached("speed"), None);
}
