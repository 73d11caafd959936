//! End-to-end control plane tests.
//!
//! Runs the real acceptor, client readers and telemetry publisher on
//! loopback sockets, with a scripted WiFi driver and a recording serial
//! sink standing in for the radio and the motor controller.
//!
//! Run with: `cargo test --test control_plane`

#![allow(clippy::panic)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use robot_gateway::app_state::AppState;
use robot_gateway::config::GatewayConfig;
use robot_gateway::domain::{
    ClientRegistry, Command, CommandRecord, MotorDirection, MotorSample, SensorSnapshot, StatusBus,
};
use robot_gateway::error::GatewayError;
use robot_gateway::network::{
    AccessPoint, Connectivity, ConnectivityState, LinkEvent, NetworkCandidate, NetworkSelector,
    WifiDriver,
};
use robot_gateway::serial::SerialSink;
use robot_gateway::server::{Acceptor, AcceptorState, ServerMessage};
use robot_gateway::service::{PublishOutcome, TelemetryPublisher};

// ============================================================================
// Fakes
// ============================================================================

#[derive(Debug, Default)]
struct RecordingSink(Mutex<Vec<CommandRecord>>);

impl RecordingSink {
    fn records(&self) -> Vec<CommandRecord> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl SerialSink for RecordingSink {
    fn send(&self, record: CommandRecord) {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).push(record);
    }
}

/// Driver that always sees one access point and either joins it or not.
#[derive(Debug)]
struct FakeRadio {
    visible: &'static str,
    joins: bool,
}

impl WifiDriver for FakeRadio {
    async fn scan(&self) -> Result<Vec<AccessPoint>, GatewayError> {
        Ok(vec![AccessPoint {
            ssid: self.visible.to_string(),
            bssid: None,
            signal_strength: -55,
            channel: Some(6),
        }])
    }

    async fn connect(&self, _ap: &AccessPoint, _password: &str) -> Result<LinkEvent, GatewayError> {
        if self.joins {
            Ok(LinkEvent::GotAddress(None))
        } else {
            Ok(LinkEvent::Disconnected {
                reason: "auth failed".to_string(),
            })
        }
    }

    async fn signal_strength(&self) -> Option<i32> {
        Some(-55)
    }

    async fn wait_link_loss(&self) {
        std::future::pending::<()>().await;
    }
}

// ============================================================================
// Harness
// ============================================================================

struct Gateway {
    state: AppState,
    sink: Arc<RecordingSink>,
    acceptor: Arc<Acceptor>,
    publisher: TelemetryPublisher<tokio::net::tcp::OwnedWriteHalf>,
}

fn gateway(capacity: usize) -> Gateway {
    let config = GatewayConfig {
        listen_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
        client_capacity: capacity,
        ..GatewayConfig::default()
    };
    let sink = Arc::new(RecordingSink::default());
    let state = AppState::new(
        Arc::new(ClientRegistry::new(capacity)),
        Arc::clone(&sink) as Arc<dyn SerialSink>,
        StatusBus::new(64),
        Connectivity::new(),
    );
    let acceptor = Arc::new(Acceptor::new(&config, state.clone()));
    let publisher = TelemetryPublisher::new(&state, config.telemetry_connect_timeout);
    Gateway {
        state,
        sink,
        acceptor,
        publisher,
    }
}

async fn join(gw: &Gateway, radio: FakeRadio) -> ConnectivityState {
    let selector = NetworkSelector::new(
        Arc::new(radio),
        vec![NetworkCandidate::new("lab", "secret")],
        2,
        gw.state.connectivity.clone(),
        gw.state.status.clone(),
    );
    selector.join().await
}

async fn serve(gw: &Gateway) -> SocketAddr {
    assert_eq!(join(gw, FakeRadio { visible: "lab", joins: true }).await, ConnectivityState::Connected);
    let Some(_task) = gw.acceptor.start() else {
        panic!("acceptor should start once");
    };
    let mut phase = gw.acceptor.subscribe();
    let Ok(Ok(_)) = tokio::time::timeout(
        Duration::from_secs(5),
        phase.wait_for(|s| *s == AcceptorState::Listening),
    )
    .await
    else {
        panic!("acceptor never started listening");
    };
    let Some(addr) = gw.acceptor.local_addr() else {
        panic!("listening without an address");
    };
    addr
}

async fn connect(addr: SocketAddr, gw: &Gateway, expected: usize) -> TcpStream {
    let Ok(stream) = TcpStream::connect(addr).await else {
        panic!("connect failed");
    };
    wait_until(|| gw.state.registry.count() == expected).await;
    stream
}

async fn wait_until(mut done: impl FnMut() -> bool) {
    for _ in 0..500 {
        if done() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}

fn snapshot() -> SensorSnapshot {
    SensorSnapshot {
        signal_strength: -70,
        voltage: 12.1,
        temperature: 36.5,
        motors: vec![
            MotorSample {
                speed: 150.0,
                direction: MotorDirection::Cw,
                amps: 1.2,
            },
            MotorSample {
                speed: 150.0,
                direction: MotorDirection::Ccw,
                amps: 1.1,
            },
        ],
        ..SensorSnapshot::default()
    }
}

// ============================================================================
// Commands
// ============================================================================

#[tokio::test]
async fn spin_command_reaches_serial_once() {
    let gw = gateway(3);
    let addr = serve(&gw).await;
    let mut client = connect(addr, &gw, 1).await;

    let Ok(()) = client.write_all(b"{\"Msg\":\"spin R 90\"}\n").await else {
        panic!("send failed");
    };
    wait_until(|| !gw.sink.records().is_empty()).await;

    assert_eq!(gw.sink.records(), vec![CommandRecord::encode(&Command::parse("spin R 90"))]);
}

#[tokio::test]
async fn move_command_keeps_every_field() {
    let gw = gateway(3);
    let addr = serve(&gw).await;
    let mut client = connect(addr, &gw, 1).await;

    let Ok(()) = client.write_all(br#"{"Msg":"move 0 S WASD 50 200"}"#).await else {
        panic!("send failed");
    };
    wait_until(|| !gw.sink.records().is_empty()).await;

    let Command::Move(params) = Command::parse("move 0 S WASD 50 200") else {
        panic!("move should parse as Move");
    };
    assert_eq!(params.direction, "WASD");
    assert_eq!((params.stop, params.mode, params.value, params.time), (0, 'S', 50, 200));
    assert_eq!(gw.sink.records(), vec![CommandRecord::encode(&Command::Move(params))]);
}

#[tokio::test]
async fn back_to_back_objects_are_each_forwarded() {
    let gw = gateway(3);
    let addr = serve(&gw).await;
    let mut client = connect(addr, &gw, 1).await;

    let Ok(()) = client.write_all(br#"{"Msg":"spin R 90"}{"Msg":"spin L 10"}"#).await else {
        panic!("send failed");
    };
    wait_until(|| gw.sink.records().len() == 2).await;

    assert_eq!(
        gw.sink.records(),
        vec![
            CommandRecord::encode(&Command::parse("spin R 90")),
            CommandRecord::encode(&Command::parse("spin L 10")),
        ]
    );
}

#[tokio::test]
async fn unit_suffix_on_angle_is_ignored() {
    let gw = gateway(3);
    let addr = serve(&gw).await;
    let mut client = connect(addr, &gw, 1).await;

    let Ok(()) = client.write_all(b"{\"Msg\":\"spin R 90deg\"}\n").await else {
        panic!("send failed");
    };
    wait_until(|| !gw.sink.records().is_empty()).await;

    assert_eq!(gw.sink.records(), vec![CommandRecord::encode(&Command::parse("spin R 90"))]);
}

#[tokio::test]
async fn garbage_and_unknown_verbs_are_ignored() {
    let gw = gateway(3);
    let addr = serve(&gw).await;
    let mut client = connect(addr, &gw, 1).await;

    let Ok(()) = client
        .write_all(b"hello\n{\"Msg\":\"jump 3\"}\n{\"Msg\":\"motor 1 A 10\"}\n")
        .await
    else {
        panic!("send failed");
    };
    wait_until(|| !gw.sink.records().is_empty()).await;

    assert_eq!(gw.sink.records(), vec![CommandRecord::encode(&Command::parse("motor 1 A 10"))]);
    assert_eq!(gw.state.registry.count(), 1);
}

// ============================================================================
// Telemetry
// ============================================================================

#[tokio::test]
async fn telemetry_reaches_connected_client() {
    let gw = gateway(3);
    let addr = serve(&gw).await;
    let client = connect(addr, &gw, 1).await;

    let outcome = gw.publisher.publish(snapshot()).await;
    assert!(matches!(outcome, PublishOutcome::Sent(r) if r.delivered == 1));

    let mut line = String::new();
    let Ok(_) = BufReader::new(client).read_line(&mut line).await else {
        panic!("read failed");
    };
    let Ok(ServerMessage::Data(data)) = serde_json::from_str::<ServerMessage>(&line) else {
        panic!("not a data frame: {line}");
    };
    assert!((data.voltage - 12.1).abs() < f32::EPSILON);
    assert!((data.temperature - 36.5).abs() < f32::EPSILON);
    assert_eq!(data.motor.len(), 2);
    assert_eq!(data.motor.first().map(|m| m.direction), Some(MotorDirection::Cw));
}

#[tokio::test]
async fn telemetry_dropped_without_wifi() {
    let gw = gateway(3);
    let state = join(&gw, FakeRadio { visible: "elsewhere", joins: true }).await;
    assert_eq!(state, ConnectivityState::Failed);

    let outcome = gw.publisher.publish(snapshot()).await;
    assert_eq!(outcome, PublishOutcome::Dropped(ConnectivityState::Failed));
}

// ============================================================================
// Lifecycle
// ============================================================================

#[tokio::test]
async fn fourth_client_is_turned_away() {
    let gw = gateway(3);
    let addr = serve(&gw).await;
    let _a = connect(addr, &gw, 1).await;
    let _b = connect(addr, &gw, 2).await;
    let _c = connect(addr, &gw, 3).await;

    let Ok(mut d) = TcpStream::connect(addr).await else {
        panic!("connect failed");
    };
    let mut buf = [0u8; 1];
    let Ok(Ok(n)) = tokio::time::timeout(Duration::from_secs(5), d.read(&mut buf)).await else {
        panic!("rejected client was not closed");
    };
    assert_eq!(n, 0);
    assert_eq!(gw.state.registry.count(), 3);
}

#[tokio::test]
async fn disconnect_frees_the_slot() {
    let gw = gateway(1);
    let addr = serve(&gw).await;
    let first = connect(addr, &gw, 1).await;
    drop(first);
    wait_until(|| gw.state.registry.is_empty()).await;

    let _second = connect(addr, &gw, 1).await;
}

#[tokio::test]
async fn failed_join_keeps_server_down() {
    let gw = gateway(3);
    let Some(task) = gw.acceptor.start() else {
        panic!("acceptor should start once");
    };
    let state = join(&gw, FakeRadio { visible: "lab", joins: false }).await;
    assert_eq!(state, ConnectivityState::Failed);

    let Ok(result) = task.await else {
        panic!("acceptor task panicked");
    };
    assert!(matches!(result, Err(GatewayError::NetworkUnavailable(_))));
    assert!(gw.acceptor.local_addr().is_none());
}
