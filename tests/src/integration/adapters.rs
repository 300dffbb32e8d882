//! # Adapter Paths
//!
//! Operator input entering through the dashboard and the serial node, and
//! the controller's answer travelling back out through every adapter.

#[cfg(test)]
mod tests {
    use super::super::{mode, valve, System};
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use control_unit::adapters::{DashboardAdapter, HardwareAdapter, Link};
    use control_unit::container::config::{DashboardConfig, HardwareConfig};
    use control_unit::{ControlUnitConfig, ServiceContainer};
    use shared_types::{Service, SystemState};
    use std::net::SocketAddr;
    use std::sync::Arc;
    use std::time::Duration;
    use tank_controller::StatusQuery;
    use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::time::timeout;
    use tower::ServiceExt;

    fn dashboard(sys: &System) -> DashboardAdapter {
        DashboardAdapter::new(
            DashboardConfig {
                bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
                ..DashboardConfig::default()
            },
            Arc::clone(&sys.bus),
            sys.topics.clone(),
            Arc::new(sys.handle.clone()),
        )
    }

    async fn post(adapter: &DashboardAdapter, uri: &str, body: &str) -> StatusCode {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_owned()))
            .unwrap();
        adapter.router().oneshot(request).await.unwrap().status()
    }

    async fn get_json(adapter: &DashboardAdapter, uri: &str) -> serde_json::Value {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let response = adapter.router().oneshot(request).await.unwrap();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_dashboard_manual_override() {
        let mut sys = System::start().await;
        let dash = dashboard(&sys);

        assert_eq!(
            post(&dash, "/api/mode", r#"{"mode":"MANUAL"}"#).await,
            StatusCode::CONFLICT
        );

        sys.connect().await;
        assert_eq!(
            post(&dash, "/api/valve", r#"{"opening":35}"#).await,
            StatusCode::CONFLICT
        );

        assert_eq!(
            post(&dash, "/api/mode", r#"{"mode":"MANUAL"}"#).await,
            StatusCode::OK
        );
        assert_eq!(sys.next().await, mode(SystemState::Manual));

        // Out of range never reaches the controller.
        assert_eq!(
            post(&dash, "/api/valve", r#"{"opening":150}"#).await,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            post(&dash, "/api/valve", r#"{"opening":35}"#).await,
            StatusCode::OK
        );
        assert_eq!(sys.next().await, valve(35.0));
        assert_eq!(sys.handle.status().valve_opening.percent(), 35.0);

        let status = get_json(&dash, "/api/status").await;
        assert_eq!(status["state"], "MANUAL");
        assert_eq!(status["valve_opening"], 35.0);

        // Requesting the current mode does not toggle it.
        assert_eq!(
            post(&dash, "/api/mode", r#"{"mode":"MANUAL"}"#).await,
            StatusCode::OK
        );
        sys.assert_quiet(Duration::from_millis(500)).await;
        assert_eq!(sys.handle.state(), SystemState::Manual);

        sys.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_dashboard_readings_follow_controller_history() {
        let mut sys = System::start().await;
        let mut dash = dashboard(&sys);
        dash.setup().await.unwrap();

        sys.connect().await;
        sys.level(20.0);
        sys.level(30.0);
        let mut handle = sys.handle.clone();
        handle.wait_for(|s| s.history_len == 3).await.unwrap();

        let readings = get_json(&dash, "/api/readings?limit=2").await;
        let values: Vec<f64> = readings
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["value"].as_f64().unwrap())
            .collect();
        assert_eq!(values, vec![20.0, 30.0]);

        dash.cleanup().await;
        sys.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_serial_node_drives_controller() {
        let mut sys = System::start().await;
        let mut hardware = HardwareAdapter::new(
            HardwareConfig {
                send_interval: Duration::from_millis(100),
                ..HardwareConfig::default()
            },
            Arc::clone(&sys.bus),
            sys.topics.clone(),
        );
        hardware.setup().await.unwrap();

        let (node, link) = tokio::io::duplex(4096);
        tokio::spawn(async move {
            let _ = hardware.serve(Link::from_stream(link)).await;
        });
        let (reader, mut writer) = tokio::io::split(node);
        let mut lines = BufReader::new(reader).lines();

        writer.write_all(b"{\"level\":10}\n").await.unwrap();
        assert_eq!(sys.next().await, valve(0.0));
        assert_eq!(sys.next().await, mode(SystemState::Automatic));

        writer
            .write_all(b"{\"event\":\"button_pressed\"}\n")
            .await
            .unwrap();
        assert_eq!(sys.next().await, mode(SystemState::Manual));

        writer
            .write_all(b"{\"event\":\"pot_changed\",\"value\":150}\n{\"event\":\"pot_changed\",\"value\":35}\n")
            .await
            .unwrap();
        assert_eq!(sys.next().await, valve(35.0));

        // The node eventually sees the new mode and opening.
        let mut frame = serde_json::Value::Null;
        for _ in 0..200 {
            let line = lines.next_line().await.unwrap().unwrap();
            frame = serde_json::from_str(&line).unwrap();
            if frame["mode"] == "MANUAL" && frame["valve_opening"] == 35.0 {
                break;
            }
        }
        assert_eq!(frame["mode"], "MANUAL");
        assert_eq!(frame["valve_opening"], 35.0);

        sys.shutdown().await;
    }

    /// One MQTT 3.1.1 control packet: fixed header byte and body.
    async fn read_packet(stream: &mut TcpStream) -> (u8, Vec<u8>) {
        let header = stream.read_u8().await.unwrap();
        let mut len = 0usize;
        for shift in (0..28).step_by(7) {
            let byte = stream.read_u8().await.unwrap();
            len |= ((byte & 0x7f) as usize) << shift;
            if byte & 0x80 == 0 {
                break;
            }
        }
        let mut body = vec![0; len];
        stream.read_exact(&mut body).await.unwrap();
        (header, body)
    }

    /// Accept the client's CONNECT, then return the payload of the first
    /// PUBLISH on `topic`.
    async fn first_publish_on(stream: &mut TcpStream, topic: &str) -> Vec<u8> {
        let (header, _) = read_packet(stream).await;
        assert_eq!(header >> 4, 1, "expected CONNECT");
        stream.write_all(&[0x20, 0x02, 0x00, 0x00]).await.unwrap();

        loop {
            let (header, body) = read_packet(stream).await;
            if header >> 4 != 3 {
                continue;
            }
            let topic_len = u16::from_be_bytes([body[0], body[1]]) as usize;
            let name = std::str::from_utf8(&body[2..2 + topic_len]).unwrap();
            let qos = (header >> 1) & 0x03;
            let payload_at = 2 + topic_len + if qos > 0 { 2 } else { 0 };
            if name == topic {
                return body[payload_at..].to_vec();
            }
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_initial_mode_reaches_cloud_adapter() {
        let broker = TcpListener::bind("127.0.0.1:0").await.unwrap();

        let mut config = ControlUnitConfig::default();
        config.hardware.enabled = false;
        config.dashboard.enabled = false;
        config.cloud.host = "127.0.0.1".to_string();
        config.cloud.port = broker.local_addr().unwrap().port();
        let mode_topic = config.cloud.mode_topic.clone();

        let mut container = ServiceContainer::build(&config).unwrap();
        container.start().await.unwrap();

        let (mut stream, _) = timeout(Duration::from_secs(5), broker.accept())
            .await
            .expect("cloud adapter never connected")
            .unwrap();
        // The controller announces UNCONNECTED once, during its setup.
        let payload = timeout(
            Duration::from_secs(5),
            first_publish_on(&mut stream, &mode_topic),
        )
        .await
        .expect("initial mode never mirrored to the broker");
        let body: serde_json::Value = serde_json::from_slice(&payload).unwrap();
        assert_eq!(body["mode"], "UNCONNECTED");

        container.stop().await;
    }
}
