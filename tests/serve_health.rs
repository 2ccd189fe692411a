//! Boots the real binary and exercises the out-of-band HTTP surface. The
//! log backend is pointed at a dead port: the service must come up healthy
//! and report the backend as disconnected.

use std::net::TcpListener;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use serde_json::Value;

fn find_free_port() -> u16 {
    TcpListener::bind(("127.0.0.1", 0))
        .expect("bind probe port")
        .local_addr()
        .expect("local addr")
        .port()
}

struct ServeGuard(Child);

impl Drop for ServeGuard {
    fn drop(&mut self) {
        let _ = self.0.kill();
        let _ = self.0.wait();
    }
}

fn spawn_serve(ws_port: u16, health_port: u16) -> ServeGuard {
    let bin = assert_cmd::cargo::cargo_bin!("cis-interceptor");
    let child = Command::new(bin)
        .env("WS_PORT", ws_port.to_string())
        .env("HEALTH_PORT", health_port.to_string())
        // A port nothing listens on, so the sink stays disconnected.
        .env("REDIS_PORT", find_free_port().to_string())
        .args(["serve"])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn serve");
    ServeGuard(child)
}

fn wait_for_health(client: &Client, port: u16) {
    let url = format!("http://127.0.0.1:{port}/health");
    for _ in 0..60 {
        if let Ok(response) = client.get(&url).send() {
            if response.status().is_success() {
                return;
            }
        }
        thread::sleep(Duration::from_millis(100));
    }
    panic!("interceptor did not become ready on port {port}");
}

#[test]
fn health_metrics_and_unknown_paths() {
    let ws_port = find_free_port();
    let health_port = find_free_port();
    let _serve = spawn_serve(ws_port, health_port);

    let client = Client::builder()
        .timeout(Duration::from_secs(2))
        .build()
        .expect("client");

    wait_for_health(&client, health_port);

    let health: Value = client
        .get(format!("http://127.0.0.1:{health_port}/health"))
        .send()
        .expect("health request")
        .json()
        .expect("health json");
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["checks"]["websocket"], "up");
    assert_eq!(health["checks"]["circuit_breaker"], "closed");
    assert_eq!(health["checks"]["log_backend"], "disconnected");

    let metrics_response = client
        .get(format!("http://127.0.0.1:{health_port}/metrics"))
        .send()
        .expect("metrics request");
    assert!(metrics_response.status().is_success());
    let metrics: Value = metrics_response.json().expect("metrics json");
    assert_eq!(metrics["circuit_breaker"]["state"], "closed");
    assert_eq!(metrics["circuit_breaker"]["failure_count"], 0);
    assert_eq!(metrics["log_backend"]["connected"], false);
    assert!(metrics["log_backend"]["stream_length"].is_null());
    assert_eq!(metrics["connections"]["active"], 0);

    let missing = client
        .get(format!("http://127.0.0.1:{health_port}/nope"))
        .send()
        .expect("fallback request");
    assert_eq!(missing.status().as_u16(), 404);
    let body: Value = missing.json().expect("fallback json");
    assert_eq!(body["error"], "Not found");
}
