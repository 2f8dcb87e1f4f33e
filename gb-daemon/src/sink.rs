//! Time-series sink
//!
//! Pushes one line-protocol sample per minute to the configured database
//! host: `POST /write?db=&u=&p=` with `measurement field=value,...` as the
//! body, expecting `204 No Content`. Any other outcome drops the sample
//! with a warning — history is the database's problem, not ours.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use gb_core::constants::timing::{SINK_INTERVAL, SINK_PING_TIMEOUT};
use gb_core::data::config::NetworkSettings;
use gb_core::sensors::SensorId;
use gb_error::{GrowboxError, Result};
use gb_protocol::encode_line;

use crate::state::AppState;

/// Measurement name for every pushed sample.
const MEASUREMENT: &str = "growbox";

/// One-shot startup reachability probe of the sink host.
pub async fn ping_host(host: &str, port: u16) -> bool {
    match timeout(SINK_PING_TIMEOUT, TcpStream::connect((host, port))).await {
        Ok(Ok(_)) => {
            info!("Sink host {}:{} is reachable", host, port);
            true
        }
        Ok(Err(e)) => {
            warn!("Sink host {}:{} unreachable: {}", host, port, e);
            false
        }
        Err(_) => {
            warn!("Sink host {}:{} ping timed out", host, port);
            false
        }
    }
}

pub async fn run_sink_loop(state: Arc<AppState>) {
    info!("sink: push task started");

    while !state.shutting_down() {
        tokio::time::sleep(SINK_INTERVAL).await;
        if state.shutting_down() {
            break;
        }

        if !state.host_reachable.load(Ordering::SeqCst) {
            debug!("sink: host not reachable, skipping sample");
            continue;
        }

        let network = state.snapshot().await.network;

        let mut fields = Vec::new();
        for id in SensorId::ALL {
            if let Some(value) = state.read_sensor(id).await {
                fields.push((id.as_str().to_string(), value));
            }
        }
        let Some(line) = encode_line(MEASUREMENT, &fields) else {
            debug!("sink: no readings this tick");
            continue;
        };

        if let Err(e) = push_sample(&network, &line).await {
            warn!("sink: push failed, sample dropped: {}", e);
        }
    }
    info!("sink: push task stopped");
}

/// POST one sample. The exchange is a single HTTP/1.1 request over a fresh
/// connection; only a `204` status counts as accepted.
pub async fn push_sample(network: &NetworkSettings, body: &str) -> Result<()> {
    let mut stream = TcpStream::connect((network.host_addr.as_str(), network.db_port))
        .await
        .map_err(|e| GrowboxError::Sink(format!("connect: {}", e)))?;

    let request = format!(
        "POST /write?db={}&u={}&p={} HTTP/1.1\r\n\
Host: {}:{}\r\n\
Content-Type: text/plain\r\n\
Content-Length: {}\r\n\
Connection: close\r\n\r\n{}",
        network.db_name,
        network.db_user,
        network.db_pass,
        network.host_addr,
        network.db_port,
        body.len(),
        body
    );

    stream
        .write_all(request.as_bytes())
        .await
        .map_err(|e| GrowboxError::Sink(format!("write: {}", e)))?;

    let mut response = vec![0u8; 256];
    let n = stream
        .read(&mut response)
        .await
        .map_err(|e| GrowboxError::Sink(format!("read: {}", e)))?;
    let status_line = String::from_utf8_lossy(&response[..n]);

    let code = status_line
        .split_whitespace()
        .nth(1)
        .unwrap_or("<none>");
    if code != "204" {
        return Err(GrowboxError::Sink(format!(
            "expected 204, got {}",
            code
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    async fn spawn_responder(status_line: &'static str) -> (NetworkSettings, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 2048];
            let n = stream.read(&mut buf).await.unwrap();
            stream
                .write_all(format!("{}\r\n\r\n", status_line).as_bytes())
                .await
                .unwrap();
            String::from_utf8_lossy(&buf[..n]).into_owned()
        });

        let network = NetworkSettings {
            host_addr: "127.0.0.1".into(),
            db_port: addr.port(),
            db_name: "growbox".into(),
            db_user: "writer".into(),
            db_pass: "secret".into(),
            ..NetworkSettings::default()
        };
        (network, handle)
    }

    #[tokio::test]
    async fn accepted_sample_returns_ok() {
        let (network, server) = spawn_responder("HTTP/1.1 204 No Content").await;

        push_sample(&network, "growbox BME280T=23.5").await.unwrap();

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /write?db=growbox&u=writer&p=secret HTTP/1.1"));
        assert!(request.ends_with("growbox BME280T=23.5"));
    }

    #[tokio::test]
    async fn non_204_drops_sample() {
        let (network, _server) = spawn_responder("HTTP/1.1 500 Internal Server Error").await;

        let err = push_sample(&network, "growbox BME280T=23.5").await.unwrap_err();
        assert!(err.to_string().contains("500"));
    }

    #[tokio::test]
    async fn unreachable_host_is_an_error() {
        let network = NetworkSettings {
            host_addr: "127.0.0.1".into(),
            db_port: 1, // nothing listens here
            ..NetworkSettings::default()
        };
        assert!(push_sample(&network, "growbox x=1").await.is_err());
    }
}
