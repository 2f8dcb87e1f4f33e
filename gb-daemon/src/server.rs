//! HTTP facade
//!
//! A line-based HTTP/1.1 reader on port 8123: parse the request line,
//! discard headers until the blank line, answer, close. Only `GET` is
//! accepted. The facade is the single writer of the configuration store —
//! every mutation happens under the snapshot's write lock and is persisted
//! before the lock is released, so readers never observe a partial
//! document.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use gb_core::constants::http::{BIND_ADDR, MAX_CONNECTIONS, READ_TIMEOUT, WRITE_TIMEOUT};
use gb_core::data::config::ConfigSnapshot;
use gb_core::sensors::SensorId;
use gb_protocol::{
    parse_bool_flag, parse_hhmm, parse_positive_u32, parse_query, parse_speed, CycleReport,
    ReadingMap, StatusReport, WindowReport, MAX_REQUEST_LINE,
};

use crate::html;
use crate::state::AppState;

/// Sensor channels served by `/temperature`.
const TEMPERATURE_IDS: [SensorId; 6] = [
    SensorId::Bme280Temp,
    SensorId::Ds18b1,
    SensorId::Ds18b2,
    SensorId::Ds18b3,
    SensorId::MlxAmbient,
    SensorId::MlxObject,
];

/// Global connection counter
static ACTIVE_CONNECTIONS: AtomicUsize = AtomicUsize::new(0);

/// Bind and serve forever.
pub async fn run_server(state: Arc<AppState>, port: u16) -> anyhow::Result<()> {
    let listener = TcpListener::bind((BIND_ADDR, port)).await?;
    info!("HTTP facade listening on {}:{}", BIND_ADDR, port);
    serve(state, listener).await
}

/// Accept loop over an already-bound listener (test seam).
pub async fn serve(state: Arc<AppState>, listener: TcpListener) -> anyhow::Result<()> {
    loop {
        let (stream, addr) = listener.accept().await?;

        let current = ACTIVE_CONNECTIONS.load(Ordering::SeqCst);
        if current >= MAX_CONNECTIONS {
            warn!("Connection limit reached ({}), rejecting {}", current, addr);
            drop(stream);
            continue;
        }

        ACTIVE_CONNECTIONS.fetch_add(1, Ordering::SeqCst);
        let state = state.clone();
        tokio::spawn(async move {
            handle_client(stream, state).await;
            ACTIVE_CONNECTIONS.fetch_sub(1, Ordering::SeqCst);
        });
    }
}

// ============================================================================
// Connection handling
// ============================================================================

async fn handle_client(stream: TcpStream, state: Arc<AppState>) {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line: Vec<u8> = Vec::with_capacity(512);

    // Request line, with the per-line timeout. An expired read closes the
    // connection without a response.
    let request_line = match timeout(
        READ_TIMEOUT,
        read_line_bounded(&mut reader, &mut line, MAX_REQUEST_LINE),
    )
    .await
    {
        Ok(Ok(0)) => return, // Early EOF.
        Ok(Ok(_)) => match std::str::from_utf8(&line) {
            Ok(s) => s.trim_end().to_string(),
            Err(_) => {
                let _ = write_response(&mut writer, bad_request("non-UTF8 request line")).await;
                return;
            }
        },
        Ok(Err(e)) => {
            debug!("Request line read failed: {}", e);
            let _ = write_response(&mut writer, bad_request("unreadable request line")).await;
            return;
        }
        Err(_) => {
            debug!("Request line read timed out");
            return;
        }
    };

    // Discard headers until the blank line; a client that never sends it
    // runs into the same per-line timeout.
    loop {
        match timeout(
            READ_TIMEOUT,
            read_line_bounded(&mut reader, &mut line, MAX_REQUEST_LINE),
        )
        .await
        {
            Ok(Ok(0)) => break,
            Ok(Ok(_)) => {
                if line == b"\r\n" || line == b"\n" {
                    break;
                }
            }
            Ok(Err(_)) | Err(_) => return,
        }
    }

    let response = match parse_request_line(&request_line) {
        Ok((method, path, query)) => route(&state, method, path, query).await,
        Err(reason) => {
            warn!("Malformed request line ({}): {:?}", reason, request_line);
            bad_request(&reason)
        }
    };

    let _ = write_response(&mut writer, response).await;
}

/// Read one `\n`-terminated line, refusing to buffer more than `max_len`.
async fn read_line_bounded<R: AsyncBufRead + Unpin>(
    reader: &mut R,
    out: &mut Vec<u8>,
    max_len: usize,
) -> std::io::Result<usize> {
    out.clear();

    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            return Ok(out.len());
        }

        let mut take_len = available.len();
        let mut found_newline = false;
        if let Some(pos) = available.iter().position(|b| *b == b'\n') {
            take_len = pos + 1;
            found_newline = true;
        }

        let remaining = max_len.saturating_sub(out.len());
        if take_len > remaining {
            let consume_len = remaining.min(available.len());
            reader.consume(consume_len);
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "Request line too long",
            ));
        }

        out.extend_from_slice(&available[..take_len]);
        reader.consume(take_len);

        if found_newline {
            return Ok(out.len());
        }
    }
}

/// Split `GET /conf?k=v HTTP/1.1` into (method, path, query).
fn parse_request_line(line: &str) -> Result<(&str, &str, &str), String> {
    let mut parts = line.split_whitespace();
    let method = parts.next().ok_or("empty request line")?;
    let target = parts.next().ok_or("missing request target")?;
    let version = parts.next().ok_or("missing HTTP version")?;
    if !version.starts_with("HTTP/1.") {
        return Err(format!("unsupported version {:?}", version));
    }
    if !target.starts_with('/') {
        return Err(format!("invalid request target {:?}", target));
    }
    let (path, query) = match target.split_once('?') {
        Some((p, q)) => (p, q),
        None => (target, ""),
    };
    Ok((method, path, query))
}

// ============================================================================
// Responses
// ============================================================================

struct HttpResponse {
    status: u16,
    reason: &'static str,
    content_type: &'static str,
    body: String,
}

fn html_page(body: String) -> HttpResponse {
    HttpResponse {
        status: 200,
        reason: "OK",
        content_type: "text/html; charset=utf-8",
        body,
    }
}

fn json_body(body: String) -> HttpResponse {
    HttpResponse {
        status: 200,
        reason: "OK",
        content_type: "application/json",
        body,
    }
}

fn bad_request(reason: &str) -> HttpResponse {
    HttpResponse {
        status: 400,
        reason: "Bad Request",
        content_type: "text/html; charset=utf-8",
        body: format!("<html><body><h1>400 Bad Request</h1><p>{}</p></body></html>\n", reason),
    }
}

fn not_found() -> HttpResponse {
    HttpResponse {
        status: 404,
        reason: "Not Found",
        content_type: "text/html; charset=utf-8",
        body: "<html><body><h1>404 Not Found</h1></body></html>\n".into(),
    }
}

fn method_not_allowed() -> HttpResponse {
    HttpResponse {
        status: 405,
        reason: "Method Not Allowed",
        content_type: "text/html; charset=utf-8",
        body: "<html><body><h1>405 Method Not Allowed</h1></body></html>\n".into(),
    }
}

async fn write_response(
    writer: &mut tokio::net::tcp::OwnedWriteHalf,
    response: HttpResponse,
) -> Result<(), ()> {
    let head = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        response.status,
        response.reason,
        response.content_type,
        response.body.len()
    );

    let result = timeout(WRITE_TIMEOUT, async {
        writer.write_all(head.as_bytes()).await?;
        writer.write_all(response.body.as_bytes()).await?;
        writer.flush().await?;
        Ok::<_, std::io::Error>(())
    })
    .await;

    match result {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => {
            debug!("Response write failed: {}", e);
            Err(())
        }
        Err(_) => {
            debug!("Response write timed out");
            Err(())
        }
    }
}

// ============================================================================
// Routing
// ============================================================================

async fn route(state: &AppState, method: &str, path: &str, query: &str) -> HttpResponse {
    if method != "GET" {
        return method_not_allowed();
    }

    match path {
        "/" => {
            let cfg = state.snapshot().await;
            let readings = collect_readings(state, &SensorId::ALL).await;
            html_page(html::status_page(&cfg, &readings, state.motor_speed()))
        }
        "/conf" => {
            apply_conf_fields(state, query).await;
            let cfg = state.snapshot().await;
            html_page(html::conf_page(&cfg))
        }
        "/monitor" => {
            apply_monitor_resets(state, query);
            html_page(html::monitor_page(&state.hub.extrema_snapshot()))
        }
        "/status" => {
            let cfg = state.snapshot().await;
            let report = status_report(&cfg, state.motor_speed());
            json_body(serde_json::to_string(&report).unwrap_or_else(|_| "{}".into()))
        }
        "/temperature" => reading_json(state, &TEMPERATURE_IDS).await,
        "/hygrometry" => reading_json(state, &[SensorId::Bme280Humidity]).await,
        "/pressure" => reading_json(state, &[SensorId::Bme280Pressure]).await,
        _ => not_found(),
    }
}

fn status_report(cfg: &ConfigSnapshot, motor_speed: Option<u8>) -> StatusReport {
    StatusReport {
        component_state: if cfg.heater.enabled {
            "Enabled".into()
        } else {
            "Disabled".into()
        },
        motor_speed,
        dailytimer1: WindowReport::new(
            (cfg.daily_timer1.start_hour, cfg.daily_timer1.start_minute),
            (cfg.daily_timer1.stop_hour, cfg.daily_timer1.stop_minute),
        ),
        cyclic: CycleReport {
            period: cfg.cyclic1.period_minutes,
            duration: cfg.cyclic1.action_duration_seconds,
        },
    }
}

async fn collect_readings(state: &AppState, ids: &[SensorId]) -> ReadingMap {
    let mut map = ReadingMap::new();
    for id in ids {
        map.insert(id.as_str().to_string(), state.read_sensor(*id).await);
    }
    map
}

async fn reading_json(state: &AppState, ids: &[SensorId]) -> HttpResponse {
    let map = collect_readings(state, ids).await;
    json_body(serde_json::to_string(&map).unwrap_or_else(|_| "{}".into()))
}

// ============================================================================
// /conf field application
// ============================================================================

/// Apply every recognized query field, rejecting invalid ones individually,
/// then persist the full configuration once. Returns the applied count.
async fn apply_conf_fields(state: &AppState, query: &str) -> usize {
    let fields = parse_query(query);
    if fields.is_empty() {
        return 0;
    }

    let mut cfg = state.config.write().await;
    let mut applied = 0;

    for (key, value) in &fields {
        match apply_field(&mut cfg, key, value) {
            Ok(()) => applied += 1,
            Err(reason) => warn!("Rejected field {}={:?}: {}", key, value, reason),
        }
    }

    if applied > 0 {
        state.persist(&cfg);
        info!("Applied {} configuration field(s)", applied);
    }

    applied
}

fn apply_field(cfg: &mut ConfigSnapshot, key: &str, value: &str) -> Result<(), String> {
    match key {
        "dt1start" => {
            let (h, m) = parse_hhmm(value)?;
            cfg.daily_timer1.start_hour = h;
            cfg.daily_timer1.start_minute = m;
        }
        "dt1stop" => {
            let (h, m) = parse_hhmm(value)?;
            cfg.daily_timer1.stop_hour = h;
            cfg.daily_timer1.stop_minute = m;
        }
        "dt2start" => {
            let (h, m) = parse_hhmm(value)?;
            cfg.daily_timer2.start_hour = h;
            cfg.daily_timer2.start_minute = m;
        }
        "dt2stop" => {
            let (h, m) = parse_hhmm(value)?;
            cfg.daily_timer2.stop_hour = h;
            cfg.daily_timer2.stop_minute = m;
        }
        "period" => cfg.cyclic1.period_minutes = parse_positive_u32(value)?,
        "duration" => cfg.cyclic1.action_duration_seconds = parse_positive_u32(value)?,
        "period2" => cfg.cyclic2.period_minutes = parse_positive_u32(value)?,
        "duration2" => cfg.cyclic2.action_duration_seconds = parse_positive_u32(value)?,
        "min_day" => cfg.temperature.min_day = parse_float(value)?,
        "max_day" => cfg.temperature.max_day = parse_float(value)?,
        "min_night" => cfg.temperature.min_night = parse_float(value)?,
        "max_night" => cfg.temperature.max_night = parse_float(value)?,
        "hysteresis_offset" => cfg.temperature.hysteresis_offset = parse_float(value)?,
        "heater_enabled" => {
            cfg.heater.enabled = parse_bool_flag(value)
                .ok_or_else(|| format!("unrecognized boolean {:?}", value))?
        }
        "stage" => cfg.life_period.stage = value.to_string(),
        "motor_mode" => {
            cfg.motor.mode = match value.to_ascii_lowercase().as_str() {
                "manual" => gb_core::engine::fan::FanMode::Manual,
                "auto" => gb_core::engine::fan::FanMode::Auto,
                other => return Err(format!("unrecognized mode {:?}", other)),
            }
        }
        "speed" => cfg.motor.user_speed = parse_speed(value)?,
        "target_temp" => cfg.motor.target_temp = parse_float(value)?,
        "hysteresis" => cfg.motor.hysteresis = parse_float(value)?,
        "min_speed" => {
            let s = parse_speed(value)?;
            if s > cfg.motor.max_speed {
                return Err(format!(
                    "min_speed {} would exceed max_speed {}",
                    s, cfg.motor.max_speed
                ));
            }
            cfg.motor.min_speed = s;
        }
        "max_speed" => {
            let s = parse_speed(value)?;
            if s < cfg.motor.min_speed {
                return Err(format!(
                    "max_speed {} would undercut min_speed {}",
                    s, cfg.motor.min_speed
                ));
            }
            cfg.motor.max_speed = s;
        }
        "host" => {
            value
                .parse::<std::net::IpAddr>()
                .map_err(|_| format!("not a valid IP address: {:?}", value))?;
            cfg.network.host_addr = value.to_string();
        }
        "wifi_ssid" => cfg.network.wifi_ssid = value.to_string(),
        "wifi_password" => cfg.network.wifi_pass = value.to_string(),
        "influx_db" => cfg.network.db_name = value.to_string(),
        "influx_port" => {
            cfg.network.db_port = value
                .parse::<u16>()
                .map_err(|_| format!("not a valid port: {:?}", value))?
        }
        "influx_user" => cfg.network.db_user = value.to_string(),
        "influx_pw" => cfg.network.db_pass = value.to_string(),
        k if k.ends_with("_pin") => {
            let pin: u32 = value
                .parse()
                .map_err(|_| format!("not a pin number: {:?}", value))?;
            if !cfg.gpio.set_pin(k, pin) {
                return Err("unrecognized field".into());
            }
        }
        k if k.ends_with("_state") => {
            let enabled =
                parse_bool_flag(value).ok_or_else(|| format!("unrecognized state {:?}", value))?;
            if !cfg.sensors.set_state(k, enabled) {
                return Err("unrecognized field".into());
            }
        }
        _ => return Err("unrecognized field".into()),
    }
    Ok(())
}

/// Reset extrema for every `reset_<sensor>` key in the query.
fn apply_monitor_resets(state: &AppState, query: &str) {
    for (key, _) in parse_query(query) {
        let Some(name) = key.strip_prefix("reset_") else {
            if !key.is_empty() {
                warn!("Ignoring unrecognized monitor field {:?}", key);
            }
            continue;
        };
        match SensorId::parse(name) {
            Some(id) => {
                if let Err(e) = state.hub.reset_extrema(id.as_str()) {
                    warn!("Extrema reset for {} failed: {}", id.as_str(), e);
                } else {
                    info!("Extrema reset for {}", id.as_str());
                }
            }
            None => warn!("Ignoring reset for unknown sensor {:?}", name),
        }
    }
}

fn parse_float(value: &str) -> Result<f64, String> {
    let v: f64 = value
        .parse()
        .map_err(|_| format!("expected a number, got {:?}", value))?;
    if !v.is_finite() {
        return Err(format!("non-finite number {:?}", value));
    }
    Ok(v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gb_core::data::persistence::{load_config, save_config};
    use gb_core::sensors::SensorHub;
    use tokio::io::AsyncReadExt;

    fn test_state() -> (tempfile::TempDir, Arc<AppState>) {
        let tmp = tempfile::tempdir().unwrap();
        let config_path = tmp.path().join("param.json");
        let cfg = ConfigSnapshot::default();
        save_config(&config_path, &cfg).unwrap();

        let hub = SensorHub::discover_at(
            &tmp.path().join("iio"),
            &tmp.path().join("w1"),
            &tmp.path().join("sensor_stats.json"),
        );
        let state = Arc::new(AppState::new(cfg, config_path, hub));
        (tmp, state)
    }

    #[test]
    fn request_line_parsing() {
        assert_eq!(
            parse_request_line("GET /conf?a=1 HTTP/1.1").unwrap(),
            ("GET", "/conf", "a=1")
        );
        assert_eq!(
            parse_request_line("GET / HTTP/1.0").unwrap(),
            ("GET", "/", "")
        );
        assert!(parse_request_line("GET /").is_err());
        assert!(parse_request_line("").is_err());
        assert!(parse_request_line("GET example.com HTTP/1.1").is_err());
    }

    #[tokio::test]
    async fn non_get_is_405() {
        let (_tmp, state) = test_state();
        let resp = route(&state, "POST", "/conf", "").await;
        assert_eq!(resp.status, 405);
    }

    #[tokio::test]
    async fn unknown_path_is_404() {
        let (_tmp, state) = test_state();
        let resp = route(&state, "GET", "/nope", "").await;
        assert_eq!(resp.status, 404);
    }

    #[tokio::test]
    async fn conf_applies_and_persists_fields() {
        let (_tmp, state) = test_state();
        let resp = route(
            &state,
            "GET",
            "/conf",
            "dt1start=17%3A30&heater_enabled=1&bme280_state=enabled&mlx90614_state=enabled",
        )
        .await;
        assert_eq!(resp.status, 200);

        // In-memory snapshot updated.
        let cfg = state.snapshot().await;
        assert_eq!(cfg.daily_timer1.start_hour, 17);
        assert_eq!(cfg.daily_timer1.start_minute, 30);
        assert!(cfg.heater.enabled);
        assert!(cfg.sensors.bme280);
        assert!(cfg.sensors.mlx90614); // default-disabled flag flipped on

        // Persisted document round-trips, including the string booleans.
        let reloaded = load_config(&state.config_path).unwrap();
        assert_eq!(reloaded.daily_timer1.start_hour, 17);
        assert!(reloaded.heater.enabled);
        let raw = std::fs::read_to_string(&state.config_path).unwrap();
        assert!(raw.contains(r#""enabled": "enabled""#));
    }

    #[tokio::test]
    async fn rejected_field_leaves_config_unchanged() {
        let (_tmp, state) = test_state();
        let before = state.snapshot().await.daily_timer1;

        let resp = route(&state, "GET", "/conf", "dt1start=25:00").await;
        assert_eq!(resp.status, 200); // the page still renders

        let after = state.snapshot().await.daily_timer1;
        assert_eq!(before.start_hour, after.start_hour);
        assert_eq!(before.start_minute, after.start_minute);

        // And the file was not rewritten with the bad value either.
        let reloaded = load_config(&state.config_path).unwrap();
        assert_eq!(reloaded.daily_timer1.start_hour, before.start_hour);
    }

    #[tokio::test]
    async fn bad_field_does_not_block_good_field() {
        let (_tmp, state) = test_state();
        route(&state, "GET", "/conf", "dt1start=25:00&period=5").await;

        let cfg = state.snapshot().await;
        assert_eq!(cfg.daily_timer1.start_hour, 6); // unchanged default
        assert_eq!(cfg.cyclic1.period_minutes, 5);
    }

    #[tokio::test]
    async fn stop_fields_apply_independently_of_start() {
        let (_tmp, state) = test_state();
        route(&state, "GET", "/conf", "dt1stop=23:45").await;

        let cfg = state.snapshot().await;
        assert_eq!(cfg.daily_timer1.stop_hour, 23);
        assert_eq!(cfg.daily_timer1.stop_minute, 45);
        // start fields untouched.
        assert_eq!(cfg.daily_timer1.start_hour, 6);
        assert_eq!(cfg.daily_timer1.start_minute, 0);
    }

    #[tokio::test]
    async fn speed_pair_rejects_inversion() {
        let (_tmp, state) = test_state();
        route(&state, "GET", "/conf", "min_speed=4&max_speed=2").await;

        let cfg = state.snapshot().await;
        // min_speed=4 accepted (max is 4), max_speed=2 rejected.
        assert_eq!(cfg.motor.min_speed, 4);
        assert_eq!(cfg.motor.max_speed, 4);
    }

    #[tokio::test]
    async fn status_document_shape() {
        let (_tmp, state) = test_state();
        let resp = route(&state, "GET", "/status", "").await;
        assert_eq!(resp.status, 200);
        assert_eq!(resp.content_type, "application/json");

        let doc: serde_json::Value = serde_json::from_str(&resp.body).unwrap();
        assert_eq!(doc["component_state"], "Disabled");
        assert!(doc["motor_speed"].is_null());
        assert_eq!(doc["dailytimer1"]["start"], "06:00");
        assert_eq!(doc["cyclic"]["period"], 60);
    }

    #[tokio::test]
    async fn temperature_map_lists_all_channels_as_null_without_drivers() {
        let (_tmp, state) = test_state();
        let resp = route(&state, "GET", "/temperature", "").await;
        let doc: serde_json::Value = serde_json::from_str(&resp.body).unwrap();
        for id in ["BME280T", "DS18B#1", "DS18B#2", "DS18B#3", "MLX-AMB", "MLX-OBJ"] {
            assert!(doc[id].is_null(), "{} missing or not null", id);
        }
    }

    #[tokio::test]
    async fn pin_fields_route_to_gpio_block() {
        let (_tmp, state) = test_state();
        route(&state, "GET", "/conf", "heater_pin=26&made_up_pin=3").await;

        let cfg = state.snapshot().await;
        assert_eq!(cfg.gpio.heater_pin, 26);
    }

    #[tokio::test]
    async fn end_to_end_over_a_socket() {
        let (_tmp, state) = test_state();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(serve(state, listener));

        let mut client = TcpStream::connect(addr).await.unwrap();
        client
            .write_all(b"GET /status HTTP/1.1\r\nHost: growbox\r\n\r\n")
            .await
            .unwrap();
        let mut buf = String::new();
        client.read_to_string(&mut buf).await.unwrap();

        assert!(buf.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(buf.contains("Connection: close"));
        assert!(buf.contains("component_state"));

        server.abort();
    }

    #[tokio::test]
    async fn malformed_request_line_is_400() {
        let (_tmp, state) = test_state();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(serve(state, listener));

        let mut client = TcpStream::connect(addr).await.unwrap();
        client.write_all(b"NOT A REQUEST\r\n\r\n").await.unwrap();
        let mut buf = String::new();
        client.read_to_string(&mut buf).await.unwrap();

        assert!(buf.starts_with("HTTP/1.1 400 Bad Request\r\n"));

        server.abort();
    }
}
