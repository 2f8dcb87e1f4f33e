//! HTML page rendering
//!
//! The UI is three static pages rendered per request from the current
//! snapshot. Failing sensors render a placeholder cell; the page itself
//! always comes up from the last known good configuration.

use gb_core::data::config::ConfigSnapshot;
use gb_core::data::extrema::ExtremaRecord;
use gb_core::engine::fan::FanMode;
use gb_protocol::ReadingMap;

const PAGE_STYLE: &str = "body{font-family:sans-serif;margin:2em}table{border-collapse:collapse}\
td,th{border:1px solid #999;padding:4px 8px}h1{font-size:1.4em}";

fn page(title: &str, body: String) -> String {
    format!(
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>{title}</title>\
<style>{PAGE_STYLE}</style></head><body><h1>{title}</h1>\
<p><a href=\"/\">status</a> | <a href=\"/conf\">configuration</a> | \
<a href=\"/monitor\">monitor</a></p>{body}</body></html>\n"
    )
}

fn cell(value: &Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.1}", v),
        None => "--".into(),
    }
}

/// `GET /` — current readings and output states.
pub fn status_page(
    cfg: &ConfigSnapshot,
    readings: &ReadingMap,
    motor_speed: Option<u8>,
) -> String {
    let mut rows = String::new();
    for (id, value) in readings {
        rows.push_str(&format!("<tr><td>{}</td><td>{}</td></tr>", id, cell(value)));
    }

    let speed = motor_speed
        .map(|s| s.to_string())
        .unwrap_or_else(|| "--".into());

    let body = format!(
        "<h2>Chamber</h2>\
<p>Stage: {stage} | Heater: {heater} | Fan speed: {speed}</p>\
<h2>Sensors</h2><table><tr><th>Sensor</th><th>Reading</th></tr>{rows}</table>",
        stage = cfg.life_period.stage,
        heater = if cfg.heater.enabled { "enabled" } else { "disabled" },
    );
    page("Growbox", body)
}

/// `GET /conf` — the editable configuration, echoed back after updates.
pub fn conf_page(cfg: &ConfigSnapshot) -> String {
    let mode = match cfg.motor.mode {
        FanMode::Manual => "manual",
        FanMode::Auto => "auto",
    };

    let body = format!(
        "<h2>Daily timers</h2><table>\
<tr><th></th><th>start</th><th>stop</th></tr>\
<tr><td>timer 1</td><td>{d1sh:02}:{d1sm:02}</td><td>{d1th:02}:{d1tm:02}</td></tr>\
<tr><td>timer 2</td><td>{d2sh:02}:{d2sm:02}</td><td>{d2th:02}:{d2tm:02}</td></tr></table>\
<h2>Cyclic outlets</h2><table>\
<tr><th></th><th>period (min)</th><th>duration (s)</th></tr>\
<tr><td>cyclic 1</td><td>{c1p}</td><td>{c1d}</td></tr>\
<tr><td>cyclic 2</td><td>{c2p}</td><td>{c2d}</td></tr></table>\
<h2>Heater</h2>\
<p>{heater}; day {min_day}-{max_day} &deg;C, night {min_night}-{max_night} &deg;C, \
offset {off} &deg;C</p>\
<h2>Fan</h2>\
<p>mode {mode}, user speed {user}, target {target} &deg;C, hysteresis {hyst} &deg;C, \
range {mn}-{mx}</p>\
<h2>Network</h2>\
<p>sink {host}:{port}/{db} ({reach})</p>",
        d1sh = cfg.daily_timer1.start_hour,
        d1sm = cfg.daily_timer1.start_minute,
        d1th = cfg.daily_timer1.stop_hour,
        d1tm = cfg.daily_timer1.stop_minute,
        d2sh = cfg.daily_timer2.start_hour,
        d2sm = cfg.daily_timer2.start_minute,
        d2th = cfg.daily_timer2.stop_hour,
        d2tm = cfg.daily_timer2.stop_minute,
        c1p = cfg.cyclic1.period_minutes,
        c1d = cfg.cyclic1.action_duration_seconds,
        c2p = cfg.cyclic2.period_minutes,
        c2d = cfg.cyclic2.action_duration_seconds,
        heater = if cfg.heater.enabled { "enabled" } else { "disabled" },
        min_day = cfg.temperature.min_day,
        max_day = cfg.temperature.max_day,
        min_night = cfg.temperature.min_night,
        max_night = cfg.temperature.max_night,
        off = cfg.temperature.hysteresis_offset,
        user = cfg.motor.user_speed,
        target = cfg.motor.target_temp,
        hyst = cfg.motor.hysteresis,
        mn = cfg.motor.min_speed,
        mx = cfg.motor.max_speed,
        host = cfg.network.host_addr,
        port = cfg.network.db_port,
        db = cfg.network.db_name,
        reach = if cfg.network.host_reachable {
            "reachable"
        } else {
            "unreachable"
        },
    );
    page("Growbox configuration", body)
}

/// `GET /monitor` — persisted extrema with reset links.
pub fn monitor_page(extrema: &[(String, ExtremaRecord)]) -> String {
    let mut rows = String::new();
    for (id, rec) in extrema {
        rows.push_str(&format!(
            "<tr><td>{id}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td>\
<td><a href=\"/monitor?reset_{id}=1\">reset</a></td></tr>",
            cell(&rec.min),
            rec.min_date.as_deref().unwrap_or("--"),
            cell(&rec.max),
            rec.max_date.as_deref().unwrap_or("--"),
        ));
    }
    if rows.is_empty() {
        rows = "<tr><td colspan=\"6\">no observations yet</td></tr>".into();
    }

    let body = format!(
        "<table><tr><th>Sensor</th><th>min</th><th>since</th><th>max</th>\
<th>since</th><th></th></tr>{rows}</table>"
    );
    page("Growbox monitor", body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gb_core::data::extrema::ExtremaRecord;

    #[test]
    fn status_page_shows_placeholder_for_failing_sensor() {
        let mut readings = ReadingMap::new();
        readings.insert("BME280T".into(), Some(23.45));
        readings.insert("TSL-LUX".into(), None);

        let html = status_page(&ConfigSnapshot::default(), &readings, None);
        assert!(html.contains("23.5") || html.contains("23.4"));
        assert!(html.contains("--"));
    }

    #[test]
    fn conf_page_renders_windows() {
        let html = conf_page(&ConfigSnapshot::default());
        assert!(html.contains("06:00"));
        assert!(html.contains("22:00"));
    }

    #[test]
    fn monitor_page_links_resets() {
        let rec = ExtremaRecord {
            min: Some(18.0),
            min_date: Some("2026-03-14T04:12:00".into()),
            max: Some(27.5),
            max_date: Some("2026-03-14T14:02:00".into()),
        };
        let html = monitor_page(&[("BME280T".into(), rec)]);
        assert!(html.contains("reset_BME280T"));
        assert!(html.contains("27.5"));
    }
}
