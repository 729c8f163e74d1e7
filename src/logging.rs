//! Structured logging for the explanation client.
//!
//! Every record is a single JSON line carrying run id, sequence number,
//! level, domain and a `data` object. Lines go to stderr and to
//! `$LOG_DIR/<run_id>/events.jsonl` (debug/trace go to `trace.jsonl`).
//!
//! Filtering:
//! - `LOG_LEVEL` sets the minimum level (default `info`)
//! - `LOG_DOMAINS` is a comma-separated list of domains or `all`

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fs::{create_dir_all, File};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock};
use std::time::Instant;

// =============================================================================
// Log Levels
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
}

impl Level {
    pub fn from_env() -> Self {
        match std::env::var("LOG_LEVEL").as_deref() {
            Ok("trace") => Level::Trace,
            Ok("debug") => Level::Debug,
            Ok("info") => Level::Info,
            Ok("warn") => Level::Warn,
            Ok("error") => Level::Error,
            _ => Level::Info,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Trace => "trace",
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
        }
    }
}

// =============================================================================
// Log Domains (categories for filtering)
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Api,     // Outbound HTTP calls
    Upload,  // Asset validation and upload
    Job,     // Job start, result fetch, reset
    Poll,    // Status polling loop
    Render,  // Display model shaping
    System,  // Startup, shutdown, timers
    Profile, // Request timing
}

impl Domain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Api => "api",
            Domain::Upload => "upload",
            Domain::Job => "job",
            Domain::Poll => "poll",
            Domain::Render => "render",
            Domain::System => "system",
            Domain::Profile => "profile",
        }
    }

    pub fn is_enabled(&self) -> bool {
        match std::env::var("LOG_DOMAINS").as_deref() {
            Ok("all") | Err(_) => true,
            Ok(domains) => domains.split(',').any(|d| d.trim() == self.as_str()),
        }
    }
}

// =============================================================================
// Run context
// =============================================================================

static LOG_SEQ: AtomicU64 = AtomicU64::new(0);
static RUN_CONTEXT: OnceLock<RunContext> = OnceLock::new();

fn next_seq() -> u64 {
    LOG_SEQ.fetch_add(1, Ordering::SeqCst)
}

#[derive(Debug)]
struct RunContext {
    run_id: String,
    events: Option<Mutex<BufWriter<File>>>,
    trace: Option<Mutex<BufWriter<File>>>,
}

fn open_sink(path: PathBuf) -> Option<Mutex<BufWriter<File>>> {
    match File::create(&path) {
        Ok(file) => Some(Mutex::new(BufWriter::new(file))),
        Err(err) => {
            eprintln!("[log] failed to create {}: {}", path.display(), err);
            None
        }
    }
}

fn ensure_run_context() -> &'static RunContext {
    RUN_CONTEXT.get_or_init(|| {
        let run_id = std::env::var("RUN_ID")
            .unwrap_or_else(|_| format!("r-{}-{}", ts_epoch_ms(), process::id()));
        let base = std::env::var("LOG_DIR").unwrap_or_else(|_| "out/runs".to_string());
        let mut run_dir = PathBuf::from(base);
        run_dir.push(&run_id);
        if let Err(err) = create_dir_all(&run_dir) {
            eprintln!("[log] failed to create run dir: {}", err);
        }

        let _ = std::fs::write(
            run_dir.join("manifest.json"),
            json!({
                "run_id": run_id,
                "ts": ts_now(),
                "pid": process::id(),
                "log_dir": run_dir.to_string_lossy(),
            })
            .to_string(),
        );

        RunContext {
            events: open_sink(run_dir.join("events.jsonl")),
            trace: open_sink(run_dir.join("trace.jsonl")),
            run_id,
        }
    })
}

fn sanitize_fields(mut fields: Map<String, Value>) -> Map<String, Value> {
    let redacted = Value::String("[REDACTED]".to_string());
    for key in ["authorization", "Authorization", "api_key", "token"] {
        if fields.contains_key(key) {
            fields.insert(key.to_string(), redacted.clone());
        }
    }
    fields
}

fn split_fields(mut fields: Map<String, Value>) -> (Map<String, Value>, Map<String, Value>) {
    let mut top = Map::new();
    for key in ["task_id", "asset_kind", "msg"] {
        if let Some(value) = fields.remove(key) {
            top.insert(key.to_string(), value);
        }
    }
    (top, fields)
}

fn write_line(writer: &Option<Mutex<BufWriter<File>>>, line: &str) {
    if let Some(writer) = writer {
        if let Ok(mut w) = writer.lock() {
            let _ = writeln!(w, "{}", line);
            let _ = w.flush();
        }
    }
}

// =============================================================================
// Core logging functions
// =============================================================================

/// RFC3339 timestamp with milliseconds
pub fn ts_now() -> String {
    Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Epoch milliseconds
pub fn ts_epoch_ms() -> u64 {
    Utc::now().timestamp_millis() as u64
}

/// Emit a structured log entry
pub fn log(level: Level, domain: Domain, event: &str, fields: Map<String, Value>) {
    let min_level = Level::from_env();
    if level < min_level || !domain.is_enabled() {
        return;
    }

    let ctx = ensure_run_context();
    let fields = sanitize_fields(fields);
    let (mut top, data) = split_fields(fields);

    let msg = top.remove("msg").unwrap_or(Value::String(String::new()));
    let mut entry = Map::new();
    entry.insert("ts".to_string(), json!(ts_now()));
    entry.insert("run_id".to_string(), json!(ctx.run_id.clone()));
    entry.insert("seq".to_string(), json!(next_seq()));
    entry.insert("lvl".to_string(), json!(level.as_str().to_uppercase()));
    entry.insert("domain".to_string(), json!(domain.as_str()));
    entry.insert("event".to_string(), json!(event));
    entry.insert("msg".to_string(), msg);
    for (k, v) in top {
        entry.insert(k, v);
    }
    entry.insert("data".to_string(), Value::Object(data));

    let line = Value::Object(entry).to_string();
    match level {
        Level::Trace | Level::Debug => write_line(&ctx.trace, &line),
        _ => write_line(&ctx.events, &line),
    }
    eprintln!("{}", line);
}

pub fn info(domain: Domain, event: &str, fields: Map<String, Value>) {
    log(Level::Info, domain, event, fields);
}

pub fn warn(domain: Domain, event: &str, fields: Map<String, Value>) {
    log(Level::Warn, domain, event, fields);
}

pub fn error(domain: Domain, event: &str, fields: Map<String, Value>) {
    log(Level::Error, domain, event, fields);
}

pub fn debug(domain: Domain, event: &str, fields: Map<String, Value>) {
    log(Level::Debug, domain, event, fields);
}

// =============================================================================
// Field helpers
// =============================================================================

pub fn obj(pairs: &[(&str, Value)]) -> Map<String, Value> {
    let mut map = Map::new();
    for (k, v) in pairs {
        map.insert((*k).to_string(), v.clone());
    }
    map
}

pub fn v_str(s: &str) -> Value {
    Value::String(s.to_string())
}

pub fn v_num(n: f64) -> Value {
    json!(n)
}

pub fn v_opt(s: Option<&str>) -> Value {
    s.map(v_str).unwrap_or(Value::Null)
}

// =============================================================================
// Profiling Scope
// =============================================================================

/// Timing scope that emits `elapsed_ms` on drop.
pub struct ProfileScope {
    label: &'static str,
    context: Map<String, Value>,
    started: Instant,
}

impl ProfileScope {
    pub fn new(label: &'static str) -> Self {
        Self::with_context(label, &[])
    }

    pub fn with_context(label: &'static str, fields: &[(&str, Value)]) -> Self {
        Self {
            label,
            context: obj(fields),
            started: Instant::now(),
        }
    }
}

impl Drop for ProfileScope {
    fn drop(&mut self) {
        let elapsed_ms = self.started.elapsed().as_secs_f64() * 1000.0;
        let mut fields = std::mem::take(&mut self.context);
        fields.insert("label".to_string(), v_str(self.label));
        fields.insert("elapsed_ms".to_string(), v_num(elapsed_ms));
        log(Level::Trace, Domain::Profile, "profile", fields);
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_ordering() {
        assert!(Level::Trace < Level::Debug);
        assert!(Level::Debug < Level::Info);
        assert!(Level::Info < Level::Warn);
        assert!(Level::Warn < Level::Error);
    }

    #[test]
    fn test_obj_helper() {
        let m = obj(&[("key", v_str("value")), ("num", v_num(42.0))]);
        assert_eq!(m.get("key").unwrap(), "value");
        assert_eq!(m.get("num").unwrap(), 42.0);
    }

    #[test]
    fn test_sanitize_redacts_secrets() {
        let m = sanitize_fields(obj(&[("token", v_str("abc")), ("task_id", v_str("t-1"))]));
        assert_eq!(m.get("token").unwrap(), "[REDACTED]");
        assert_eq!(m.get("task_id").unwrap(), "t-1");
    }

    #[test]
    fn test_split_fields_lifts_correlation_keys() {
        let (top, data) = split_fields(obj(&[
            ("task_id", v_str("t-1")),
            ("msg", v_str("hello")),
            ("attempt", v_num(3.0)),
        ]));
        assert!(top.contains_key("task_id"));
        assert!(top.contains_key("msg"));
        assert!(data.contains_key("attempt"));
        assert!(!data.contains_key("task_id"));
    }

    #[test]
    fn test_seq_increments() {
        let s1 = next_seq();
        let s2 = next_seq();
        assert!(s2 > s1);
    }

    #[test]
    fn test_v_opt_null_for_none() {
        assert_eq!(v_opt(None), Value::Null);
        assert_eq!(v_opt(Some("x")), v_str("x"));
    }
}
