//! Debug file transport for `tracing` events.
//!
//! [`FileTransport`] implements [`tracing_subscriber::Layer`] to capture log
//! events as JSON lines in a debug log file. Events are written through a
//! buffered writer; warn and error levels flush immediately so the tail of
//! the file is useful when the host process dies.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;

/// Inner state shared between the layer and its handle.
struct TransportInner {
    writer: BufWriter<File>,
}

/// JSON-lines file transport for the `tracing` subscriber.
pub struct FileTransport {
    inner: Arc<Mutex<TransportInner>>,
}

impl FileTransport {
    /// Open (append) the debug log file at `path`, creating parent
    /// directories as needed.
    pub fn open(path: &Path) -> std::io::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            inner: Arc::new(Mutex::new(TransportInner {
                writer: BufWriter::new(file),
            })),
        })
    }

    /// Get a handle for manual flushing.
    #[must_use]
    pub fn handle(&self) -> TransportHandle {
        TransportHandle {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Handle for flushing the transport from outside the layer.
#[derive(Clone)]
pub struct TransportHandle {
    inner: Arc<Mutex<TransportInner>>,
}

impl TransportHandle {
    /// Flush any buffered log lines to disk.
    pub fn flush(&self) {
        let mut guard = match self.inner.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        let _ = guard.writer.flush();
    }
}

/// Visitor that extracts the message and structured fields from an event.
struct EventFieldVisitor {
    message: Option<String>,
    data: serde_json::Map<String, serde_json::Value>,
}

impl EventFieldVisitor {
    fn new() -> Self {
        Self {
            message: None,
            data: serde_json::Map::new(),
        }
    }
}

impl Visit for EventFieldVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_owned());
        } else {
            let _ = self.data.insert(
                field.name().to_owned(),
                serde_json::Value::String(value.to_owned()),
            );
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        let _ = self.data.insert(
            field.name().to_owned(),
            serde_json::Value::Number(value.into()),
        );
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        let _ = self.data.insert(
            field.name().to_owned(),
            serde_json::Value::Number(value.into()),
        );
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        let _ = self
            .data
            .insert(field.name().to_owned(), serde_json::Value::Bool(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        if let Some(n) = serde_json::Number::from_f64(value) {
            let _ = self
                .data
                .insert(field.name().to_owned(), serde_json::Value::Number(n));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = Some(format!("{value:?}"));
        } else {
            let _ = self.data.insert(
                field.name().to_owned(),
                serde_json::Value::String(format!("{value:?}")),
            );
        }
    }
}

impl<S: Subscriber> Layer<S> for FileTransport {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = EventFieldVisitor::new();
        event.record(&mut visitor);

        let level = event.metadata().level();
        let millis = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();

        let mut line = serde_json::Map::new();
        let _ = line.insert("ts".into(), serde_json::Value::from(millis as u64));
        let _ = line.insert("level".into(), serde_json::Value::from(level.to_string()));
        let _ = line.insert(
            "target".into(),
            serde_json::Value::from(event.metadata().target()),
        );
        if let Some(message) = visitor.message {
            let _ = line.insert("message".into(), serde_json::Value::from(message));
        }
        if !visitor.data.is_empty() {
            let _ = line.insert("fields".into(), serde_json::Value::Object(visitor.data));
        }

        let mut guard = match self.inner.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        let _ = serde_json::to_writer(&mut guard.writer, &serde_json::Value::Object(line));
        let _ = guard.writer.write_all(b"\n");
        if *level <= Level::WARN {
            let _ = guard.writer.flush();
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
