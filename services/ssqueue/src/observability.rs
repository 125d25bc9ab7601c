//! Observability wiring for the ssqueue service.
//!
//! # Purpose
//! Initializes tracing (with runtime-toggled log tags), optional OTLP span
//! export, W3C trace-context propagation, and the Prometheus recorder.
//!
//! # Notes
//! Initialization is guarded by `OnceLock` to keep startup idempotent in tests.
use metrics_exporter_prometheus::PrometheusBuilder;
use metrics_exporter_prometheus::PrometheusHandle;
use opentelemetry::KeyValue;
use opentelemetry::global;
use opentelemetry::propagation::Extractor;
use opentelemetry::trace::TracerProvider;
use opentelemetry_sdk::Resource;
use parking_lot::RwLock;
use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, OnceLock};
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;

/// Event field naming the log tag an event belongs to.
pub const TAG_FIELD: &str = "tag";

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();
static OBS_INIT: OnceLock<()> = OnceLock::new();
static PROPAGATOR_INIT: OnceLock<()> = OnceLock::new();
static LOG_TAGS: OnceLock<LogTags> = OnceLock::new();

pub fn init_observability(service_name: &str, debug: bool) -> PrometheusHandle {
    OBS_INIT.get_or_init(|| {
        global::set_text_map_propagator(
            opentelemetry_sdk::propagation::TraceContextPropagator::new(),
        );

        let default_level = if debug { "debug" } else { "info" };
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_file(debug)
            .with_line_number(debug);
        let registry = tracing_subscriber::registry()
            .with(filter)
            .with(log_tags())
            .with(fmt_layer);
        if let Some(provider) = build_tracer_provider(service_name) {
            let tracer = provider.tracer(service_name.to_string());
            let otel_layer = tracing_opentelemetry::layer().with_tracer(tracer);
            let _ = registry.with(otel_layer).try_init();
        } else {
            let _ = registry.try_init();
        }
    });

    install_metrics_recorder()
}

/// Process-wide tag set consulted by the tracing layer and the log-tag
/// endpoints.
pub fn log_tags() -> LogTags {
    LOG_TAGS.get_or_init(LogTags::default).clone()
}

// Spans are only exported when a collector endpoint is configured.
fn build_tracer_provider(
    service_name: &str,
) -> Option<opentelemetry_sdk::trace::SdkTracerProvider> {
    std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").ok()?;
    let resource = Resource::builder_empty()
        .with_attributes(resource_attributes(service_name))
        .build();
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .build()
        .ok()?;
    Some(
        opentelemetry_sdk::trace::SdkTracerProvider::builder()
            .with_batch_exporter(exporter)
            .with_resource(resource)
            .build(),
    )
}

fn resource_attributes(service_name: &str) -> Vec<KeyValue> {
    let mut attrs = vec![
        KeyValue::new("service.name", service_name.to_string()),
        KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
    ];
    if let Ok(value) =
        std::env::var("SSQUEUE_SERVICE_INSTANCE_ID").or_else(|_| std::env::var("HOSTNAME"))
    {
        attrs.push(KeyValue::new("service.instance.id", value));
    }
    if let Ok(value) = std::env::var("DEPLOYMENT_ENVIRONMENT") {
        attrs.push(KeyValue::new("deployment.environment", value));
    }
    attrs
}

pub fn trace_context_from_headers(headers: &axum::http::HeaderMap) -> opentelemetry::Context {
    PROPAGATOR_INIT.get_or_init(|| {
        global::set_text_map_propagator(
            opentelemetry_sdk::propagation::TraceContextPropagator::new(),
        );
    });
    global::get_text_map_propagator(|prop| prop.extract(&HeaderMapExtractor(headers)))
}

struct HeaderMapExtractor<'a>(&'a axum::http::HeaderMap);

impl<'a> Extractor for HeaderMapExtractor<'a> {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|value| value.to_str().ok())
    }

    fn keys(&self) -> Vec<&str> {
        self.0.keys().map(|name| name.as_str()).collect()
    }
}

fn install_metrics_recorder() -> PrometheusHandle {
    if let Some(handle) = METRICS_HANDLE.get() {
        return handle.clone();
    }
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("install metrics recorder");
    let _ = METRICS_HANDLE.set(handle.clone());
    handle
}

/// Set of enabled log tags.
///
/// Events carrying a string `tag` field are dropped unless that tag is
/// enabled; untagged events pass through.
#[derive(Clone, Default)]
pub struct LogTags {
    enabled: Arc<RwLock<HashSet<String>>>,
}

impl LogTags {
    pub fn on(&self, tag: &str) {
        self.enabled.write().insert(tag.to_string());
    }

    pub fn off(&self, tag: &str) {
        self.enabled.write().remove(tag);
    }

    pub fn is_enabled(&self, tag: &str) -> bool {
        self.enabled.read().contains(tag)
    }
}

impl fmt::Debug for LogTags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.enabled.read().iter()).finish()
    }
}

impl<S: Subscriber> Layer<S> for LogTags {
    fn event_enabled(&self, event: &Event<'_>, _ctx: Context<'_, S>) -> bool {
        let mut visitor = TagVisitor::default();
        event.record(&mut visitor);
        match visitor.tag {
            Some(tag) => self.is_enabled(&tag),
            None => true,
        }
    }
}

#[derive(Default)]
struct TagVisitor {
    tag: Option<String>,
}

impl Visit for TagVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == TAG_FIELD {
            self.tag = Some(value.to_string());
        }
    }

    fn record_debug(&mut self, _field: &Field, _value: &dyn fmt::Debug) {}
}
