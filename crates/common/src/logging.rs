//! Provides utilities to initialize logging and OpenTelemetry tracing.
use std::env;

use opentelemetry::{trace::TracerProvider, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::Resource;
use tracing::{info, warn, Subscriber};
use tracing_subscriber::{
    layer::SubscriberExt, registry::LookupSpan, util::SubscriberInitExt, EnvFilter, Layer,
};

/// Environment variable holding the OTLP collector endpoint.
pub const OTLP_URL_ENVVAR: &str = "BTC_RELAYER_OTLP_URL";

/// Environment variable name for the service label, which is appended to the
/// whoami string.
pub const SVC_LABEL_ENVVAR: &str = "BTC_RELAYER_SVC_LABEL";

/// Filter directive used when `RUST_LOG` is not set.
pub const DEFAULT_DIRECTIVE: &str = "info";

/// Configuration for the logger.
#[derive(Debug, Clone)]
pub struct LoggerConfig {
    /// The whoami string, which is used to identify the service in logs.
    whoami: String,

    /// The OpenTelemetry URL for exporting traces.
    otel_url: Option<String>,

    /// Fallback filter directive, e.g. `debug` or `btc_relayer_observer=trace`.
    default_directive: String,
}

impl LoggerConfig {
    /// Creates a new empty instance with whoami set.
    pub fn new(whoami: String) -> Self {
        Self {
            whoami,
            otel_url: None,
            default_directive: DEFAULT_DIRECTIVE.to_string(),
        }
    }

    /// Creates a new instance with the whoami string set to the provided
    /// string.
    pub fn with_base_name(s: &str) -> Self {
        Self::new(get_whoami_string(s))
    }

    /// Sets the opentelemetry URL to the provided string.
    pub fn set_otlp_url(&mut self, url: String) {
        self.otel_url = Some(url);
    }

    /// Sets the directive applied when `RUST_LOG` is absent.
    pub fn with_default_directive(mut self, directive: &str) -> Self {
        self.default_directive = directive.to_string();
        self
    }
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self::with_base_name("(btc-relayer)")
    }
}

/// Builds the env filter, preferring `RUST_LOG` over the configured directive.
fn build_filter(default_directive: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::try_new(default_directive).unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE))
    })
}

/// Initializes the logging subsystem with the provided config.
///
/// Logs go to stdout. Spans are additionally exported over OTLP when an endpoint is configured;
/// failing to set up the exporter is logged and does not prevent stdout logging.
pub fn init(config: LoggerConfig) {
    let stdout_layer = tracing_subscriber::fmt::layer()
        .compact()
        .event_format(
            tracing_subscriber::fmt::format()
                .with_file(env_flag("LOG_FILE"))
                .with_line_number(env_flag("LOG_LINE_NUM")),
        )
        .with_filter(build_filter(&config.default_directive));

    let (otel_layer, otel_err) = match config.otel_url.as_deref() {
        Some(url) => match otel_layer(url, &config.whoami) {
            Ok(layer) => (Some(layer), None),
            Err(err) => (None, Some(err)),
        },
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(stdout_layer)
        .with(otel_layer)
        .init();

    info!(whoami = %config.whoami, otlp = ?config.otel_url, "logging started");
    if let Some(err) = otel_err {
        warn!(%err, "could not set up span export");
    }
}

fn otel_layer<S>(url: &str, whoami: &str) -> Result<impl Layer<S>, String>
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    let resource = Resource::builder()
        .with_attribute(KeyValue::new("service.name", whoami.to_string()))
        .build();

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(url)
        .build()
        .map_err(|e| e.to_string())?;

    let provider = opentelemetry_sdk::trace::SdkTracerProvider::builder()
        .with_resource(resource)
        .with_batch_exporter(exporter)
        .build();

    Ok(tracing_opentelemetry::layer().with_tracer(provider.tracer("btc-relayer")))
}

/// Whether the boolean env flag `name` is set to `1`.
fn env_flag(name: &str) -> bool {
    env::var(name).is_ok_and(|v| v == "1")
}

/// Gets the OTLP URL from the standard envvar.
pub fn get_otlp_url_from_env() -> Option<String> {
    env::var(OTLP_URL_ENVVAR).ok()
}

/// Gets the service label from the standard envvar, which should be included
/// in the whoami string.
pub fn get_service_label_from_env() -> Option<String> {
    env::var(SVC_LABEL_ENVVAR).ok()
}

/// Computes a standard whoami string.
pub fn get_whoami_string(base: &str) -> String {
    match get_service_label_from_env() {
        Some(label) => format!("{base}%{label}"),
        None => base.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_directive_is_info() {
        let config = LoggerConfig::new("relayer".to_string());
        assert_eq!(config.default_directive, DEFAULT_DIRECTIVE);
        assert_eq!(config.whoami, "relayer");
    }

    #[test]
    fn whoami_carries_service_label() {
        // the label env var is not set in tests
        assert_eq!(get_whoami_string("relayer"), "relayer");
    }

    #[test]
    fn invalid_directive_falls_back() {
        // must not panic on garbage input
        let _ = build_filter("==not a directive==");
    }
}
