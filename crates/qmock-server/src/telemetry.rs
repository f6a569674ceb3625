//! Subscriber setup: log output plus optional OTLP span export.

use std::fmt;
use std::str::FromStr;

use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::trace::{RandomIdGenerator, Sampler, Tracer};
use tracing::Subscriber;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Log line format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Pretty multi-line output for terminals.
    #[default]
    Console,
    /// One JSON object per event.
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "console" => Ok(LogFormat::Console),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("Invalid log format: {other}")),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogFormat::Console => write!(f, "console"),
            LogFormat::Json => write!(f, "json"),
        }
    }
}

impl LogFormat {
    fn layer<S>(self) -> Box<dyn Layer<S> + Send + Sync>
    where
        S: Subscriber + for<'a> LookupSpan<'a>,
    {
        let layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_file(true)
            .with_line_number(true);
        match self {
            LogFormat::Console => layer.pretty().boxed(),
            LogFormat::Json => layer.with_thread_ids(true).json().boxed(),
        }
    }
}

/// Resolved telemetry settings for the server process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Telemetry {
    /// `EnvFilter` directive, e.g. `info` or `qmock_server=debug`.
    pub filter: String,
    pub format: LogFormat,
    pub service_name: String,
    /// Collector endpoint; spans are only exported when set.
    pub otlp_endpoint: Option<String>,
}

impl Default for Telemetry {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            format: LogFormat::Console,
            service_name: "qmock-server".to_string(),
            otlp_endpoint: None,
        }
    }
}

impl Telemetry {
    /// Falls back to `RUST_LOG`, then `info`, when the directive does not parse.
    fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_new(&self.filter)
            .or_else(|_| EnvFilter::try_from_default_env())
            .unwrap_or_else(|_| EnvFilter::new("info"))
    }

    /// Install the global subscriber. Fails if one is already set.
    pub fn init(self) -> anyhow::Result<()> {
        let otel = self
            .otlp_endpoint
            .as_deref()
            .map(|endpoint| otlp_tracer(endpoint, &self.service_name))
            .transpose()?
            .map(|tracer| tracing_opentelemetry::layer().with_tracer(tracer));
        let exporting = otel.is_some();

        tracing_subscriber::registry()
            .with(self.env_filter())
            .with(self.format.layer())
            .with(otel)
            .try_init()?;

        tracing::info!(format = %self.format, otlp = exporting, "Telemetry initialized");
        Ok(())
    }
}

fn otlp_tracer(endpoint: &str, service_name: &str) -> anyhow::Result<Tracer> {
    let exporter = opentelemetry_otlp::new_exporter()
        .tonic()
        .with_endpoint(endpoint);

    let tracer = opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_exporter(exporter)
        .with_trace_config(
            opentelemetry_sdk::trace::config()
                .with_sampler(Sampler::AlwaysOn)
                .with_id_generator(RandomIdGenerator::default())
                .with_resource(Resource::new(vec![opentelemetry::KeyValue::new(
                    "service.name",
                    service_name.to_string(),
                )])),
        )
        .install_batch(opentelemetry_sdk::runtime::Tokio)?;
    Ok(tracer)
}
