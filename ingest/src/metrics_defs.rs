use shared::metrics_defs::{MetricDef, MetricType};

pub const INGEST_REQUESTS: MetricDef = MetricDef {
    name: "ingest.requests",
    metric_type: MetricType::Counter,
    description: "Ingest requests handled. Tagged with endpoint, status.",
};

pub const REQUEST_DURATION: MetricDef = MetricDef {
    name: "ingest.request.duration",
    metric_type: MetricType::Histogram,
    description: "Request duration in seconds, including sink fan-out. Tagged with endpoint.",
};

pub const SINK_FAILURES: MetricDef = MetricDef {
    name: "sink.failures",
    metric_type: MetricType::Counter,
    description: "Sink deliveries that failed, timed out or panicked. Tagged with sink.",
};

pub const ALL_METRICS: &[MetricDef] = &[INGEST_REQUESTS, REQUEST_DURATION, SINK_FAILURES];
