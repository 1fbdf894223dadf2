//! Metrics definitions for the responder.

use shared::metrics_defs::{MetricDef, MetricType};

pub const RESPONSES_RECORDED: MetricDef = MetricDef {
    name: "responses.recorded",
    metric_type: MetricType::Counter,
    description: "Responses written to the sheet, tagged by decision",
};

pub const RESPONSES_FAILED: MetricDef = MetricDef {
    name: "responses.failed",
    metric_type: MetricType::Counter,
    description: "Responses that could not be recorded, tagged by the step reached",
};

pub const REASON_FORM_SHOWN: MetricDef = MetricDef {
    name: "responses.reason_form",
    metric_type: MetricType::Counter,
    description: "Rejections answered with the reason form",
};

pub const CLIENT_ERRORS: MetricDef = MetricDef {
    name: "responses.client_error",
    metric_type: MetricType::Counter,
    description: "Requests rejected for missing or invalid parameters",
};

pub const STORE_WRITE_DURATION: MetricDef = MetricDef {
    name: "store.write.duration",
    metric_type: MetricType::Histogram,
    description: "Time to write a single cell to the sheet in seconds",
};

pub const ALL_METRICS: &[MetricDef] = &[
    RESPONSES_RECORDED,
    RESPONSES_FAILED,
    REASON_FORM_SHOWN,
    CLIENT_ERRORS,
    STORE_WRITE_DURATION,
];
