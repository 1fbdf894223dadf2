use crate::config::{ResponsesConfig, SpreadsheetConfig};
use crate::errors::ResponseError;
use crate::form::render_reason_form;
use crate::metrics_defs::{
    CLIENT_ERRORS, REASON_FORM_SHOWN, RESPONSES_FAILED, RESPONSES_RECORDED, STORE_WRITE_DURATION,
};
use crate::request::{Decision, ResponseRequest, is_debug};
use crate::resolver::{normalized_headers, resolve};
use axum::http::StatusCode;
use serde::Serialize;
use serde_json::Value;
use shared::{counter, histogram};
use sheets::{CellAddress, StoreProvider, TabularStore};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;

/// Furthest state reached while handling a response.
#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Start,
    Auth,
    GetValues,
    Resolve,
    Dryrun,
    Write,
    Updated,
}

impl Step {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Step::Start => "start",
            Step::Auth => "auth",
            Step::GetValues => "get_values",
            Step::Resolve => "resolve",
            Step::Dryrun => "dryrun",
            Step::Write => "write",
            Step::Updated => "updated",
        }
    }
}

/// Every intermediate decision, reported in debug mode.
#[derive(Serialize, Default, Debug, PartialEq)]
pub struct Details {
    pub qs: BTreeMap<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows_len: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_col_index: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_col_index: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub used_id_header: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub found_row_number: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cell_range: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub write_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wrote_motivo: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub motivo_range: Option<String>,
}

#[derive(Serialize, Debug, PartialEq)]
pub struct DebugReport {
    pub ok: bool,
    pub step: Step,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub details: Details,
}

impl DebugReport {
    fn new(query: &HashMap<String, String>) -> Self {
        let mut qs: BTreeMap<String, Value> = query
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();
        let reason_len = query.get("motivo").map_or(0, |m| m.trim().chars().count());
        qs.insert("motivo_len".into(), reason_len.into());

        DebugReport {
            ok: false,
            step: Step::Start,
            error: None,
            details: Details {
                qs,
                ..Default::default()
            },
        }
    }
}

/// Result of handling one request, independent of the HTTP framework.
#[derive(Debug, PartialEq)]
pub enum Outcome {
    Redirect { location: String },
    ReasonForm { html: String },
    ClientError { message: String },
    Debug { status: StatusCode, report: DebugReport },
}

enum Recorded {
    DryRun,
    Written { wrote_reason: bool },
}

struct HandlerInner {
    spreadsheet: SpreadsheetConfig,
    responses: ResponsesConfig,
    provider: Arc<dyn StoreProvider>,
}

/// Records confirmation and rejection responses in the sheet.
///
/// Outside debug mode only validation errors reach the caller; every other
/// failure is logged and answered with the regular thank-you redirect, since
/// respondents arrive through a shared link and cannot act on internal errors.
#[derive(Clone)]
pub struct ResponseHandler {
    inner: Arc<HandlerInner>,
}

impl ResponseHandler {
    pub fn new(
        spreadsheet: SpreadsheetConfig,
        responses: ResponsesConfig,
        provider: Arc<dyn StoreProvider>,
    ) -> Self {
        ResponseHandler {
            inner: Arc::new(HandlerInner {
                spreadsheet,
                responses,
                provider,
            }),
        }
    }

    pub fn provider(&self) -> &Arc<dyn StoreProvider> {
        &self.inner.provider
    }

    pub fn spreadsheet(&self) -> &SpreadsheetConfig {
        &self.inner.spreadsheet
    }

    pub fn route(&self) -> &str {
        &self.inner.responses.route
    }

    pub async fn handle(&self, query: &HashMap<String, String>) -> Outcome {
        let debug = is_debug(query);
        let mut report = DebugReport::new(query);

        let request = match ResponseRequest::from_query(query) {
            Ok(request) => request,
            Err(e) => return self.fail(debug, report, e.into()),
        };

        if request.needs_reason() {
            counter!(REASON_FORM_SHOWN).increment(1);
            return Outcome::ReasonForm {
                html: render_reason_form(&request.id, &self.inner.responses.route),
            };
        }

        match self.record(&request, &mut report).await {
            Ok(Recorded::DryRun) => {
                report.ok = true;
                Outcome::Debug {
                    status: StatusCode::OK,
                    report,
                }
            }
            Ok(Recorded::Written { wrote_reason }) => {
                counter!(RESPONSES_RECORDED, "decision" => request.decision.write_value())
                    .increment(1);
                tracing::info!(
                    id = %request.id,
                    value = request.decision.write_value(),
                    wrote_reason,
                    "response recorded"
                );

                if debug {
                    report.ok = true;
                    Outcome::Debug {
                        status: StatusCode::OK,
                        report,
                    }
                } else {
                    self.redirect(wrote_reason)
                }
            }
            Err(e) => self.fail(debug, report, e),
        }
    }

    async fn record(
        &self,
        request: &ResponseRequest,
        report: &mut DebugReport,
    ) -> Result<Recorded, ResponseError> {
        let spreadsheet = &self.inner.spreadsheet;
        let responses = &self.inner.responses;

        report.step = Step::Auth;
        let store = self.inner.provider.connect().await?;

        report.step = Step::GetValues;
        let grid = store.get_values(&spreadsheet.read_range()).await?;
        report.details.rows_len = Some(grid.len());

        if grid.is_empty() {
            return Err(ResponseError::EmptyData);
        }

        report.step = Step::Resolve;
        report.details.headers = Some(normalized_headers(&grid));
        let resolution = resolve(
            &grid,
            &responses.identifier_priority,
            &responses.target_header,
            &request.id,
        )?;

        let details = &mut report.details;
        details.target_col_index = Some(resolution.target_column_index);
        details.id_col_index = Some(resolution.identifier_column_index);
        details.used_id_header = Some(resolution.identifier_header_used.clone());
        details.found_row_number = Some(resolution.row_number);

        let value = request.decision.write_value();
        let cell = CellAddress::from_index(
            &spreadsheet.sheet_name,
            resolution.target_column_index,
            resolution.row_number,
        );
        details.cell_range = Some(cell.to_string());
        details.write_value = Some(value.to_string());

        if request.dry_run {
            report.step = Step::Dryrun;
            return Ok(Recorded::DryRun);
        }

        report.step = Step::Write;
        write_cell(store.as_ref(), &cell, value).await?;

        // The two writes are not atomic: if the second one fails the flag
        // stays recorded without its reason.
        let mut wrote_reason = false;
        if let (Decision::Rejected, Some(reason)) = (request.decision, &request.reason) {
            let reason_cell = CellAddress::with_column(
                &spreadsheet.sheet_name,
                &responses.reason_column,
                resolution.row_number,
            );
            report.details.motivo_range = Some(reason_cell.to_string());
            write_cell(store.as_ref(), &reason_cell, reason).await?;
            wrote_reason = true;
        }

        report.details.wrote_motivo = Some(wrote_reason);
        report.step = Step::Updated;
        Ok(Recorded::Written { wrote_reason })
    }

    fn fail(&self, debug: bool, mut report: DebugReport, err: ResponseError) -> Outcome {
        let step = report.step.as_str();
        report.error = Some(err.to_string());

        let status = match &err {
            ResponseError::Validation(e) => {
                counter!(CLIENT_ERRORS).increment(1);
                tracing::debug!(error = %e, "invalid response request");

                if !debug {
                    return Outcome::ClientError {
                        message: e.to_string(),
                    };
                }
                StatusCode::BAD_REQUEST
            }
            e if e.is_internal() => {
                counter!(RESPONSES_FAILED, "step" => step).increment(1);
                tracing::error!(step, error = %e, "failed to record response");
                StatusCode::INTERNAL_SERVER_ERROR
            }
            e => {
                counter!(RESPONSES_FAILED, "step" => step).increment(1);
                tracing::warn!(step, error = %e, "response not recorded");
                StatusCode::OK
            }
        };

        if debug {
            Outcome::Debug { status, report }
        } else {
            self.redirect(false)
        }
    }

    fn redirect(&self, wrote_reason: bool) -> Outcome {
        let url = &self.inner.responses.thank_you_url;
        let location = if wrote_reason {
            let sep = if url.contains('?') { '&' } else { '?' };
            format!("{url}{sep}m=1")
        } else {
            url.clone()
        };

        Outcome::Redirect { location }
    }
}

async fn write_cell(
    store: &dyn TabularStore,
    cell: &CellAddress,
    value: &str,
) -> Result<(), ResponseError> {
    let start = Instant::now();
    let result = store.update_value(cell, value).await;
    histogram!(STORE_WRITE_DURATION).record(start.elapsed().as_secs_f64());

    Ok(result?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;
    use serde_json::json;
    use sheets::testutils::{MemoryProvider, MemoryStore};

    fn query(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    /// `AB123` sits on sheet row 5; `Si/No` is column C.
    fn sample_store() -> MemoryStore {
        MemoryStore::from_rows(&[
            &["ID", "Nombre", "Si/No"],
            &["X1", "Ana", ""],
            &["X2", "Luis", ""],
            &["X3", "Eva", ""],
            &["AB123", "Juan", ""],
        ])
    }

    fn handler_for(provider: MemoryProvider) -> (ResponseHandler, Arc<MemoryProvider>) {
        let config = test_config();
        let provider = Arc::new(provider);
        let handler = ResponseHandler::new(config.spreadsheet, config.responses, provider.clone());
        (handler, provider)
    }

    fn debug_report(outcome: Outcome) -> (StatusCode, Value) {
        match outcome {
            Outcome::Debug { status, report } => (status, serde_json::to_value(report).unwrap()),
            other => panic!("expected debug outcome, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_confirmed_writes_si_and_redirects() {
        let store = sample_store();
        let (handler, _) = handler_for(MemoryProvider::new(store.clone()));

        let outcome = handler
            .handle(&query(&[("status", "confirmado"), ("id", "AB123")]))
            .await;

        assert_eq!(
            outcome,
            Outcome::Redirect {
                location: "/gracias.html".into()
            }
        );
        assert_eq!(
            store.writes(),
            vec![("Sheet1!C5".to_string(), "SI".to_string())]
        );
        assert_eq!(store.reads(), vec!["Sheet1!A:Z"]);
    }

    #[tokio::test]
    async fn test_rejected_without_reason_shows_form() {
        let store = sample_store();
        let (handler, provider) = handler_for(MemoryProvider::new(store.clone()));

        let outcome = handler
            .handle(&query(&[("status", "rechazado"), ("id", "AB123")]))
            .await;

        let html = match outcome {
            Outcome::ReasonForm { html } => html,
            other => panic!("expected reason form, got {other:?}"),
        };
        assert!(html.contains(r#"name="id" value="AB123""#));
        assert!(html.contains(r#"name="status" value="rechazado""#));
        assert!(html.contains(r#"action="/respuesta""#));
        assert_eq!(provider.connects(), 0);
        assert!(store.writes().is_empty());
    }

    #[tokio::test]
    async fn test_rejected_with_reason_writes_both_cells() {
        let store = sample_store();
        let (handler, _) = handler_for(MemoryProvider::new(store.clone()));

        let outcome = handler
            .handle(&query(&[
                ("status", "rechazado"),
                ("id", "AB123"),
                ("motivo", "too expensive"),
            ]))
            .await;

        assert_eq!(
            outcome,
            Outcome::Redirect {
                location: "/gracias.html?m=1".into()
            }
        );
        assert_eq!(
            store.writes(),
            vec![
                ("Sheet1!C5".to_string(), "NO".to_string()),
                ("Sheet1!N5".to_string(), "too expensive".to_string()),
            ]
        );
        assert_eq!(store.grid()[4][13], "too expensive");
    }

    #[tokio::test]
    async fn test_confirmed_ignores_reason() {
        let store = sample_store();
        let (handler, _) = handler_for(MemoryProvider::new(store.clone()));

        let outcome = handler
            .handle(&query(&[
                ("status", "confirmado"),
                ("id", "AB123"),
                ("motivo", "no aplica"),
            ]))
            .await;

        assert_eq!(
            outcome,
            Outcome::Redirect {
                location: "/gracias.html".into()
            }
        );
        assert_eq!(store.writes().len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_status_makes_no_calls() {
        let (handler, provider) = handler_for(MemoryProvider::new(sample_store()));

        let outcome = handler
            .handle(&query(&[("status", "maybe"), ("id", "AB123")]))
            .await;

        assert_eq!(
            outcome,
            Outcome::ClientError {
                message: "Invalid status. Use confirmado|rechazado.".into()
            }
        );
        assert_eq!(provider.connects(), 0);

        let outcome = handler.handle(&query(&[("id", "AB123")])).await;
        assert_eq!(
            outcome,
            Outcome::ClientError {
                message: "Missing id or status.".into()
            }
        );
    }

    #[tokio::test]
    async fn test_invalid_status_debug() {
        let (handler, provider) = handler_for(MemoryProvider::new(sample_store()));

        let outcome = handler
            .handle(&query(&[("status", "maybe"), ("id", "AB123"), ("debug", "1")]))
            .await;

        let (status, report) = debug_report(outcome);
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(report["ok"], false);
        assert_eq!(report["step"], "start");
        assert_eq!(report["error"], "Invalid status. Use confirmado|rechazado.");
        assert_eq!(report["details"]["qs"]["status"], "maybe");
        assert_eq!(provider.connects(), 0);
    }

    #[tokio::test]
    async fn test_dry_run_reports_without_writing() {
        let store = sample_store();
        let (handler, _) = handler_for(MemoryProvider::new(store.clone()));

        let outcome = handler
            .handle(&query(&[
                ("status", "confirmado"),
                ("id", "ab123 "),
                ("debug", "1"),
                ("dryrun", "1"),
            ]))
            .await;

        let (status, report) = debug_report(outcome);
        assert_eq!(status, StatusCode::OK);
        assert_eq!(report["ok"], true);
        assert_eq!(report["step"], "dryrun");
        assert_eq!(report["details"]["write_value"], "SI");
        assert_eq!(report["details"]["cell_range"], "Sheet1!C5");
        assert_eq!(report["details"]["found_row_number"], 5);
        assert!(store.writes().is_empty());
        assert_eq!(store.reads().len(), 1);
    }

    #[tokio::test]
    async fn test_dry_run_ignored_without_debug() {
        let store = sample_store();
        let (handler, _) = handler_for(MemoryProvider::new(store.clone()));

        handler
            .handle(&query(&[
                ("status", "confirmado"),
                ("id", "AB123"),
                ("dryrun", "1"),
            ]))
            .await;

        assert_eq!(store.writes().len(), 1);
    }

    #[tokio::test]
    async fn test_debug_success_report() {
        let store = sample_store();
        let (handler, _) = handler_for(MemoryProvider::new(store.clone()));

        let outcome = handler
            .handle(&query(&[
                ("status", "rechazado"),
                ("id", "AB123"),
                ("motivo", " caro "),
                ("debug", "1"),
            ]))
            .await;

        let (status, report) = debug_report(outcome);
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            report,
            json!({
                "ok": true,
                "step": "updated",
                "details": {
                    "qs": {
                        "status": "rechazado",
                        "id": "AB123",
                        "motivo": " caro ",
                        "debug": "1",
                        "motivo_len": 4,
                    },
                    "rows_len": 5,
                    "headers": ["ID", "Nombre", "Si/No"],
                    "target_col_index": 2,
                    "id_col_index": 0,
                    "used_id_header": "ID",
                    "found_row_number": 5,
                    "cell_range": "Sheet1!C5",
                    "write_value": "NO",
                    "wrote_motivo": true,
                    "motivo_range": "Sheet1!N5",
                },
            })
        );
        assert_eq!(store.writes()[1].1, "caro");
    }

    #[tokio::test]
    async fn test_row_missing() {
        let store = sample_store();
        let (handler, _) = handler_for(MemoryProvider::new(store.clone()));

        let outcome = handler
            .handle(&query(&[("status", "confirmado"), ("id", "ZZ999")]))
            .await;
        assert_eq!(
            outcome,
            Outcome::Redirect {
                location: "/gracias.html".into()
            }
        );

        let outcome = handler
            .handle(&query(&[("status", "confirmado"), ("id", "ZZ999"), ("debug", "1")]))
            .await;
        let (status, report) = debug_report(outcome);
        assert_eq!(status, StatusCode::OK);
        assert_eq!(report["ok"], false);
        assert_eq!(report["step"], "resolve");
        assert_eq!(report["error"], "Row not found for id='ZZ999'");
        assert_eq!(report["details"]["headers"], json!(["ID", "Nombre", "Si/No"]));
        assert!(store.writes().is_empty());
    }

    #[tokio::test]
    async fn test_missing_headers() {
        let store = MemoryStore::from_rows(&[&["Nombre", "Si/No"], &["Ana", ""]]);
        let (handler, _) = handler_for(MemoryProvider::new(store));

        let outcome = handler
            .handle(&query(&[("status", "confirmado"), ("id", "Ana"), ("debug", "1")]))
            .await;
        let (_, report) = debug_report(outcome);
        assert_eq!(
            report["error"],
            "No identifier column found (tried: ID, Placa, Cedula)"
        );

        let store = MemoryStore::from_rows(&[&["ID"], &["AB123"]]);
        let (handler, _) = handler_for(MemoryProvider::new(store));

        let outcome = handler
            .handle(&query(&[("status", "confirmado"), ("id", "AB123"), ("debug", "1")]))
            .await;
        let (_, report) = debug_report(outcome);
        assert_eq!(report["error"], "Target header 'Si/No' not found");
    }

    #[tokio::test]
    async fn test_empty_sheet() {
        let store = MemoryStore::default();
        let (handler, _) = handler_for(MemoryProvider::new(store.clone()));

        let outcome = handler
            .handle(&query(&[("status", "confirmado"), ("id", "AB123"), ("debug", "1")]))
            .await;
        let (status, report) = debug_report(outcome);
        assert_eq!(status, StatusCode::OK);
        assert_eq!(report["step"], "get_values");
        assert_eq!(report["error"], "Empty sheet");
        assert_eq!(report["details"]["rows_len"], 0);

        let outcome = handler
            .handle(&query(&[("status", "confirmado"), ("id", "AB123")]))
            .await;
        assert!(matches!(outcome, Outcome::Redirect { .. }));
    }

    #[tokio::test]
    async fn test_missing_credentials() {
        let store = sample_store();
        let (handler, provider) = handler_for(MemoryProvider::without_credentials(store.clone()));

        let outcome = handler
            .handle(&query(&[("status", "confirmado"), ("id", "AB123")]))
            .await;
        assert_eq!(
            outcome,
            Outcome::Redirect {
                location: "/gracias.html".into()
            }
        );

        let outcome = handler
            .handle(&query(&[("status", "confirmado"), ("id", "AB123"), ("debug", "1")]))
            .await;
        let (status, report) = debug_report(outcome);
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(report["ok"], false);
        assert_eq!(report["step"], "auth");
        assert!(report["error"]
            .as_str()
            .unwrap()
            .starts_with("configuration error"));

        assert_eq!(provider.connects(), 2);
        assert!(store.reads().is_empty());
    }

    #[tokio::test]
    async fn test_read_failure() {
        let store = sample_store();
        store.fail_reads();
        let (handler, _) = handler_for(MemoryProvider::new(store.clone()));

        let outcome = handler
            .handle(&query(&[("status", "confirmado"), ("id", "AB123"), ("debug", "1")]))
            .await;
        let (status, report) = debug_report(outcome);
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(report["step"], "get_values");
        assert!(report["error"].as_str().unwrap().starts_with("transport error"));
    }

    #[tokio::test]
    async fn test_reason_write_failure_keeps_flag() {
        let store = sample_store();
        store.fail_writes_after(1);
        let (handler, _) = handler_for(MemoryProvider::new(store.clone()));

        let outcome = handler
            .handle(&query(&[
                ("status", "rechazado"),
                ("id", "AB123"),
                ("motivo", "caro"),
            ]))
            .await;

        // Failures after validation still look like success to the respondent.
        assert_eq!(
            outcome,
            Outcome::Redirect {
                location: "/gracias.html".into()
            }
        );
        assert_eq!(
            store.writes(),
            vec![("Sheet1!C5".to_string(), "NO".to_string())]
        );
    }

    #[tokio::test]
    async fn test_thank_you_url_with_query() {
        let store = sample_store();
        let mut config = test_config();
        config.responses.thank_you_url = "https://example.com/gracias?lang=es".into();
        let handler = ResponseHandler::new(
            config.spreadsheet,
            config.responses,
            Arc::new(MemoryProvider::new(store)),
        );

        let outcome = handler
            .handle(&query(&[
                ("status", "rechazado"),
                ("id", "AB123"),
                ("motivo", "caro"),
            ]))
            .await;
        assert_eq!(
            outcome,
            Outcome::Redirect {
                location: "https://example.com/gracias?lang=es&m=1".into()
            }
        );
    }
}
