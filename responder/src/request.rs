use std::collections::HashMap;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RequestError {
    #[error("Missing id or status.")]
    MissingParams,

    #[error("Invalid status. Use confirmado|rechazado.")]
    InvalidStatus(String),
}

/// What the respondent answered.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    Confirmed,
    Rejected,
}

impl Decision {
    pub fn parse(status: &str) -> Option<Self> {
        match status.to_lowercase().as_str() {
            "confirmado" => Some(Decision::Confirmed),
            "rechazado" => Some(Decision::Rejected),
            _ => None,
        }
    }

    /// Value stored in the flag column.
    pub fn write_value(&self) -> &'static str {
        match self {
            Decision::Confirmed => "SI",
            Decision::Rejected => "NO",
        }
    }
}

/// A validated response, built from the query string of one request.
#[derive(Clone, Debug, PartialEq)]
pub struct ResponseRequest {
    pub id: String,
    pub decision: Decision,
    /// Trimmed rejection reason, `None` when absent or blank.
    pub reason: Option<String>,
    pub debug: bool,
    pub dry_run: bool,
}

impl ResponseRequest {
    pub fn from_query(query: &HashMap<String, String>) -> Result<Self, RequestError> {
        let present = |key: &str| query.get(key).filter(|v| !v.is_empty());

        let (Some(id), Some(status)) = (present("id"), present("status")) else {
            return Err(RequestError::MissingParams);
        };

        let decision =
            Decision::parse(status).ok_or_else(|| RequestError::InvalidStatus(status.clone()))?;

        let reason = query
            .get("motivo")
            .map(|m| m.trim())
            .filter(|m| !m.is_empty())
            .map(String::from);

        let debug = is_debug(query);

        Ok(ResponseRequest {
            id: id.clone(),
            decision,
            reason,
            debug,
            dry_run: debug && flag(query, "dryrun"),
        })
    }

    /// A rejection without a reason must first collect one.
    pub fn needs_reason(&self) -> bool {
        self.decision == Decision::Rejected && self.reason.is_none()
    }
}

fn flag(query: &HashMap<String, String>, key: &str) -> bool {
    query.get(key).is_some_and(|v| v == "1")
}

/// Debug mode is decided before validation so that validation errors can be
/// reported in debug form as well.
pub fn is_debug(query: &HashMap<String, String>) -> bool {
    flag(query, "debug")
}
