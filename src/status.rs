//! Error-to-status mapping and error redirects.

use http::StatusCode;
use serde::Serialize;
use url::Url;

use crate::error::StreamError;
use crate::query::QueryStore;

/// HTTP status code and message of a failed request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Status {
    #[serde(rename = "status")]
    pub code: u16,
    pub message: String,
}

impl Status {
    pub fn new(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn http_status(&self) -> StatusCode {
        StatusCode::from_u16(self.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Short machine-readable name of the error kind, used in logs.
    pub fn error_type(&self) -> &'static str {
        match self.code {
            400 => "unsupported_saver",
            413 => "too_large_image",
            415 => "invalid_image",
            422 => "unreadable_image",
            504 => "timeout",
            _ => "internal_error",
        }
    }

    /// `{"status": <code>, "message": <message>}`
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(r#"{{"status":{},"message":"Internal error"}}"#, self.code)
        })
    }
}

impl From<&StreamError> for Status {
    fn from(err: &StreamError) -> Self {
        let code = match err {
            StreamError::InvalidImage { .. } => 415,
            StreamError::UnreadableImage { .. } => 422,
            StreamError::TooLargeImage { .. } => 413,
            StreamError::UnsupportedSaver { .. } => 400,
            StreamError::Timeout { .. } => 504,
            StreamError::Encode { .. } | StreamError::Io(_) => 500,
        };
        Status::new(code, err.to_string())
    }
}

impl From<StreamError> for Status {
    fn from(err: StreamError) -> Self {
        Status::from(&err)
    }
}

// =============================================================================
// Redirect
// =============================================================================

/// Where a failed request should be redirected, if anywhere.
///
/// Reads `default`, falling back to the legacy `errorredirect`. The value
/// `1` redirects to the request's own `url` argument. Targets without a
/// scheme get `http://`; only `http` and `https` URLs with a host are used.
pub fn redirect_target(query: &QueryStore) -> Option<Url> {
    let target = query
        .get_str("default")
        .or_else(|| query.get_str("errorredirect"))?
        .trim();

    let target = if target == "1" {
        query.get_str("url")?.trim()
    } else {
        target
    };

    parse_redirect(target)
}

fn parse_redirect(target: &str) -> Option<Url> {
    if target.is_empty() {
        return None;
    }

    let url = match Url::parse(target) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            let target = target.trim_start_matches("//");
            Url::parse(&format!("http://{}", target)).ok()?
        }
        Err(_) => return None,
    };

    let valid = matches!(url.scheme(), "http" | "https")
        && url.host_str().is_some_and(|h| !h.is_empty());
    valid.then_some(url)
}
