use super::query::{Query, ResponseMode};
use crate::error::ErrorContext;
use crate::pipeline::Outcome;
use crate::registry::{RequestClassDescriptor, SchemaSource};
use crate::schema::{rest_predicates, Predicate};
use crate::transport::HttpRequest;
use crate::{Error, Result};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

/// A validated request, ready for the rate limiter and the transport.
#[derive(Debug, Clone)]
pub struct RequestPlan {
    pub descriptor: Arc<RequestClassDescriptor>,
    pub request: HttpRequest,
    pub mode: ResponseMode,
    /// A `format` predicate was given, so the body is returned unparsed.
    pub has_format: bool,
    pub parse_types: bool,
}

impl RequestPlan {
    /// Text bodies get CRLF normalisation; binary ones are passed through.
    pub fn decode_text(&self) -> bool {
        !self.descriptor.binary
    }
}

/// Option checks that need only the descriptor.
pub fn check_options(descriptor: &RequestClassDescriptor, query: &Query) -> Result<ResponseMode> {
    let mode = query.mode()?;
    if query.wants_parse_types() && query.has_predicate("format") {
        return Err(Error::InvalidOptions(
            "parse_types can only be used if format is unset".into(),
        ));
    }
    if mode == ResponseMode::Lines && !descriptor.supports_line_streaming() {
        return Err(Error::BinaryStream(format!(
            "iter_lines is disabled for {}; use iter_content instead",
            descriptor.key()
        )));
    }
    Ok(mode)
}

/// Predicates the class knows without asking Space-Track.
pub fn offline_predicates(descriptor: &RequestClassDescriptor) -> Option<&[Predicate]> {
    match &descriptor.schema {
        SchemaSource::Offline(predicates) => Some(predicates),
        SchemaSource::Remote => None,
    }
}

/// Reject any keyword the class does not accept.
pub fn validate_predicates(
    descriptor: &RequestClassDescriptor,
    query: &Query,
    schema: &[Predicate],
) -> Result<()> {
    let rest = rest_predicates();
    let valid: HashSet<&str> = rest
        .iter()
        .chain(schema.iter())
        .map(|p| p.name.as_str())
        .chain(descriptor.param_fields.iter().map(String::as_str))
        .collect();

    let unexpected = |predicate: &str| Error::UnexpectedPredicate {
        class: descriptor.name.clone(),
        predicate: predicate.to_string(),
    };

    for (key, _) in query.predicates() {
        if !valid.contains(key.as_str()) {
            return Err(unexpected(key));
        }
        if descriptor.upload && key == "file" {
            return Err(Error::InvalidOptions(
                "upload files are attached with Query::file".into(),
            ));
        }
    }

    match (descriptor.upload, query.file_part().is_some()) {
        (true, false) => Err(Error::MissingPredicate {
            class: descriptor.name.clone(),
            predicate: "file".into(),
        }),
        (false, true) => Err(unexpected("file")),
        _ => Ok(()),
    }
}

/// Validate `query` against `schema` and build the HTTP request.
pub fn plan_request(
    base_url: &Url,
    descriptor: Arc<RequestClassDescriptor>,
    query: &Query,
    schema: &[Predicate],
) -> Result<RequestPlan> {
    let mode = check_options(&descriptor, query)?;
    validate_predicates(&descriptor, query, schema)?;

    if descriptor.deprecated {
        warn!(
            class = %descriptor.name,
            "The {} request class is deprecated and scheduled to be removed. \
             Visit https://www.space-track.org for more information.",
            descriptor.name
        );
    }

    let rest = rest_predicates();
    let lookup = |key: &str| rest.iter().chain(schema.iter()).find(|p| p.name == key);

    let mut url = endpoint(
        base_url,
        &format!("{}/query/class/{}", descriptor.controller, descriptor.name),
    )?;
    let mut params = Vec::new();
    {
        let mut segments = url
            .path_segments_mut()
            .map_err(|_| invalid_base(base_url))?;
        for (key, value) in query.predicates() {
            let value = match (query.wants_coercion(), lookup(key)) {
                (true, Some(predicate)) => value.clone().coerce(predicate),
                _ => value.clone(),
            };
            let rendered = value.to_query_string();
            if descriptor.param_fields.iter().any(|f| f == key) {
                params.push((key.clone(), rendered));
            } else {
                segments.push(key).push(&rendered);
            }
        }
    }

    let mut request = match query.file_part() {
        Some(file) if descriptor.upload => {
            let mut req = HttpRequest::post(url);
            req.file = Some(file.clone());
            req
        }
        _ => HttpRequest::get(url),
    }
    .with_query(params);
    request.stream = mode != ResponseMode::Buffered;
    request.timeout = query.request_timeout();
    debug!(url = %request.url, method = %request.method, "Planned Space-Track request");

    Ok(RequestPlan {
        descriptor,
        request,
        mode,
        has_format: query.has_predicate("format"),
        parse_types: query.wants_parse_types(),
    })
}

/// `GET {controller}/modeldef/class/{class}`.
pub fn modeldef_request(base_url: &Url, descriptor: &RequestClassDescriptor) -> Result<HttpRequest> {
    let url = endpoint(
        base_url,
        &format!("{}/modeldef/class/{}", descriptor.controller, descriptor.name),
    )?;
    Ok(HttpRequest::get(url))
}

pub fn login_request(base_url: &Url, identity: &str, password: &str) -> Result<HttpRequest> {
    let url = endpoint(base_url, "ajaxauth/login")?;
    Ok(HttpRequest::post(url).with_form(vec![
        ("identity".into(), identity.into()),
        ("password".into(), password.into()),
    ]))
}

pub fn logout_request(base_url: &Url) -> Result<HttpRequest> {
    Ok(HttpRequest::get(endpoint(base_url, "ajaxauth/logout")?))
}

/// Interpret a login response. Space-Track answers bad credentials with
/// HTTP 200 and `{"Login": "Failed"}`.
pub fn check_login(identity: &str, status: u16, body: &[u8]) -> Result<()> {
    if let Outcome::Failed { status, message } = Outcome::classify(status, body) {
        return Err(Error::RequestFailed { status, message });
    }
    if let Ok(Value::Object(map)) = serde_json::from_slice::<Value>(body) {
        if map.get("Login").and_then(Value::as_str) == Some("Failed") {
            return Err(Error::Authentication {
                identity: identity.to_string(),
            });
        }
    }
    Ok(())
}

fn endpoint(base_url: &Url, path: &str) -> Result<Url> {
    base_url.join(path).map_err(|e| {
        Error::configuration_with_context(
            format!("cannot build endpoint '{}': {}", path, e),
            ErrorContext::new()
                .with_field_path("base_url")
                .with_details(base_url.as_str()),
        )
    })
}

fn invalid_base(base_url: &Url) -> Error {
    Error::configuration_with_context(
        "base URL cannot carry path segments",
        ErrorContext::new()
            .with_field_path("base_url")
            .with_details(base_url.as_str()),
    )
}
