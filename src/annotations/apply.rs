//! Translation of annotations into proxy model fields.

use crate::annotations::values::{parse_bool, parse_int, parse_snippet, parse_time};
use crate::annotations::{AnnotationError, Annotations};
use crate::haproxy::models::{Backend, Balance, Cookie, Defaults, Global, ServerOptions, Toggle};

const SSL_ALPN: &str = "h2,http/1.1";
const SSL_VERIFY: &str = "none";

const BALANCE_ALGORITHMS: &[&str] = &[
    "roundrobin",
    "static-rr",
    "leastconn",
    "first",
    "source",
    "uri",
    "url_param",
    "random",
];

/// Server template shared by every slot of a backend.
pub fn server_options(annotations: &Annotations<'_>) -> ServerOptions {
    let mut options = ServerOptions {
        check: Some(Toggle::Enabled),
        ..Default::default()
    };

    if let Some(check) = annotations.parsed("check", parse_bool) {
        options.check = Some(check.into());
    }
    options.inter = annotations.parsed("check-interval", parse_time);
    options.maxconn = annotations.parsed("server-maxconn", parse_positive);

    if annotations.parsed("server-ssl", parse_bool) == Some(true) {
        options.ssl = Some(Toggle::Enabled);
        options.alpn = Some(SSL_ALPN.to_string());
        options.verify = Some(SSL_VERIFY.to_string());
    }
    options
}

/// Apply global annotations. Absent annotations leave fields untouched.
pub fn apply_global(global: &mut Global, annotations: &Annotations<'_>) {
    if let Some(nbthread) = annotations.parsed("nbthread", parse_nbthread) {
        global.nbthread = (nbthread > 0).then_some(nbthread);
    }
    if let Some(maxconn) = annotations.parsed("maxconn", parse_positive) {
        global.maxconn = Some(maxconn);
    }
    if let Some(snippet) = annotations.parsed("global-config-snippet", parse_snippet) {
        global.config_snippet = snippet;
    }
}

/// Apply defaults-section timeouts. Absent annotations leave fields untouched.
pub fn apply_defaults(defaults: &mut Defaults, annotations: &Annotations<'_>) {
    let timeouts = [
        ("timeout-connect", &mut defaults.connect_timeout),
        ("timeout-client", &mut defaults.client_timeout),
        ("timeout-server", &mut defaults.server_timeout),
        ("timeout-check", &mut defaults.check_timeout),
    ];
    for (name, field) in timeouts {
        if let Some(ms) = annotations.parsed(name, parse_time) {
            *field = Some(ms);
        }
    }
}

/// Apply backend annotations.
///
/// Cookie, check timeout and snippet are derived entirely from annotations and
/// are cleared when absent. The balance algorithm is kept when unset.
pub fn apply_backend(backend: &mut Backend, annotations: &Annotations<'_>) {
    backend.cookie = annotations.parsed("cookie-persistence", parse_cookie);
    backend.check_timeout = annotations.parsed("timeout-check", parse_time);
    backend.config_snippet = annotations
        .parsed("backend-config-snippet", parse_snippet)
        .unwrap_or_default();

    if let Some(algorithm) = annotations.parsed("load-balance", parse_balance) {
        backend.balance = Some(Balance { algorithm });
    }
}

fn parse_positive(input: &str) -> Result<i64, AnnotationError> {
    let value = parse_int(input)?;
    if value <= 0 {
        return Err(AnnotationError::Invalid {
            annotation: "integer",
            message: format!("'{}' must be positive", input),
        });
    }
    Ok(value)
}

/// Thread count, capped at the available parallelism. 0 removes the setting.
fn parse_nbthread(input: &str) -> Result<i64, AnnotationError> {
    let value = parse_int(input)?;
    if value < 0 {
        return Err(AnnotationError::Invalid {
            annotation: "nbthread",
            message: format!("'{}' must not be negative", input),
        });
    }
    let available = std::thread::available_parallelism()
        .map(|n| n.get() as i64)
        .unwrap_or(1);
    Ok(value.min(available))
}

fn parse_cookie(input: &str) -> Result<Cookie, AnnotationError> {
    let mut fields = input.split_whitespace();
    match (fields.next(), fields.next()) {
        (Some(name), None) => Ok(Cookie::insert(name)),
        _ => Err(AnnotationError::Invalid {
            annotation: "cookie-persistence",
            message: format!("incorrect input '{}'", input),
        }),
    }
}

fn parse_balance(input: &str) -> Result<String, AnnotationError> {
    let value = input.trim();
    let algorithm = value.split_whitespace().next().unwrap_or_default();
    if BALANCE_ALGORITHMS.contains(&algorithm) || algorithm.starts_with("hdr(") {
        Ok(value.to_string())
    } else {
        Err(AnnotationError::Invalid {
            annotation: "load-balance",
            message: format!("unknown algorithm '{}'", input),
        })
    }
}
