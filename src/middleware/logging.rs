use std::net::{IpAddr, SocketAddr};
use std::time::{Duration, Instant};

use tracing::{event, Level};

use super::Middleware;
use crate::handler::{header, Handler, HandlerRequest, HandlerResponse};
use crate::ids::RequestId;

/// Access log, one event per request.
///
/// The request id is taken from `X-Logger-ID` when the client sent a valid one,
/// generated otherwise, and echoed on the response. The event level follows the
/// status: ERROR for 5xx (and anything below 100), WARN for 1xx and 4xx, INFO
/// for the rest.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingMiddleware;

macro_rules! access_event {
    ($level:expr, $line:expr) => {{
        let line: &AccessLine = $line;
        event!(
            $level,
            request_id = %line.request_id,
            method = %line.method,
            route = %line.route,
            path = %line.path,
            host = %line.host,
            ip = %line.ip,
            user_agent = %line.user_agent,
            request_size = line.request_size,
            status = line.status,
            response_size = line.response_size,
            elapsed_ms = line.elapsed.as_secs_f64() * 1000.0,
            "HTTP Response {:03} {}B {:?} {} {}",
            line.status,
            line.response_size,
            line.elapsed,
            line.method,
            line.route
        )
    }};
}

struct AccessLine {
    request_id: RequestId,
    method: String,
    route: String,
    path: String,
    host: String,
    ip: String,
    user_agent: String,
    request_size: usize,
    status: u16,
    response_size: usize,
    elapsed: Duration,
}

impl Middleware for LoggingMiddleware {
    fn handle(&self, mut req: HandlerRequest, next: &dyn Handler) -> HandlerResponse {
        let start = Instant::now();
        req.request_id = RequestId::from_header_or_new(req.get_header(header::X_LOGGER_ID));

        let mut line = AccessLine {
            request_id: req.request_id,
            method: req.method.to_string(),
            route: route_of(&req.pattern).to_string(),
            path: req.path.clone(),
            host: req.host.clone(),
            ip: real_ip(&req),
            user_agent: req.get_header(header::USER_AGENT).unwrap_or_default().to_string(),
            request_size: req.body.len(),
            status: 0,
            response_size: 0,
            elapsed: Duration::ZERO,
        };

        let mut res = next.handle(req);
        if res.get_header(header::X_LOGGER_ID).is_none() {
            res.add_header(header::X_LOGGER_ID, &line.request_id.to_string());
        }

        line.status = res.status;
        line.response_size = res.body.len();
        line.elapsed = round_elapsed(start.elapsed());
        match res.status {
            s if s < 100 || s >= 500 => access_event!(Level::ERROR, &line),
            s if s < 200 || s >= 400 => access_event!(Level::WARN, &line),
            _ => access_event!(Level::INFO, &line),
        }
        res
    }
}

/// Path part of a matched pattern key: `GET example.com/user/{id}` gives `/user/{id}`.
pub(crate) fn route_of(pattern: &str) -> &str {
    match pattern.find('/') {
        Some(idx) => &pattern[idx..],
        None => pattern,
    }
}

/// Client address, preferring what a trusted proxy reported.
///
/// Checks `True-Client-IP`, `X-Real-IP`, then the first `X-Forwarded-For` entry;
/// a value that is not an IP address is skipped. Falls back to the host part of
/// the peer address.
#[must_use]
pub fn real_ip(req: &HandlerRequest) -> String {
    let forwarded = req
        .get_header(header::X_FORWARDED_FOR)
        .and_then(|v| v.split(',').next());
    let candidates = [
        req.get_header(header::TRUE_CLIENT_IP),
        req.get_header(header::X_REAL_IP),
        forwarded,
    ];
    for candidate in candidates.into_iter().flatten() {
        if let Ok(ip) = candidate.trim().parse::<IpAddr>() {
            return ip.to_string();
        }
    }

    match req.remote_addr.as_deref() {
        Some(addr) => match addr.parse::<SocketAddr>() {
            Ok(socket) => socket.ip().to_string(),
            Err(_) => addr.to_string(),
        },
        None => String::new(),
    }
}

/// Round a latency for display: microseconds below 1ms, 10µs steps below 1s,
/// 10ms steps above.
#[must_use]
pub fn round_elapsed(elapsed: Duration) -> Duration {
    let step = if elapsed < Duration::from_millis(1) {
        Duration::from_micros(1)
    } else if elapsed < Duration::from_secs(1) {
        Duration::from_micros(10)
    } else {
        Duration::from_millis(10)
    };
    let step_ns = step.as_nanos();
    let rounded = (elapsed.as_nanos() + step_ns / 2) / step_ns * step_ns;
    Duration::from_nanos(u64::try_from(rounded).unwrap_or(u64::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::method::RouteMethod;

    #[test]
    fn test_real_ip_order() {
        let req = HandlerRequest::new(RouteMethod::Get, "/")
            .with_remote_addr("10.0.0.1:5555")
            .with_header("X-Forwarded-For", "203.0.113.7, 10.0.0.2")
            .with_header("X-Real-IP", "not-an-ip")
            .with_header("True-Client-IP", "198.51.100.4");
        assert_eq!(real_ip(&req), "198.51.100.4");

        let req = HandlerRequest::new(RouteMethod::Get, "/")
            .with_remote_addr("10.0.0.1:5555")
            .with_header("X-Forwarded-For", "203.0.113.7, 10.0.0.2")
            .with_header("X-Real-IP", "not-an-ip");
        assert_eq!(real_ip(&req), "203.0.113.7");

        let req = HandlerRequest::new(RouteMethod::Get, "/").with_remote_addr("[::1]:5555");
        assert_eq!(real_ip(&req), "::1");

        let req = HandlerRequest::new(RouteMethod::Get, "/");
        assert_eq!(real_ip(&req), "");
    }

    #[test]
    fn test_round_elapsed() {
        assert_eq!(
            round_elapsed(Duration::from_nanos(1_499)),
            Duration::from_micros(1)
        );
        assert_eq!(
            round_elapsed(Duration::from_nanos(12_345_678)),
            Duration::from_micros(12_350)
        );
        assert_eq!(
            round_elapsed(Duration::from_millis(2_345)),
            Duration::from_millis(2_350)
        );
    }

    #[test]
    fn test_route_of() {
        assert_eq!(route_of("GET example.com/user/{id}"), "/user/{id}");
        assert_eq!(route_of("/health"), "/health");
        assert_eq!(route_of(""), "");
    }

    #[test]
    fn test_request_id_echoed() {
        let id = RequestId::new();
        let handler = |req: HandlerRequest| HandlerResponse::text(200, &req.request_id.to_string());
        let req = HandlerRequest::new(RouteMethod::Get, "/")
            .with_header(header::X_LOGGER_ID, &id.to_string());
        let res = LoggingMiddleware.handle(req, &handler);
        assert_eq!(res.body_text(), id.to_string());
        assert_eq!(res.get_header(header::X_LOGGER_ID), Some(id.to_string().as_str()));

        let res = LoggingMiddleware.handle(HandlerRequest::new(RouteMethod::Get, "/"), &handler);
        assert_eq!(res.get_header(header::X_LOGGER_ID).map(str::len), Some(26));
    }
}
