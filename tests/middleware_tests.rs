use std::io::Write;
use std::sync::{Arc, Mutex};

use tracing_subscriber::fmt::format::FmtSpan;

use routemux::middleware::{LoggingMiddleware, RecoverMiddleware, TracingMiddleware};
use routemux::{HandlerRequest, HandlerResponse, RouteMethod, RouterBuilder, RouterOptions};

mod common;
use common::request;

/// In-memory sink for the JSON formatter.
#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn lines(&self) -> Vec<serde_json::Value> {
        let bytes = self.0.lock().unwrap().clone();
        String::from_utf8(bytes)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    fn access_lines(&self) -> Vec<serde_json::Value> {
        self.lines()
            .into_iter()
            .filter(|line| {
                line["fields"]["message"]
                    .as_str()
                    .is_some_and(|m| m.starts_with("HTTP Response"))
            })
            .collect()
    }
}

impl Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

fn with_captured_logs<T>(f: impl FnOnce() -> T) -> (T, CapturedLogs) {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .json()
        .with_max_level(tracing::Level::DEBUG)
        .with_writer(move || writer.clone())
        .finish();
    let out = tracing::subscriber::with_default(subscriber, f);
    (out, logs)
}

/// Like `with_captured_logs`, plus one `close` event per span.
fn with_captured_spans<T>(f: impl FnOnce() -> T) -> (T, CapturedLogs) {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .json()
        .with_max_level(tracing::Level::DEBUG)
        .with_span_events(FmtSpan::CLOSE)
        .with_writer(move || writer.clone())
        .finish();
    let out = tracing::subscriber::with_default(subscriber, f);
    (out, logs)
}

#[test]
fn test_access_log_reports_route_and_status() {
    let ((), logs) = with_captured_logs(|| {
        let mut root = RouterBuilder::new(RouterOptions::new());
        root.use_middleware(LoggingMiddleware);
        root.get("/user/{id}", |_req: HandlerRequest| HandlerResponse::text(200, "ok"))
            .unwrap();
        let router = root.finalize().unwrap();

        let req = request(RouteMethod::Get, "/user/42")
            .with_host("api.example.com")
            .with_remote_addr("192.0.2.10:40000")
            .with_header("User-Agent", "curl/8.0");
        let res = router.dispatch(req);
        assert_eq!(res.status, 200);
        assert!(res.get_header("X-Logger-ID").is_some());

        let res = router.dispatch(request(RouteMethod::Get, "/nowhere"));
        assert_eq!(res.status, 404);
    });

    let lines = logs.access_lines();
    assert_eq!(lines.len(), 2);

    let ok = &lines[0];
    assert_eq!(ok["level"], "INFO");
    assert_eq!(ok["fields"]["route"], "/user/{id}");
    assert_eq!(ok["fields"]["path"], "/user/42");
    assert_eq!(ok["fields"]["method"], "GET");
    assert_eq!(ok["fields"]["status"], 200);
    assert_eq!(ok["fields"]["ip"], "192.0.2.10");
    assert_eq!(ok["fields"]["host"], "api.example.com");
    assert_eq!(ok["fields"]["user_agent"], "curl/8.0");

    let missing = &lines[1];
    assert_eq!(missing["level"], "WARN");
    assert_eq!(missing["fields"]["status"], 404);
    assert_eq!(missing["fields"]["route"], "/");
}

#[test]
fn test_access_log_sees_absolute_route_behind_mount() {
    let ((), logs) = with_captured_logs(|| {
        let mut inner = RouterBuilder::new(RouterOptions::new());
        inner.use_middleware(LoggingMiddleware);
        inner
            .get("/users/{id}", |_req: HandlerRequest| HandlerResponse::new(204))
            .unwrap();

        let outer = RouterBuilder::new(RouterOptions::new());
        outer.mount("/api", inner.finalize().unwrap()).unwrap();
        let router = outer.finalize().unwrap();
        router.dispatch(request(RouteMethod::Get, "/api/users/5"));
    });

    let lines = logs.access_lines();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["fields"]["route"], "/api/users/{id}");
    assert_eq!(lines[0]["fields"]["path"], "/users/5");
}

#[test]
fn test_client_request_id_is_kept() {
    let mut root = RouterBuilder::new(RouterOptions::new());
    root.use_middleware(LoggingMiddleware);
    root.get("/id", |req: HandlerRequest| {
        HandlerResponse::text(200, &req.request_id.to_string())
    })
    .unwrap();
    let router = root.finalize().unwrap();

    let id = "01ARZ3NDEKTSV4RRFFQ69G5FAV";
    let res = router.dispatch(request(RouteMethod::Get, "/id").with_header("X-Logger-ID", id));
    assert_eq!(res.body_text(), id);
    assert_eq!(res.get_header("X-Logger-ID"), Some(id));
}

#[test]
fn test_recover_turns_panic_into_500() {
    let ((), logs) = with_captured_logs(|| {
        let mut root = RouterBuilder::new(RouterOptions::new());
        root.use_middleware(LoggingMiddleware);
        root.use_middleware(RecoverMiddleware);
        root.get("/boom", |_req: HandlerRequest| -> HandlerResponse {
            panic!("kaboom")
        })
        .unwrap();
        root.get("/fine", |_req: HandlerRequest| HandlerResponse::text(200, "fine"))
            .unwrap();
        let router = root.finalize().unwrap();

        let res = router.dispatch(request(RouteMethod::Get, "/boom"));
        assert_eq!(res.status, 500);
        assert_eq!(res.body_text(), "500 internal server error");

        let res = router.dispatch(request(RouteMethod::Get, "/fine"));
        assert_eq!(res.status, 200);
    });

    let lines = logs.lines();
    let panic_line = lines
        .iter()
        .find(|line| line["fields"]["message"] == "handler panicked")
        .unwrap();
    assert_eq!(panic_line["level"], "ERROR");
    assert_eq!(panic_line["fields"]["panic"], "kaboom");
    assert_eq!(panic_line["fields"]["pattern"], "GET /boom");

    let access = logs.access_lines();
    assert_eq!(access[0]["level"], "ERROR");
    assert_eq!(access[0]["fields"]["status"], 500);
}

#[test]
fn test_tracing_span_carries_route_and_log_id() {
    let id = "01ARZ3NDEKTSV4RRFFQ69G5FAV";
    let ((), logs) = with_captured_spans(|| {
        let mut inner = RouterBuilder::new(RouterOptions::new());
        inner.use_middleware(LoggingMiddleware);
        inner.use_middleware(TracingMiddleware);
        inner
            .get("/users/{id}", |_req: HandlerRequest| {
                tracing::info!("loading user");
                HandlerResponse::text(200, "ok")
            })
            .unwrap();

        let outer = RouterBuilder::new(RouterOptions::new());
        outer.mount("/api", inner.finalize().unwrap()).unwrap();
        let router = outer.finalize().unwrap();

        let req = request(RouteMethod::Get, "/api/users/5").with_header("X-Logger-ID", id);
        let res = router.dispatch(req);
        assert_eq!(res.status, 200);
    });

    let lines = logs.lines();
    let inside = lines
        .iter()
        .find(|line| line["fields"]["message"] == "loading user")
        .unwrap();
    assert_eq!(inside["span"]["name"], "http_request");
    assert_eq!(inside["span"]["http.route"], "/api/users/{id}");
    assert_eq!(inside["span"]["http.request.method"], "GET");
    assert_eq!(inside["span"]["log.id"], id);

    let closed = lines
        .iter()
        .find(|line| line["fields"]["message"] == "close" && line["span"]["name"] == "http_request")
        .unwrap();
    assert_eq!(closed["span"]["http.response.status_code"], 200);
    assert_eq!(closed["span"]["log.id"], id);

    let access = logs.access_lines();
    assert_eq!(access.len(), 1);
    assert_eq!(access[0]["fields"]["request_id"], id);
    assert!(access[0].get("span").is_none());
}
