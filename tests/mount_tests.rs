use routemux::{HandlerRequest, HandlerResponse, RouteMethod, Router, RouterBuilder, RouterError, RouterOptions};

mod common;
use common::{request, CallLog};

/// Handler reporting what it saw: `<pattern>|<path>|<mount>`
fn report(req: HandlerRequest) -> HandlerResponse {
    HandlerResponse::text(
        200,
        &format!(
            "{}|{}|{}",
            req.pattern,
            req.path,
            req.mount_pattern.as_deref().unwrap_or("-")
        ),
    )
}

fn users_router() -> Router {
    let root = RouterBuilder::new(RouterOptions::new());
    root.get("/users/{id}", report).unwrap();
    root.post("/users", report).unwrap();
    root.finalize().unwrap()
}

#[test]
fn test_mount_strips_prefix_and_reports_absolute_pattern() {
    let outer = RouterBuilder::new(RouterOptions::new());
    outer.mount("/api", users_router()).unwrap();
    assert!(outer.route_patterns().is_empty());
    let router = outer.finalize().unwrap();
    assert_eq!(router.patterns(), vec!["/api/".to_string()]);

    let res = router.dispatch(request(RouteMethod::Get, "/api/users/7"));
    assert_eq!(res.body_text(), "GET /api/users/{id}|/users/7|/api");

    let res = router.dispatch(request(RouteMethod::Post, "/api/users"));
    assert_eq!(res.body_text(), "POST /api/users|/users|/api");
}

#[test]
fn test_mounted_router_keeps_its_defaults() {
    let outer = RouterBuilder::new(RouterOptions::new());
    outer.mount("/api", users_router()).unwrap();
    let router = outer.finalize().unwrap();

    let res = router.dispatch(request(RouteMethod::Get, "/api/nothing"));
    assert_eq!(res.status, 404);
    assert_eq!(res.body_text(), "404 not found");

    let res = router.dispatch(request(RouteMethod::Delete, "/api/users"));
    assert_eq!(res.status, 405);
    assert_eq!(res.get_header("Allow"), Some("OPTIONS, POST"));

    let res = router.dispatch(request(RouteMethod::Options, "/api/users/1"));
    assert_eq!(res.status, 204);
    assert_eq!(res.get_header("Allow"), Some("GET, HEAD, OPTIONS"));
}

#[test]
fn test_nested_mounts_join_patterns() {
    let inner = RouterBuilder::new(RouterOptions::new());
    inner.get("/{id}", report).unwrap();
    let middle = RouterBuilder::new(RouterOptions::new());
    middle.mount("/users", inner.finalize().unwrap()).unwrap();
    let outer = RouterBuilder::new(RouterOptions::new());
    outer.mount("/api", middle.finalize().unwrap()).unwrap();
    let router = outer.finalize().unwrap();

    let res = router.dispatch(request(RouteMethod::Get, "/api/users/7"));
    assert_eq!(res.body_text(), "GET /api/users/{id}|/7|/api/users");
}

#[test]
fn test_mount_under_wildcard_prefix() {
    let inner = RouterBuilder::new(RouterOptions::new());
    inner
        .get("/repos/{id}", |req: HandlerRequest| {
            HandlerResponse::text(
                200,
                &format!(
                    "{} org={} id={}",
                    req.pattern,
                    req.path_value("org").unwrap_or("-"),
                    req.path_value("id").unwrap_or("-")
                ),
            )
        })
        .unwrap();

    let outer = RouterBuilder::new(RouterOptions::new());
    outer
        .group("/org/{org}")
        .unwrap()
        .mount("/", inner.finalize().unwrap())
        .unwrap();
    let router = outer.finalize().unwrap();

    let res = router.dispatch(request(RouteMethod::Get, "/org/acme/repos/3"));
    assert_eq!(res.body_text(), "GET /org/{org}/repos/{id} org=acme id=3");
}

#[test]
fn test_mount_does_not_inherit_middleware() {
    let log = CallLog::default();
    let inner = RouterBuilder::new(RouterOptions::new());
    inner.get("/x", log.handler("inner")).unwrap();

    let mut outer = RouterBuilder::new(RouterOptions::new());
    outer.use_middleware(log.middleware("outer"));
    outer.get("/local", log.handler("local")).unwrap();
    outer.mount("/sub", inner.finalize().unwrap()).unwrap();
    let router = outer.finalize().unwrap();

    router.dispatch(request(RouteMethod::Get, "/sub/x"));
    assert_eq!(log.take(), vec!["HANDLER:inner"]);

    router.dispatch(request(RouteMethod::Get, "/local"));
    assert_eq!(log.take(), vec!["BEFORE:outer", "HANDLER:local", "AFTER:outer"]);
}

#[test]
fn test_mount_conflicts_and_composition_errors() {
    let outer = RouterBuilder::new(RouterOptions::new());
    let api = outer.group("/api").unwrap();
    api.mount("/v2", users_router()).unwrap();
    assert_eq!(
        outer.mount("/api/v2", users_router()).unwrap_err(),
        RouterError::PatternConflict {
            pattern: "/api/v2/".to_string()
        }
    );

    let host = outer.group("a.example.com").unwrap();
    assert!(matches!(
        host.mount("b.example.com/x", users_router()),
        Err(RouterError::HostConflict { .. })
    ));
}

#[test]
fn test_mount_with_plain_handler() {
    let outer = RouterBuilder::new(RouterOptions::new());
    outer.mount("/static", report).unwrap();
    let router = outer.finalize().unwrap();

    let res = router.dispatch(request(RouteMethod::Get, "/static/css/site.css"));
    assert_eq!(res.body_text(), "/static/|/css/site.css|/static");
    let res = router.dispatch(request(RouteMethod::Delete, "/static/"));
    assert_eq!(res.body_text(), "/static/|/|/static");
}

#[test]
fn test_mount_at_root_takes_over_host_fallback() {
    let outer = RouterBuilder::new(RouterOptions::new());
    outer.get("/health", report).unwrap();
    outer.mount("/", users_router()).unwrap();
    outer.get("/ready", report).unwrap();
    assert_eq!(
        outer.mount("/", report).unwrap_err(),
        RouterError::PatternConflict {
            pattern: "/".to_string()
        }
    );
    let router = outer.finalize().unwrap();

    let res = router.dispatch(request(RouteMethod::Get, "/health"));
    assert_eq!(res.body_text(), "GET /health|/health|-");
    let res = router.dispatch(request(RouteMethod::Get, "/ready"));
    assert_eq!(res.body_text(), "GET /ready|/ready|-");
    let res = router.dispatch(request(RouteMethod::Get, "/users/7"));
    assert_eq!(res.body_text(), "GET /users/{id}|/users/7|");

    let res = router.dispatch(request(RouteMethod::Delete, "/health"));
    assert_eq!(res.status, 405);
    let res = router.dispatch(request(RouteMethod::Get, "/nothing"));
    assert_eq!(res.status, 404);
}

#[test]
fn test_mount_at_root_before_any_route() {
    let outer = RouterBuilder::new(RouterOptions::new());
    outer.mount("/", users_router()).unwrap();
    outer.get("/h", report).unwrap();
    let router = outer.finalize().unwrap();

    let res = router.dispatch(request(RouteMethod::Get, "/h"));
    assert_eq!(res.body_text(), "GET /h|/h|-");
    let res = router.dispatch(request(RouteMethod::Post, "/users"));
    assert_eq!(res.body_text(), "POST /users|/users|");
}
