use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use routemux::middleware::CorsPolicy;
use routemux::{
    HandlerRequest, HandlerResponse, RouteMethod, Router, RouterBuilder, RouterError,
    RouterOptions,
};

fn ok(_req: HandlerRequest) -> HandlerResponse {
    HandlerResponse::new(200)
}

fn register(root: &RouterBuilder) -> Result<(), RouterError> {
    root.get("/", ok)?;
    root.route("/zoo", |zoo| {
        zoo.get("/animals", ok)?;
        zoo.post("/animals", ok)?;
        zoo.route("/animals/{id}", |animal| {
            animal.get("/", ok)?;
            animal.put("/", ok)?;
            animal.patch("/", ok)?;
            animal.delete("/", ok)?;
            animal.get("/toys/{toy_id}", ok)
        })?;
        zoo.get("/{category}/animals/{id}/habitats/{habitat_id}/sections/{section_id}", ok)?;
        zoo.head("/health", ok)?;
        zoo.trace("/health", ok)
    })?;
    root.post(
        "/inventory/{warehouse_id}/feeds/{feed_id}/items/{item_id}/batches/{batch_id}",
        ok,
    )?;
    root.get("/static/{path...}", ok)?;
    Ok(())
}

fn build(options: RouterOptions) -> Router {
    let root = RouterBuilder::new(options);
    register(&root).expect("routes register");
    root.finalize().expect("router finalizes")
}

fn bench_registration(c: &mut Criterion) {
    c.bench_function("register_routes", |b| {
        b.iter(|| black_box(build(RouterOptions::new())))
    });
}

fn bench_dispatch(c: &mut Criterion) {
    let router = build(RouterOptions::new());
    let requests = [
        (RouteMethod::Get, "/zoo/animals/123"),
        (RouteMethod::Get, "/zoo/animals/123/toys/456"),
        (RouteMethod::Get, "/zoo/cats/animals/123/habitats/88/sections/5"),
        (RouteMethod::Post, "/inventory/1/feeds/2/items/3/batches/4"),
        (RouteMethod::Get, "/static/css/site.css"),
        (RouteMethod::Delete, "/zoo/animals"),
        (RouteMethod::Options, "/zoo/animals/123"),
        (RouteMethod::Get, "/missing/path"),
    ];
    c.bench_function("dispatch", |b| {
        b.iter(|| {
            for (method, path) in &requests {
                let res = router.dispatch(HandlerRequest::new(method.clone(), path));
                black_box(&res);
            }
        })
    });
}

fn bench_cors_preflight(c: &mut Criterion) {
    let policy = CorsPolicy::builder()
        .allowed_origins(&["https://app.example.com", "https://*.example.org"])
        .allowed_headers(&["Content-Type", "Authorization"])
        .build()
        .expect("valid CORS configuration");
    let router = build(RouterOptions::new().with_cors(policy));
    c.bench_function("cors_preflight", |b| {
        b.iter(|| {
            let req = HandlerRequest::new(RouteMethod::Options, "/zoo/animals/123")
                .with_header("Origin", "https://docs.example.org")
                .with_header("Access-Control-Request-Method", "PUT")
                .with_header("Access-Control-Request-Headers", "content-type");
            black_box(router.dispatch(req))
        })
    });
}

criterion_group!(benches, bench_registration, bench_dispatch, bench_cors_preflight);
criterion_main!(benches);
