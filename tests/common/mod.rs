#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use routemux::middleware::Middleware;
use routemux::{Handler, HandlerRequest, HandlerResponse, RouteMethod};

/// Handler answering `200 <name> <pattern>`.
pub fn named(name: &'static str) -> impl Handler + 'static {
    move |req: HandlerRequest| HandlerResponse::text(200, &format!("{name} {}", req.pattern))
}

pub fn request(method: RouteMethod, path: &str) -> HandlerRequest {
    HandlerRequest::new(method, path)
}

pub fn with_origin(method: RouteMethod, path: &str, origin: &str) -> HandlerRequest {
    HandlerRequest::new(method, path).with_header("Origin", origin)
}

/// Records the order middleware and handlers run in.
#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.0.lock().unwrap())
    }

    /// Middleware logging `BEFORE:<tag>` and `AFTER:<tag>` around the rest of the chain.
    pub fn middleware(&self, tag: &'static str) -> impl Middleware + 'static {
        let log = self.clone();
        move |req: HandlerRequest, next: &dyn Handler| {
            log.push(format!("BEFORE:{tag}"));
            let res = next.handle(req);
            log.push(format!("AFTER:{tag}"));
            res
        }
    }

    /// Handler logging `HANDLER:<tag>` and answering 200.
    pub fn handler(&self, tag: &'static str) -> impl Handler + 'static {
        let log = self.clone();
        move |_req: HandlerRequest| {
            log.push(format!("HANDLER:{tag}"));
            HandlerResponse::text(200, tag)
        }
    }
}

pub mod temp_files {
    use std::io::Write;

    use tempfile::NamedTempFile;

    /// Write `content` to a temporary file ending in `.{ext}`; removed on drop.
    pub fn create_temp_config(content: &str, ext: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new()
            .prefix("routemux_test_")
            .suffix(&format!(".{ext}"))
            .tempfile()
            .unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }
}
