//! Wires the URI-shortener use cases into router handlers, producing a
//! small JSON response surface.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

use crate::error::DomainErrorKind;
use crate::request::Request;
use crate::response::Response;
use crate::router::Router;
use crate::shortener::usecases::{DeleteLink, LinkRepository, ResolveLink, ShortenUrl};

#[derive(Serialize)]
struct ShortenResponseBody {
    code: String,
    short_url: String,
}

#[derive(Serialize)]
struct ResolveResponseBody {
    original_url: String,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

fn now_unix() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}

fn write_json(response: &mut Response, status: u16, body: &impl Serialize) {
    response.set_status(status);
    response.set_header("content-type", "application/json");
    let bytes = serde_json::to_vec(body).unwrap_or_else(|_| b"{}".to_vec());
    response.write(&bytes);
    response.close();
}

fn write_domain_error(response: &mut Response, kind: DomainErrorKind) {
    write_json(response, kind.http_status(), &ErrorBody { error: kind.to_string() });
}

/// Registers `POST /links`, `GET /links/:code`, `DELETE /links/:code` on
/// `router`, backed by `repository`.
pub fn register(router: &mut Router, repository: Arc<dyn LinkRepository>) {
    let shorten = Arc::new(ShortenUrl::new(Arc::clone(&repository)));
    router.route("POST", "/links", move |request: Request, mut response: Response| {
        let raw_url = String::from_utf8_lossy(&request.body()).to_string();
        match shorten.execute(&raw_url, None, now_unix()) {
            Ok(link) => {
                let code = link.code().as_str().to_string();
                write_json(
                    &mut response,
                    201,
                    &ShortenResponseBody { short_url: format!("/links/{code}"), code },
                );
            }
            Err(kind) => write_domain_error(&mut response, kind),
        }
    });

    let resolve = Arc::new(ResolveLink::new(Arc::clone(&repository)));
    router.route("GET", "/links/:code", move |request: Request, mut response: Response| {
        let code = request.path_param("code").unwrap_or_default();
        match resolve.execute(&code, now_unix()) {
            Ok(original_url) => write_json(&mut response, 200, &ResolveResponseBody { original_url }),
            Err(kind) => write_domain_error(&mut response, kind),
        }
    });

    let delete = Arc::new(DeleteLink::new(repository));
    router.route("DELETE", "/links/:code", move |request: Request, mut response: Response| {
        let code = request.path_param("code").unwrap_or_default();
        match delete.execute(&code) {
            Ok(()) => {
                response.set_status(204);
                response.close();
            }
            Err(kind) => write_domain_error(&mut response, kind),
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::RequestData;
    use crate::response::ResponseHandle;
    use crate::shortener::usecases::InMemoryLinkRepository;
    use std::sync::Mutex;

    fn harness() -> (tokio::runtime::Runtime, Router, Arc<Mutex<Option<(u16, Vec<u8>)>>>, ResponseHandle) {
        let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        let mut router = Router::new();
        register(&mut router, Arc::new(InMemoryLinkRepository::new()));
        let captured = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&captured);
        let handle = ResponseHandle::new(rt.handle().clone(), move |status, _headers, body| {
            *sink.lock().unwrap() = Some((status, body));
        });
        (rt, router, captured, handle)
    }

    fn request(method: &str, path: &str, body: &[u8]) -> Request {
        let mut data = RequestData::new(method, path);
        data.body = body.to_vec();
        Request::new(&data.shared())
    }

    #[test]
    fn shorten_then_resolve_via_router() {
        let (rt, router, captured, handle) = harness();
        router.dispatch(request("POST", "/links", b"https://example.com/a"), Response::new(&handle));
        rt.block_on(async { tokio::task::yield_now().await });
        let (status, body) = captured.lock().unwrap().take().unwrap();
        assert_eq!(status, 201);
        let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
        let code = parsed["code"].as_str().unwrap().to_string();

        router.dispatch(request("GET", &format!("/links/{code}"), b""), Response::new(&handle));
        rt.block_on(async { tokio::task::yield_now().await });
        let (status, body) = captured.lock().unwrap().take().unwrap();
        assert_eq!(status, 200);
        let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed["original_url"], "https://example.com/a");
    }

    #[test]
    fn invalid_url_is_400() {
        let (rt, router, captured, handle) = harness();
        router.dispatch(request("POST", "/links", b"not-a-url"), Response::new(&handle));
        rt.block_on(async { tokio::task::yield_now().await });
        assert_eq!(captured.lock().unwrap().as_ref().unwrap().0, 400);
    }

    #[test]
    fn resolve_unknown_code_is_404() {
        let (rt, router, captured, handle) = harness();
        router.dispatch(request("GET", "/links/abcd1234", b""), Response::new(&handle));
        rt.block_on(async { tokio::task::yield_now().await });
        assert_eq!(captured.lock().unwrap().as_ref().unwrap().0, 404);
    }
}
