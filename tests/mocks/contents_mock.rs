//! In-process stand-in for the versioned contents API the backup client
//! talks to.

use actix_web::dev::ServerHandle;
use actix_web::{web, App, HttpRequest, HttpResponse, HttpServer};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const TOKEN: &str = "test-token";

#[derive(Default)]
pub struct ContentsState {
    pub sha: Option<String>,    // Revision of the stored file, None until created
    pub puts: Vec<Value>,       // Every PUT body received, in order
    pub gets: usize,
    pub fail_with: Option<u16>, // Answer every request with this status
    pub garbage_body: bool,     // GET answers 200 with a body that is not JSON
    pub delay: Option<Duration>, // Stall every GET this long before answering
}

pub struct MockContents {
    pub base_url: String,
    pub state: Arc<Mutex<ContentsState>>,
    handle: ServerHandle,
}

impl MockContents {
    pub async fn stop(self) {
        self.handle.stop(false).await;
    }
}

pub async fn start(state: ContentsState) -> MockContents {
    let state = Arc::new(Mutex::new(state));
    let data = web::Data::from(state.clone());
    let server = HttpServer::new(move || {
        App::new()
            .app_data(data.clone())
            .route("/repos/{owner}/{repo}/contents/{path:.*}", web::get().to(get_contents))
            .route("/repos/{owner}/{repo}/contents/{path:.*}", web::put().to(put_contents))
    })
    .workers(1)
    .bind(("127.0.0.1", 0))
    .expect("failed to bind mock contents API");
    let addr = server.addrs()[0];
    let server = server.run();
    let handle = server.handle();
    actix_web::rt::spawn(server);

    MockContents {
        base_url: format!("http://{addr}"),
        state,
        handle,
    }
}

fn authorized(req: &HttpRequest) -> bool {
    req.headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(|v| v == format!("token {TOKEN}"))
        .unwrap_or(false)
}

fn status(code: u16) -> HttpResponse {
    HttpResponse::build(actix_web::http::StatusCode::from_u16(code).unwrap())
        .json(json!({"message": "mock failure"}))
}

async fn get_contents(req: HttpRequest, state: web::Data<Mutex<ContentsState>>) -> HttpResponse {
    let delay = state.lock().unwrap().delay;
    if let Some(delay) = delay {
        actix_web::rt::time::sleep(delay).await;
    }

    let mut state = state.lock().unwrap();
    state.gets += 1;
    if state.garbage_body {
        return HttpResponse::Ok()
            .content_type("text/html")
            .body("<html>maintenance</html>");
    }
    if let Some(code) = state.fail_with {
        return status(code);
    }
    if !authorized(&req) {
        return status(401);
    }
    match &state.sha {
        Some(sha) => HttpResponse::Ok().json(json!({"type": "file", "sha": sha})),
        None => HttpResponse::NotFound().json(json!({"message": "Not Found"})),
    }
}

async fn put_contents(
    req: HttpRequest,
    state: web::Data<Mutex<ContentsState>>,
    body: web::Json<Value>,
) -> HttpResponse {
    let mut state = state.lock().unwrap();
    if let Some(code) = state.fail_with {
        return status(code);
    }
    if !authorized(&req) {
        return status(401);
    }
    let body = body.into_inner();
    let sent_sha = body.get("sha").and_then(Value::as_str).map(str::to_string);
    if sent_sha != state.sha {
        return HttpResponse::Conflict().json(json!({"message": "sha mismatch"}));
    }

    let created = state.sha.is_none();
    state.puts.push(body);
    let new_sha = format!("sha-{}", state.puts.len());
    state.sha = Some(new_sha.clone());

    let reply = json!({"content": {"sha": new_sha}});
    if created {
        HttpResponse::Created().json(reply)
    } else {
        HttpResponse::Ok().json(reply)
    }
}
