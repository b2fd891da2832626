//! End-to-end pipeline tests: requests go through the dispatcher exactly as
//! the server hands them over, against in-memory collaborators.

use std::sync::Arc;

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use serde_json::{Value, json};

use hapi::store::{Post, User};
use hapi::{
    ArgSpec, Args, Config, Context, Descriptor, Dispatcher, Endpoint, HandlerResult, MemoryIdentity,
    MemoryStore, Method, Principal, Registry, Request, Response, Status, Store, endpoints,
};

const EDITOR: u64 = 1;
const READER: u64 = 2;

struct Harness {
    dispatcher: Dispatcher,
    identity: Arc<MemoryIdentity>,
    posts: Arc<MemoryStore<Post>>,
    users: Arc<MemoryStore<User>>,
}

impl Harness {
    fn new() -> Self {
        Self::with_registry(|registry| registry)
    }

    fn with_registry(extra: impl FnOnce(Registry) -> Registry) -> Self {
        let config = Config { redirect_hosts: vec!["example.com".into()], ..Config::default() };

        let identity = Arc::new(MemoryIdentity::new());
        identity.add_user(Principal::new(EDITOR, "editor", &["edit_posts"]), "secret");
        identity.add_user(Principal::new(READER, "reader", &["read"]), "secret");
        identity.add_api_key(EDITOR, "k3y");
        identity.add_api_key(READER, "r3ad");

        let posts = Arc::new(MemoryStore::<Post>::new());
        let users = Arc::new(MemoryStore::<User>::new());
        let registry = extra(endpoints::register_all(
            Registry::with_base(&config.base_path),
            posts.clone(),
            users.clone(),
        ));

        let dispatcher = Dispatcher::new(&config, registry, identity.clone());
        Self { dispatcher, identity, posts, users }
    }

    async fn send(&self, req: Request) -> Response {
        self.dispatcher.dispatch(req).await
    }

    /// Cookie header and nonce for a browser-style request as `user_id`.
    fn session(&self, user_id: u64) -> (String, String) {
        let token = self.identity.start_session(user_id);
        let nonce = self.identity.issue_nonce(user_id, "h-api");
        (format!("hapi_session={token}"), nonce)
    }
}

fn basic(user: &str, password: &str) -> String {
    format!("Basic {}", BASE64.encode(format!("{user}:{password}")))
}

fn form(method: Method, path: &str, body: &str) -> Request {
    Request::new(method, path)
        .header("content-type", "application/x-www-form-urlencoded")
        .body_bytes(body.as_bytes())
}

fn as_editor(req: Request) -> Request {
    req.header("authorization", &basic("editor", "secret"))
}

fn json_body(res: &Response) -> Value {
    serde_json::from_slice(res.body()).expect("json body")
}

fn text_body(res: &Response) -> &str {
    std::str::from_utf8(res.body()).expect("utf-8 body")
}

// ── Authentication ────────────────────────────────────────────────────────────

#[tokio::test]
async fn missing_credentials_get_a_challenge() {
    let h = Harness::new();
    let res = h.send(Request::new(Method::Get, "/api/json/post/42")).await;
    assert_eq!(res.status_code(), 401);
    assert_eq!(res.header("www-authenticate"), Some(r#"Basic realm="H-API""#));
    assert!(res.body().is_empty());
}

#[tokio::test]
async fn session_without_nonce_is_rejected_despite_basic_credentials() {
    let h = Harness::new();
    let (cookie, _) = h.session(EDITOR);
    let req = as_editor(Request::new(Method::Get, "/api/json/user").header("cookie", &cookie));
    let res = h.send(req).await;
    assert_eq!(res.status_code(), 401);
    assert_eq!(res.header("www-authenticate"), None);
}

#[tokio::test]
async fn missing_capability_is_rejected_without_challenge() {
    let h = Harness::new();
    let req = Request::new(Method::Get, "/api/json/user").header("authorization", &basic("reader", "secret"));
    let res = h.send(req).await;
    assert_eq!(res.status_code(), 401);
    assert_eq!(res.header("www-authenticate"), None);
}

#[tokio::test]
async fn api_key_authenticates() {
    let h = Harness::new();
    let id = h
        .users
        .save(User { email: "a@b.com".into(), password: "pw".into(), ..User::default() })
        .await
        .unwrap();

    let req = Request::new(Method::Get, &format!("/api/json/user/{id}"))
        .header("authorization", &basic("k3y", ""));
    let res = h.send(req).await;
    assert_eq!(res.status_code(), 200);
    assert_eq!(json_body(&res), json!({ "id": id, "email": "a@b.com" }));
}

#[tokio::test]
async fn api_key_without_capability_is_rejected_without_challenge() {
    let h = Harness::new();
    let req = Request::new(Method::Get, "/api/json/user").header("authorization", &basic("r3ad", ""));
    let res = h.send(req).await;
    assert_eq!(res.status_code(), 401);
    assert_eq!(res.header("www-authenticate"), None);
}

#[tokio::test]
async fn session_with_empty_nonce_is_rejected() {
    let h = Harness::new();
    let (cookie, _) = h.session(EDITOR);
    let req = form(Method::Post, "/api/json/post", "title=x&_nonce=").header("cookie", &cookie);
    let res = h.send(req).await;
    assert_eq!(res.status_code(), 401);
    assert_eq!(res.header("www-authenticate"), None);
    assert!(h.posts.load(1).await.unwrap().is_none());
}

#[tokio::test]
async fn undecodable_basic_header_gets_a_challenge() {
    let h = Harness::new();
    let req = Request::new(Method::Get, "/api/json/user").header("authorization", "Basic %%%");
    let res = h.send(req).await;
    assert_eq!(res.status_code(), 401);
    assert_eq!(res.header("www-authenticate"), Some(r#"Basic realm="H-API""#));
}

// ── Users ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn creating_a_user_with_a_session_returns_the_user() {
    let h = Harness::new();
    let (cookie, nonce) = h.session(EDITOR);
    let req = form(Method::Post, "/api/json/user", &format!("email=a%40b.com&password=x&_nonce={nonce}"))
        .header("cookie", &cookie);

    let res = h.send(req).await;
    assert_eq!(res.status_code(), 200);
    assert_eq!(res.header("content-type"), Some("application/json"));

    let body = json_body(&res);
    assert_eq!(body["email"], "a@b.com");
    let id = body["id"].as_u64().expect("numeric id");
    let stored = h.users.load(id).await.unwrap().expect("stored user");
    assert_eq!(stored.password, "x");
}

#[tokio::test]
async fn json_bodies_and_header_nonces_are_accepted() {
    let h = Harness::new();
    let (cookie, nonce) = h.session(EDITOR);
    let req = Request::new(Method::Post, "/api/json/user")
        .header("content-type", "application/json")
        .header("cookie", &cookie)
        .header("x-hapi-nonce", &nonce)
        .body_bytes(br#"{"email":" c@d.org ","password":"pw","first_name":"<b>Ann</b>"}"#);

    let res = h.send(req).await;
    assert_eq!(res.status_code(), 200);
    assert_eq!(json_body(&res)["email"], "c@d.org");
}

#[tokio::test]
async fn missing_required_argument_names_it() {
    let h = Harness::new();
    let res = h.send(as_editor(form(Method::Post, "/api/json/user", "password=x"))).await;
    assert_eq!(res.status_code(), 400);
    assert_eq!(text_body(&res), "'email' is a required argument.");
}

#[tokio::test]
async fn store_refusals_surface_as_bad_request() {
    let h = Harness::new();
    let res = h.send(as_editor(form(Method::Post, "/api/json/user", "email=nobody&password=x"))).await;
    assert_eq!(res.status_code(), 400);
    assert_eq!(text_body(&res), "Cannot create a user with an empty login name.");

    h.send(as_editor(form(Method::Post, "/api/json/user", "email=a%40b.com&password=x"))).await;
    let res = h.send(as_editor(form(Method::Post, "/api/json/user", "email=a%40b.com&password=y"))).await;
    assert_eq!(res.status_code(), 400);
    assert_eq!(text_body(&res), "Sorry, that email address is already used!");
}

#[tokio::test]
async fn missing_user_is_not_found() {
    let h = Harness::new();
    let res = h.send(as_editor(Request::new(Method::Get, "/api/json/user/99"))).await;
    assert_eq!(res.status_code(), 404);
    assert_eq!(text_body(&res), "User not found.");
}

// ── Posts ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn post_lifecycle() {
    let h = Harness::new();

    let res = h
        .send(as_editor(form(
            Method::Post,
            "/api/json/post",
            "title=+Hello%0A+world+&content=%3Cp+onclick%3D%22x()%22%3EHi%3C%2Fp%3E%3Cscript%3Ebad()%3C%2Fscript%3E",
        )))
        .await;
    assert_eq!(res.status_code(), 204);
    assert!(res.body().is_empty());

    let res = h.send(as_editor(Request::new(Method::Get, "/api/json/post/1"))).await;
    assert_eq!(res.status_code(), 200);
    assert_eq!(json_body(&res), json!({ "id": 1, "title": "Hello world", "content": "<p>Hi</p>" }));

    let res = h.send(as_editor(form(Method::Post, "/api/json/post/1", "title=Renamed"))).await;
    assert_eq!(res.status_code(), 204);
    let post = h.posts.load(1).await.unwrap().unwrap();
    assert_eq!(post.title, "Renamed");
    assert_eq!(post.content, "<p>Hi</p>");

    let res = h.send(as_editor(Request::new(Method::Delete, "/api/json/post/1"))).await;
    assert_eq!(res.status_code(), 204);

    let res = h.send(as_editor(Request::new(Method::Get, "/api/json/post/1"))).await;
    assert_eq!(res.status_code(), 404);
    assert_eq!(text_body(&res), "Post not found.");
}

#[tokio::test]
async fn redirect_to_follows_a_silent_handler() {
    let h = Harness::new();
    let res = h
        .send(as_editor(form(Method::Post, "/api/json/post", "title=x&redirect_to=%2Fthanks")))
        .await;
    assert_eq!(res.status_code(), 303);
    assert_eq!(res.header("location"), Some("/thanks"));

    let res = h
        .send(as_editor(form(Method::Post, "/api/json/post", "title=y&redirect_to=https%3A%2F%2Fevil.test%2F")))
        .await;
    assert_eq!(res.header("location"), Some("/"));
}

#[tokio::test]
async fn redirect_to_is_ignored_when_handler_responds() {
    let h = Harness::new();
    let res = h
        .send(as_editor(form(Method::Post, "/api/json/user", "email=a%40b.com&password=x&redirect_to=%2Fthanks")))
        .await;
    assert_eq!(res.status_code(), 200);
    assert_eq!(res.header("location"), None);
}

// ── Routing ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn unknown_endpoints_are_not_implemented() {
    let h = Harness::new();
    for req in [
        Request::new(Method::Delete, "/api/json/unknown/1"),
        Request::new(Method::Get, "/api/json/post/abc"),
        Request::new(Method::Delete, "/api/json/user/1"),
    ] {
        let res = h.send(req).await;
        assert_eq!(res.status_code(), 404);
        assert_eq!(text_body(&res), "Endpoint not implemented.");
    }
}

#[tokio::test]
async fn paths_outside_the_api_get_a_bare_404() {
    let h = Harness::new();
    let res = h.send(Request::new(Method::Get, "/favicon.ico")).await;
    assert_eq!(res.status_code(), 404);
    assert!(res.body().is_empty());
}

/// Public test endpoint: no auth, a GET-only option argument, no DELETE handler.
struct Lookup;

#[async_trait]
impl Endpoint for Lookup {
    fn descriptor(&self) -> Descriptor {
        Descriptor::new("term/{TERM_ID}")
            .methods(&[Method::Get, Method::Delete])
            .authenticated(false)
            .arg("order", ArgSpec::new(&[Method::Get]).options(&["asc", "desc"]).default_value("asc"))
            .arg("ids", ArgSpec::new(&[Method::Get]).multiple())
    }

    async fn get(&self, ctx: &mut Context, args: Args) -> HandlerResult {
        let body = json!({
            "term": ctx.var("term_id"),
            "anonymous": ctx.principal().is_none(),
            "args": args,
        });
        Ok(Some(Response::send_response(&body, Status::Ok)))
    }
}

#[tokio::test]
async fn unauthenticated_endpoint_validates_query_args() {
    let h = Harness::with_registry(|r| r.register(Lookup));

    let res = h.send(Request::new(Method::Get, "/api/json/term/7").query_string("ids=1,2&x=y")).await;
    assert_eq!(res.status_code(), 200);
    assert_eq!(
        json_body(&res),
        json!({ "term": "7", "anonymous": true, "args": { "order": "asc", "ids": ["1", "2"] } }),
    );

    let res = h.send(Request::new(Method::Get, "/api/json/term/7").query_string("order=random")).await;
    assert_eq!(res.status_code(), 400);
    assert_eq!(text_body(&res), "'order' must be one of asc, desc");
}

#[tokio::test]
async fn allowed_method_without_handler_is_501() {
    let h = Harness::with_registry(|r| r.register(Lookup));
    let res = h.send(Request::new(Method::Delete, "/api/json/term/7")).await;
    assert_eq!(res.status_code(), 501);
    assert!(res.body().is_empty());
}

#[tokio::test]
async fn resolution_is_stable() {
    let h = Harness::new();
    let registry = h.dispatcher.registry();
    for _ in 0..3 {
        let m = registry.resolve(Method::Post, "/api/json/user/5").unwrap();
        assert_eq!(m.route.descriptor().template(), "user/{USER_ID}");
        assert_eq!(m.vars, vec![("user_id", "5".to_owned())]);
    }
}
