//! Minimal hapi demo: the post and user endpoints over in-memory stores.
//!
//! Run with:
//!   RUST_LOG=hapi=debug cargo run --example basic
//!
//! `HAPI_*` settings may also come from a `.env` file.
//!
//! Try:
//!   curl -u editor:secret http://localhost:3000/api/json/user/1
//!   curl -u demo-key: -d 'title=Hello&content=<p>World</p>' \
//!        http://localhost:3000/api/json/post
//!   curl -u editor:secret http://localhost:3000/api/json/post/1
//!   curl -u demo-key: -d 'email=new@example.com&password=pw' \
//!        http://localhost:3000/api/json/user
//!   curl -X DELETE -u editor:secret http://localhost:3000/api/json/post/1
//!   curl -i http://localhost:3000/api/json/post/1          # 401 + challenge

use std::sync::Arc;

use hapi::store::{Post, User};
use hapi::{endpoints, Config, Dispatcher, MemoryIdentity, MemoryStore, Principal, Registry, Server, Store};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let _ = dotenvy::dotenv();
    let config = Config::from_env();

    let users = Arc::new(MemoryStore::<User>::new());
    let editor_id = users
        .save(User {
            email: "editor@example.com".into(),
            password: "secret".into(),
            ..User::default()
        })
        .await?;

    let identity = MemoryIdentity::new();
    identity.add_user(Principal::new(editor_id, "editor", &["edit_posts"]), "secret");
    identity.add_api_key(editor_id, "demo-key");
    let session = identity.start_session(editor_id);
    let nonce = identity.issue_nonce(editor_id, &config.nonce_action);
    tracing::info!(
        cookie = %format!("{}={session}", config.session_cookie),
        nonce = %nonce,
        "session for browser-style requests",
    );

    let registry = endpoints::register_all(
        Registry::with_base(&config.base_path),
        Arc::new(MemoryStore::<Post>::new()),
        users,
    );
    let dispatcher = Dispatcher::new(&config, registry, Arc::new(identity));

    Server::bind(&config.addr)?.serve(dispatcher).await?;
    Ok(())
}
