use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::args::{ArgSpec, Args, Sanitizer};
use crate::endpoint::{Context, Descriptor, Endpoint, HandlerResult};
use crate::error::ApiError;
use crate::method::Method;
use crate::response::Response;
use crate::status::Status;
use crate::store::{Post, Store};

fn post_args(descriptor: Descriptor) -> Descriptor {
    descriptor
        .arg("title", ArgSpec::new(&[Method::Post]))
        .arg("content", ArgSpec::new(&[Method::Post]).sanitizer(Sanitizer::html()))
}

/// `GET|POST /post`
pub struct PostCollection {
    posts: Arc<dyn Store<Post>>,
}

impl PostCollection {
    pub fn new(posts: Arc<dyn Store<Post>>) -> Self {
        Self { posts }
    }
}

#[async_trait]
impl Endpoint for PostCollection {
    fn descriptor(&self) -> Descriptor {
        post_args(Descriptor::new("post").methods(&[Method::Get, Method::Post]))
    }

    async fn get(&self, _ctx: &mut Context, _args: Args) -> HandlerResult {
        Ok(None)
    }

    /// Creates a post. Nothing is sent back, so the client sees `204` or is
    /// redirected to `redirect_to`.
    async fn post(&self, _ctx: &mut Context, args: Args) -> HandlerResult {
        let post = Post {
            id: None,
            title: args.str_or_empty("title").to_owned(),
            content: args.str_or_empty("content").to_owned(),
        };
        let id = self.posts.save(post).await?;
        debug!(post = id, "post created");
        Ok(None)
    }
}

/// `GET|POST|DELETE /post/{POST_ID}`
pub struct PostItem {
    posts: Arc<dyn Store<Post>>,
}

impl PostItem {
    pub fn new(posts: Arc<dyn Store<Post>>) -> Self {
        Self { posts }
    }

    fn loaded(ctx: &Context) -> Result<&Post, ApiError> {
        ctx.get::<Post>().ok_or_else(|| ApiError::not_found("Post not found."))
    }
}

#[async_trait]
impl Endpoint for PostItem {
    fn descriptor(&self) -> Descriptor {
        post_args(
            Descriptor::new("post/{POST_ID}")
                .methods(&[Method::Get, Method::Post, Method::Delete]),
        )
    }

    async fn validate_path_vars(&self, ctx: &mut Context) -> Result<(), ApiError> {
        let id = ctx.id_var("post_id")?;
        let post = self
            .posts
            .load(id)
            .await?
            .ok_or_else(|| ApiError::not_found("Post not found."))?;
        ctx.insert(post);
        Ok(())
    }

    async fn get(&self, ctx: &mut Context, _args: Args) -> HandlerResult {
        Ok(Some(Response::send_response(Self::loaded(ctx)?, Status::Ok)))
    }

    /// Updates the fields that were sent; absent fields keep their value.
    async fn post(&self, ctx: &mut Context, args: Args) -> HandlerResult {
        let mut post = Self::loaded(ctx)?.clone();
        if let Some(title) = args.str("title") {
            post.title = title.to_owned();
        }
        if let Some(content) = args.str("content") {
            post.content = content.to_owned();
        }
        self.posts.save(post).await?;
        Ok(None)
    }

    async fn delete(&self, ctx: &mut Context) -> HandlerResult {
        let id = ctx.id_var("post_id")?;
        self.posts.delete(id).await?;
        Ok(None)
    }
}
