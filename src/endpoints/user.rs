use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use crate::args::{ArgSpec, Args, Sanitizer};
use crate::endpoint::{Context, Descriptor, Endpoint, HandlerResult};
use crate::error::ApiError;
use crate::method::Method;
use crate::response::Response;
use crate::status::Status;
use crate::store::{Store, User};

/// What a user looks like on the wire.
#[derive(Debug, Serialize)]
struct UserObject<'a> {
    id: u64,
    email: &'a str,
}

impl<'a> UserObject<'a> {
    fn new(id: u64, user: &'a User) -> Self {
        Self { id, email: &user.email }
    }
}

/// `email` and `password`, both required on POST.
///
/// The password skips the text sanitizer and is stored exactly as sent, so
/// characters such as `<` or `%41` survive.
fn credential_args(descriptor: Descriptor) -> Descriptor {
    descriptor
        .arg("password", ArgSpec::new(&[Method::Post]).required().sanitizer(Sanitizer::Disabled))
        .arg("email", ArgSpec::new(&[Method::Post]).required().sanitizer(Sanitizer::email()))
}

/// `GET|POST /user`
pub struct UserCollection {
    users: Arc<dyn Store<User>>,
}

impl UserCollection {
    pub fn new(users: Arc<dyn Store<User>>) -> Self {
        Self { users }
    }
}

#[async_trait]
impl Endpoint for UserCollection {
    fn descriptor(&self) -> Descriptor {
        credential_args(Descriptor::new("user").methods(&[Method::Get, Method::Post]))
            .arg("first_name", ArgSpec::new(&[Method::Post]))
            .arg("last_name", ArgSpec::new(&[Method::Post]))
    }

    async fn get(&self, _ctx: &mut Context, _args: Args) -> HandlerResult {
        Ok(None)
    }

    async fn post(&self, _ctx: &mut Context, args: Args) -> HandlerResult {
        let user = User {
            id: None,
            email: args.str_or_empty("email").to_owned(),
            password: args.str_or_empty("password").to_owned(),
            first_name: args.str_or_empty("first_name").to_owned(),
            last_name: args.str_or_empty("last_name").to_owned(),
        };
        let id = self.users.save(user.clone()).await?;
        debug!(user = id, "user created");
        Ok(Some(Response::send_response(&UserObject::new(id, &user), Status::Ok)))
    }
}

/// `GET|POST /user/{USER_ID}`
pub struct UserItem {
    users: Arc<dyn Store<User>>,
}

impl UserItem {
    pub fn new(users: Arc<dyn Store<User>>) -> Self {
        Self { users }
    }
}

#[async_trait]
impl Endpoint for UserItem {
    fn descriptor(&self) -> Descriptor {
        credential_args(Descriptor::new("user/{USER_ID}").methods(&[Method::Get, Method::Post]))
    }

    async fn validate_path_vars(&self, ctx: &mut Context) -> Result<(), ApiError> {
        let id = ctx.id_var("user_id")?;
        let user = self
            .users
            .load(id)
            .await?
            .ok_or_else(|| ApiError::not_found("User not found."))?;
        ctx.insert(user);
        Ok(())
    }

    async fn get(&self, ctx: &mut Context, _args: Args) -> HandlerResult {
        let user = ctx.get::<User>().ok_or_else(|| ApiError::not_found("User not found."))?;
        let id = user.id.unwrap_or_default();
        Ok(Some(Response::send_response(&UserObject::new(id, user), Status::Ok)))
    }

    /// Replaces the user's email and password.
    async fn post(&self, ctx: &mut Context, args: Args) -> HandlerResult {
        let mut user = ctx
            .get::<User>()
            .cloned()
            .ok_or_else(|| ApiError::not_found("User not found."))?;
        user.email = args.str_or_empty("email").to_owned();
        user.password = args.str_or_empty("password").to_owned();
        self.users.save(user).await?;
        Ok(None)
    }
}
