//! Reference endpoints for posts and users.
//!
//! They show how the validator, the gate and the path-variable hook fit
//! together; the records themselves live behind [`Store`](crate::store::Store).

mod post;
mod user;

use std::sync::Arc;

use crate::registry::Registry;
use crate::store::{Post, Store, User};

pub use post::{PostCollection, PostItem};
pub use user::{UserCollection, UserItem};

/// Registers every reference endpoint on `registry`, collections before
/// their item routes.
pub fn register_all(
    registry: Registry,
    posts: Arc<dyn Store<Post>>,
    users: Arc<dyn Store<User>>,
) -> Registry {
    registry
        .register(PostCollection::new(Arc::clone(&posts)))
        .register(PostItem::new(posts))
        .register(UserCollection::new(Arc::clone(&users)))
        .register(UserItem::new(users))
}
