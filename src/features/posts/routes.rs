use axum::{routing::get, Router};

use crate::features::posts::handlers::{
    create_post, edit_post_form, list_posts, new_post_form, update_post, PostPagesState,
};

/// Create routes for the public post pages
///
/// Note: These pages are public (no authentication required)
pub fn routes(state: PostPagesState) -> Router {
    Router::new()
        .route("/", get(list_posts))
        .route("/posts/new", get(new_post_form).post(create_post))
        .route("/posts/{id}/update", get(edit_post_form).post(update_post))
        .with_state(state)
}
