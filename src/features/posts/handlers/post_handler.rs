//! Public HTML pages: post listing, creation and update.
//!
//! Every submission follows the same cycle: bind the form and its file
//! formsets, validate them together, then either persist and redirect or
//! render the form again with messages and the submitted values.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    response::{Html, IntoResponse, Redirect, Response},
};
use minijinja::context;
use serde::Serialize;
use validator::Validate;

use crate::core::error::Result;
use crate::core::extractor::FormData;
use crate::features::comments::models::Comment;
use crate::features::comments::services::CommentService;
use crate::features::files::formset::{comment_files_prefix, FileFormset, FileLink};
use crate::features::files::models::{AttachmentOwner, File};
use crate::features::files::services::FileService;
use crate::features::posts::dtos::PostInput;
use crate::features::posts::models::Post;
use crate::features::posts::services::{OwnerChanges, PostService};
use crate::shared::constants::POST_FILES_PREFIX;
use crate::shared::templates;
use crate::shared::validation::{field_messages, FieldErrors};

/// Services used by the post pages
#[derive(Clone)]
pub struct PostPagesState {
    pub posts: Arc<PostService>,
    pub comments: Arc<CommentService>,
    pub files: Arc<FileService>,
}

/// A post as shown on the listing page
#[derive(Debug, Serialize)]
struct PostListItem {
    id: i64,
    title: String,
    text: String,
    date: String,
    files: Vec<FileLink>,
}

impl PostListItem {
    fn new(post: Post, files: &[File]) -> Self {
        Self {
            id: post.id,
            title: post.title,
            text: post.text,
            date: post.date.format("%Y-%m-%d %H:%M").to_string(),
            files: files.iter().map(FileLink::from).collect(),
        }
    }
}

/// Values and messages of the post fields
#[derive(Debug, Default, Serialize)]
struct PostFormView {
    title: String,
    text: String,
    errors: FieldErrors,
}

impl PostFormView {
    fn from_input(input: &PostInput, errors: FieldErrors) -> Self {
        Self {
            title: input.title.clone(),
            text: input.text.clone(),
            errors,
        }
    }
}

/// A comment with the formset for its files
#[derive(Debug, Serialize)]
struct CommentSection {
    id: i64,
    text: String,
    formset: FileFormset,
}

/// List all posts with their attached files
pub async fn list_posts(State(state): State<PostPagesState>) -> Result<Html<String>> {
    let posts: Vec<PostListItem> = state
        .posts
        .list_with_files()
        .await?
        .into_iter()
        .map(|(post, files)| PostListItem::new(post, &files))
        .collect();

    let html = templates::render("post_list.html", context! { posts })?;
    Ok(Html(html))
}

/// Empty creation form
pub async fn new_post_form() -> Result<Html<String>> {
    render_create_form(PostFormView::default(), FileFormset::unbound(POST_FILES_PREFIX, &[]))
}

/// Validate and persist a new post with its files
pub async fn create_post(
    State(state): State<PostPagesState>,
    mut data: FormData,
) -> Result<Response> {
    let input = PostInput::from_form(&data);
    let errors = input_errors(&input);
    let formset = FileFormset::bind(
        POST_FILES_PREFIX,
        &mut data,
        &[],
        state.files.max_upload_size(),
    );

    if !errors.is_empty() || !formset.is_valid() {
        let page = render_create_form(PostFormView::from_input(&input, errors), formset)?;
        return Ok(page.into_response());
    }

    state
        .posts
        .create_with_files(&input, formset.into_changes())
        .await?;

    Ok(Redirect::to("/").into_response())
}

/// Update form for an existing post, its files, and its comments' files
pub async fn edit_post_form(
    State(state): State<PostPagesState>,
    Path(id): Path<i64>,
) -> Result<Html<String>> {
    let post = state.posts.get(id).await?;
    let files = state.files.list_for_owner(AttachmentOwner::post(id)).await?;

    let mut comment_files = comment_files_by_owner(&state, id).await?;
    let comments = state
        .comments
        .list_for_post(id)
        .await?
        .into_iter()
        .map(|comment| {
            let existing = comment_files.remove(&comment.id).unwrap_or_default();
            CommentSection {
                formset: FileFormset::unbound(&comment_files_prefix(comment.id), &existing),
                id: comment.id,
                text: comment.text,
            }
        })
        .collect();

    let view = PostFormView {
        title: post.title,
        text: post.text,
        errors: FieldErrors::new(),
    };

    render_update_form(id, view, FileFormset::unbound(POST_FILES_PREFIX, &files), comments)
}

/// Validate and persist changes to a post and to the files of the post and
/// its comments.
///
/// A comment formset is optional; comments whose management field is
/// absent from the submission keep their files untouched.
pub async fn update_post(
    State(state): State<PostPagesState>,
    Path(id): Path<i64>,
    mut data: FormData,
) -> Result<Response> {
    state.posts.get(id).await?;

    let max_upload_size = state.files.max_upload_size();
    let input = PostInput::from_form(&data);
    let errors = input_errors(&input);

    let files = state.files.list_for_owner(AttachmentOwner::post(id)).await?;
    let formset = FileFormset::bind(POST_FILES_PREFIX, &mut data, &files, max_upload_size);

    let mut comment_files = comment_files_by_owner(&state, id).await?;
    let mut bound: Vec<(Comment, Vec<File>, Option<FileFormset>)> = Vec::new();
    for comment in state.comments.list_for_post(id).await? {
        let prefix = comment_files_prefix(comment.id);
        let existing = comment_files.remove(&comment.id).unwrap_or_default();
        let comment_formset = data
            .text(&format!("{}-TOTAL_FORMS", prefix))
            .is_some()
            .then(|| FileFormset::bind(&prefix, &mut data, &existing, max_upload_size));
        bound.push((comment, existing, comment_formset));
    }

    let comments_valid = bound
        .iter()
        .all(|(_, _, f)| f.as_ref().is_none_or(FileFormset::is_valid));

    if !errors.is_empty() || !formset.is_valid() || !comments_valid {
        let comments = bound
            .into_iter()
            .map(|(comment, existing, comment_formset)| CommentSection {
                formset: comment_formset.unwrap_or_else(|| {
                    FileFormset::unbound(&comment_files_prefix(comment.id), &existing)
                }),
                id: comment.id,
                text: comment.text,
            })
            .collect();

        let page = render_update_form(
            id,
            PostFormView::from_input(&input, errors),
            formset,
            comments,
        )?;
        return Ok(page.into_response());
    }

    let mut changes: Vec<OwnerChanges> = vec![(AttachmentOwner::post(id), formset.into_changes())];
    changes.extend(bound.into_iter().filter_map(|(comment, _, f)| {
        f.map(|f| (AttachmentOwner::comment(comment.id), f.into_changes()))
    }));

    state.posts.update_with_files(id, &input, changes).await?;

    Ok(Redirect::to(&format!("/posts/{}/update", id)).into_response())
}

fn input_errors(input: &PostInput) -> FieldErrors {
    match input.validate() {
        Ok(()) => FieldErrors::new(),
        Err(e) => field_messages(&e),
    }
}

async fn comment_files_by_owner(
    state: &PostPagesState,
    post_id: i64,
) -> Result<HashMap<i64, Vec<File>>> {
    let mut grouped: HashMap<i64, Vec<File>> = HashMap::new();
    for file in state.files.list_for_post_comments(post_id).await? {
        grouped.entry(file.owner_id).or_default().push(file);
    }
    Ok(grouped)
}

fn render_create_form(post: PostFormView, formset: FileFormset) -> Result<Html<String>> {
    let html = templates::render(
        "post_form.html",
        context! {
            heading => "New post",
            action => "/posts/new",
            post,
            formset,
            comments => Vec::<CommentSection>::new(),
        },
    )?;
    Ok(Html(html))
}

fn render_update_form(
    id: i64,
    post: PostFormView,
    formset: FileFormset,
    comments: Vec<CommentSection>,
) -> Result<Html<String>> {
    let html = templates::render(
        "post_form.html",
        context! {
            heading => format!("Edit post #{}", id),
            action => format!("/posts/{}/update", id),
            post,
            formset,
            comments,
        },
    )?;
    Ok(Html(html))
}
