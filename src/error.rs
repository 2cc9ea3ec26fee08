use std::io;

use thiserror::Error;

use crate::render::TransformError;

/// Reason a source file did not become a [`Post`](crate::content::Post).
///
/// These never escape the content index: the post is logged and left out.
#[derive(Debug, Error)]
pub enum PostError {
    #[error("missing required front-matter field `{0}`")]
    MissingRequiredField(&'static str),

    #[error(transparent)]
    Transform(#[from] TransformError),

    #[error("error reading post file: {0}")]
    Io(#[from] io::Error),
}
