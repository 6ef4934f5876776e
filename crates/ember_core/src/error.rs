//! Error types for scene construction.

use thiserror::Error;

/// Errors raised while materializing a scene. The core never yields a
/// partially built scene: any of these aborts the build.
#[derive(Error, Debug)]
pub enum SceneError {
    #[error("missing required attribute `{attribute}` on `{node}`")]
    MissingAttribute {
        node: &'static str,
        attribute: &'static str,
    },

    #[error("malformed value for `{field}`: {message}")]
    Malformed { field: &'static str, message: String },

    #[error("unknown material `{0}` referenced by the scene")]
    UnknownMaterial(String),

    #[error("unsupported camera type `{0}`")]
    UnsupportedCamera(String),

    #[error("unreadable asset: {0}")]
    UnreadableAsset(String),
}

pub type SceneResult<T> = Result<T, SceneError>;
