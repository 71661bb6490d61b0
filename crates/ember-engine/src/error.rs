use std::fmt::Debug;

use thiserror::Error;

/// Errors surfaced by the graphics layer and the scene/renderer built on top of it.
#[derive(Debug, Error)]
pub enum GraphicsError {
    #[error("failed to create {what}: {reason}")]
    ResourceCreation { what: &'static str, reason: String },

    #[error("unsupported {kind} value `{value}` on this backend")]
    UnsupportedEnumValue { kind: &'static str, value: String },

    #[error("shader program is already compiled")]
    AlreadyCompiled,

    #[error("shader program is not compiled")]
    NotCompiled,

    #[error("{stage} shader failed to compile: {message}")]
    ShaderCompilation { stage: &'static str, message: String },

    #[error("material index {0} does not refer to a live material")]
    InvalidMaterialIndex(usize),

    #[error("mesh id {0} does not refer to a mesh slot")]
    InvalidMeshId(usize),

    #[error("render object {0} has been removed or never existed")]
    InvalidObjectId(usize),

    #[error("material {0} is still referenced by a render object")]
    MaterialInUse(usize),

    #[error("pixel data mismatch: {0}")]
    FormatMismatch(String),

    #[error("resource {0} has pending compute writes; call memory_barrier first")]
    UnsynchronizedTexture(u64),

    #[error("framebuffer is incomplete: {0}")]
    IncompleteFramebuffer(&'static str),

    #[error("nothing bound for {0}")]
    UnboundResource(String),

    #[error("no frame in flight")]
    NoActiveFrame,

    /// Frame acquisition failed. `fatal` is set when rendering cannot resume.
    #[error("surface error: {message}")]
    Surface { message: String, fatal: bool },
}

impl GraphicsError {
    pub(crate) fn unsupported(kind: &'static str, value: impl Debug) -> Self {
        Self::UnsupportedEnumValue {
            kind,
            value: format!("{value:?}"),
        }
    }

    pub(crate) fn creation(what: &'static str, reason: impl ToString) -> Self {
        Self::ResourceCreation {
            what,
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, GraphicsError>;
