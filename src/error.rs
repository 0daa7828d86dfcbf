//! Error taxonomy shared by the loaders, the scene graph and the frame driver.
//!
//! Every failure is surfaced synchronously to the caller of the operation that
//! triggered it. Nothing is retried.

use std::path::PathBuf;

use thiserror::Error;

use crate::data_structures::scene_graph::NodeId;

#[derive(Error, Debug)]
pub enum Error {
    /// A model or material file is missing or unreadable.
    #[error("couldn't open file {}: {source}", path.display())]
    FileOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A recognized directive is missing a required token or value.
    #[error("error parsing file {}:{line}: {message}", path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("failed to decode image {}: {source}", path.display())]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("cannot draw on empty textures")]
    EmptyInput,

    #[error("cannot draw on {requested} textures, at most {max} colour targets are supported")]
    TooManyTargets { requested: usize, max: usize },

    #[error("parent node {0:?} is not part of the scene graph")]
    UnknownParent(NodeId),

    #[error("node {0:?} is not part of the scene graph")]
    UnknownNode(NodeId),

    #[error("the scene graph already has a root node")]
    RootAlreadySet,

    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    #[error("surface error: {0}")]
    Surface(#[from] wgpu::SurfaceError),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn parse(path: impl Into<PathBuf>, line: usize, message: impl Into<String>) -> Self {
        Error::Parse {
            path: path.into(),
            line,
            message: message.into(),
        }
    }

    pub(crate) fn file_open(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::FileOpen {
            path: path.into(),
            source,
        }
    }
}
