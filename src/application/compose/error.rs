use thiserror::Error;

/// The view resolver could not map a name to a view.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("no view registered under `{name}`")]
    UnknownView { name: String },
}

/// A view failed while producing output.
#[derive(Debug, Error)]
pub enum ViewError {
    #[error("model does not fit the view: {0}")]
    Model(#[from] serde_json::Error),
    #[error("template rendering failed: {0}")]
    Template(#[from] askama::Error),
    #[error("view i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Message(String),
}

impl ViewError {
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderErrorKind {
    ResolutionFailed,
    RenderFailed,
}

impl RenderErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ResolutionFailed => "resolution_failed",
            Self::RenderFailed => "render_failed",
        }
    }
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to resolve view `{view}`")]
    ResolutionFailed {
        view: String,
        #[source]
        source: ResolveError,
    },
    #[error("view `{view}` failed to render")]
    RenderFailed {
        view: String,
        #[source]
        source: ViewError,
    },
}

impl RenderError {
    pub fn kind(&self) -> RenderErrorKind {
        match self {
            Self::ResolutionFailed { .. } => RenderErrorKind::ResolutionFailed,
            Self::RenderFailed { .. } => RenderErrorKind::RenderFailed,
        }
    }

    pub fn view(&self) -> &str {
        match self {
            Self::ResolutionFailed { view, .. } | Self::RenderFailed { view, .. } => view,
        }
    }
}

#[derive(Debug, Error)]
pub enum ComposeError {
    #[error(transparent)]
    Render(#[from] RenderError),
    /// The exchange was cancelled or timed out; a normal outcome, not an application failure.
    #[error("composition aborted before all renderings completed")]
    Aborted,
}
