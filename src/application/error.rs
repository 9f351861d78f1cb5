use std::error::Error as StdError;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::{
    application::{compose::ComposeError, repos::RepoError, todos::TodoError},
    config::LoadError,
    domain::error::DomainError,
    infra::error::InfraError,
};

/// Display strings of an error and each of its sources, outermost first.
pub fn error_chain(error: &dyn StdError) -> Vec<String> {
    let mut messages = vec![error.to_string()];
    let mut current = error.source();
    while let Some(inner) = current {
        messages.push(inner.to_string());
        current = inner.source();
    }
    messages
}

#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub status: StatusCode,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, status: StatusCode, error: &dyn StdError) -> Self {
        Self {
            source,
            status,
            messages: error_chain(error),
        }
    }

    pub fn from_message(
        source: &'static str,
        status: StatusCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source,
            status,
            messages: vec![message.into()],
        }
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

#[derive(Debug)]
pub struct HttpError {
    status: StatusCode,
    public_message: &'static str,
    report: ErrorReport,
}

impl HttpError {
    pub fn new(
        source: &'static str,
        status: StatusCode,
        public_message: &'static str,
        detail: impl Into<String>,
    ) -> Self {
        let report = ErrorReport::from_message(source, status, detail);
        Self {
            status,
            public_message,
            report,
        }
    }

    pub fn from_error(
        source: &'static str,
        status: StatusCode,
        public_message: &'static str,
        error: &dyn StdError,
    ) -> Self {
        let report = ErrorReport::from_error(source, status, error);
        Self {
            status,
            public_message,
            report,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let mut response = (self.status, self.public_message).into_response();
        self.report.attach(&mut response);
        response
    }
}

impl From<TodoError> for HttpError {
    fn from(error: TodoError) -> Self {
        const SOURCE: &str = "application::todos::TodoError";
        match &error {
            TodoError::NotFound(_) => HttpError::from_error(
                SOURCE,
                StatusCode::NOT_FOUND,
                "Todo not found",
                &error,
            ),
            TodoError::Domain(DomainError::NotFound { .. }) => HttpError::from_error(
                SOURCE,
                StatusCode::NOT_FOUND,
                "Resource not found",
                &error,
            ),
            TodoError::Domain(DomainError::Validation { .. }) => HttpError::from_error(
                SOURCE,
                StatusCode::BAD_REQUEST,
                "Request could not be processed",
                &error,
            ),
            TodoError::Repo(RepoError::Timeout) => HttpError::from_error(
                SOURCE,
                StatusCode::SERVICE_UNAVAILABLE,
                "Database timeout",
                &error,
            ),
            TodoError::Repo(RepoError::NotFound) => HttpError::from_error(
                SOURCE,
                StatusCode::NOT_FOUND,
                "Resource not found",
                &error,
            ),
            TodoError::Repo(RepoError::Persistence(_)) => HttpError::from_error(
                SOURCE,
                StatusCode::INTERNAL_SERVER_ERROR,
                "Persistence error",
                &error,
            ),
        }
    }
}

impl From<ComposeError> for HttpError {
    fn from(error: ComposeError) -> Self {
        const SOURCE: &str = "application::compose::FragmentComposer";
        match &error {
            ComposeError::Aborted => HttpError::from_error(
                SOURCE,
                StatusCode::SERVICE_UNAVAILABLE,
                "Response was cancelled",
                &error,
            ),
            ComposeError::Render(_) => HttpError::from_error(
                SOURCE,
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error",
                &error,
            ),
        }
    }
}

impl From<serde_json::Error> for HttpError {
    fn from(error: serde_json::Error) -> Self {
        HttpError::from_error(
            "presentation::views::model",
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal server error",
            &error,
        )
    }
}

/// Failures that stop the binary before or while serving.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("failed to load configuration: {0}")]
    Config(#[from] LoadError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::application::compose::{RenderError, ResolveError};

    #[test]
    fn chain_walks_every_source() {
        let error = ComposeError::from(RenderError::ResolutionFailed {
            view: "index :: todos".to_string(),
            source: ResolveError::UnknownView {
                name: "index :: todos".to_string(),
            },
        });

        let chain = error_chain(&error);
        assert_eq!(chain.len(), 2);
        assert_eq!(chain[0], "failed to resolve view `index :: todos`");
        assert_eq!(chain[1], "no view registered under `index :: todos`");
    }

    #[test]
    fn todo_errors_map_to_statuses() {
        let missing = HttpError::from(TodoError::NotFound(Uuid::nil()));
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);

        let invalid = HttpError::from(TodoError::Domain(DomainError::validation("blank")));
        assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn report_is_attached_to_the_response() {
        let response = HttpError::from(ComposeError::Aborted).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let report = response
            .extensions()
            .get::<ErrorReport>()
            .expect("report attached");
        assert_eq!(report.source, "application::compose::FragmentComposer");
    }
}
