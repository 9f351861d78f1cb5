use axum::{
    body::Body,
    http::{
        HeaderValue, StatusCode,
        header::{CACHE_CONTROL, CONTENT_TYPE},
    },
    response::{IntoResponse, Response},
};

use crate::application::{
    compose::{ComposeStream, CompositionResult, MediaType},
    error::HttpError,
};

fn content_type_header(content_type: &MediaType) -> Result<HeaderValue, HttpError> {
    HeaderValue::from_str(&content_type.to_string()).map_err(|err| {
        HttpError::from_error(
            "infra::http::responses::content_type_header",
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal server error",
            &err,
        )
    })
}

impl IntoResponse for CompositionResult {
    fn into_response(self) -> Response {
        let content_type = match content_type_header(&self.content_type) {
            Ok(value) => value,
            Err(err) => return err.into_response(),
        };
        let mut response = Response::new(Body::from(self.body));
        response.headers_mut().insert(CONTENT_TYPE, content_type);
        response
    }
}

/// A streaming composition written to the body unit by unit.
///
/// A rendering failure mid-stream aborts the body; the status line has already been sent.
pub struct StreamingFragments {
    stream: ComposeStream,
    content_type: MediaType,
}

impl StreamingFragments {
    pub fn new(stream: ComposeStream, content_type: MediaType) -> Self {
        Self {
            stream,
            content_type,
        }
    }
}

impl IntoResponse for StreamingFragments {
    fn into_response(self) -> Response {
        let content_type = match content_type_header(&self.content_type) {
            Ok(value) => value,
            Err(err) => return err.into_response(),
        };
        let is_event_stream = self.content_type.is_event_stream();

        let mut response = Response::new(Body::from_stream(self.stream));
        let headers = response.headers_mut();
        headers.insert(CONTENT_TYPE, content_type);
        if is_event_stream {
            headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use futures::stream;

    use super::*;
    use crate::application::compose::ComposeError;

    #[test]
    fn composition_result_sets_content_type_once() {
        let result = CompositionResult {
            body: Bytes::from_static(b"<p>x</p>\n\n"),
            content_type: "text/html; charset=utf-8".parse().unwrap(),
            fragments: 1,
            skipped: 0,
        };
        let response = result.into_response();
        assert_eq!(response.status(), StatusCode::OK);
        let values: Vec<_> = response.headers().get_all(CONTENT_TYPE).iter().collect();
        assert_eq!(values, vec!["text/html; charset=utf-8"]);
    }

    #[test]
    fn event_streams_are_not_cached() {
        let stream: ComposeStream = Box::pin(stream::empty::<Result<Bytes, ComposeError>>());
        let response = StreamingFragments::new(stream, MediaType::event_stream()).into_response();
        assert_eq!(
            response.headers().get(CONTENT_TYPE).unwrap(),
            "text/event-stream"
        );
        assert_eq!(response.headers().get(CACHE_CONTROL).unwrap(), "no-cache");
    }
}
