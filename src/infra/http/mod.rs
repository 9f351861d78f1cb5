mod flavor;
mod middleware;
mod responses;
mod todos;

pub use flavor::{ClientFlavor, request_locale};
pub use responses::StreamingFragments;
pub use todos::{HttpState, build_router};

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::application::{error::ErrorReport, todos::TodoError};

const HX_REQUEST_HEADER: &str = "hx-request";
const UP_CONTEXT_HEADER: &str = "x-up-context";
const DATASTAR_REQUEST_HEADER: &str = "datastar-request";

fn health_response(result: Result<(), TodoError>) -> Response {
    match result {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            let mut response = StatusCode::SERVICE_UNAVAILABLE.into_response();
            ErrorReport::from_error(
                "infra::http::health",
                StatusCode::SERVICE_UNAVAILABLE,
                &err,
            )
            .attach(&mut response);
            response
        }
    }
}
