use std::sync::Arc;

use axum::{
    Form, Router,
    extract::{Path, Query, State},
    http::HeaderMap,
    middleware,
    response::{IntoResponse, Redirect, Response},
    routing::{delete, get, post},
};
use datastar::prelude::ElementPatchMode;
use futures::stream;
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    application::{
        compose::{FragmentComposer, Locale, MediaType, Model, Rendering},
        error::HttpError,
        stream::StreamBuilder,
        todos::{TodoForm, TodoService},
    },
    domain::types::TodoFilter,
    presentation::views::{
        APPEND_ACTION, REPLACE_ACTION, created_model, hidden_by_filter, listing_model, names,
        todo_model,
    },
};

use super::{
    ClientFlavor, StreamingFragments, health_response,
    middleware::{log_responses, set_request_context},
    request_locale,
};

#[derive(Clone)]
pub struct HttpState {
    pub todos: Arc<TodoService>,
    pub composer: Arc<FragmentComposer>,
}

pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .route("/", get(index).post(create_todo))
        .route("/toggles", get(toggles))
        .route("/events", get(events))
        .route("/completed", delete(delete_completed))
        .route("/completed/delete", post(delete_completed))
        .route(
            "/{id}/toggle",
            get(toggle_todo).put(toggle_todo).post(toggle_todo),
        )
        .route("/{id}", delete(delete_todo))
        .route("/{id}/delete", post(delete_todo))
        .route("/_health", get(health))
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FilterQuery {
    filter: Option<String>,
}

impl FilterQuery {
    fn filter(&self) -> TodoFilter {
        TodoFilter::from_query(self.filter.as_deref())
    }
}

/// What a handler wants sent back, before the client flavour is applied.
enum Reply {
    Fragments {
        renderings: Vec<Rendering>,
        /// Todo whose element should disappear from the page.
        removed: Option<Uuid>,
    },
    Redirect(String),
}

impl Reply {
    fn fragments(views: &[&str], model: &Model) -> Self {
        Self::Fragments {
            renderings: views
                .iter()
                .map(|name| Rendering::view(*name).with_model(model.clone()))
                .collect(),
            removed: None,
        }
    }

    fn removing(self, id: Uuid) -> Self {
        match self {
            Self::Fragments { renderings, .. } => Self::Fragments {
                renderings,
                removed: Some(id),
            },
            other => other,
        }
    }
}

fn list_location(filter: TodoFilter) -> String {
    match filter.query_value() {
        "" => "/".to_string(),
        value => format!("/?filter={value}"),
    }
}

fn list_action(flavor: ClientFlavor) -> &'static str {
    match flavor {
        ClientFlavor::Htmx => REPLACE_ACTION,
        _ => "",
    }
}

async fn respond(
    state: &HttpState,
    flavor: ClientFlavor,
    locale: Option<Locale>,
    reply: Reply,
) -> Result<Response, HttpError> {
    let (renderings, removed) = match reply {
        Reply::Redirect(location) => return Ok(Redirect::to(&location).into_response()),
        Reply::Fragments {
            renderings,
            removed,
        } => (renderings, removed),
    };
    let html = MediaType::html();

    match flavor {
        ClientFlavor::Page | ClientFlavor::Htmx => {
            let result = state
                .composer
                .compose(renderings, locale.as_ref(), &html)
                .await?;
            Ok(result.into_response())
        }
        ClientFlavor::Unpoly => {
            let units = state
                .composer
                .compose_stream(stream::iter(renderings), locale, html.clone());
            Ok(StreamingFragments::new(units, html).into_response())
        }
        ClientFlavor::Datastar => {
            let patches: Vec<Rendering> = renderings
                .into_iter()
                .filter(|rendering| rendering.label() != names::REMOVE_TODO)
                .collect();
            let (fragments, _) = state
                .composer
                .render_all(patches, locale.as_ref(), &html)
                .await?;
            let mut builder = StreamBuilder::from_fragments(fragments);
            if let Some(id) = removed {
                builder.push_patch(
                    String::new(),
                    &format!("#todo-{id}"),
                    ElementPatchMode::Remove,
                );
            }
            Ok(builder.into_response())
        }
    }
}

async fn list_reply(
    state: &HttpState,
    flavor: ClientFlavor,
    filter: TodoFilter,
) -> Result<Reply, HttpError> {
    let listing = state.todos.listing(filter).await?;
    let reply = match flavor {
        ClientFlavor::Page => {
            let model = listing_model(&listing, &TodoForm::default(), "")?;
            Reply::fragments(&[names::INDEX], &model)
        }
        _ => {
            let model = listing_model(&listing, &TodoForm::default(), list_action(flavor))?;
            Reply::fragments(&[names::TODOS, names::FOOT], &model)
        }
    };
    Ok(reply)
}

async fn index(
    State(state): State<HttpState>,
    headers: HeaderMap,
    Query(query): Query<FilterQuery>,
) -> Result<Response, HttpError> {
    let flavor = ClientFlavor::from_headers(&headers);
    let reply = list_reply(&state, flavor, query.filter()).await?;
    respond(&state, flavor, request_locale(&headers), reply).await
}

async fn create_todo(
    State(state): State<HttpState>,
    headers: HeaderMap,
    Query(query): Query<FilterQuery>,
    Form(form): Form<TodoForm>,
) -> Result<Response, HttpError> {
    let flavor = ClientFlavor::from_headers(&headers);
    let filter = query.filter();
    let created = state.todos.create(&form).await?;

    let reply = match flavor {
        ClientFlavor::Page => Reply::Redirect(list_location(filter)),
        ClientFlavor::Htmx if !hidden_by_filter(&created, filter) => {
            let reference = state.todos.reference_data(filter).await?;
            let model = created_model(&created, &reference, APPEND_ACTION)?;
            Reply::fragments(&[names::NEW_TODO, names::TODOS, names::FOOT], &model)
        }
        _ => {
            let listing = state.todos.listing(filter).await?;
            let model = listing_model(&listing, &TodoForm::default(), list_action(flavor))?;
            Reply::fragments(&[names::NEW_TODO, names::TODOS, names::FOOT], &model)
        }
    };
    respond(&state, flavor, request_locale(&headers), reply).await
}

async fn toggle_todo(
    State(state): State<HttpState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Query(query): Query<FilterQuery>,
) -> Result<Response, HttpError> {
    let flavor = ClientFlavor::from_headers(&headers);
    let filter = query.filter();
    let toggled = state.todos.toggle(id).await?;

    let reply = if flavor == ClientFlavor::Page {
        Reply::Redirect(list_location(filter))
    } else {
        let reference = state.todos.reference_data(filter).await?;
        let model = todo_model(&toggled, &reference)?;
        if hidden_by_filter(&toggled, filter) {
            Reply::fragments(&[names::REMOVE_TODO, names::FOOT], &model).removing(id)
        } else {
            Reply::fragments(&[names::UPDATE_TODO, names::FOOT], &model)
        }
    };
    respond(&state, flavor, request_locale(&headers), reply).await
}

async fn delete_todo(
    State(state): State<HttpState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Query(query): Query<FilterQuery>,
) -> Result<Response, HttpError> {
    let flavor = ClientFlavor::from_headers(&headers);
    let filter = query.filter();
    let removed = state.todos.delete(id).await?;

    let reply = if flavor == ClientFlavor::Page {
        Reply::Redirect(list_location(filter))
    } else {
        let reference = state.todos.reference_data(filter).await?;
        let model = todo_model(&removed, &reference)?;
        Reply::fragments(&[names::REMOVE_TODO, names::FOOT], &model).removing(id)
    };
    respond(&state, flavor, request_locale(&headers), reply).await
}

async fn delete_completed(
    State(state): State<HttpState>,
    headers: HeaderMap,
    Query(query): Query<FilterQuery>,
) -> Result<Response, HttpError> {
    let flavor = ClientFlavor::from_headers(&headers);
    let filter = query.filter();
    state.todos.delete_completed().await?;

    let reply = if flavor == ClientFlavor::Page {
        Reply::Redirect(list_location(filter))
    } else {
        list_reply(&state, flavor, filter).await?
    };
    respond(&state, flavor, request_locale(&headers), reply).await
}

async fn toggles(State(state): State<HttpState>, headers: HeaderMap) -> Result<Response, HttpError> {
    let flavor = ClientFlavor::from_headers(&headers);
    let reply = Reply::fragments(&[names::TOGGLE_ALL], &Model::new());
    respond(&state, flavor, request_locale(&headers), reply).await
}

/// The list and footer as server-sent events, one event per fragment.
async fn events(
    State(state): State<HttpState>,
    headers: HeaderMap,
    Query(query): Query<FilterQuery>,
) -> Result<Response, HttpError> {
    let listing = state.todos.listing(query.filter()).await?;
    let model = listing_model(&listing, &TodoForm::default(), "")?;
    let renderings = [names::TODOS, names::FOOT]
        .into_iter()
        .map(|name| Rendering::view(name).with_model(model.clone()))
        .collect::<Vec<_>>();

    let content_type = MediaType::event_stream();
    let units = state.composer.compose_stream(
        stream::iter(renderings),
        request_locale(&headers),
        content_type.clone(),
    );
    Ok(StreamingFragments::new(units, content_type).into_response())
}

async fn health(State(state): State<HttpState>) -> Response {
    health_response(state.todos.health_check().await)
}
