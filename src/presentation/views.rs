use std::{collections::HashMap, marker::PhantomData, sync::Arc};

use askama::Template;
use async_trait::async_trait;
use serde::{Deserialize, de::DeserializeOwned};

use crate::{
    application::{
        compose::{
            FragmentSink, Locale, Model, ResolveError, SinkWriter, View, ViewError, ViewResolver,
        },
        todos::{ReferenceData, TodoDto, TodoForm, TodoListing},
    },
    domain::types::TodoFilter,
};

/// Names handlers use to address views.
pub mod names {
    pub const INDEX: &str = "index";
    pub const TODOS: &str = "index :: todos";
    pub const FOOT: &str = "index :: foot";
    pub const NEW_TODO: &str = "index :: new-todo";
    pub const TODO: &str = "fragments :: todo";
    pub const UPDATE_TODO: &str = "fragments :: update-todo";
    pub const REMOVE_TODO: &str = "fragments :: remove-todo";
    pub const TOGGLE_ALL: &str = "fragments :: toggle-all";
}

/// Value of `hx-swap-oob` on the todo list when only new items are sent.
pub const APPEND_ACTION: &str = "beforeend";
/// Value of `hx-swap-oob` on the todo list when the whole list is replaced.
pub const REPLACE_ACTION: &str = "true";

#[derive(Template, Deserialize)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub form: TodoForm,
    pub todos: Vec<TodoDto>,
    pub filter: TodoFilter,
    pub number_of_incomplete: usize,
    pub number_of_todos: usize,
    #[serde(default)]
    pub action: String,
}

#[derive(Template, Deserialize)]
#[template(path = "partials/todos.html")]
pub struct TodosPartial {
    pub todos: Vec<TodoDto>,
    #[serde(default)]
    pub filter: TodoFilter,
    #[serde(default)]
    pub action: String,
}

#[derive(Template, Deserialize)]
#[template(path = "partials/foot.html")]
pub struct FootPartial {
    pub filter: TodoFilter,
    pub number_of_incomplete: usize,
    pub number_of_todos: usize,
}

#[derive(Template, Deserialize)]
#[template(path = "partials/new_todo.html")]
pub struct NewTodoPartial {
    pub form: TodoForm,
    #[serde(default)]
    pub filter: TodoFilter,
}

#[derive(Template, Deserialize)]
#[template(path = "partials/todo.html")]
pub struct TodoPartial {
    pub todo: TodoDto,
    #[serde(default)]
    pub filter: TodoFilter,
    #[serde(default)]
    pub swap_oob: bool,
}

#[derive(Template, Deserialize)]
#[template(path = "partials/update_todo.html")]
pub struct UpdateTodoPartial {
    pub todo: TodoDto,
    #[serde(default)]
    pub filter: TodoFilter,
}

#[derive(Template, Deserialize)]
#[template(path = "partials/remove_todo.html")]
pub struct RemoveTodoPartial {
    pub todo: TodoDto,
}

#[derive(Template, Deserialize)]
#[template(path = "partials/toggle_all.html")]
pub struct ToggleAllPartial {}

/// Binds the model to the template struct `T` and renders it into the sink.
pub struct TemplateView<T> {
    name: &'static str,
    template: PhantomData<fn() -> T>,
}

impl<T> TemplateView<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            template: PhantomData,
        }
    }
}

#[async_trait]
impl<T> View for TemplateView<T>
where
    T: Template + DeserializeOwned + Send + 'static,
{
    async fn render(&self, model: &Model, sink: &mut dyn FragmentSink) -> Result<(), ViewError> {
        let template: T = model.bind()?;
        template.render_into(&mut SinkWriter::new(sink))?;
        Ok(())
    }

    fn name(&self) -> &str {
        self.name
    }
}

/// Registry of named views with locale-specific variants.
///
/// A variant is registered as `name@tag` (`index :: foot@de-CH`) or
/// `name@language` (`index :: foot@de`). Lookup prefers the full tag, then the
/// language, then the bare name.
#[derive(Default)]
pub struct TemplateViewResolver {
    views: HashMap<String, Arc<dyn View>>,
}

impl TemplateViewResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every todo page and fragment template under its well-known name.
    pub fn with_defaults() -> Self {
        let mut resolver = Self::new();
        resolver
            .register_template::<IndexTemplate>(names::INDEX)
            .register_template::<TodosPartial>(names::TODOS)
            .register_template::<FootPartial>(names::FOOT)
            .register_template::<NewTodoPartial>(names::NEW_TODO)
            .register_template::<TodoPartial>(names::TODO)
            .register_template::<UpdateTodoPartial>(names::UPDATE_TODO)
            .register_template::<RemoveTodoPartial>(names::REMOVE_TODO)
            .register_template::<ToggleAllPartial>(names::TOGGLE_ALL);
        resolver
    }

    pub fn register(&mut self, name: impl Into<String>, view: Arc<dyn View>) -> &mut Self {
        self.views.insert(name.into(), view);
        self
    }

    pub fn register_template<T>(&mut self, name: &'static str) -> &mut Self
    where
        T: Template + DeserializeOwned + Send + 'static,
    {
        self.register(name, Arc::new(TemplateView::<T>::new(name)))
    }

    pub fn len(&self) -> usize {
        self.views.len()
    }

    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }
}

impl ViewResolver for TemplateViewResolver {
    fn resolve(&self, name: &str, locale: &Locale) -> Result<Arc<dyn View>, ResolveError> {
        [
            format!("{name}@{}", locale.tag()),
            format!("{name}@{}", locale.language()),
        ]
        .iter()
        .find_map(|key| self.views.get(key))
        .or_else(|| self.views.get(name))
        .cloned()
        .ok_or_else(|| ResolveError::UnknownView {
            name: name.to_string(),
        })
    }
}

/// Counters and filter shared by every list-related view.
pub fn reference_model(reference: &ReferenceData) -> Result<Model, serde_json::Error> {
    Model::new().merge(reference)
}

/// Model for the full page and the list fragments. `action` drives the out-of-band swap of the list.
pub fn listing_model(
    listing: &TodoListing,
    form: &TodoForm,
    action: &str,
) -> Result<Model, serde_json::Error> {
    reference_model(&listing.reference)?
        .with("form", form)?
        .with("todos", &listing.todos)?
        .with("action", action)
}

/// Model after a todo was created: the list carries only the new item.
pub fn created_model(
    created: &TodoDto,
    reference: &ReferenceData,
    action: &str,
) -> Result<Model, serde_json::Error> {
    reference_model(reference)?
        .with("form", &TodoForm::default())?
        .with("todos", std::slice::from_ref(created))?
        .with("todo", created)?
        .with("action", action)
}

/// Model for a single todo fragment plus the footer.
pub fn todo_model(todo: &TodoDto, reference: &ReferenceData) -> Result<Model, serde_json::Error> {
    reference_model(reference)?.with("todo", todo)
}

/// Whether a toggled todo left the filtered list and must be removed rather than updated.
pub fn hidden_by_filter(todo: &TodoDto, filter: TodoFilter) -> bool {
    match filter {
        TodoFilter::All => false,
        TodoFilter::Active => todo.completed,
        TodoFilter::Completed => !todo.completed,
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::application::compose::{CaptureSink, Charset};

    fn todo(title: &str, completed: bool) -> TodoDto {
        TodoDto {
            id: Uuid::new_v4(),
            title: title.to_string(),
            completed,
        }
    }

    fn reference(filter: TodoFilter) -> ReferenceData {
        ReferenceData {
            filter,
            number_of_incomplete: 1,
            number_of_todos: 2,
        }
    }

    async fn render(name: &str, model: &Model) -> String {
        let resolver = TemplateViewResolver::with_defaults();
        let view = resolver.resolve(name, &Locale::default()).expect("view");
        let mut sink = CaptureSink::new(Charset::Utf8);
        view.render(model, &mut sink).await.expect("render");
        String::from_utf8(sink.drain().to_vec()).expect("utf-8")
    }

    #[tokio::test]
    async fn plain_list_has_no_out_of_band_marker() {
        let item = todo("Something", false);
        let listing = TodoListing {
            todos: vec![item.clone()],
            reference: reference(TodoFilter::All),
        };
        let model = listing_model(&listing, &TodoForm::default(), "").unwrap();

        let html = render(names::TODOS, &model).await;
        assert!(html.contains(&item.id.to_string()));
        assert!(!html.contains("hx-swap-oob"));
    }

    #[tokio::test]
    async fn plain_todo_has_no_out_of_band_marker() {
        let item = todo("Something", false);
        let model = Model::new().with("todo", &item).unwrap();

        let html = render(names::TODO, &model).await;
        assert!(html.contains(&format!("id=\"todo-{}\"", item.id)));
        assert!(!html.contains("hx-swap-oob"));
    }

    #[tokio::test]
    async fn update_and_remove_swap_out_of_band() {
        let item = todo("Something", true);
        let model = todo_model(&item, &reference(TodoFilter::All)).unwrap();

        let updated = render(names::UPDATE_TODO, &model).await;
        assert!(updated.contains(&item.id.to_string()));
        assert!(updated.contains("hx-swap-oob=\"true\""));
        assert!(updated.contains("class=\"completed\""));

        let removed = render(names::REMOVE_TODO, &model).await;
        assert!(removed.contains(&format!("<li hx-swap-oob=\"true\" id=\"todo-{}\"></li>", item.id)));
    }

    #[tokio::test]
    async fn created_list_appends_out_of_band() {
        let item = todo("Foo", false);
        let model = created_model(&item, &reference(TodoFilter::All), APPEND_ACTION).unwrap();

        let list = render(names::TODOS, &model).await;
        assert!(list.contains("<ul id=\"todos\" class=\"todo-list\" hx-swap-oob=\"beforeend\">"));
        assert!(list.contains("<label>Foo</label>"));

        let form = render(names::NEW_TODO, &model).await;
        assert!(form.contains("<form id=\"new-todo\""));
        assert!(form.contains("value=\"\""));
    }

    #[tokio::test]
    async fn foot_reports_counts_and_selected_filter() {
        let model = reference_model(&reference(TodoFilter::Active)).unwrap();
        let html = render(names::FOOT, &model).await;
        assert!(html.contains("id=\"foot\""));
        assert!(html.contains("<strong>1</strong> item left"));
        assert!(html.contains("<a href=\"/?filter=active\" class=\"selected\">"));
        assert!(html.contains("Clear completed"));
    }

    #[tokio::test]
    async fn full_page_includes_every_region() {
        let listing = TodoListing {
            todos: vec![todo("Completed", true), todo("Incomplete", false)],
            reference: reference(TodoFilter::All),
        };
        let model = listing_model(&listing, &TodoForm::default(), "").unwrap();
        let html = render(names::INDEX, &model).await;

        for needle in ["<!doctype html>", "id=\"new-todo\"", "id=\"todos\"", "id=\"foot\"", "Completed"] {
            assert!(html.contains(needle), "missing {needle}");
        }
        assert!(!html.contains("class=\"todo-list\" hx-swap-oob"));
    }

    #[tokio::test]
    async fn model_missing_attributes_fails_to_render() {
        let resolver = TemplateViewResolver::with_defaults();
        let view = resolver.resolve(names::FOOT, &Locale::default()).unwrap();
        let mut sink = CaptureSink::default();
        let err = view.render(&Model::new(), &mut sink).await.unwrap_err();
        assert!(matches!(err, ViewError::Model(_)));
        assert!(sink.is_empty());
    }

    #[test]
    fn resolution_prefers_most_specific_locale() {
        struct Marker(&'static str);

        #[async_trait]
        impl View for Marker {
            async fn render(
                &self,
                _model: &Model,
                sink: &mut dyn FragmentSink,
            ) -> Result<(), ViewError> {
                sink.write_text(self.0);
                Ok(())
            }

            fn name(&self) -> &str {
                self.0
            }
        }

        let mut resolver = TemplateViewResolver::new();
        resolver
            .register("greeting", Arc::new(Marker("plain")))
            .register("greeting@de", Arc::new(Marker("german")))
            .register("greeting@de-CH", Arc::new(Marker("swiss")));

        let pick = |tag: &str| {
            resolver
                .resolve("greeting", &Locale::parse(tag).unwrap())
                .unwrap()
                .name()
                .to_string()
        };
        assert_eq!(pick("de-CH"), "swiss");
        assert_eq!(pick("de-AT"), "german");
        assert_eq!(pick("fr"), "plain");

        assert!(matches!(
            resolver.resolve("farewell", &Locale::default()),
            Err(ResolveError::UnknownView { .. })
        ));
    }

    #[test]
    fn toggled_todo_hidden_by_active_or_completed_filter() {
        let done = todo("x", true);
        let open = todo("y", false);
        assert!(hidden_by_filter(&done, TodoFilter::Active));
        assert!(!hidden_by_filter(&open, TodoFilter::Active));
        assert!(hidden_by_filter(&open, TodoFilter::Completed));
        assert!(!hidden_by_filter(&done, TodoFilter::All));
    }
}
