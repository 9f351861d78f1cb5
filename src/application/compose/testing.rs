//! Test doubles shared by the composition tests.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;

use super::{
    error::{ResolveError, ViewError},
    media::Locale,
    model::Model,
    sink::FragmentSink,
    view::{View, ViewResolver},
};

pub struct StaticView {
    body: &'static str,
}

impl StaticView {
    pub fn new(body: &'static str) -> Self {
        Self { body }
    }
}

#[async_trait]
impl View for StaticView {
    async fn render(&self, _model: &Model, sink: &mut dyn FragmentSink) -> Result<(), ViewError> {
        sink.write_text(self.body);
        Ok(())
    }
}

/// Emits each part as its own write, yielding to the runtime in between.
pub struct ChunkedView {
    parts: Vec<&'static str>,
    pause: Option<Duration>,
}

impl ChunkedView {
    pub fn new(parts: Vec<&'static str>) -> Self {
        Self { parts, pause: None }
    }

    pub fn with_pause(self, pause: Duration) -> Self {
        Self {
            pause: Some(pause),
            ..self
        }
    }
}

#[async_trait]
impl View for ChunkedView {
    async fn render(&self, _model: &Model, sink: &mut dyn FragmentSink) -> Result<(), ViewError> {
        for part in &self.parts {
            sink.write_text(part);
            match self.pause {
                Some(pause) => tokio::time::sleep(pause).await,
                None => tokio::task::yield_now().await,
            }
        }
        Ok(())
    }
}

/// Writes a partial prefix and then fails.
pub struct FailingView {
    message: &'static str,
}

impl FailingView {
    pub fn new(message: &'static str) -> Self {
        Self { message }
    }
}

#[async_trait]
impl View for FailingView {
    async fn render(&self, _model: &Model, sink: &mut dyn FragmentSink) -> Result<(), ViewError> {
        sink.write_text("<partial");
        Err(ViewError::message(self.message))
    }
}

/// Echoes the model's `greeting` attribute.
pub struct GreetingView;

#[async_trait]
impl View for GreetingView {
    async fn render(&self, model: &Model, sink: &mut dyn FragmentSink) -> Result<(), ViewError> {
        let greeting = model
            .get("greeting")
            .and_then(|value| value.as_str())
            .ok_or_else(|| ViewError::message("missing greeting"))?;
        sink.write_text(greeting);
        Ok(())
    }
}

#[derive(Default)]
pub struct MapResolver {
    views: HashMap<String, Arc<dyn View>>,
    seen: Arc<Mutex<Vec<String>>>,
}

impl MapResolver {
    pub fn with(mut self, name: &str, view: impl View + 'static) -> Self {
        self.views.insert(name.to_string(), Arc::new(view));
        self
    }

    /// Locales passed to `resolve`, in call order.
    pub fn seen_locales(&self) -> Arc<Mutex<Vec<String>>> {
        self.seen.clone()
    }
}

impl ViewResolver for MapResolver {
    fn resolve(&self, name: &str, locale: &Locale) -> Result<Arc<dyn View>, ResolveError> {
        self.seen.lock().unwrap().push(locale.tag().to_string());
        self.views
            .get(name)
            .cloned()
            .ok_or_else(|| ResolveError::UnknownView {
                name: name.to_string(),
            })
    }
}
