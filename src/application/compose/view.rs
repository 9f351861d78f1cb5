use std::{fmt, sync::Arc};

use async_trait::async_trait;

use super::{
    error::{ResolveError, ViewError},
    media::Locale,
    model::Model,
    sink::FragmentSink,
};

/// Something that can write a model into a sink.
#[async_trait]
pub trait View: Send + Sync {
    async fn render(&self, model: &Model, sink: &mut dyn FragmentSink) -> Result<(), ViewError>;

    /// Label used in logs and errors.
    fn name(&self) -> &str {
        "inline"
    }
}

/// Maps view names to executable views. Shared across requests.
pub trait ViewResolver: Send + Sync {
    fn resolve(&self, name: &str, locale: &Locale) -> Result<Arc<dyn View>, ResolveError>;
}

#[derive(Clone)]
pub enum RenderTarget {
    /// Resolved through the [`ViewResolver`] at render time.
    Named(String),
    /// Already executable; resolution is skipped.
    Resolved(Arc<dyn View>),
}

impl RenderTarget {
    pub fn label(&self) -> &str {
        match self {
            Self::Named(name) => name,
            Self::Resolved(view) => view.name(),
        }
    }
}

impl fmt::Debug for RenderTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(name) => f.debug_tuple("Named").field(name).finish(),
            Self::Resolved(view) => f.debug_tuple("Resolved").field(&view.name()).finish(),
        }
    }
}

/// One piece of output to compose: a view target plus its model.
#[derive(Debug, Clone)]
pub struct Rendering {
    target: RenderTarget,
    model: Model,
}

impl Rendering {
    pub fn view(name: impl Into<String>) -> Self {
        Self {
            target: RenderTarget::Named(name.into()),
            model: Model::default(),
        }
    }

    pub fn resolved(view: Arc<dyn View>) -> Self {
        Self {
            target: RenderTarget::Resolved(view),
            model: Model::default(),
        }
    }

    pub fn with_model(self, model: Model) -> Self {
        Self { model, ..self }
    }

    pub fn target(&self) -> &RenderTarget {
        &self.target
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn label(&self) -> &str {
        self.target.label()
    }
}
