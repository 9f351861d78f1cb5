use std::sync::Arc;

use super::{
    error::RenderError,
    fragment::Fragment,
    media::{Locale, MediaType},
    sink::{CaptureSink, FragmentSink},
    view::{RenderTarget, Rendering, View, ViewResolver},
};

/// Resolves one rendering to a view and captures its output as a fragment.
#[derive(Clone)]
pub struct FragmentRenderer {
    resolver: Arc<dyn ViewResolver>,
    default_locale: Locale,
}

impl FragmentRenderer {
    pub fn new(resolver: Arc<dyn ViewResolver>, default_locale: Locale) -> Self {
        Self {
            resolver,
            default_locale,
        }
    }

    pub fn default_locale(&self) -> &Locale {
        &self.default_locale
    }

    /// Resolve the rendering's target; a missing locale falls back to the default one.
    pub fn resolve(
        &self,
        rendering: &Rendering,
        locale: Option<&Locale>,
    ) -> Result<Arc<dyn View>, RenderError> {
        match rendering.target() {
            RenderTarget::Resolved(view) => Ok(view.clone()),
            RenderTarget::Named(name) => {
                let locale = locale.unwrap_or(&self.default_locale);
                self.resolver
                    .resolve(name, locale)
                    .map_err(|source| RenderError::ResolutionFailed {
                        view: name.clone(),
                        source,
                    })
            }
        }
    }

    pub async fn render_one(
        &self,
        rendering: &Rendering,
        locale: Option<&Locale>,
        content_type: &MediaType,
    ) -> Result<Fragment, RenderError> {
        let view = self.resolve(rendering, locale)?;
        let mut sink = CaptureSink::new(content_type.charset());
        render_view(view.as_ref(), rendering, &mut sink).await?;
        Ok(Fragment::from(sink.drain()))
    }
}

pub(super) async fn render_view(
    view: &dyn View,
    rendering: &Rendering,
    sink: &mut dyn FragmentSink,
) -> Result<(), RenderError> {
    view.render(rendering.model(), sink)
        .await
        .map_err(|source| RenderError::RenderFailed {
            view: rendering.label().to_string(),
            source,
        })
}
