use std::{fmt, str::FromStr, sync::Arc, time::Duration, time::Instant};

use bytes::{Bytes, BytesMut};
use metrics::{counter, histogram};
use tracing::{debug, error, warn};

use super::{
    error::{ComposeError, RenderError},
    fragment::{EventFramer, Fragment},
    media::{Charset, Locale, MediaType},
    renderer::FragmentRenderer,
    view::{Rendering, ViewResolver},
};
use crate::application::error::error_chain;

/// Appended after every fragment in the composed body.
pub const SEPARATOR: &[u8] = b"\n\n";

pub(super) const METRIC_FRAGMENTS_RENDERED: &str = "mosaic_fragments_rendered_total";
pub(super) const METRIC_FRAGMENTS_FAILED: &str = "mosaic_fragments_failed_total";
pub(super) const METRIC_COMPOSITIONS_ABORTED: &str = "mosaic_compositions_aborted_total";
pub(super) const METRIC_COMPOSE_MS: &str = "mosaic_compose_ms";

/// What synchronous composition does when one rendering fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Log the failure and leave the fragment out.
    #[default]
    Skip,
    /// Fail the whole composition.
    Abort,
}

impl FailurePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Skip => "skip",
            Self::Abort => "abort",
        }
    }
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown failure policy `{0}` (expected `skip` or `abort`)")]
pub struct ParseFailurePolicyError(String);

impl FromStr for FailurePolicy {
    type Err = ParseFailurePolicyError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "skip" => Ok(Self::Skip),
            "abort" => Ok(Self::Abort),
            _ => Err(ParseFailurePolicyError(value.to_string())),
        }
    }
}

/// A fully assembled response body.
#[derive(Debug, Clone)]
pub struct CompositionResult {
    pub body: Bytes,
    pub content_type: MediaType,
    /// Fragments that made it into the body.
    pub fragments: usize,
    /// Renderings left out under [`FailurePolicy::Skip`].
    pub skipped: usize,
}

impl CompositionResult {
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Renders an ordered list of renderings into one response.
#[derive(Clone)]
pub struct FragmentComposer {
    renderer: FragmentRenderer,
    policy: FailurePolicy,
    stream_timeout: Option<Duration>,
}

impl FragmentComposer {
    pub fn new(resolver: Arc<dyn ViewResolver>, default_locale: Locale) -> Self {
        Self {
            renderer: FragmentRenderer::new(resolver, default_locale),
            policy: FailurePolicy::default(),
            stream_timeout: None,
        }
    }

    pub fn with_failure_policy(self, policy: FailurePolicy) -> Self {
        Self { policy, ..self }
    }

    /// Bound on the whole streaming exchange; elapsing aborts it quietly.
    pub fn with_stream_timeout(self, timeout: Option<Duration>) -> Self {
        Self {
            stream_timeout: timeout,
            ..self
        }
    }

    pub fn renderer(&self) -> &FragmentRenderer {
        &self.renderer
    }

    pub fn failure_policy(&self) -> FailurePolicy {
        self.policy
    }

    pub(super) fn stream_timeout(&self) -> Option<Duration> {
        self.stream_timeout
    }

    /// Render every rendering in order, applying the failure policy.
    pub async fn render_all(
        &self,
        renderings: Vec<Rendering>,
        locale: Option<&Locale>,
        content_type: &MediaType,
    ) -> Result<(Vec<Fragment>, usize), ComposeError> {
        let mut fragments = Vec::with_capacity(renderings.len());
        let mut skipped = 0;

        for rendering in &renderings {
            match self.renderer.render_one(rendering, locale, content_type).await {
                Ok(fragment) => {
                    counter!(METRIC_FRAGMENTS_RENDERED, "mode" => "sync").increment(1);
                    fragments.push(fragment);
                }
                Err(err) => {
                    record_failure(&err);
                    match self.policy {
                        FailurePolicy::Abort => return Err(err.into()),
                        FailurePolicy::Skip => skipped += 1,
                    }
                }
            }
        }

        Ok((fragments, skipped))
    }

    /// Synchronous composition: every fragment is rendered before the body is returned.
    pub async fn compose(
        &self,
        renderings: Vec<Rendering>,
        locale: Option<&Locale>,
        content_type: &MediaType,
    ) -> Result<CompositionResult, ComposeError> {
        let started_at = Instant::now();
        warn_on_unsupported_charset(content_type);

        let requested = renderings.len();
        let (fragments, skipped) = self.render_all(renderings, locale, content_type).await?;

        let is_event_stream = content_type.is_event_stream();
        let capacity = fragments.iter().map(|f| f.len() + SEPARATOR.len()).sum();
        let mut body = BytesMut::with_capacity(capacity);
        let count = fragments.len();
        for fragment in fragments {
            let framed = EventFramer::frame(fragment, is_event_stream);
            body.extend_from_slice(framed.as_bytes());
            body.extend_from_slice(SEPARATOR);
        }

        histogram!(METRIC_COMPOSE_MS, "mode" => "sync")
            .record(started_at.elapsed().as_secs_f64() * 1000.0);
        debug!(
            target = "mosaic::compose",
            requested,
            fragments = count,
            skipped,
            content_type = %content_type,
            "composition complete"
        );

        Ok(CompositionResult {
            body: body.freeze(),
            content_type: content_type.clone(),
            fragments: count,
            skipped,
        })
    }
}

pub(super) fn record_failure(err: &RenderError) {
    counter!(METRIC_FRAGMENTS_FAILED, "reason" => err.kind().as_str()).increment(1);
    error!(
        target = "mosaic::compose",
        view = err.view(),
        reason = err.kind().as_str(),
        chain = ?error_chain(err),
        "fragment rendering failed"
    );
}

pub(super) fn warn_on_unsupported_charset(content_type: &MediaType) {
    let Some(label) = content_type.charset_label() else {
        return;
    };
    if Charset::from_label(label).is_none() {
        warn!(
            target = "mosaic::compose",
            charset = label,
            "unsupported charset requested, encoding text as utf-8"
        );
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::application::compose::{
        model::Model,
        testing::{ChunkedView, FailingView, GreetingView, MapResolver, StaticView},
    };

    fn composer(resolver: MapResolver) -> FragmentComposer {
        FragmentComposer::new(Arc::new(resolver), Locale::default())
    }

    fn abc() -> MapResolver {
        MapResolver::default()
            .with("a", StaticView::new("<p>A</p>"))
            .with("b", StaticView::new("<p>B</p>"))
            .with("c", StaticView::new("<p>C</p>"))
    }

    #[tokio::test]
    async fn fragments_appear_in_input_order_each_followed_by_separator() {
        let result = composer(abc())
            .compose(
                vec![Rendering::view("c"), Rendering::view("a"), Rendering::view("b")],
                None,
                &MediaType::html(),
            )
            .await
            .expect("composition");

        assert_eq!(result.body_text(), "<p>C</p>\n\n<p>A</p>\n\n<p>B</p>\n\n");
        assert_eq!(result.fragments, 3);
        assert_eq!(result.skipped, 0);
        assert_eq!(result.content_type, MediaType::html());
    }

    #[tokio::test]
    async fn empty_list_composes_to_empty_body() {
        let result = composer(abc())
            .compose(Vec::new(), None, &MediaType::html())
            .await
            .unwrap();
        assert!(result.body.is_empty());
        assert_eq!(result.fragments, 0);
    }

    #[tokio::test]
    async fn failed_rendering_is_skipped_and_the_rest_survive() {
        let result = composer(abc())
            .compose(
                vec![Rendering::view("a"), Rendering::view("missing"), Rendering::view("c")],
                None,
                &MediaType::html(),
            )
            .await
            .unwrap();

        assert_eq!(result.body_text(), "<p>A</p>\n\n<p>C</p>\n\n");
        assert_eq!(result.fragments, 2);
        assert_eq!(result.skipped, 1);
    }

    #[tokio::test]
    async fn partial_output_of_a_failing_view_is_never_emitted() {
        let resolver = abc().with("broken", FailingView::new("boom"));
        let result = composer(resolver)
            .compose(
                vec![Rendering::view("broken"), Rendering::view("b")],
                None,
                &MediaType::html(),
            )
            .await
            .unwrap();

        assert_eq!(result.body_text(), "<p>B</p>\n\n");
        assert!(!result.body_text().contains("<partial"));
    }

    #[tokio::test]
    async fn abort_policy_fails_the_composition() {
        let err = composer(abc())
            .with_failure_policy(FailurePolicy::Abort)
            .compose(
                vec![Rendering::view("a"), Rendering::view("missing")],
                None,
                &MediaType::html(),
            )
            .await
            .unwrap_err();

        match err {
            ComposeError::Render(render) => assert_eq!(render.view(), "missing"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn chunked_view_is_captured_as_one_fragment() {
        let resolver = MapResolver::default()
            .with("list", ChunkedView::new(vec!["<ul>", "<li>1</li>", "</ul>"]));
        let result = composer(resolver)
            .compose(vec![Rendering::view("list")], None, &MediaType::html())
            .await
            .unwrap();
        assert_eq!(result.body_text(), "<ul><li>1</li></ul>\n\n");
    }

    #[tokio::test]
    async fn event_stream_fragments_are_framed() {
        let resolver = MapResolver::default()
            .with("two", StaticView::new("<div>\n<span>x</span>\n</div>\n"))
            .with("one", StaticView::new("<p>y</p>"));
        let result = composer(resolver)
            .compose(
                vec![Rendering::view("two"), Rendering::view("one")],
                None,
                &MediaType::event_stream(),
            )
            .await
            .unwrap();

        assert_eq!(
            result.body_text(),
            "data:<div>\ndata:<span>x</span>\ndata:</div>\n\ndata:<p>y</p>\n\n"
        );
    }

    #[tokio::test]
    async fn models_are_bound_per_rendering() {
        let resolver = MapResolver::default().with("greet", GreetingView);
        let hello = Model::new().with("greeting", "hello").unwrap();
        let bye = Model::new().with("greeting", "bye").unwrap();

        let result = composer(resolver)
            .compose(
                vec![
                    Rendering::view("greet").with_model(hello),
                    Rendering::view("greet").with_model(bye),
                ],
                None,
                &MediaType::html(),
            )
            .await
            .unwrap();
        assert_eq!(result.body_text(), "hello\n\nbye\n\n");
    }

    #[tokio::test]
    async fn resolved_and_named_targets_mix() {
        let result = composer(abc())
            .compose(
                vec![
                    Rendering::resolved(Arc::new(StaticView::new("<i>inline</i>"))),
                    Rendering::view("a"),
                ],
                None,
                &MediaType::html(),
            )
            .await
            .unwrap();
        assert_eq!(result.body_text(), "<i>inline</i>\n\n<p>A</p>\n\n");
    }

    #[test]
    fn failure_policy_parses_case_insensitively() {
        assert_eq!("Skip".parse::<FailurePolicy>().unwrap(), FailurePolicy::Skip);
        assert_eq!(" abort ".parse::<FailurePolicy>().unwrap(), FailurePolicy::Abort);
        assert!("retry".parse::<FailurePolicy>().is_err());
    }
}
