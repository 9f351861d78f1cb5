//! Incremental composition: each fragment reaches the client as soon as it is rendered.

use std::{future::Future, pin::Pin};

use async_stream::stream;
use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};
use metrics::{counter, histogram};
use tokio::time::{Instant, timeout_at};
use tracing::{debug, info};

use super::{
    accumulator::StreamingAccumulator,
    composer::{
        FragmentComposer, METRIC_COMPOSE_MS, METRIC_COMPOSITIONS_ABORTED,
        METRIC_FRAGMENTS_RENDERED, SEPARATOR, record_failure, warn_on_unsupported_charset,
    },
    error::{ComposeError, RenderError},
    fragment::{EventFramer, Fragment},
    media::{Charset, Locale, MediaType},
    renderer::{FragmentRenderer, render_view},
    sink::AccumulatorSink,
    view::Rendering,
};

/// Ordered fragment units; each item is one framed fragment followed by the separator.
pub type ComposeStream = Pin<Box<dyn Stream<Item = Result<Bytes, ComposeError>> + Send>>;

impl FragmentComposer {
    /// Streaming composition over a lazily produced sequence of renderings.
    ///
    /// Rendering failures end the stream with an error item. Cancellation by the
    /// consumer (dropping the stream) or the configured timeout ends it quietly,
    /// discarding any partially accumulated output.
    pub fn compose_stream<S>(
        &self,
        renderings: S,
        locale: Option<Locale>,
        content_type: MediaType,
    ) -> ComposeStream
    where
        S: Stream<Item = Rendering> + Send + 'static,
    {
        let renderer = self.renderer().clone();
        let deadline = self.stream_timeout().map(|timeout| Instant::now() + timeout);

        Box::pin(stream! {
            let started_at = Instant::now();
            warn_on_unsupported_charset(&content_type);

            let mut renderings = Box::pin(renderings);
            let mut accumulator = StreamingAccumulator::new();
            let is_event_stream = content_type.is_event_stream();
            let charset = content_type.charset();
            let mut emitted = 0usize;

            loop {
                let rendering = match until(deadline, renderings.next()).await {
                    Ok(Some(rendering)) => rendering,
                    Ok(None) => break,
                    Err(_) => {
                        abort_quietly(&mut accumulator, emitted);
                        break;
                    }
                };

                let rendered = until(
                    deadline,
                    render_unit(&renderer, &rendering, locale.as_ref(), &mut accumulator, charset),
                )
                .await;

                let fragment = match rendered {
                    Ok(Ok(fragment)) => fragment,
                    Ok(Err(err)) => {
                        accumulator.discard();
                        record_failure(&err);
                        yield Err(ComposeError::Render(err));
                        break;
                    }
                    Err(_) => {
                        abort_quietly(&mut accumulator, emitted);
                        break;
                    }
                };

                counter!(METRIC_FRAGMENTS_RENDERED, "mode" => "stream").increment(1);
                emitted += 1;
                yield Ok(unit(fragment, is_event_stream));
            }

            histogram!(METRIC_COMPOSE_MS, "mode" => "stream")
                .record(started_at.elapsed().as_secs_f64() * 1000.0);
            debug!(target = "mosaic::compose", fragments = emitted, "stream finished");
        })
    }
}

/// Render one rendering through the accumulator and drain it as a single group.
async fn render_unit(
    renderer: &FragmentRenderer,
    rendering: &Rendering,
    locale: Option<&Locale>,
    accumulator: &mut StreamingAccumulator,
    charset: Charset,
) -> Result<Fragment, RenderError> {
    let view = renderer.resolve(rendering, locale)?;
    let mut sink = AccumulatorSink::new(accumulator, charset);
    render_view(view.as_ref(), rendering, &mut sink).await?;
    Ok(Fragment::from(accumulator.drain()))
}

fn unit(fragment: Fragment, is_event_stream: bool) -> Bytes {
    let framed = EventFramer::frame(fragment, is_event_stream);
    let mut unit = BytesMut::with_capacity(framed.len() + SEPARATOR.len());
    unit.extend_from_slice(framed.as_bytes());
    unit.extend_from_slice(SEPARATOR);
    unit.freeze()
}

async fn until<F: Future>(deadline: Option<Instant>, future: F) -> Result<F::Output, ComposeError> {
    match deadline {
        Some(deadline) => timeout_at(deadline, future)
            .await
            .map_err(|_| ComposeError::Aborted),
        None => Ok(future.await),
    }
}

fn abort_quietly(accumulator: &mut StreamingAccumulator, emitted: usize) {
    let dropped = accumulator.discard();
    counter!(METRIC_COMPOSITIONS_ABORTED).increment(1);
    info!(
        target = "mosaic::compose",
        emitted,
        dropped_chunks = dropped,
        "streaming composition aborted"
    );
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            Arc,
            atomic::{AtomicUsize, Ordering},
        },
        time::Duration,
    };

    use async_trait::async_trait;
    use futures::stream;

    use super::*;
    use crate::application::compose::{
        error::ViewError,
        model::Model,
        sink::FragmentSink,
        testing::{ChunkedView, MapResolver, StaticView},
        view::View,
    };

    fn composer(resolver: MapResolver) -> FragmentComposer {
        FragmentComposer::new(Arc::new(resolver), Locale::default())
    }

    fn named(names: &[&'static str]) -> impl Stream<Item = Rendering> + Send + 'static {
        stream::iter(names.iter().map(|name| Rendering::view(*name)).collect::<Vec<_>>())
    }

    async fn collect(stream: ComposeStream) -> Vec<Result<String, String>> {
        stream
            .map(|item| match item {
                Ok(bytes) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
                Err(err) => Err(err.to_string()),
            })
            .collect()
            .await
    }

    struct CountingView(Arc<AtomicUsize>);

    #[async_trait]
    impl View for CountingView {
        async fn render(&self, _model: &Model, sink: &mut dyn FragmentSink) -> Result<(), ViewError> {
            let n = self.0.fetch_add(1, Ordering::SeqCst) + 1;
            sink.write_text(&format!("<p>{n}</p>"));
            Ok(())
        }
    }

    #[tokio::test]
    async fn partial_writes_of_one_rendering_form_one_unit() {
        let resolver = MapResolver::default().with(
            "list",
            ChunkedView::new(vec!["<ul>", "<li>1</li>", "<li>2</li>", "<li>3</li>", "</ul>"]),
        );
        let items = collect(composer(resolver).compose_stream(
            named(&["list"]),
            None,
            MediaType::html(),
        ))
        .await;

        assert_eq!(
            items,
            vec![Ok("<ul><li>1</li><li>2</li><li>3</li></ul>\n\n".to_string())]
        );
    }

    #[tokio::test]
    async fn units_follow_source_order() {
        let resolver = MapResolver::default()
            .with("a", ChunkedView::new(vec!["<a>", "</a>"]).with_pause(Duration::from_millis(5)))
            .with("b", StaticView::new("<b></b>"));
        let items = collect(composer(resolver).compose_stream(
            named(&["a", "b", "a"]),
            None,
            MediaType::html(),
        ))
        .await;

        assert_eq!(
            items,
            vec![
                Ok("<a></a>\n\n".to_string()),
                Ok("<b></b>\n\n".to_string()),
                Ok("<a></a>\n\n".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn event_stream_units_are_framed() {
        let resolver = MapResolver::default().with("two", StaticView::new("<p>\nx\n</p>\n"));
        let items = collect(composer(resolver).compose_stream(
            named(&["two"]),
            None,
            MediaType::event_stream(),
        ))
        .await;

        assert_eq!(items, vec![Ok("data:<p>\ndata:x\ndata:</p>\n\n".to_string())]);
    }

    #[tokio::test]
    async fn rendering_failure_escalates_and_ends_the_stream() {
        let resolver = MapResolver::default()
            .with("a", StaticView::new("<p>A</p>"))
            .with("c", StaticView::new("<p>C</p>"));
        let items = collect(composer(resolver).compose_stream(
            named(&["a", "missing", "c"]),
            None,
            MediaType::html(),
        ))
        .await;

        assert_eq!(items.len(), 2);
        assert_eq!(items[0], Ok("<p>A</p>\n\n".to_string()));
        assert!(items[1].as_ref().is_err_and(|msg| msg.contains("missing")));
    }

    #[tokio::test]
    async fn timeout_aborts_quietly_without_partial_output() {
        let resolver = MapResolver::default()
            .with("fast", StaticView::new("<p>fast</p>"))
            .with(
                "slow",
                ChunkedView::new(vec!["<slow>", "never", "</slow>"])
                    .with_pause(Duration::from_millis(200)),
            );
        let composer = composer(resolver).with_stream_timeout(Some(Duration::from_millis(50)));
        let items = collect(composer.compose_stream(
            named(&["fast", "slow", "fast"]),
            None,
            MediaType::html(),
        ))
        .await;

        assert_eq!(items, vec![Ok("<p>fast</p>\n\n".to_string())]);
    }

    #[tokio::test]
    async fn dropping_the_stream_stops_rendering() {
        let calls = Arc::new(AtomicUsize::new(0));
        let resolver = MapResolver::default().with("count", CountingView(calls.clone()));
        let mut stream = composer(resolver).compose_stream(
            named(&["count", "count", "count"]),
            None,
            MediaType::html(),
        );

        let first = stream.next().await.expect("first unit").expect("rendered");
        assert_eq!(first.as_ref(), b"<p>1</p>\n\n");
        drop(stream);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn source_produced_asynchronously_is_consumed_lazily() {
        let resolver = MapResolver::default().with("a", StaticView::new("a"));
        let source = stream::unfold(0u8, |n| async move {
            if n == 2 {
                return None;
            }
            tokio::task::yield_now().await;
            Some((Rendering::view("a"), n + 1))
        });

        let items = collect(composer(resolver).compose_stream(source, None, MediaType::html())).await;
        assert_eq!(items, vec![Ok("a\n\n".to_string()), Ok("a\n\n".to_string())]);
    }
}
