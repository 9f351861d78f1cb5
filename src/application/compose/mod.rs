//! Multi-fragment view composition.
//!
//! A handler returns an ordered list (or a lazy stream) of [`Rendering`]s. Each
//! one is rendered into a private sink, optionally framed as server-sent-event
//! data, and concatenated into a single response.

mod accumulator;
mod composer;
mod error;
mod fragment;
mod media;
mod model;
mod renderer;
mod sink;
mod stream;
mod view;

#[cfg(test)]
pub(crate) mod testing;

pub use accumulator::StreamingAccumulator;
pub use composer::{
    CompositionResult, FailurePolicy, FragmentComposer, ParseFailurePolicyError, SEPARATOR,
};
pub use error::{ComposeError, RenderError, RenderErrorKind, ResolveError, ViewError};
pub use fragment::{DATA_MARKER, EventFramer, Fragment};
pub use media::{Charset, Locale, LocaleError, MediaType, MediaTypeError};
pub use model::Model;
pub use renderer::FragmentRenderer;
pub use sink::{AccumulatorSink, CaptureSink, FragmentSink, SinkWriter};
pub use stream::ComposeStream;
pub use view::{RenderTarget, Rendering, View, ViewResolver};
