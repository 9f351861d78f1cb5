//! Write targets handed to views in place of the client connection.

use std::{fmt, io};

use bytes::{Bytes, BytesMut};

use super::{accumulator::StreamingAccumulator, media::Charset};

/// Output target for a single view execution.
pub trait FragmentSink: Send {
    fn write_bytes(&mut self, bytes: &[u8]);

    /// Text is encoded with the sink's charset before it is stored.
    fn write_text(&mut self, text: &str);
}

/// Buffers everything a view writes; nothing reaches the connection.
#[derive(Debug, Default)]
pub struct CaptureSink {
    buffer: BytesMut,
    charset: Charset,
}

impl CaptureSink {
    pub fn new(charset: Charset) -> Self {
        Self {
            buffer: BytesMut::new(),
            charset,
        }
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Return the captured bytes and leave the sink empty.
    pub fn drain(&mut self) -> Bytes {
        self.buffer.split().freeze()
    }
}

impl FragmentSink for CaptureSink {
    fn write_bytes(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    fn write_text(&mut self, text: &str) {
        self.buffer
            .extend_from_slice(self.charset.encode(text).as_ref());
    }
}

/// Forwards each partial write into the composition's accumulator.
pub struct AccumulatorSink<'a> {
    accumulator: &'a mut StreamingAccumulator,
    charset: Charset,
}

impl<'a> AccumulatorSink<'a> {
    pub fn new(accumulator: &'a mut StreamingAccumulator, charset: Charset) -> Self {
        Self {
            accumulator,
            charset,
        }
    }
}

impl FragmentSink for AccumulatorSink<'_> {
    fn write_bytes(&mut self, bytes: &[u8]) {
        if !bytes.is_empty() {
            self.accumulator.push(Bytes::copy_from_slice(bytes));
        }
    }

    fn write_text(&mut self, text: &str) {
        if !text.is_empty() {
            let encoded = self.charset.encode(text);
            self.accumulator.push(Bytes::copy_from_slice(encoded.as_ref()));
        }
    }
}

/// Adapts a sink to `fmt::Write` and `io::Write` so templates can render into it.
pub struct SinkWriter<'a> {
    sink: &'a mut dyn FragmentSink,
}

impl<'a> SinkWriter<'a> {
    pub fn new(sink: &'a mut dyn FragmentSink) -> Self {
        Self { sink }
    }
}

impl fmt::Write for SinkWriter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.sink.write_text(s);
        Ok(())
    }
}

impl io::Write for SinkWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.sink.write_bytes(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
