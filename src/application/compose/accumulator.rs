use std::collections::VecDeque;

use bytes::{Bytes, BytesMut};

/// Collects the partial writes of the rendering currently in flight.
///
/// Owned by exactly one streaming composition and drained at every fragment
/// boundary, so chunks from different renderings never share a group.
#[derive(Debug, Default)]
pub struct StreamingAccumulator {
    pending: VecDeque<Bytes>,
    buffered: usize,
}

impl StreamingAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: Bytes) {
        self.buffered += chunk.len();
        self.pending.push_back(chunk);
    }

    /// Number of queued chunks.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn buffered_bytes(&self) -> usize {
        self.buffered
    }

    /// Take every queued chunk, in emission order, as one contiguous group.
    pub fn drain(&mut self) -> Bytes {
        self.buffered = 0;
        match self.pending.len() {
            0 => Bytes::new(),
            1 => self.pending.pop_front().unwrap_or_default(),
            _ => {
                let total = self.pending.iter().map(Bytes::len).sum();
                let mut group = BytesMut::with_capacity(total);
                for chunk in self.pending.drain(..) {
                    group.extend_from_slice(&chunk);
                }
                group.freeze()
            }
        }
    }

    /// Drop everything queued without emitting it; returns the chunk count dropped.
    pub fn discard(&mut self) -> usize {
        let dropped = self.pending.len();
        self.pending.clear();
        self.buffered = 0;
        dropped
    }
}
