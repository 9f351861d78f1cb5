use std::ops::Deref;

use bytes::{BufMut, Bytes, BytesMut};

/// Rendered output of exactly one rendering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fragment(Bytes);

impl Fragment {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Bytes {
        self.0
    }

    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.0).into_owned()
    }
}

impl Deref for Fragment {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Bytes> for Fragment {
    fn from(bytes: Bytes) -> Self {
        Self(bytes)
    }
}

impl From<&'static str> for Fragment {
    fn from(text: &'static str) -> Self {
        Self(Bytes::from_static(text.as_bytes()))
    }
}

pub const DATA_MARKER: &[u8] = b"data:";

/// Reformats fragments as server-sent-event `data` fields.
pub struct EventFramer;

impl EventFramer {
    /// Prefix every line with `data:` when `is_event_stream` holds; otherwise identity.
    ///
    /// A single trailing line terminator does not open an extra line, and an
    /// empty fragment still yields one empty `data:` line.
    pub fn frame(fragment: Fragment, is_event_stream: bool) -> Fragment {
        if !is_event_stream {
            return fragment;
        }

        let bytes = fragment.as_bytes();
        let body = strip_line_terminator(bytes);
        let mut framed = BytesMut::with_capacity(bytes.len() + DATA_MARKER.len() * 4);
        for (index, line) in lines(body).enumerate() {
            if index > 0 {
                framed.put_u8(b'\n');
            }
            framed.extend_from_slice(DATA_MARKER);
            framed.extend_from_slice(line);
        }
        Fragment(framed.freeze())
    }
}

fn strip_line_terminator(bytes: &[u8]) -> &[u8] {
    bytes
        .strip_suffix(b"\r\n")
        .or_else(|| bytes.strip_suffix(b"\n"))
        .or_else(|| bytes.strip_suffix(b"\r"))
        .unwrap_or(bytes)
}

/// Lines split on `\r\n`, `\n` or a lone `\r`, the terminators SSE recognises.
fn lines(mut body: &[u8]) -> impl Iterator<Item = &[u8]> {
    let mut done = false;
    std::iter::from_fn(move || {
        if done {
            return None;
        }
        match body.iter().position(|b| matches!(b, b'\r' | b'\n')) {
            Some(end) => {
                let line = &body[..end];
                let skip = if body[end..].starts_with(b"\r\n") { 2 } else { 1 };
                body = &body[end + skip..];
                Some(line)
            }
            None => {
                done = true;
                Some(body)
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn framed(text: &'static str) -> String {
        EventFramer::frame(Fragment::from(text), true).to_string_lossy()
    }

    #[test]
    fn prefixes_every_line() {
        assert_eq!(
            framed("<ul>\n  <li>a</li>\n</ul>"),
            "data:<ul>\ndata:  <li>a</li>\ndata:</ul>"
        );
    }

    #[test]
    fn trailing_newline_does_not_add_an_empty_line() {
        assert_eq!(framed("<p>x</p>\n"), "data:<p>x</p>");
        assert_eq!(framed("a\r\nb\r\n"), "data:a\ndata:b");
        assert_eq!(framed("a\rb\r"), "data:a\ndata:b");
    }

    #[test]
    fn lone_carriage_returns_split_lines() {
        let output = framed("<p>a</p>\r<p>b</p>");
        assert_eq!(output, "data:<p>a</p>\ndata:<p>b</p>");
        assert!(!output.contains('\r'));
        for line in output.split('\n') {
            assert!(line.starts_with("data:"), "unframed line: {line:?}");
        }
    }

    #[test]
    fn mixed_terminators_each_open_one_line() {
        assert_eq!(framed("a\r\nb\rc\nd"), "data:a\ndata:b\ndata:c\ndata:d");
        assert_eq!(framed("a\r\rb"), "data:a\ndata:\ndata:b");
    }

    #[test]
    fn blank_lines_inside_fragment_stay_as_empty_data_lines() {
        assert_eq!(framed("a\n\nb"), "data:a\ndata:\ndata:b");
    }

    #[test]
    fn empty_fragment_yields_single_data_line() {
        assert_eq!(framed(""), "data:");
    }

    #[test]
    fn identity_when_not_event_stream() {
        let fragment = Fragment::from("<p>\nplain\n</p>");
        assert_eq!(EventFramer::frame(fragment.clone(), false), fragment);
    }

    #[test]
    fn identity_pass_over_framed_output_changes_nothing() {
        let once = EventFramer::frame(Fragment::from("one\ntwo"), true);
        let again = EventFramer::frame(once.clone(), false);
        assert_eq!(again, once);
    }
}
