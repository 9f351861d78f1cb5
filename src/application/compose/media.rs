//! Negotiated media types, charsets and locales for a composition.

use std::{borrow::Cow, fmt, str::FromStr};

use mime::Mime;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MediaTypeError {
    #[error("media type `{0}` is missing a `type/subtype` pair")]
    MissingSubtype(String),
    #[error("media type `{value}` is malformed")]
    Malformed {
        value: String,
        #[source]
        source: mime::FromStrError,
    },
}

/// A parsed `type/subtype; name=value` media type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaType(Mime);

impl MediaType {
    pub fn html() -> Self {
        Self(mime::TEXT_HTML)
    }

    pub fn event_stream() -> Self {
        Self(mime::TEXT_EVENT_STREAM)
    }

    /// The lowercased `type/subtype` without parameters.
    pub fn essence(&self) -> &str {
        self.0.essence_str()
    }

    /// Parameter value with surrounding quotes removed.
    pub fn param(&self, name: &str) -> Option<&str> {
        let name = name.to_ascii_lowercase();
        self.0
            .get_param(name.as_str())
            .map(|value| value.as_str())
    }

    pub fn is_event_stream(&self) -> bool {
        self.essence() == mime::TEXT_EVENT_STREAM.essence_str()
    }

    pub fn charset_label(&self) -> Option<&str> {
        self.0.get_param(mime::CHARSET).map(|value| value.as_str())
    }

    /// Charset used to encode text writes; unsupported labels fall back to UTF-8.
    pub fn charset(&self) -> Charset {
        self.charset_label()
            .and_then(Charset::from_label)
            .unwrap_or_default()
    }
}

impl Default for MediaType {
    fn default() -> Self {
        Self::html()
    }
}

impl FromStr for MediaType {
    type Err = MediaTypeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if !trimmed.contains('/') {
            return Err(MediaTypeError::MissingSubtype(value.to_string()));
        }
        let parsed: Mime = trimmed.parse().map_err(|source| MediaTypeError::Malformed {
            value: value.to_string(),
            source,
        })?;
        if parsed.subtype().as_str().is_empty() {
            return Err(MediaTypeError::MissingSubtype(value.to_string()));
        }
        Ok(Self(parsed))
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Charset {
    #[default]
    Utf8,
    Latin1,
}

impl Charset {
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "utf-8" | "utf8" => Some(Self::Utf8),
            "iso-8859-1" | "latin1" | "latin-1" => Some(Self::Latin1),
            _ => None,
        }
    }

    /// Encode text for the wire. Characters outside Latin-1 become `?`.
    pub fn encode<'a>(&self, text: &'a str) -> Cow<'a, [u8]> {
        match self {
            Self::Utf8 => Cow::Borrowed(text.as_bytes()),
            Self::Latin1 if text.is_ascii() => Cow::Borrowed(text.as_bytes()),
            Self::Latin1 => Cow::Owned(
                text.chars()
                    .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
                    .collect(),
            ),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("`{0}` is not a valid locale tag")]
pub struct LocaleError(String);

/// Language tag such as `en` or `de-CH`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Locale(String);

impl Locale {
    pub fn parse(tag: &str) -> Option<Self> {
        let tag = tag.trim();
        if tag.is_empty() || tag == "*" {
            return None;
        }

        let mut normalized = String::with_capacity(tag.len());
        for (index, subtag) in tag.split(['-', '_']).enumerate() {
            if subtag.is_empty() || !subtag.bytes().all(|b| b.is_ascii_alphanumeric()) {
                return None;
            }
            if index == 0 {
                normalized.push_str(&subtag.to_ascii_lowercase());
            } else {
                normalized.push('-');
                match subtag.len() {
                    2 => normalized.push_str(&subtag.to_ascii_uppercase()),
                    // Script subtags are title-cased: `Hant`, `Latn`.
                    4 => {
                        let (first, rest) = subtag.split_at(1);
                        normalized.push_str(&first.to_ascii_uppercase());
                        normalized.push_str(&rest.to_ascii_lowercase());
                    }
                    _ => normalized.push_str(&subtag.to_ascii_lowercase()),
                }
            }
        }
        Some(Self(normalized))
    }

    /// Pick the most preferred tag from an `Accept-Language` header value.
    pub fn from_accept_language(header: &str) -> Option<Self> {
        let mut best: Option<(f32, Locale)> = None;
        for entry in header.split(',') {
            let mut pieces = entry.split(';');
            let Some(locale) = pieces.next().and_then(Locale::parse) else {
                continue;
            };
            let quality = pieces
                .filter_map(|piece| piece.trim().strip_prefix("q="))
                .map(|q| q.trim().parse::<f32>().ok())
                .next()
                .unwrap_or(Some(1.0));
            // Entries whose weight is unparseable or outside (0, 1] are dropped.
            let Some(quality) = quality.filter(|q| q.is_finite() && *q > 0.0 && *q <= 1.0) else {
                continue;
            };
            if best.as_ref().is_none_or(|(current, _)| quality > *current) {
                best = Some((quality, locale));
            }
        }
        best.map(|(_, locale)| locale)
    }

    pub fn tag(&self) -> &str {
        &self.0
    }

    pub fn language(&self) -> &str {
        self.0.split('-').next().unwrap_or(&self.0)
    }
}

impl Default for Locale {
    fn default() -> Self {
        Self("en".to_string())
    }
}

impl FromStr for Locale {
    type Err = LocaleError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value).ok_or_else(|| LocaleError(value.to_string()))
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
