use axum::http::{HeaderMap, header::ACCEPT_LANGUAGE};

use crate::application::compose::Locale;

use super::{DATASTAR_REQUEST_HEADER, HX_REQUEST_HEADER, UP_CONTEXT_HEADER};

/// How the requesting page expects partial updates to arrive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientFlavor {
    /// No client library: full pages and redirects.
    Page,
    /// htmx: one composed HTML body with out-of-band swaps.
    Htmx,
    /// Unpoly: fragments streamed as they are rendered.
    Unpoly,
    /// datastar: each fragment becomes a `patch-elements` event.
    Datastar,
}

impl ClientFlavor {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let hx_request = headers
            .get(HX_REQUEST_HEADER)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.eq_ignore_ascii_case("true"));

        if hx_request {
            Self::Htmx
        } else if headers.contains_key(UP_CONTEXT_HEADER) {
            Self::Unpoly
        } else if headers.contains_key(DATASTAR_REQUEST_HEADER) {
            Self::Datastar
        } else {
            Self::Page
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ClientFlavor::Page => "page",
            ClientFlavor::Htmx => "htmx",
            ClientFlavor::Unpoly => "unpoly",
            ClientFlavor::Datastar => "datastar",
        }
    }
}

/// Preferred locale from `Accept-Language`, if the header names one.
pub fn request_locale(headers: &HeaderMap) -> Option<Locale> {
    headers
        .get(ACCEPT_LANGUAGE)
        .and_then(|value| value.to_str().ok())
        .and_then(Locale::from_accept_language)
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn flavour_follows_request_headers() {
        assert_eq!(
            ClientFlavor::from_headers(&headers(&[("hx-request", "true")])),
            ClientFlavor::Htmx
        );
        assert_eq!(
            ClientFlavor::from_headers(&headers(&[("x-up-context", "{}")])),
            ClientFlavor::Unpoly
        );
        assert_eq!(
            ClientFlavor::from_headers(&headers(&[("datastar-request", "true")])),
            ClientFlavor::Datastar
        );
        assert_eq!(ClientFlavor::from_headers(&HeaderMap::new()), ClientFlavor::Page);
    }

    #[test]
    fn hx_request_must_be_true() {
        assert_eq!(
            ClientFlavor::from_headers(&headers(&[("hx-request", "false")])),
            ClientFlavor::Page
        );
    }

    #[test]
    fn locale_comes_from_accept_language() {
        let locale = request_locale(&headers(&[("accept-language", "fr;q=0.5, de-ch")]));
        assert_eq!(locale.map(|l| l.to_string()), Some("de-CH".to_string()));
        assert!(request_locale(&HeaderMap::new()).is_none());
    }
}
