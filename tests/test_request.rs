use courier::http::request::{Method, ProtocolError, RequestBuilder};

fn with_method(token: &str) -> courier::http::request::Request {
    RequestBuilder::new()
        .method(Method::from_token(token))
        .path("/")
        .build()
        .unwrap()
}

#[test]
fn test_method_from_token_known_and_extension() {
    assert_eq!(Method::from_token("POST"), Method::POST);
    assert_eq!(Method::from_token("PATCH"), Method::PATCH);
    assert_eq!(Method::from_token("BREW"), Method::Extension("BREW".into()));
    assert_eq!(Method::from_token("BREW").as_str(), "BREW");
    assert_eq!(Method::DELETE.to_string(), "DELETE");
}

#[test]
fn test_expects_body_uses_first_character_only() {
    for token in ["POST", "PUT", "PATCH", "PROPFIND", "PURGE"] {
        assert!(with_method(token).expects_body(), "{token}");
    }
    for token in ["GET", "HEAD", "DELETE", "OPTIONS", "OPTIONSX", "post"] {
        assert!(!with_method(token).expects_body(), "{token}");
    }
}

#[test]
fn test_header_lookup_is_case_insensitive_first_match() {
    let req = RequestBuilder::new()
        .method(Method::GET)
        .path("/")
        .header("X-Trace", "first")
        .header("x-trace", "second")
        .build()
        .unwrap();

    assert_eq!(req.header("X-TRACE"), Some("first"));
    assert_eq!(req.header("missing"), None);
}

#[test]
fn test_content_length_valid() {
    let req = RequestBuilder::new()
        .method(Method::POST)
        .path("/")
        .header("content-LENGTH", "42")
        .build()
        .unwrap();

    assert_eq!(req.content_length(), Ok(42));
}

#[test]
fn test_content_length_missing() {
    assert_eq!(
        with_method("POST").content_length(),
        Err(ProtocolError::MissingContentLength)
    );
}

#[test]
fn test_content_length_rejects_partial_numbers() {
    for value in ["abc", "12abc", "-1", "+5", " 5", "", "1.0", "99999999999999999999999999"] {
        let req = RequestBuilder::new()
            .method(Method::POST)
            .path("/")
            .header("Content-Length", value)
            .build()
            .unwrap();

        assert_eq!(
            req.content_length(),
            Err(ProtocolError::InvalidContentLength {
                value: value.to_string()
            }),
            "{value:?}"
        );
    }
}

#[test]
fn test_content_length_first_match_wins() {
    let req = RequestBuilder::new()
        .method(Method::POST)
        .path("/")
        .header("Content-Length", "3")
        .header("Content-Length", "nope")
        .build()
        .unwrap();

    assert_eq!(req.content_length(), Ok(3));
}

#[test]
fn test_request_builder_requires_method_and_path() {
    assert!(RequestBuilder::new().path("/").build().is_err());
    assert!(RequestBuilder::new().method(Method::GET).build().is_err());

    let req = RequestBuilder::new()
        .method(Method::POST)
        .path("/submit")
        .body(b"payload")
        .build()
        .unwrap();
    assert_eq!(req.version, 1);
    assert_eq!(&req.body[..], b"payload");
}
