//! Fuzz testing for the authentication filter.
//!
//! Feeds arbitrary paths and `Authorization` header bytes through
//! `AuthenticationFilter::process` and checks that it:
//!
//! - Never panics on any input
//! - Classifies by the dot-normalized path and forwards exactly that path
//! - Never forwards caller-supplied identity headers on public paths
//! - Only lets a protected request through with identity headers attached
//!
//! # Running the Fuzz Tests
//!
//! ```bash
//! cargo +nightly install cargo-fuzz
//! cargo +nightly fuzz run fuzz_auth_header
//! cargo +nightly fuzz run fuzz_auth_header -- -max_total_time=60
//! ```

#![no_main]

use std::sync::LazyLock;

use arbitrary::Arbitrary;
use axum::http::{HeaderValue, Request};
use edge_gateway::config::DEFAULT_PUBLIC_PATHS;
use edge_gateway::middleware::USER_ID_HEADER;
use edge_gateway::auth::paths::normalize_path;
use edge_gateway::{AuthenticationFilter, FilterOutcome, PublicPaths, TokenVerifier};
use libfuzzer_sys::fuzz_target;

static FILTER: LazyLock<AuthenticationFilter> = LazyLock::new(|| {
    AuthenticationFilter::new(
        TokenVerifier::new(b"fuzz-secret-that-is-at-least-32-bytes-long", 0),
        DEFAULT_PUBLIC_PATHS.iter().copied().collect::<PublicPaths>(),
    )
});

#[derive(Debug, Arbitrary)]
struct Input {
    path: String,
    authorization: Option<Vec<u8>>,
}

fuzz_target!(|input: Input| {
    let path = format!("/{}", input.path.trim_start_matches('/'));
    let Ok(mut request) = Request::builder().uri(path.as_str()).body(()) else {
        return;
    };
    request
        .headers_mut()
        .insert(USER_ID_HEADER, HeaderValue::from_static("spoofed"));
    if let Some(raw) = &input.authorization {
        if let Ok(value) = HeaderValue::from_bytes(raw) {
            request.headers_mut().insert("authorization", value);
        }
    }

    let path = normalize_path(request.uri().path()).into_owned();
    let public = FILTER.public_paths().is_public(&path);

    match FILTER.process(request) {
        FilterOutcome::Continue(forwarded) => {
            assert_eq!(forwarded.uri().path(), path);
            if public {
                assert!(!forwarded.headers().contains_key(USER_ID_HEADER));
            } else {
                assert!(forwarded.headers().contains_key(USER_ID_HEADER));
            }
        }
        FilterOutcome::Reject(rejection) => {
            if rejection.status.as_u16() == 400 {
                return;
            }
            assert!(!public, "public path {path:?} was rejected");
            assert_eq!(rejection.status.as_u16(), 401);
        }
    }
});
