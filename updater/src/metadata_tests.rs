//! Unit tests for descriptor parsing and fetching.

use super::*;
use crate::http::{HttpResponse, MockHttpTransport};
use rstest::rstest;

const URL: &str = "https://updates.example.test/app-version.json";

fn sha() -> String {
    "ab".repeat(32)
}

#[test]
fn parses_full_descriptor_and_ignores_unknown_fields() {
    let json = format!(
        concat!(
            r#"{{"latest_client_version":"1.0.1","min_required_client_version":"1.0.0","#,
            r#""download_url":"https://example.test/c.zip","sha256":"{}","#,
            r#""release_notes":"faster login","build":{{"number":7}}}}"#
        ),
        sha().to_uppercase()
    );

    let metadata = parse_metadata(&json).expect("valid");

    assert_eq!(metadata.latest_version(), "1.0.1");
    assert_eq!(metadata.min_required_version(), "1.0.0");
    assert_eq!(metadata.download_url(), Some("https://example.test/c.zip"));
    assert_eq!(
        metadata.expected_digest().map(Sha256Digest::as_str),
        Some(sha().as_str())
    );
}

#[test]
fn min_required_defaults_to_latest() {
    let metadata = parse_metadata(r#"{"latest_client_version":"2.3"}"#).expect("valid");
    assert_eq!(metadata.min_required_version(), "2.3");
}

#[test]
fn digest_without_url_is_kept_but_not_installable() {
    let json = format!(r#"{{"latest_client_version":"2.3","sha256":"{}"}}"#, sha());
    let metadata = parse_metadata(&json).expect("valid");
    assert!(metadata.package().is_none());
    assert!(metadata.expected_digest().is_some());
}

#[rstest]
#[case::missing_latest(r#"{"download_url":"u"}"#)]
#[case::blank_latest(r#"{"latest_client_version":"  "}"#)]
#[case::url_without_digest(r#"{"latest_client_version":"1.0","download_url":"https://x/c.zip"}"#)]
#[case::bad_digest(r#"{"latest_client_version":"1.0","download_url":"https://x/c.zip","sha256":"xyz"}"#)]
#[case::not_json("<html>maintenance</html>")]
#[case::wrong_type(r#"{"latest_client_version":101}"#)]
fn rejects_incomplete_descriptors(#[case] body: &str) {
    assert!(parse_metadata(body).is_err(), "accepted {body}");
}

#[test]
fn fetch_caches_raw_body_before_parsing() {
    let mut transport = MockHttpTransport::new();
    transport
        .expect_get()
        .times(1)
        .returning(|_, _| Ok(HttpResponse::from_bytes(200, b"{ not json".to_vec())));
    let cache = tempfile::tempdir().expect("temp dir");
    let fetcher = MetadataFetcher::new(&transport, cache.path());

    let outcome = fetcher.fetch(URL, Duration::from_secs(5));

    assert!(matches!(outcome, MetadataOutcome::NotAvailable { .. }));
    let cached = fs::read_to_string(cache.path().join(METADATA_CACHE_FILENAME)).expect("cache");
    assert_eq!(cached, "{ not json");
}

#[test]
fn fetch_uses_requested_timeout() {
    let mut transport = MockHttpTransport::new();
    transport
        .expect_get()
        .withf(|url, timeouts| {
            url == URL && *timeouts == Timeouts::uniform(Duration::from_secs(3))
        })
        .returning(|_, _| {
            Ok(HttpResponse::from_bytes(
                200,
                br#"{"latest_client_version":"1.0.0"}"#.to_vec(),
            ))
        });
    let cache = tempfile::tempdir().expect("temp dir");

    let outcome = MetadataFetcher::new(&transport, cache.path()).fetch(URL, Duration::from_secs(3));

    match outcome {
        MetadataOutcome::Available(metadata) => assert_eq!(metadata.latest_version(), "1.0.0"),
        other @ MetadataOutcome::NotAvailable { .. } => panic!("expected metadata, got {other:?}"),
    }
}

#[rstest]
#[case::not_found(404)]
#[case::moved(301)]
#[case::no_content(204)]
fn non_200_is_not_available(#[case] status: u16) {
    let mut transport = MockHttpTransport::new();
    transport
        .expect_get()
        .returning(move |_, _| Ok(HttpResponse::from_bytes(status, Vec::new())));
    let cache = tempfile::tempdir().expect("temp dir");

    let outcome = MetadataFetcher::new(&transport, cache.path()).fetch(URL, Duration::from_secs(5));

    assert!(
        matches!(&outcome, MetadataOutcome::NotAvailable { reason } if reason.contains(&status.to_string())),
        "unexpected outcome: {outcome:?}"
    );
}

#[test]
fn network_failure_is_not_available() {
    let mut transport = MockHttpTransport::new();
    transport.expect_get().returning(|url, _| {
        Err(TransportError::Request {
            url: url.to_owned(),
            reason: "timed out".to_owned(),
        })
    });
    let cache = tempfile::tempdir().expect("temp dir");

    let outcome = MetadataFetcher::new(&transport, cache.path()).fetch(URL, Duration::from_secs(5));

    assert!(matches!(outcome, MetadataOutcome::NotAvailable { reason } if reason.contains("timed out")));
}
