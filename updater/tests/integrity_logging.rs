//! Integrity failures must leave a distinct, greppable log line.

use logtest::Logger;
use wsmr_updater::digest::{INTEGRITY_LOG_TARGET, IntegrityError, IntegrityVerifier, Sha256Digest};
use wsmr_updater::download::DownloadedArtifact;
use wsmr_updater::test_support::sha256_hex;

#[test]
fn mismatch_is_logged_under_integrity_target() {
    let mut logger = Logger::start();
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("client-latest.zip");
    std::fs::write(&path, b"tampered bytes").expect("write archive");
    let expected = Sha256Digest::parse(&sha256_hex(b"genuine bytes")).expect("digest");

    let result =
        IntegrityVerifier.verify_artifact(DownloadedArtifact::sealed(path.clone(), 14), &expected);

    assert!(matches!(result, Err(IntegrityError::Mismatch { .. })));
    assert!(!path.exists(), "rejected archive must be removed");

    let mut found = false;
    while let Some(record) = logger.pop() {
        if record.target() == INTEGRITY_LOG_TARGET {
            assert_eq!(record.level(), log::Level::Warn);
            assert!(record.args().to_string().contains(expected.as_str()));
            found = true;
        }
    }
    assert!(found, "expected a warning under {INTEGRITY_LOG_TARGET}");
}
