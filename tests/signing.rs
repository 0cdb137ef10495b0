//! Presigned transcription URLs through the public signing API.

use chrono::{TimeZone, Utc};
use voxlate::signing::{self, Credentials, Signer};

fn signer() -> Signer {
    Signer::new(Credentials::new(
        "ASIAEXAMPLE",
        "wJalrXUtnFEMI/K7MDENG/bPxRfiCYEXAMPLEKEY",
        "FwoGZXIvYXdzEBYaD+token/with=reserved",
    ))
}

fn query_keys(url: &str) -> Vec<String> {
    let query = url.split_once('?').map(|(_, q)| q).unwrap_or("");
    query
        .split('&')
        .filter_map(|pair| pair.split_once('=').map(|(k, _)| k.to_string()))
        .collect()
}

#[test]
fn same_inputs_produce_the_same_url() {
    let at = Utc.with_ymd_and_hms(2024, 3, 9, 17, 45, 12).unwrap();
    let first = signing::transcribe_stream_url(&signer(), "us-west-2", "ja-JP", 16000, at).unwrap();
    let second = signing::transcribe_stream_url(&signer(), "us-west-2", "ja-JP", 16000, at).unwrap();

    assert_eq!(first, second);
    assert_eq!(first.signature.len(), 64);
    assert!(
        first
            .signature
            .chars()
            .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase())
    );
}

#[test]
fn every_input_is_covered_by_the_signature() {
    let at = Utc.with_ymd_and_hms(2024, 3, 9, 17, 45, 12).unwrap();
    let base = signing::transcribe_stream_url(&signer(), "us-west-2", "ja-JP", 16000, at).unwrap();

    let later = signing::transcribe_stream_url(
        &signer(),
        "us-west-2",
        "ja-JP",
        16000,
        at + chrono::Duration::seconds(1),
    )
    .unwrap();
    let other_language =
        signing::transcribe_stream_url(&signer(), "us-west-2", "ko-KR", 16000, at).unwrap();
    let other_rate =
        signing::transcribe_stream_url(&signer(), "us-west-2", "ja-JP", 8000, at).unwrap();
    let other_region =
        signing::transcribe_stream_url(&signer(), "eu-west-1", "ja-JP", 16000, at).unwrap();

    for other in [later, other_language, other_rate, other_region] {
        assert_ne!(base.signature, other.signature);
    }
}

#[test]
fn query_is_sorted_and_signature_comes_last() {
    let at = Utc.with_ymd_and_hms(2024, 3, 9, 17, 45, 12).unwrap();
    let signed = signing::transcribe_stream_url(&signer(), "us-west-2", "ja-JP", 16000, at).unwrap();

    let keys = query_keys(&signed.url);
    assert_eq!(keys.last().map(String::as_str), Some("X-Amz-Signature"));

    let signed_keys = &keys[..keys.len() - 1];
    let mut sorted = signed_keys.to_vec();
    sorted.sort();
    assert_eq!(signed_keys, sorted.as_slice());
    assert_eq!(
        sorted,
        vec![
            "X-Amz-Algorithm",
            "X-Amz-Credential",
            "X-Amz-Date",
            "X-Amz-Expires",
            "X-Amz-Security-Token",
            "X-Amz-SignedHeaders",
            "language-code",
            "media-encoding",
            "sample-rate",
        ]
    );
}

#[test]
fn reserved_characters_in_the_token_are_percent_encoded() {
    let at = Utc.with_ymd_and_hms(2024, 3, 9, 17, 45, 12).unwrap();
    let signed = signing::transcribe_stream_url(&signer(), "us-west-2", "ja-JP", 16000, at).unwrap();

    assert!(
        signed
            .url
            .contains("X-Amz-Security-Token=FwoGZXIvYXdzEBYaD%2Btoken%2Fwith%3Dreserved")
    );
    assert!(signed.url.contains("X-Amz-Date=20240309T174512Z"));
    assert!(!signed.redacted().contains(&signed.signature));
}

#[test]
fn url_expires_after_five_minutes() {
    let at = Utc.with_ymd_and_hms(2024, 3, 9, 17, 45, 12).unwrap();
    let signed = signing::transcribe_stream_url(&signer(), "us-west-2", "ja-JP", 16000, at).unwrap();

    assert!(signed.ensure_fresh(at + chrono::Duration::seconds(299)).is_ok());
    assert!(signed.ensure_fresh(at + chrono::Duration::seconds(300)).is_err());
}

#[test]
fn partial_credentials_are_refused() {
    let at = Utc.with_ymd_and_hms(2024, 3, 9, 17, 45, 12).unwrap();
    for credentials in [
        Credentials::new("", "secret", "token"),
        Credentials::new("AKID", "", "token"),
        Credentials::new("AKID", "secret", ""),
    ] {
        let result = signing::transcribe_stream_url(
            &Signer::new(credentials),
            "us-west-2",
            "ja-JP",
            16000,
            at,
        );
        assert!(matches!(
            result,
            Err(voxlate::VoxlateError::SigningPrecondition { .. })
        ));
    }
}
