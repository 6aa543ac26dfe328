use super::*;
use std::collections::HashSet;

#[test]
fn uuid_session_ids_are_unique_hex() {
    let source = UuidSessionIds;
    let ids: HashSet<String> = (0..1000).map(|_| source.next_id()).collect();

    assert_eq!(ids.len(), 1000);
    for id in &ids {
        assert_eq!(id.len(), 32);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }
}

#[test]
fn retryable_errors() {
    assert!(is_retryable(&ureq::Error::StatusCode(500)));
    assert!(is_retryable(&ureq::Error::StatusCode(503)));
    assert!(is_retryable(&ureq::Error::StatusCode(429)));
    assert!(is_retryable(&ureq::Error::ConnectionFailed));
    assert!(is_retryable(&ureq::Error::HostNotFound));

    assert!(!is_retryable(&ureq::Error::StatusCode(400)));
    assert!(!is_retryable(&ureq::Error::StatusCode(401)));
    assert!(!is_retryable(&ureq::Error::StatusCode(404)));
}

#[test]
fn status_errors_keep_status() {
    let error = classify_ureq_error(&ureq::Error::StatusCode(502));
    assert!(matches!(error, ProviderError::Http { status: 502, .. }));

    let error = classify_ureq_error(&ureq::Error::ConnectionFailed);
    assert!(matches!(error, ProviderError::Transport(_)));
}

#[test]
fn retry_stops_on_client_error() {
    let mut calls = 0;
    let result = request_with_retry(3, "test", || {
        calls += 1;
        Err(ureq::Error::StatusCode(400))
    });

    assert_eq!(calls, 1);
    assert!(matches!(result, Err(ProviderError::Http { status: 400, .. })));
}

#[test]
fn retry_recovers_after_server_error() {
    let mut calls = 0;
    let result = request_with_retry(2, "test", || {
        calls += 1;
        if calls == 1 {
            Err(ureq::Error::StatusCode(503))
        } else {
            Ok("ok".to_string())
        }
    });

    assert_eq!(calls, 2);
    assert_eq!(result, Ok("ok".to_string()));
}

#[test]
fn zero_attempts_still_tries_once() {
    let mut calls = 0;
    let result = request_with_retry(0, "test", || {
        calls += 1;
        Ok("done".to_string())
    });

    assert_eq!(calls, 1);
    assert!(result.is_ok());
}

#[test]
fn build_providers_by_mode() {
    let providers =
        build_providers(&ProviderConfig::default()).expect("ollama providers should build");
    assert_eq!(providers.embedder.model_name(), "nomic-embed-text:latest");

    let config = ProviderConfig {
        mode: ProviderMode::LmStudio,
        endpoint: "http://localhost:1234/v1".to_string(),
        ..ProviderConfig::default()
    };
    assert!(build_providers(&config).is_ok());

    let config = ProviderConfig {
        mode: ProviderMode::OpenRouter,
        api_key: None,
        ..config
    };
    assert!(build_providers(&config).is_err());
}

#[tokio::test]
async fn run_blocking_propagates_result() {
    let ok = run_blocking(|| Ok::<_, ProviderError>(7)).await;
    assert_eq!(ok, Ok(7));

    let err = run_blocking(|| Err::<u8, _>(ProviderError::Transport("boom".to_string()))).await;
    assert_eq!(err, Err(ProviderError::Transport("boom".to_string())));
}
