use bitbucket_build_status::credentials::{Credential, CredentialStore};
use bitbucket_build_status::error::NotifyError;
use bitbucket_build_status::logging::BuildLog;
use bitbucket_build_status::transport::{
    HttpTransport, ProxySettings, StatusRequest, StatusTransport, TransportResponse,
    basic_auth_header,
};
use bitbucket_build_status::{
    BuildInfo, BuildOutcome, GitBinding, HostContext, NotifyOutcome, ScmBinding, StatusNotifier,
};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_json, header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const STATUS_PATH: &str = "/2.0/repositories/acme/widgets/commit/abc123/statuses/build";

/// Runs one blocking notification against `api_base` off the async runtime.
async fn notify(
    api_base: String,
    outcome: BuildOutcome,
    timeout: Duration,
) -> (NotifyOutcome, BuildLog) {
    tokio::task::spawn_blocking(move || {
        let store = CredentialStore::new(vec![
            Credential::new("bb-bot", "bot", "s3cret").with_domains(&["bitbucket.org"]),
        ]);
        let transport = HttpTransport::new(None, timeout).unwrap();
        let notifier = StatusNotifier::new("bb-bot", store, transport).with_api_base_url(api_base);
        let host = HostContext {
            root_url: "https://ci.example.com/".into(),
            ..HostContext::default()
        };
        let scm = ScmBinding::Git(GitBinding::new(
            "https://bitbucket.org/acme/widgets.git",
            "abc123",
        ));
        let mut log = BuildLog::new();

        let outcome = notifier.notify(
            &BuildInfo::new(42, "job/widgets/42/", outcome),
            &scm,
            &host,
            &mut log,
        );
        (outcome, log)
    })
    .await
    .unwrap()
}

/// Posts a status to a plain-http API host through `proxy`.
async fn post_through_proxy(proxy: ProxySettings) -> TransportResponse {
    tokio::task::spawn_blocking(move || {
        let transport = HttpTransport::new(Some(&proxy), Duration::from_secs(10)).unwrap();
        transport
            .post_json(&StatusRequest {
                url: format!("http://api.bitbucket.invalid{}", STATUS_PATH),
                authorization: basic_auth_header("bot", "s3cret"),
                body: "{}".to_string(),
            })
            .unwrap()
    })
    .await
    .unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn posts_status_with_basic_auth() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(STATUS_PATH))
        .and(header("authorization", "Basic Ym90OnMzY3JldA=="))
        .and(body_json(json!({
            "state": "SUCCESSFUL",
            "name": "Build #42",
            "url": "https://ci.example.com/job/widgets/42/",
            "key": "JENKINS-BUILD-42",
        })))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let (outcome, log) = notify(server.uri(), BuildOutcome::Success, Duration::from_secs(10)).await;

    assert!(outcome.is_sent(), "unexpected outcome: {:?}", outcome);
    assert!(log.errors().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn rejected_status_is_logged_not_raised() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(STATUS_PATH))
        .respond_with(
            ResponseTemplate::new(400).set_body_string(r#"{"error":{"message":"key too long"}}"#),
        )
        .expect(1)
        .mount(&server)
        .await;

    let (outcome, log) = notify(server.uri(), BuildOutcome::Failure, Duration::from_secs(10)).await;

    assert!(matches!(
        outcome,
        NotifyOutcome::Failed(NotifyError::RemoteRejected { status: 400, .. })
    ));
    assert!(log.errors()[0].contains("key too long"));
}

#[tokio::test(flavor = "multi_thread")]
async fn slow_server_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let (outcome, log) =
        notify(server.uri(), BuildOutcome::Success, Duration::from_millis(200)).await;

    assert!(matches!(
        outcome,
        NotifyOutcome::Failed(NotifyError::TransportFailure(_))
    ));
    assert_eq!(log.errors().len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn aborted_build_makes_no_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let (outcome, _log) =
        notify(server.uri(), BuildOutcome::Aborted, Duration::from_secs(10)).await;

    assert!(matches!(
        outcome,
        NotifyOutcome::Skipped(NotifyError::SkippedOutcome(BuildOutcome::Aborted))
    ));
}

#[tokio::test(flavor = "multi_thread")]
async fn unreachable_api_is_swallowed() {
    // Nothing listens on a port released straight after binding.
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();

    let (outcome, log) = notify(
        format!("http://127.0.0.1:{}", port),
        BuildOutcome::Success,
        Duration::from_secs(5),
    )
    .await;

    assert!(matches!(
        outcome,
        NotifyOutcome::Failed(NotifyError::TransportFailure(_))
    ));
    assert!(!log.errors().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn proxy_receives_credentials_for_named_user() {
    let proxy = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("proxy-authorization", "Basic YWxpY2U6cHc="))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&proxy)
        .await;

    let settings =
        ProxySettings::new("127.0.0.1", proxy.address().port()).with_credentials("alice", "pw");
    let response = post_through_proxy(settings).await;

    assert_eq!(response.status, 201);
}

#[tokio::test(flavor = "multi_thread")]
async fn proxy_gets_no_credentials_for_blank_user() {
    let proxy = MockServer::start().await;
    Mock::given(header_exists("proxy-authorization"))
        .respond_with(ResponseTemplate::new(407))
        .expect(0)
        .mount(&proxy)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&proxy)
        .await;

    let settings =
        ProxySettings::new("127.0.0.1", proxy.address().port()).with_credentials("  ", "pw");
    let response = post_through_proxy(settings).await;

    assert_eq!(response.status, 201);
}
