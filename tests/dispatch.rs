//! Integration tests for the dispatch coordinator.

mod helpers;

use alertdispatch::core::{Alert, AlertBatch, ChannelConfig, Outcome};
use alertdispatch::error::{FailureReason, NotifyError};
use alertdispatch::template::TemplateSet;
use alertdispatch::transport::HttpTransport;
use alertdispatch::{DispatchSettings, Dispatcher};
use helpers::mock_transport::MockTransport;
use helpers::{dispatcher, dispatcher_with_templates, firing_batch, resolved_batch, victorops};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_test::traced_test;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn failed_with(outcome: &Outcome, expected: FailureReason) -> bool {
    matches!(outcome, Outcome::Failed { reason, .. } if *reason == expected)
}

#[tokio::test]
async fn test_single_firing_alert_is_delivered_as_critical() {
    let transport = Arc::new(MockTransport::new());
    let d = dispatcher(transport.clone());
    let batch = AlertBatch::new(vec![Alert::firing([("alertname", "DiskFull")])]).unwrap();

    let results = d
        .dispatch(&batch, &[victorops("vo", "https://x")], &CancellationToken::new())
        .await;

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].outcome, Outcome::Delivered);
    assert!(results[0].error().is_none());

    let requests = transport.requests();
    assert_eq!(requests.len(), 1, "Expected exactly one transport call");
    assert_eq!(requests[0].url, "https://x");
    assert_eq!(requests[0].content_type, "application/json");
    let body = requests[0].json();
    assert_eq!(body["message_type"], "CRITICAL");
    assert_eq!(body["monitoring_tool"], "Grafana v9.0.0");
    assert_eq!(body["alert_url"], "http://grafana.local/alerting/list");
    assert_eq!(body["entity_display_name"], "[FIRING:1] DiskFull");
}

#[tokio::test]
async fn test_failing_channel_does_not_affect_others() {
    let transport = Arc::new(MockTransport::new().failing("https://a"));
    let d = dispatcher(transport.clone());

    let results = d
        .dispatch(
            &firing_batch(),
            &[victorops("a", "https://a"), victorops("b", "https://b")],
            &CancellationToken::new(),
        )
        .await;

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].channel_uid, "a");
    assert!(failed_with(&results[0].outcome, FailureReason::Transport));
    assert!(results[0].error().unwrap().contains("connection refused"));
    assert_eq!(results[1].channel_uid, "b");
    assert_eq!(results[1].outcome, Outcome::Delivered);
    assert_eq!(transport.requests_to("https://b").len(), 1);
}

#[tokio::test]
async fn test_results_match_channel_count_and_order() {
    let transport = Arc::new(MockTransport::new().failing("https://down"));
    let d = dispatcher(transport.clone());
    let channels = vec![
        victorops("one", "https://up"),
        ChannelConfig::new("two", "victorops"),
        victorops("three", "https://down"),
        ChannelConfig::new("four", "pagerduty").with_url("https://up"),
        ChannelConfig::new("five", "webhook").with_url("https://up"),
        ChannelConfig::new("six", "slack").with_url("https://up"),
    ];

    let results = d
        .dispatch(&firing_batch(), &channels, &CancellationToken::new())
        .await;

    let uids: Vec<&str> = results.iter().map(|r| r.channel_uid.as_str()).collect();
    assert_eq!(uids, ["one", "two", "three", "four", "five", "six"]);
    assert_eq!(results[0].outcome, Outcome::Delivered);
    assert!(failed_with(&results[1].outcome, FailureReason::Configuration));
    assert!(failed_with(&results[2].outcome, FailureReason::Transport));
    assert!(failed_with(&results[3].outcome, FailureReason::Configuration));
    assert_eq!(results[4].outcome, Outcome::Delivered);
    assert_eq!(results[5].outcome, Outcome::Delivered);
    assert_eq!(transport.calls(), 4);
}

#[tokio::test]
async fn test_missing_url_never_reaches_transport() {
    let transport = Arc::new(MockTransport::new());
    let d = dispatcher(transport.clone());

    let results = d
        .dispatch(
            &firing_batch(),
            &[ChannelConfig::new("no-url", "victorops")],
            &CancellationToken::new(),
        )
        .await;

    assert!(failed_with(&results[0].outcome, FailureReason::Configuration));
    assert!(results[0].error().unwrap().contains("no endpoint url"));
    assert_eq!(transport.calls(), 0);

    let prepared = d.prepare(&[ChannelConfig::new("no-url", "victorops")]);
    assert!(matches!(prepared[0], Err(NotifyError::Configuration(_))));
}

#[tokio::test]
async fn test_resolved_batch_sends_recovery() {
    let transport = Arc::new(MockTransport::new());
    let d = dispatcher(transport.clone());

    let results = d
        .dispatch(
            &resolved_batch(),
            &[victorops("vo", "https://x")],
            &CancellationToken::new(),
        )
        .await;

    assert_eq!(results[0].outcome, Outcome::Delivered);
    let body = transport.requests()[0].json();
    assert_eq!(body["message_type"], "RECOVERY");
    assert_eq!(body["entity_display_name"], "[RESOLVED] HighCPU");
}

#[tokio::test]
async fn test_resolved_batch_suppressed_for_every_kind() {
    let transport = Arc::new(MockTransport::new());
    let d = dispatcher(transport.clone());
    let channels: Vec<ChannelConfig> = ["victorops", "slack", "webhook"]
        .iter()
        .map(|kind| {
            let mut config = ChannelConfig::new(*kind, *kind).with_url("https://x");
            config.disable_resolve_message = true;
            config
        })
        .collect();

    let results = d
        .dispatch(&resolved_batch(), &channels, &CancellationToken::new())
        .await;

    assert_eq!(results.len(), 3);
    for r in &results {
        assert_eq!(r.outcome, Outcome::Suppressed, "channel {}", r.channel_uid);
        assert!(r.is_success());
    }
    assert_eq!(transport.calls(), 0);
}

#[tokio::test]
async fn test_one_firing_alert_keeps_batch_firing() {
    let transport = Arc::new(MockTransport::new());
    let d = dispatcher(transport.clone());
    let batch = AlertBatch::new(vec![
        Alert::firing([("alertname", "A")]).resolve_at(chrono::Utc::now()),
        Alert::firing([("alertname", "B")]),
    ])
    .unwrap();
    let mut config = victorops("vo", "https://x");
    config.disable_resolve_message = true;

    let results = d
        .dispatch(&batch, &[config], &CancellationToken::new())
        .await;

    assert_eq!(results[0].outcome, Outcome::Delivered);
    assert_eq!(transport.requests()[0].json()["message_type"], "CRITICAL");
}

#[tokio::test]
async fn test_render_failure_degrades_to_empty_message() {
    let templates = TemplateSet::builtin()
        .unwrap()
        .with_source(
            "overrides",
            r#"{{ define "default.message" }}{{ .NoSuchField }}{{ end }}"#,
        )
        .unwrap();
    let transport = Arc::new(MockTransport::new());
    let d = dispatcher_with_templates(templates, transport.clone());

    let results = d
        .dispatch(
            &firing_batch(),
            &[victorops("vo", "https://x")],
            &CancellationToken::new(),
        )
        .await;

    assert_eq!(results[0].outcome, Outcome::Delivered);
    assert_eq!(results[0].render_errors.len(), 1);
    assert!(results[0].render_errors[0].contains("NoSuchField"));

    let body = transport.requests()[0].json();
    assert_eq!(body["state_message"], "");
    assert_eq!(body["entity_display_name"], "[FIRING:2] HighCPU");
    assert_eq!(body["message_type"], "CRITICAL");
}

#[tokio::test]
async fn test_slack_override_render_failure_is_reported() {
    let templates = TemplateSet::builtin()
        .unwrap()
        .with_source(
            "slack",
            r#"{{ define "slack.text" }}{{ .NoSuchField }}{{ end }}"#,
        )
        .unwrap();
    let transport = Arc::new(MockTransport::new());
    let d = dispatcher_with_templates(templates, transport.clone());
    let slack = ChannelConfig::new("slack", "slack")
        .with_url("https://slack")
        .with_setting("text", "slack.text");

    let results = d
        .dispatch(&firing_batch(), &[slack], &CancellationToken::new())
        .await;

    assert_eq!(results[0].outcome, Outcome::Delivered);
    assert_eq!(results[0].render_errors.len(), 1);
    assert!(results[0].render_errors[0].contains("NoSuchField"));
    assert_eq!(transport.requests()[0].json()["attachments"][0]["text"], "");
}

#[tokio::test]
async fn test_webhook_and_slack_payloads() {
    let transport = Arc::new(MockTransport::new());
    let d = dispatcher(transport.clone());
    let mut hook = ChannelConfig::new("hook", "webhook").with_url("https://hook");
    hook.name = "ops-hook".to_string();
    let slack = ChannelConfig::new("slack", "slack")
        .with_url("https://slack")
        .with_setting("recipient", "#alerts");

    let results = d
        .dispatch(&firing_batch(), &[hook, slack], &CancellationToken::new())
        .await;
    assert!(results.iter().all(|r| r.outcome == Outcome::Delivered));

    let hook_body = transport.requests_to("https://hook")[0].json();
    assert_eq!(hook_body["receiver"], "ops-hook");
    assert_eq!(hook_body["status"], "firing");
    assert_eq!(hook_body["state"], "alerting");
    assert_eq!(hook_body["alerts"].as_array().unwrap().len(), 2);
    assert_eq!(hook_body["commonLabels"]["alertname"], "HighCPU");

    let slack_body = transport.requests_to("https://slack")[0].json();
    assert_eq!(slack_body["channel"], "#alerts");
    assert_eq!(slack_body["attachments"][0]["color"], "danger");
    assert_eq!(
        slack_body["attachments"][0]["title_link"],
        "http://grafana.local/alerting/list"
    );
}

#[tokio::test(start_paused = true)]
async fn test_slow_channel_times_out_without_blocking_others() {
    let transport = Arc::new(MockTransport::new().delayed(Duration::from_secs(10)));
    let d = dispatcher(transport.clone());
    let mut slow = victorops("slow", "https://slow");
    slow.timeout_secs = Some(1);
    let patient = victorops("patient", "https://patient");

    let results = d
        .dispatch(&firing_batch(), &[slow, patient], &CancellationToken::new())
        .await;

    assert!(failed_with(&results[0].outcome, FailureReason::Timeout));
    assert_eq!(results[1].outcome, Outcome::Delivered);
    assert_eq!(transport.calls(), 2);
}

#[tokio::test]
async fn test_channel_timeout_longer_than_default_is_honored() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(1500)))
        .expect(1)
        .mount(&server)
        .await;

    let default_timeout = Duration::from_secs(1);
    let transport = Arc::new(HttpTransport::new(default_timeout).unwrap());
    let d = Dispatcher::new(
        Arc::new(TemplateSet::builtin().unwrap()),
        transport,
        DispatchSettings {
            default_timeout,
            ..Default::default()
        },
    );
    let mut patient = victorops("patient", &format!("{}/slow", server.uri()));
    patient.timeout_secs = Some(5);

    let results = d
        .dispatch(&firing_batch(), &[patient], &CancellationToken::new())
        .await;

    assert_eq!(results[0].outcome, Outcome::Delivered);
}

#[tokio::test]
async fn test_default_timeout_applies_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let default_timeout = Duration::from_secs(1);
    let d = Dispatcher::new(
        Arc::new(TemplateSet::builtin().unwrap()),
        Arc::new(HttpTransport::new(default_timeout).unwrap()),
        DispatchSettings {
            default_timeout,
            ..Default::default()
        },
    );

    let results = d
        .dispatch(
            &firing_batch(),
            &[victorops("vo", &format!("{}/hook", server.uri()))],
            &CancellationToken::new(),
        )
        .await;

    assert!(failed_with(&results[0].outcome, FailureReason::Timeout));
}

#[tokio::test]
async fn test_zero_timeout_is_a_configuration_error() {
    let transport = Arc::new(MockTransport::new());
    let d = dispatcher(transport.clone());
    let mut zero = victorops("zero", "https://x");
    zero.timeout_secs = Some(0);

    let results = d
        .dispatch(&firing_batch(), &[zero], &CancellationToken::new())
        .await;

    assert!(failed_with(&results[0].outcome, FailureReason::Configuration));
    assert_eq!(transport.calls(), 0);
}

#[tokio::test]
async fn test_cancel_abandons_in_flight_delivery() {
    let transport = Arc::new(MockTransport::new().delayed(Duration::from_secs(60)));
    let started = transport.started.clone();
    let d = dispatcher(transport.clone());
    let cancel = CancellationToken::new();

    let canceller = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            started.notified().await;
            cancel.cancel();
        })
    };

    let results = tokio::time::timeout(
        Duration::from_secs(5),
        d.dispatch(&firing_batch(), &[victorops("vo", "https://x")], &cancel),
    )
    .await
    .expect("dispatch did not stop after cancellation");
    canceller.await.unwrap();

    assert_eq!(transport.calls(), 1);
    assert!(failed_with(&results[0].outcome, FailureReason::Cancelled));
}

#[tokio::test]
async fn test_empty_alert_list_is_rejected() {
    let transport = Arc::new(MockTransport::new());
    let d = dispatcher(transport.clone());

    let err = d
        .dispatch_alerts(
            Vec::new(),
            &[victorops("vo", "https://x")],
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, NotifyError::InvalidInput(_)));
    assert_eq!(transport.calls(), 0);
}

#[tokio::test]
#[traced_test]
async fn test_delivery_failure_is_logged() {
    let transport = Arc::new(MockTransport::new().failing("https://a"));
    let d = dispatcher(transport);

    d.dispatch(
        &firing_batch(),
        &[victorops("a", "https://a")],
        &CancellationToken::new(),
    )
    .await;

    assert!(logs_contain("Failed to send notification"));
    assert!(logs_contain("Dispatch finished"));
}
