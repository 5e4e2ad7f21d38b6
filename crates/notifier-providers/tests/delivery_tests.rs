// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Message sink deliveries against a mock HTTP server.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{event, options, CountingSource};
use notifier_common_http::signature::{verify_hmac_sha256, SIGNATURE_HEADER};
use notifier_core::{Context, Severity};
use notifier_providers::{provider_types, Factory, NotifyError};
use serde_json::{json, Value};
use wiremock::matchers::{any, body_partial_json, header, header_exists, method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn signed_generic_webhook() {
	let server = MockServer::start().await;
	Mock::given(method("POST"))
		.and(path("/hook"))
		.and(header("gotk-component", "kustomize-controller"))
		.and(header("x-team", "platform"))
		.and(header_exists(SIGNATURE_HEADER))
		.respond_with(ResponseTemplate::new(200))
		.expect(1)
		.mount(&server)
		.await;

	let opts = options(format!("{}/hook", server.uri()))
		.with_token("s3cret")
		.with_header("X-Team", "platform");
	let notifier = Factory::new(opts).notifier("generic-hmac").unwrap();
	notifier.post(&Context::background(), &event()).await.unwrap();

	let received = server.received_requests().await.unwrap();
	let req = &received[0];
	let signature = req
		.headers
		.get(SIGNATURE_HEADER)
		.unwrap()
		.to_str()
		.unwrap()
		.strip_prefix("sha256=")
		.unwrap()
		.to_string();
	assert!(verify_hmac_sha256(b"s3cret", &req.body, &signature));

	let body: Value = serde_json::from_slice(&req.body).unwrap();
	assert_eq!(body["involvedObject"]["name"], "apps");
}

const COMMIT_STATUS_HOSTS: [&str; 6] = ["github", "gitlab", "gitea", "bitbucket", "bitbucketserver", "azuredevops"];

#[tokio::test]
async fn update_only_events_skip_message_sinks() {
	let server = MockServer::start().await;
	Mock::given(any())
		.respond_with(ResponseTemplate::new(200))
		.expect(0)
		.mount(&server)
		.await;

	let mut update = event();
	update
		.metadata
		.insert("commit_status".to_string(), "update".to_string());

	let source = Arc::new(CountingSource::default());
	let host = server.uri().trim_start_matches("http://").to_string();
	let sinks: Vec<&str> = provider_types()
		.into_iter()
		.filter(|t| !COMMIT_STATUS_HOSTS.contains(t))
		.collect();
	assert_eq!(sinks.len(), 21);

	for provider in sinks {
		let opts = match provider {
			"nats" => options("nats://127.0.0.1:4222").with_channel("flux.events"),
			"sentry" => options(format!("http://key@{host}/1")),
			"googlepubsub" => options("project")
				.with_channel("topic")
				.with_token_source(source.clone()),
			"githubdispatch" => options(format!("{}/org/repo", server.uri())).with_token("t"),
			_ => options(format!("{}/hook", server.uri()))
				.with_token("t")
				.with_channel("room"),
		};
		let notifier = Factory::new(opts)
			.notifier(provider)
			.unwrap_or_else(|e| panic!("{provider}: {e}"));
		notifier
			.post(&Context::background(), &update)
			.await
			.unwrap_or_else(|e| panic!("{provider}: {e}"));
	}
	assert_eq!(source.calls(), 0);
}

#[tokio::test]
async fn discord_posts_to_slack_compatible_path() {
	let server = MockServer::start().await;
	Mock::given(method("POST"))
		.and(path("/api/webhooks/1/abc/slack"))
		.and(body_partial_json(json!({
			"attachments": [{"color": "good", "author_name": "kustomization/apps.flux-system", "text": "m"}]
		})))
		.respond_with(ResponseTemplate::new(200))
		.expect(1)
		.mount(&server)
		.await;

	let notifier = Factory::new(options(format!("{}/api/webhooks/1/abc", server.uri())))
		.notifier("discord")
		.unwrap();
	notifier.post(&Context::background(), &event()).await.unwrap();
}

#[tokio::test]
async fn telegram_reports_api_failure() {
	let server = MockServer::start().await;
	Mock::given(method("POST"))
		.and(path("/bot123:abc/sendMessage"))
		.and(body_partial_json(json!({"chat_id": "-100", "parse_mode": "MarkdownV2"})))
		.respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": false, "description": "chat not found"})))
		.expect(1)
		.mount(&server)
		.await;

	let notifier = Factory::new(options(server.uri()).with_token("123:abc").with_channel("-100"))
		.notifier("telegram")
		.unwrap();
	let err = notifier.post(&Context::background(), &event()).await.unwrap_err();
	assert!(matches!(err, NotifyError::Provider(ref m) if m.contains("chat not found")));
}

#[tokio::test]
async fn pagerduty_resolves_and_records_change_for_info() {
	let server = MockServer::start().await;
	Mock::given(method("POST"))
		.and(path("/v2/enqueue"))
		.and(body_partial_json(json!({
			"event_action": "resolve",
			"routing_key": "R0UT1NG",
			"dedup_key": "Kustomization/flux-system/apps"
		})))
		.respond_with(ResponseTemplate::new(202))
		.expect(1)
		.mount(&server)
		.await;
	Mock::given(method("POST"))
		.and(path("/v2/change/enqueue"))
		.respond_with(ResponseTemplate::new(202))
		.expect(1)
		.mount(&server)
		.await;

	let notifier = Factory::new(options(server.uri()).with_channel("R0UT1NG"))
		.notifier("pagerduty")
		.unwrap();
	notifier.post(&Context::background(), &event()).await.unwrap();
}

#[tokio::test]
async fn pagerduty_triggers_on_error() {
	let server = MockServer::start().await;
	Mock::given(method("POST"))
		.and(path("/v2/enqueue"))
		.and(body_partial_json(json!({"event_action": "trigger", "payload": {"severity": "error"}})))
		.respond_with(ResponseTemplate::new(202))
		.expect(1)
		.mount(&server)
		.await;
	Mock::given(method("POST"))
		.and(path("/v2/change/enqueue"))
		.respond_with(ResponseTemplate::new(202))
		.expect(0)
		.mount(&server)
		.await;

	let mut failed = event();
	failed.severity = Severity::Error;
	let notifier = Factory::new(options(server.uri()).with_channel("R0UT1NG"))
		.notifier("pagerduty")
		.unwrap();
	notifier.post(&Context::background(), &failed).await.unwrap();
}

#[tokio::test]
async fn alertmanager_receives_one_alert() {
	let server = MockServer::start().await;
	Mock::given(method("POST"))
		.and(path("/api/v2/alerts"))
		.and(header("authorization", "Bearer am-token"))
		.respond_with(ResponseTemplate::new(200))
		.expect(1)
		.mount(&server)
		.await;

	let notifier = Factory::new(options(format!("{}/api/v2/alerts", server.uri())).with_token("am-token"))
		.notifier("alertmanager")
		.unwrap();
	notifier.post(&Context::background(), &event()).await.unwrap();

	let received = server.received_requests().await.unwrap();
	let alerts: Value = serde_json::from_slice(&received[0].body).unwrap();
	assert_eq!(alerts.as_array().unwrap().len(), 1);
	assert_eq!(alerts[0]["labels"]["alertname"], "FluxKustomizationReconciliationSucceeded");
}

#[tokio::test]
async fn event_hub_signs_with_shared_access_key() {
	let server = MockServer::start().await;
	Mock::given(method("POST"))
		.and(path("/events/messages"))
		.and(header("content-type", "application/vnd.microsoft.servicebus.json"))
		.respond_with(ResponseTemplate::new(201))
		.expect(1)
		.mount(&server)
		.await;

	let conn = format!(
		"Endpoint={}/;SharedAccessKeyName=send;SharedAccessKey=c2VjcmV0;EntityPath=events",
		server.uri()
	);
	let notifier = Factory::new(options(conn)).notifier("azureeventhub").unwrap();
	notifier.post(&Context::background(), &event()).await.unwrap();

	let received = server.received_requests().await.unwrap();
	let auth = received[0].headers.get("authorization").unwrap().to_str().unwrap();
	assert!(auth.starts_with("SharedAccessSignature sr="));
	assert!(auth.ends_with("&skn=send"));
	let batch: Value = serde_json::from_slice(&received[0].body).unwrap();
	assert_eq!(batch.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn event_hub_rejects_sas_with_token() {
	let opts = options("Endpoint=sb://flux.servicebus.windows.net/;SharedAccessKeyName=send;SharedAccessKey=k;EntityPath=events")
		.with_token("jwt");
	let err = Factory::new(opts).notifier("azureeventhub").err().unwrap();
	assert_eq!(
		err.to_string(),
		"invalid provider configuration: SAS authentication cannot be set at the same time as a JWT token"
	);
}

#[tokio::test]
async fn event_hub_managed_identity_token_is_fetched_once() {
	let server = MockServer::start().await;
	Mock::given(method("POST"))
		.and(path_regex("^/events/messages$"))
		.and(header("authorization", "Bearer token-1"))
		.respond_with(ResponseTemplate::new(201))
		.expect(8)
		.mount(&server)
		.await;

	let source = Arc::new(CountingSource::slow(Duration::from_millis(50)));
	let opts = options(server.uri())
		.with_channel("events")
		.with_token_source(source.clone());
	let notifier: Arc<dyn notifier_providers::Notifier> =
		Arc::from(Factory::new(opts).notifier("azureeventhub").unwrap());

	let mut handles = Vec::new();
	for _ in 0..8 {
		let notifier = Arc::clone(&notifier);
		handles.push(tokio::spawn(async move {
			notifier.post(&Context::background(), &event()).await
		}));
	}
	for handle in handles {
		handle.await.unwrap().unwrap();
	}
	assert_eq!(source.calls(), 1);
}

#[tokio::test]
async fn hurried_caller_does_not_fail_token_peers() {
	let server = MockServer::start().await;
	Mock::given(method("POST"))
		.and(path_regex("^/events/messages$"))
		.and(header("authorization", "Bearer token-1"))
		.respond_with(ResponseTemplate::new(201))
		.expect(1)
		.mount(&server)
		.await;

	let source = Arc::new(CountingSource::slow(Duration::from_millis(200)));
	let opts = options(server.uri())
		.with_channel("events")
		.with_token_source(source.clone());
	let notifier: Arc<dyn notifier_providers::Notifier> =
		Arc::from(Factory::new(opts).notifier("azureeventhub").unwrap());

	let hurried = {
		let notifier = Arc::clone(&notifier);
		tokio::spawn(async move {
			let ctx = Context::background().with_timeout(Duration::from_millis(30));
			notifier.post(&ctx, &event()).await
		})
	};
	tokio::time::sleep(Duration::from_millis(10)).await;
	let patient = {
		let notifier = Arc::clone(&notifier);
		tokio::spawn(async move { notifier.post(&Context::background(), &event()).await })
	};

	let err = hurried.await.unwrap().unwrap_err();
	assert_eq!(err.cancelled(), Some(notifier_core::Cancelled::DeadlineExceeded));
	patient.await.unwrap().unwrap();
	assert_eq!(source.calls(), 1);
}

#[tokio::test]
async fn deadline_is_reported_as_cancellation() {
	let server = MockServer::start().await;
	Mock::given(method("POST"))
		.respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(10)))
		.mount(&server)
		.await;

	let notifier = Factory::new(options(format!("{}/hook", server.uri())))
		.notifier("generic")
		.unwrap();
	let ctx = Context::background().with_timeout(Duration::from_millis(200));
	let err = notifier.post(&ctx, &event()).await.unwrap_err();
	assert_eq!(err.cancelled(), Some(notifier_core::Cancelled::DeadlineExceeded));
}
