//! Discord verification popup flow, callback page and referral gating.

mod common;

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use common::*;
use gorillas::discord::{FlowState, PromptPolicy};
use gorillas::{
    DiscordAuthMessage, GorillasError, OpenedPopup, OpenerChannel, PopupOpener, PopupWindow,
    QueryKey, ReferralDecision, Result, Route, WindowMessage,
};
use serde_json::json;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use url::Url;
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const APP_ORIGIN: &str = "http://localhost:3000";

#[derive(Default)]
struct WindowState {
    closed: AtomicBool,
    close_calls: AtomicUsize,
}

struct FakeWindow(Arc<WindowState>);

impl PopupWindow for FakeWindow {
    fn is_closed(&self) -> bool {
        self.0.closed.load(Ordering::SeqCst)
    }

    fn close(&self) {
        self.0.close_calls.fetch_add(1, Ordering::SeqCst);
        self.0.closed.store(true, Ordering::SeqCst);
    }
}

/// Opens one fake popup whose behavior is scripted up front.
struct FakeOpener {
    blocked: bool,
    closed_by_user: bool,
    queued: Vec<WindowMessage>,
    window: Arc<WindowState>,
    opened_urls: Mutex<Vec<String>>,
    // Keeps the message channel open for the duration of the flow.
    sender: Mutex<Option<mpsc::UnboundedSender<WindowMessage>>>,
}

impl FakeOpener {
    fn new() -> Self {
        Self {
            blocked: false,
            closed_by_user: false,
            queued: Vec::new(),
            window: Arc::new(WindowState::default()),
            opened_urls: Mutex::new(Vec::new()),
            sender: Mutex::new(None),
        }
    }

    fn close_calls(&self) -> usize {
        self.window.close_calls.load(Ordering::SeqCst)
    }
}

impl PopupOpener for FakeOpener {
    fn open(&self, url: &str) -> Result<OpenedPopup> {
        if self.blocked {
            return Err(GorillasError::PopupBlocked);
        }
        self.opened_urls.lock().unwrap().push(url.to_string());
        self.window
            .closed
            .store(self.closed_by_user, Ordering::SeqCst);

        let (tx, rx) = mpsc::unbounded_channel();
        for message in &self.queued {
            tx.send(message.clone()).unwrap();
        }
        *self.sender.lock().unwrap() = Some(tx);

        Ok(OpenedPopup {
            window: Box::new(FakeWindow(Arc::clone(&self.window))),
            messages: rx,
        })
    }
}

#[derive(Default)]
struct RecordingOpener {
    posted: Mutex<Vec<(DiscordAuthMessage, String)>>,
    closed: AtomicBool,
}

impl OpenerChannel for RecordingOpener {
    fn post_message(&self, message: &DiscordAuthMessage, target_origin: &str) -> Result<()> {
        self.posted
            .lock()
            .unwrap()
            .push((message.clone(), target_origin.to_string()));
        Ok(())
    }

    fn close_self(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

async fn mount_auth_url(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/discord/auth-url"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"url": "https://discord.com/oauth2/authorize?state=s1"})),
        )
        .mount(server)
        .await;
}

async fn mount_status(server: &MockServer, verified: bool, calls: u64) {
    let user = if verified {
        json!({"id": "1", "username": "kong"})
    } else {
        serde_json::Value::Null
    };
    Mock::given(method("GET"))
        .and(path("/discord/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "verified": verified,
            "discordUser": user
        })))
        .expect(calls)
        .mount(server)
        .await;
}

fn success_message(origin: &str) -> WindowMessage {
    WindowMessage::new(
        origin,
        &DiscordAuthMessage::Success {
            data: json!({"username": "kong"}),
        },
    )
    .unwrap()
}

#[tokio::test]
async fn test_success_message_resolves_with_fresh_status() {
    let server = MockServer::start().await;
    mount_auth_url(&server).await;
    mount_status(&server, true, 1).await;

    let h = logged_in(&server.uri(), "tok").await;
    let mut opener = FakeOpener::new();
    opener.queued.push(success_message(APP_ORIGIN));

    let status = h
        .gorillas
        .verify_discord(&opener, &CancellationToken::new())
        .await
        .unwrap();

    assert!(status.verified);
    assert_eq!(status.discord_user.unwrap().username, "kong");
    assert_eq!(
        opener.opened_urls.lock().unwrap().as_slice(),
        ["https://discord.com/oauth2/authorize?state=s1"]
    );
    assert_eq!(opener.close_calls(), 1);
    assert_eq!(h.gorillas.discord_flow_state(), FlowState::Resolved);
}

#[tokio::test]
async fn test_success_and_close_together_resolve_once() {
    let server = MockServer::start().await;
    mount_auth_url(&server).await;
    mount_status(&server, true, 1).await;

    let h = logged_in(&server.uri(), "tok").await;
    let mut opener = FakeOpener::new();
    opener.queued.push(success_message(APP_ORIGIN));
    opener.closed_by_user = true;

    let status = h
        .gorillas
        .verify_discord(&opener, &CancellationToken::new())
        .await
        .unwrap();
    assert!(status.verified);
    // Already closed by the user, so never force-closed.
    assert_eq!(opener.close_calls(), 0);
}

#[tokio::test]
async fn test_success_message_with_unverified_status_fails() {
    let server = MockServer::start().await;
    mount_auth_url(&server).await;
    mount_status(&server, false, 1).await;

    let h = logged_in(&server.uri(), "tok").await;
    let mut opener = FakeOpener::new();
    opener.queued.push(success_message(APP_ORIGIN));

    let err = h
        .gorillas
        .verify_discord(&opener, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, GorillasError::Verification(_)));
    assert_eq!(opener.close_calls(), 1);
    assert!(h.gorillas.is_logged_in());
}

#[tokio::test]
async fn test_closed_without_verifying_is_cancelled() {
    let server = MockServer::start().await;
    mount_auth_url(&server).await;
    mount_status(&server, false, 1).await;

    let h = logged_in(&server.uri(), "tok").await;
    let mut opener = FakeOpener::new();
    opener.closed_by_user = true;
    // From another origin: must not count as success.
    opener.queued.push(success_message("https://evil.example"));

    let err = h
        .gorillas
        .verify_discord(&opener, &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err, GorillasError::Cancelled);
    assert!(h.gorillas.is_logged_in());
}

#[tokio::test]
async fn test_error_message_fails_verification() {
    let server = MockServer::start().await;
    mount_auth_url(&server).await;

    let h = logged_in(&server.uri(), "tok").await;
    let mut opener = FakeOpener::new();
    opener.queued.push(
        WindowMessage::new(
            APP_ORIGIN,
            &DiscordAuthMessage::Error {
                error: "access_denied".into(),
            },
        )
        .unwrap(),
    );

    let err = h
        .gorillas
        .verify_discord(&opener, &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err, GorillasError::Verification("access_denied".into()));
    assert_eq!(opener.close_calls(), 1);
}

#[tokio::test]
async fn test_blocked_popup() {
    let server = MockServer::start().await;
    mount_auth_url(&server).await;

    let h = logged_in(&server.uri(), "tok").await;
    let mut opener = FakeOpener::new();
    opener.blocked = true;

    let err = h
        .gorillas
        .verify_discord(&opener, &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err, GorillasError::PopupBlocked);
    assert_eq!(h.gorillas.discord_flow_state(), FlowState::Resolved);
}

#[tokio::test]
async fn test_cancel_releases_popup() {
    let server = MockServer::start().await;
    mount_auth_url(&server).await;

    let h = logged_in(&server.uri(), "tok").await;
    let opener = FakeOpener::new();
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();

    let mut flow = h.gorillas.subscribe_discord_flow();
    tokio::spawn(async move {
        flow.wait_for(|state| *state == FlowState::PopupOpen)
            .await
            .unwrap();
        trigger.cancel();
    });

    let err = h.gorillas.verify_discord(&opener, &cancel).await.unwrap_err();
    assert_eq!(err, GorillasError::Cancelled);
    assert_eq!(opener.close_calls(), 1);
}

#[tokio::test]
async fn test_unverified_user_with_pending_referral_must_verify_first() {
    let server = MockServer::start().await;
    mount_status(&server, false, 1).await;
    Mock::given(method("POST"))
        .and(path("/referrals"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .expect(0)
        .mount(&server)
        .await;

    let h = logged_in(&server.uri(), "tok").await;
    h.gorillas.pending_referral().set("FRIEND50").unwrap();

    let decision = h.gorillas.process_pending_referral().await.unwrap();
    assert_eq!(decision, ReferralDecision::RequireDiscord("FRIEND50".into()));
    assert_eq!(h.gorillas.pending_referral().get().as_deref(), Some("FRIEND50"));
    assert_eq!(h.gorillas.discord_prompt_policy().await.unwrap(), PromptPolicy::Blocking);
}

#[tokio::test]
async fn test_verified_user_submits_pending_referral() {
    let server = MockServer::start().await;
    mount_status(&server, true, 1).await;
    Mock::given(method("POST"))
        .and(path("/referrals"))
        .and(body_json(json!({"referralCode": "FRIEND50"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/referrals/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"referralCode": "ME"})))
        .expect(2)
        .mount(&server)
        .await;

    let h = logged_in(&server.uri(), "tok").await;
    h.gorillas.referral_info().await.unwrap();
    let url = Url::parse("http://localhost:3000/?ref=FRIEND50").unwrap();
    h.gorillas.pending_referral().capture_from_url(&url).unwrap();

    let decision = h.gorillas.process_pending_referral().await.unwrap();
    assert_eq!(decision, ReferralDecision::Submit("FRIEND50".into()));
    assert_eq!(h.gorillas.pending_referral().get(), None);
    assert!(h.gorillas.cache().is_stale(&QueryKey::ReferralInfo));

    h.gorillas.referral_info().await.unwrap();
}

#[tokio::test]
async fn test_referral_accepted_with_empty_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/referrals"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let h = logged_in(&server.uri(), "tok").await;
    let submission = h.gorillas.submit_referral("FRIEND50").await.unwrap();
    assert!(submission.message.is_none());
}

#[tokio::test]
async fn test_logged_out_referral_waits_for_login() {
    let server = MockServer::start().await;
    mount_status(&server, true, 0).await;

    let h = harness(&server.uri());
    h.gorillas.pending_referral().set("FRIEND50").unwrap();

    let decision = h.gorillas.process_pending_referral().await.unwrap();
    assert_eq!(decision, ReferralDecision::AwaitLogin("FRIEND50".into()));
    assert_eq!(h.gorillas.discord_prompt_policy().await.unwrap(), PromptPolicy::Skippable);
}

#[tokio::test]
async fn test_callback_page_reports_to_opener_and_closes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/discord/callback"))
        .and(query_param("code", "abc"))
        .and(query_param("state", "xyz"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "discordUser": {"id": "1", "username": "kong"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let h = logged_in(&server.uri(), "tok").await;
    let opener = RecordingOpener::default();
    let url = Url::parse("http://localhost:3000/discord/callback?code=abc&state=xyz").unwrap();

    let message = h
        .gorillas
        .handle_discord_callback(&url, Some(&opener as &dyn OpenerChannel))
        .await;

    assert!(matches!(message, DiscordAuthMessage::Success { .. }));
    let posted = opener.posted.lock().unwrap();
    assert_eq!(posted.len(), 1);
    assert_eq!(posted[0].1, APP_ORIGIN);
    assert!(opener.closed.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_callback_rejection_keeps_session() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/discord/callback"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad state"))
        .expect(1)
        .mount(&server)
        .await;

    let h = logged_in(&server.uri(), "tok").await;
    let url = Url::parse("http://localhost:3000/discord/callback?code=abc&state=xyz").unwrap();

    let message = h.gorillas.handle_discord_callback(&url, None).await;

    assert!(matches!(message, DiscordAuthMessage::Error { .. }));
    assert!(h.gorillas.is_logged_in());
    assert!(h.gorillas.wallet().is_connected());
    let requests = server.received_requests().await.unwrap();
    assert!(requests[0].headers.get("authorization").is_none());
}

#[tokio::test]
async fn test_callback_without_code_reports_error() {
    let server = MockServer::start().await;
    let h = logged_in(&server.uri(), "tok").await;
    let url = Url::parse("http://localhost:3000/discord/callback?error=access_denied").unwrap();

    let message = h.gorillas.handle_discord_callback(&url, None).await;
    assert_eq!(
        message,
        DiscordAuthMessage::Error {
            error: "access_denied".into()
        }
    );
}

#[tokio::test]
async fn test_unlink_ends_session() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/discord/unlink"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .expect(1)
        .mount(&server)
        .await;

    let h = logged_in(&server.uri(), "tok").await;
    h.gorillas.unlink_discord().await.unwrap();

    assert!(!h.gorillas.is_logged_in());
    assert_eq!(h.gorillas.route(), Route::Landing);
    assert!(!h.gorillas.wallet().is_connected());
}
