//! HTTP surface: OAuth login flow, the synchronous command-test endpoint,
//! and the operational triggers for the live chat bot.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{AppendHeaders, Html, IntoResponse, Redirect},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info};

use crate::commands::{dispatch, BotStatus};
use crate::config::Config;
use crate::oauth::OAuthClient;
use crate::platform::youtube::YouTubeClient;
use crate::platform::ChatPlatform;
use crate::poller::{ChatPoller, StartOutcome};
use crate::session::{random_token, AuthSession, SessionStore};

const SESSION_COOKIE: &str = "tubebot_sid";

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub sessions: Arc<SessionStore>,
    pub oauth: Arc<OAuthClient>,
    pub poller: Arc<ChatPoller>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let oauth = OAuthClient::new(
            &config.client_id,
            &config.client_secret,
            &config.redirect_uri(),
        );
        let sessions = SessionStore::new(&config.session_secret);
        let poller = ChatPoller::new(std::time::Duration::from_secs(config.poll_interval_secs));
        Self {
            config: Arc::new(config),
            sessions: Arc::new(sessions),
            oauth: Arc::new(oauth),
            poller: Arc::new(poller),
        }
    }
}

pub async fn run(state: AppState) -> Result<()> {
    let addr = format!("0.0.0.0:{}", state.config.port);

    let app = Router::new()
        .route("/", get(home))
        .route("/auth", get(auth_start))
        .route("/oauth2callback", get(oauth_callback))
        .route("/api/command", post(api_command))
        .route("/api/channel/{name}", get(channel_search))
        .route("/find-live", get(find_live))
        .route("/send-test", get(send_test))
        .route("/start-bot", get(start_bot))
        .route("/stop-bot", get(stop_bot))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;

    info!("Server listening on {}", addr);
    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}

// ── Session plumbing ───────────────────────────────────────────────────────

/// Pull the "k=v" pair for `name` out of a Cookie header line.
fn cookie_from_header(header_value: &str, name: &str) -> Option<String> {
    header_value.split(';').find_map(|pair| {
        let (k, v) = pair.trim().split_once('=')?;
        (k == name).then(|| v.to_string())
    })
}

/// Verified session id from the request headers, if any.
fn session_id(state: &AppState, headers: &HeaderMap) -> Option<String> {
    let raw = headers.get(header::COOKIE)?.to_str().ok()?;
    let value = cookie_from_header(raw, SESSION_COOKIE)?;
    state.sessions.verify_cookie(&value)
}

fn session(state: &AppState, headers: &HeaderMap) -> Option<(String, AuthSession)> {
    let sid = session_id(state, headers)?;
    let session = state.sessions.get(&sid)?;
    Some((sid, session))
}

fn bot_status(session: Option<&AuthSession>, poller: &ChatPoller) -> BotStatus {
    let channel = session.and_then(|s| s.channel.as_ref());
    BotStatus {
        authenticated: session.is_some_and(|s| s.tokens.is_some()),
        channel_id: channel.map(|c| c.id.clone()),
        channel_title: channel.map(|c| c.title.clone()),
        subscriber_count: channel.map(|c| c.subscriber_count),
        live_chat_connected: poller.is_running(),
    }
}

type ApiError = (StatusCode, Json<serde_json::Value>);

fn api_error(status: StatusCode, message: impl std::fmt::Display) -> ApiError {
    (status, Json(json!({ "error": message.to_string() })))
}

fn internal_error(err: anyhow::Error) -> ApiError {
    error!("Request failed: {:#}", err);
    api_error(StatusCode::INTERNAL_SERVER_ERROR, format!("{err:#}"))
}

// ── Handlers ───────────────────────────────────────────────────────────────

async fn home(State(state): State<AppState>, headers: HeaderMap) -> Html<String> {
    let session = session(&state, &headers).map(|(_, s)| s);
    let status = bot_status(session.as_ref(), &state.poller);

    let who = match &status.channel_title {
        Some(title) => format!("Logged in as <b>{title}</b>."),
        None => r#"Not logged in. <a href="/auth">Log in with Google</a>."#.to_string(),
    };
    let bot_line = if status.live_chat_connected {
        "Chat bot: running."
    } else {
        "Chat bot: stopped."
    };

    Html(format!(
        "<html><body><h1>tubebot</h1><p>{who}</p><p>{bot_line}</p></body></html>"
    ))
}

async fn auth_start(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    // Reuse an existing session so a re-login keeps the same cookie.
    let sid = session_id(&state, &headers)
        .filter(|sid| state.sessions.get(sid).is_some())
        .unwrap_or_else(|| state.sessions.create());

    let csrf = random_token();
    state.sessions.update(&sid, |s| {
        s.oauth_state = Some(csrf.clone());
    });

    let url = state.oauth.authorize_url(&csrf);
    let cookie = format!(
        "{}={}; Path=/; HttpOnly",
        SESSION_COOKIE,
        state.sessions.cookie_value(&sid)
    );

    (
        AppendHeaders([(header::SET_COOKIE, cookie)]),
        Redirect::to(&url),
    )
}

#[derive(Deserialize)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

async fn oauth_callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
    headers: HeaderMap,
) -> Result<Redirect, (StatusCode, String)> {
    if let Some(provider_error) = params.error {
        return Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("OAuth exchange failed: {provider_error}"),
        ));
    }
    let code = params
        .code
        .ok_or((StatusCode::BAD_REQUEST, "No code in query".to_string()))?;

    let (sid, session) = session(&state, &headers).ok_or((
        StatusCode::BAD_REQUEST,
        "No session cookie; start the login at /auth".to_string(),
    ))?;

    // CSRF check: the state we sent must come back unchanged.
    if session.oauth_state.is_none() || session.oauth_state != params.state {
        return Err((StatusCode::BAD_REQUEST, "OAuth state mismatch".to_string()));
    }

    let tokens = state.oauth.exchange_code(&code).await.map_err(|e| {
        error!("OAuth exchange failed: {:#}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("OAuth exchange failed: {e:#}"),
        )
    })?;

    // Cache the authenticated channel so !info and !channel can answer
    // without another API round trip.
    let channel = YouTubeClient::new(&tokens.access_token)
        .map_err(to_500)?
        .my_channel()
        .await
        .map_err(to_500)?;

    info!("Authenticated as channel {} ({})", channel.title, channel.id);

    state.sessions.update(&sid, |s| {
        s.tokens = Some(tokens);
        s.channel = Some(channel);
        s.oauth_state = None;
    });

    Ok(Redirect::to("/"))
}

fn to_500(err: anyhow::Error) -> (StatusCode, String) {
    error!("Request failed: {:#}", err);
    (StatusCode::INTERNAL_SERVER_ERROR, format!("{err:#}"))
}

#[derive(Deserialize)]
struct CommandRequest {
    user: Option<String>,
    message: Option<String>,
}

#[derive(Serialize)]
struct CommandReply {
    reply: String,
}

async fn api_command(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CommandRequest>,
) -> Result<Json<CommandReply>, ApiError> {
    let message = match body.message {
        Some(m) if !m.trim().is_empty() => m,
        _ => return Err(api_error(StatusCode::BAD_REQUEST, "message required")),
    };
    let user = body.user.unwrap_or_else(|| "anonymous".to_string());

    let session = session(&state, &headers).map(|(_, s)| s);
    let status = bot_status(session.as_ref(), &state.poller);

    // Non-blank input always yields a reply (at worst the fallback).
    let reply = dispatch(&user, &message, &status).unwrap_or_default();
    Ok(Json(CommandReply { reply }))
}

async fn channel_search(
    State(state): State<AppState>,
    Path(name): Path<String>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    let (_, session) = authed_session(&state, &headers)?;
    let youtube = youtube_client(&session)?;

    match youtube.search_channel(&name).await.map_err(internal_error)? {
        Some(channel) => Ok(Json(json!({
            "found": true,
            "id": channel.id,
            "title": channel.title,
            "subscriberCount": channel.subscriber_count,
        }))),
        None => Ok(Json(json!({ "found": false }))),
    }
}

async fn find_live(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    let (sid, session) = authed_session(&state, &headers)?;
    let channel = session
        .channel
        .as_ref()
        .ok_or_else(|| api_error(StatusCode::UNAUTHORIZED, "no channel on this session"))?;

    let youtube = youtube_client(&session)?;
    match youtube
        .find_live_chat_id(&channel.id)
        .await
        .map_err(internal_error)?
    {
        Some(live_chat_id) => {
            info!("Found live chat {}", live_chat_id);
            state.sessions.update(&sid, |s| {
                s.live_chat_id = Some(live_chat_id.clone());
            });
            Ok(Json(json!({ "found": true, "liveChatId": live_chat_id })))
        }
        None => Ok(Json(json!({ "found": false }))),
    }
}

#[derive(Deserialize)]
struct SendTestParams {
    text: Option<String>,
}

async fn send_test(
    State(state): State<AppState>,
    Query(params): Query<SendTestParams>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    let (_, session) = authed_session(&state, &headers)?;
    let live_chat_id = live_chat_id(&session)?;

    let text = params.text.unwrap_or_else(|| "Bot connected.".to_string());
    let youtube = youtube_client(&session)?;
    youtube
        .send_message(&live_chat_id, &text)
        .await
        .map_err(internal_error)?;

    Ok(Json(json!({ "sent": true })))
}

async fn start_bot(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    let (_, session) = authed_session(&state, &headers)?;
    let live_chat_id = live_chat_id(&session)?;

    let status = bot_status(Some(&session), &state.poller);
    let own_channel_id = session.channel.as_ref().map(|c| c.id.clone());
    let platform: Arc<dyn ChatPlatform> = Arc::new(youtube_client(&session)?);

    let outcome = state
        .poller
        .start(platform, live_chat_id, status, own_channel_id);

    let message = match outcome {
        StartOutcome::Started => "started",
        StartOutcome::AlreadyRunning => "already running",
    };
    Ok(Json(json!({ "status": message })))
}

async fn stop_bot(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    authed_session(&state, &headers)?;
    state.poller.stop();
    Ok(Json(json!({ "status": "stopped" })))
}

// ── Handler helpers ────────────────────────────────────────────────────────

fn authed_session(state: &AppState, headers: &HeaderMap) -> Result<(String, AuthSession), ApiError> {
    let (sid, session) = session(state, headers)
        .ok_or_else(|| api_error(StatusCode::UNAUTHORIZED, "not authenticated"))?;
    if session.tokens.is_none() {
        return Err(api_error(StatusCode::UNAUTHORIZED, "not authenticated"));
    }
    Ok((sid, session))
}

fn youtube_client(session: &AuthSession) -> Result<YouTubeClient, ApiError> {
    let token = session
        .access_token()
        .ok_or_else(|| api_error(StatusCode::UNAUTHORIZED, "not authenticated"))?;
    YouTubeClient::new(token).map_err(internal_error)
}

fn live_chat_id(session: &AuthSession) -> Result<String, ApiError> {
    session.live_chat_id.clone().ok_or_else(|| {
        api_error(
            StatusCode::BAD_REQUEST,
            "no live chat located yet; call /find-live first",
        )
    })
}
