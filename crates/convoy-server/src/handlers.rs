//! HTTP handlers for the webhook, admin, audio, and media-stream surface.

use std::sync::Arc;

use axum::extract::rejection::FormRejection;
use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::{Form, Json};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use convoy_agent::{build_instructions, finish_call};
use convoy_core::ids::CallSid;
use convoy_core::phone::PhoneNumber;
use convoy_store::assistants::AssistantRepo;
use convoy_store::callers::CallerRepo;
use convoy_store::carriers::CarrierRepo;
use convoy_store::conversations::ConversationRepo;
use convoy_store::StoreError;
use convoy_telephony::twiml;

use crate::flow::{self, InboundLine};
use crate::server::AppState;
use crate::session::CallSession;

/// Carrier media frames buffered toward the bridge per connection.
const FRAME_QUEUE: usize = 256;

/// Response body with the carrier's expected content type. Webhook
/// replies are always XML, even the error ones.
pub struct Xml(pub String);

impl IntoResponse for Xml {
    fn into_response(self) -> Response {
        ([(header::CONTENT_TYPE, "application/xml")], self.0).into_response()
    }
}

fn detail(status: StatusCode, message: &str) -> Response {
    (status, Json(serde_json::json!({ "detail": message }))).into_response()
}

/// Root page, doubling as a liveness probe.
pub async fn root() -> Html<&'static str> {
    Html("<html><body><h1>Super Truck AI voice agent is running.</h1></body></html>")
}

// ── Telephony webhooks ──

type WebhookForm = Result<Form<convoy_telephony::CallPayload>, FormRejection>;

pub async fn incoming_call(State(state): State<AppState>, payload: WebhookForm) -> Xml {
    inbound_webhook(state, InboundLine::General, payload).await
}

pub async fn agent_incoming_call(State(state): State<AppState>, payload: WebhookForm) -> Xml {
    inbound_webhook(state, InboundLine::Agent, payload).await
}

/// A body the form layer cannot read gets the same treatment as a
/// readable one with missing fields: fixed error markup, never a bare
/// HTTP error the carrier would play as dead air.
async fn inbound_webhook(state: AppState, line: InboundLine, payload: WebhookForm) -> Xml {
    match payload {
        Ok(Form(payload)) => Xml(flow::handle_inbound(&state, line, &payload).await),
        Err(e) => {
            warn!(error = %e, "unreadable inbound webhook payload");
            Xml(twiml::ERROR_RESPONSE.to_owned())
        }
    }
}

pub async fn outgoing_call_handler(State(state): State<AppState>, payload: WebhookForm) -> Xml {
    match payload {
        Ok(Form(payload)) => Xml(flow::handle_outgoing_connected(&state, &payload)),
        Err(e) => {
            warn!(error = %e, "unreadable outgoing webhook payload");
            Xml(twiml::HANGUP_RESPONSE.to_owned())
        }
    }
}

// ── Outbound call initiation ──

#[derive(Debug, Deserialize)]
pub struct InitiateCallRequest {
    pub to_number: String,
}

#[derive(Debug, Serialize)]
pub struct InitiateCallResponse {
    pub status: &'static str,
    pub message: &'static str,
    pub call_sid: CallSid,
}

pub async fn initiate_call(
    State(state): State<AppState>,
    Json(req): Json<InitiateCallRequest>,
) -> Response {
    match flow::initiate_call(&state, &req.to_number).await {
        Ok(call_sid) => Json(InitiateCallResponse {
            status: "success",
            message: "Outgoing call initiated.",
            call_sid,
        })
        .into_response(),
        Err(e) => {
            error!(to_number = %req.to_number, error = %e, "failed to initiate call");
            detail(
                StatusCode::INTERNAL_SERVER_ERROR,
                &format!("Failed to initiate call: {e}"),
            )
        }
    }
}

// ── Admin provisioning ──

#[derive(Debug, Deserialize)]
pub struct CreateCarrierRequest {
    pub mc_number: String,
    pub city: String,
    pub state: String,
    pub phone: PhoneNumber,
    pub agent_name: Option<String>,
}

pub async fn create_carrier(
    State(state): State<AppState>,
    Json(req): Json<CreateCarrierRequest>,
) -> Response {
    let carriers = CarrierRepo::new(state.db.clone());
    match carriers.create(
        &req.mc_number,
        &req.city,
        &req.state,
        &req.phone,
        req.agent_name.as_deref(),
    ) {
        Ok(carrier) => {
            info!(carrier_id = %carrier.id, mc_number = %carrier.mc_number, "carrier registered");
            (StatusCode::CREATED, Json(carrier)).into_response()
        }
        Err(StoreError::Conflict(e)) => detail(StatusCode::CONFLICT, &e),
        Err(e) => {
            error!(error = %e, "carrier creation failed");
            detail(StatusCode::INTERNAL_SERVER_ERROR, "carrier creation failed")
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateAssistantRequest {
    pub mc_number: String,
    pub area_code: String,
    pub region: Option<String>,
}

/// Provision a dedicated inbound number for a carrier: buy a local
/// number through the carrier line, then record the assignment.
pub async fn create_assistant(
    State(state): State<AppState>,
    Json(req): Json<CreateAssistantRequest>,
) -> Response {
    let carriers = CarrierRepo::new(state.db.clone());
    let carrier = match carriers.find_by_mc_number(&req.mc_number) {
        Ok(Some(carrier)) => carrier,
        Ok(None) => {
            return detail(
                StatusCode::NOT_FOUND,
                &format!("no carrier with MC number {}", req.mc_number),
            )
        }
        Err(e) => {
            error!(error = %e, "carrier lookup failed");
            return detail(StatusCode::INTERNAL_SERVER_ERROR, "carrier lookup failed");
        }
    };

    let assistants = AssistantRepo::new(state.db.clone());
    match assistants.find_by_carrier(&carrier.id) {
        Ok(Some(existing)) => {
            return detail(
                StatusCode::CONFLICT,
                &format!("carrier already has assistant {}", existing.id),
            )
        }
        Ok(None) => {}
        Err(e) => {
            error!(error = %e, "assistant lookup failed");
            return detail(StatusCode::INTERNAL_SERVER_ERROR, "assistant lookup failed");
        }
    }

    let number = match state.line.provision_number(&req.area_code).await {
        Ok(Some(number)) => number,
        Ok(None) => {
            return detail(
                StatusCode::NOT_FOUND,
                &format!("no numbers available in area code {}", req.area_code),
            )
        }
        Err(e) => {
            error!(error = %e, "number provisioning failed");
            return detail(
                StatusCode::BAD_GATEWAY,
                &format!("number provisioning failed: {e}"),
            );
        }
    };
    let number = match PhoneNumber::parse(&number) {
        Ok(number) => number,
        Err(e) => {
            error!(raw = %number, error = %e, "carrier returned an unusable number");
            return detail(
                StatusCode::BAD_GATEWAY,
                "carrier returned an unusable number",
            );
        }
    };

    match assistants.create(&number, req.region.as_deref(), &carrier.id) {
        Ok(assistant) => {
            info!(
                assistant_id = %assistant.id,
                carrier_id = %carrier.id,
                number = %number,
                "assistant provisioned"
            );
            (StatusCode::CREATED, Json(assistant)).into_response()
        }
        Err(e) => {
            error!(error = %e, "assistant creation failed");
            detail(StatusCode::INTERNAL_SERVER_ERROR, "assistant creation failed")
        }
    }
}

// ── Greeting audio ──

/// Serves synthesized greeting files out of the audio cache directory.
pub async fn audio_file(State(state): State<AppState>, Path(filename): Path<String>) -> Response {
    if filename.contains('/') || filename.contains('\\') || filename.contains("..") {
        return StatusCode::NOT_FOUND.into_response();
    }
    match tokio::fs::read(state.settings.audio_dir.join(&filename)).await {
        Ok(bytes) => ([(header::CONTENT_TYPE, "audio/mpeg")], bytes).into_response(),
        Err(_) => StatusCode::NOT_FOUND.into_response(),
    }
}

// ── Media stream ──

pub async fn media_stream(
    ws: WebSocketUpgrade,
    Path((call_sid, phone_number)): Path<(String, String)>,
    State(state): State<AppState>,
) -> Response {
    let call_sid = CallSid::from_raw(call_sid);
    match PhoneNumber::parse(&phone_number) {
        Ok(phone) => {
            ws.on_upgrade(move |socket| handle_media_socket(socket, state, call_sid, phone))
        }
        Err(e) => {
            warn!(call_sid = %call_sid, raw = phone_number, error = %e, "rejecting media stream with malformed phone");
            StatusCode::BAD_REQUEST.into_response()
        }
    }
}

/// Drive one streaming connection from handshake to teardown. The
/// session is registered for the duration; every exit path (normal end,
/// carrier disconnect, bridge failure) funnels into the same idempotent
/// teardown, so racing exits cannot double-release.
async fn handle_media_socket(
    socket: WebSocket,
    state: AppState,
    call_sid: CallSid,
    phone: PhoneNumber,
) {
    info!(call_sid = %call_sid, phone = %phone, "media stream connected");

    let conversations = ConversationRepo::new(state.db.clone());
    let instructions = match build_instructions(&conversations, Some(&phone)) {
        Ok(assembled) => {
            info!(
                call_sid = %call_sid,
                returning = assembled.is_returning,
                "session instructions assembled"
            );
            assembled.text
        }
        Err(e) => {
            // A history read failure costs the digest, not the call.
            warn!(call_sid = %call_sid, error = %e, "history read failed, starting from bare persona");
            convoy_agent::instructions::PERSONA.to_owned()
        }
    };

    let (in_tx, in_rx) = mpsc::channel::<String>(FRAME_QUEUE);
    let (out_tx, mut out_rx) = mpsc::channel::<String>(FRAME_QUEUE);
    let bridge = state
        .bridges
        .create(call_sid.clone(), instructions.clone(), in_rx, out_tx);
    let session = Arc::new(CallSession::accept(call_sid, phone, instructions, bridge));
    state.registry.insert(Arc::clone(&session));

    let (mut ws_tx, mut ws_rx) = socket.split();

    // Writer: bridge frames out to the carrier.
    let writer = tokio::spawn(async move {
        while let Some(frame) = out_rx.recv().await {
            if ws_tx.send(WsMessage::Text(frame.into())).await.is_err() {
                break;
            }
        }
    });

    // Reader: carrier frames in to the bridge. Dropping `in_tx` on exit
    // is how the bridge learns the transport is gone.
    let reader = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_rx.next().await {
            match msg {
                WsMessage::Text(text) => {
                    if in_tx.send(text.to_string()).await.is_err() {
                        break;
                    }
                }
                WsMessage::Close(_) => break,
                _ => {}
            }
        }
    });

    if let Err(e) = session.run().await {
        warn!(call_sid = %session.call_sid(), error = %e, "media session ended with error");
    }

    finish_session(&state, &session).await;

    writer.abort();
    reader.abort();
}

/// First-stop teardown: collect the transcript and run the post-call
/// pipeline. A session some other path already stopped yields nothing
/// and is left alone.
async fn finish_session(state: &AppState, session: &Arc<CallSession>) {
    let Some(transcript) = session.stop().await else {
        return;
    };
    state.registry.remove(session.call_sid());
    info!(call_sid = %session.call_sid(), "media stream closed");

    finish_call(
        &CallerRepo::new(state.db.clone()),
        &ConversationRepo::new(state.db.clone()),
        state.extractor.as_ref(),
        session.phone(),
        session.call_sid(),
        &transcript,
        session.instructions(),
    )
    .await;
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::body::Body;
    use axum::http::Request;
    use axum::Router;
    use tower::ServiceExt;

    use convoy_agent::instructions::PERSONA;
    use convoy_openai::mock::{FakeGreeting, FakeLine};
    use convoy_store::Database;

    use crate::server::tests::{extractor_none, state_with, test_settings};
    use crate::server::{build_router, ServerConfig};
    use crate::session::tests::ScriptedBridges;

    fn default_state() -> AppState {
        state_with(
            Arc::new(FakeGreeting::returning("/audio/greeting_15551234567.mp3")),
            Arc::new(FakeLine::answering("CA900", Some("+14155550123"))),
            Arc::new(ScriptedBridges::with_transcript("")),
        )
    }

    fn app() -> Router {
        build_router(default_state())
    }

    fn form_post(uri: &str, body: &str) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn json_post(uri: &str, json: serde_json::Value) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap()
    }

    async fn body_string(resp: Response) -> String {
        let bytes = axum::body::to_bytes(resp.into_body(), 1024 * 1024)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn root_serves_liveness_page() {
        let resp = app()
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(body_string(resp).await.contains("running"));
    }

    #[tokio::test]
    async fn inbound_webhook_replies_with_greeting_and_stream() {
        let resp = app()
            .oneshot(form_post(
                "/telephony/incoming-call",
                "CallSid=CA123&From=%2B15551234567&CallStatus=ringing&AccountSid=AC000",
            ))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[header::CONTENT_TYPE], "application/xml");
        let body = body_string(resp).await;
        assert!(body.contains("<Play>"));
        assert!(body.contains("/media-stream/CA123/+15551234567"));
    }

    #[tokio::test]
    async fn inbound_webhook_reads_query_string_on_get() {
        let resp = app()
            .oneshot(
                Request::get("/telephony/incoming-call?CallSid=CA123&From=%2B15551234567")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_string(resp).await;
        assert!(body.contains("<Connect>"));
    }

    #[tokio::test]
    async fn inbound_webhook_missing_sid_gets_error_markup() {
        let state = default_state();
        let resp = build_router(state.clone())
            .oneshot(form_post("/telephony/incoming-call", "From=%2B15551234567"))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_string(resp).await, twiml::ERROR_RESPONSE);

        let phone = PhoneNumber::parse("+15551234567").unwrap();
        assert!(matches!(
            CallerRepo::new(state.db.clone()).get(&phone),
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn unreadable_webhook_body_still_yields_markup() {
        let resp = app()
            .oneshot(json_post(
                "/telephony/incoming-call",
                serde_json::json!({"CallSid": "CA123"}),
            ))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[header::CONTENT_TYPE], "application/xml");
        assert_eq!(body_string(resp).await, twiml::ERROR_RESPONSE);
    }

    #[tokio::test]
    async fn agent_webhook_requires_dialed_number() {
        let app = app();
        let resp = app
            .clone()
            .oneshot(form_post(
                "/telephony/agent-incoming-call",
                "CallSid=CA123&From=%2B15551234567",
            ))
            .await
            .unwrap();
        assert_eq!(body_string(resp).await, twiml::ERROR_RESPONSE);

        let resp = app
            .oneshot(form_post(
                "/telephony/agent-incoming-call",
                "CallSid=CA123&From=%2B15551234567&To=%2B15550001111",
            ))
            .await
            .unwrap();
        assert!(body_string(resp).await.contains("<Connect>"));
    }

    #[tokio::test]
    async fn outgoing_webhook_speaks_then_connects() {
        let resp = app()
            .oneshot(form_post(
                "/telephony/outgoing-call-handler",
                "CallSid=CA77&To=%2B15557654321",
            ))
            .await
            .unwrap();

        let body = body_string(resp).await;
        assert!(body.contains("<Say>Hello! This is Alex from Super Truck AI.</Say>"));
        assert!(body.contains("/media-stream/CA77/+15557654321"));
    }

    #[tokio::test]
    async fn outgoing_webhook_without_callee_hangs_up() {
        let resp = app()
            .oneshot(form_post("/telephony/outgoing-call-handler", "CallSid=CA77"))
            .await
            .unwrap();
        assert_eq!(body_string(resp).await, twiml::HANGUP_RESPONSE);
    }

    #[tokio::test]
    async fn initiate_call_returns_carrier_sid() {
        let resp = app()
            .oneshot(json_post(
                "/telephony/initiate-call",
                serde_json::json!({"to_number": "+15557654321"}),
            ))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let body: serde_json::Value =
            serde_json::from_str(&body_string(resp).await).unwrap();
        assert_eq!(body["status"], "success");
        assert_eq!(body["call_sid"], "CA900");
    }

    #[tokio::test]
    async fn initiate_call_rejects_shorthand_before_dialing() {
        let line = Arc::new(FakeLine::answering("CA900", None));
        let state = state_with(
            Arc::new(FakeGreeting::failing()),
            line.clone(),
            Arc::new(ScriptedBridges::with_transcript("")),
        );

        let resp = build_router(state)
            .oneshot(json_post(
                "/telephony/initiate-call",
                serde_json::json!({"to_number": "5557654321"}),
            ))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: serde_json::Value =
            serde_json::from_str(&body_string(resp).await).unwrap();
        assert!(body["detail"]
            .as_str()
            .unwrap()
            .starts_with("Failed to initiate call"));
        assert_eq!(line.place_calls(), 0);
    }

    #[tokio::test]
    async fn initiate_call_surfaces_carrier_failure() {
        let state = state_with(
            Arc::new(FakeGreeting::failing()),
            Arc::new(FakeLine::failing()),
            Arc::new(ScriptedBridges::with_transcript("")),
        );
        let resp = build_router(state)
            .oneshot(json_post(
                "/telephony/initiate-call",
                serde_json::json!({"to_number": "+15557654321"}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn audio_serves_cached_greeting() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("greeting_15551234567.mp3"), b"ID3mp3").unwrap();

        let mut settings = test_settings();
        settings.audio_dir = dir.path().to_path_buf();
        let state = AppState::new(
            Database::in_memory().unwrap(),
            Arc::new(settings),
            Arc::new(FakeGreeting::failing()),
            extractor_none(),
            Arc::new(FakeLine::failing()),
            Arc::new(ScriptedBridges::with_transcript("")),
        );
        let app = build_router(state);

        let resp = app
            .clone()
            .oneshot(
                Request::get("/audio/greeting_15551234567.mp3")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[header::CONTENT_TYPE], "audio/mpeg");

        let resp = app
            .clone()
            .oneshot(Request::get("/audio/missing.mp3").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        // Encoded separators decode into the path segment; they must not
        // escape the audio directory.
        let resp = app
            .oneshot(
                Request::get("/audio/..%2Fconvoy.db")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn create_carrier_returns_materialized_record() {
        let resp = app()
            .oneshot(json_post(
                "/carriers",
                serde_json::json!({
                    "mc_number": "MC123456",
                    "city": "Dallas",
                    "state": "TX",
                    "phone": "+15552223333",
                    "agent_name": "Alex",
                }),
            ))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::CREATED);
        let body: serde_json::Value =
            serde_json::from_str(&body_string(resp).await).unwrap();
        assert!(body["id"].as_str().unwrap().starts_with("car_"));
        assert_eq!(body["country"], "USA");
    }

    #[tokio::test]
    async fn create_carrier_duplicate_mc_conflicts() {
        let app = app();
        let req = serde_json::json!({
            "mc_number": "MC123456",
            "city": "Dallas",
            "state": "TX",
            "phone": "+15552223333",
        });
        let first = app
            .clone()
            .oneshot(json_post("/carriers", req.clone()))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::CREATED);

        let second = app
            .oneshot(json_post(
                "/carriers",
                serde_json::json!({
                    "mc_number": "MC123456",
                    "city": "Austin",
                    "state": "TX",
                    "phone": "+15554445555",
                }),
            ))
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::CONFLICT);
    }

    async fn register_carrier(app: &Router) {
        let resp = app
            .clone()
            .oneshot(json_post(
                "/carriers",
                serde_json::json!({
                    "mc_number": "MC123456",
                    "city": "Dallas",
                    "state": "TX",
                    "phone": "+15552223333",
                }),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
    }

    #[tokio::test]
    async fn create_assistant_provisions_a_number() {
        let app = app();
        register_carrier(&app).await;

        let resp = app
            .clone()
            .oneshot(json_post(
                "/assistants",
                serde_json::json!({"mc_number": "MC123456", "area_code": "415", "region": "west"}),
            ))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::CREATED);
        let body: serde_json::Value =
            serde_json::from_str(&body_string(resp).await).unwrap();
        assert!(body["id"].as_str().unwrap().starts_with("asst_"));
        assert_eq!(body["twilio_number"], "+14155550123");
        assert_eq!(body["region"], "west");

        // One assistant per carrier.
        let resp = app
            .oneshot(json_post(
                "/assistants",
                serde_json::json!({"mc_number": "MC123456", "area_code": "415"}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn create_assistant_unknown_carrier_is_404() {
        let resp = app()
            .oneshot(json_post(
                "/assistants",
                serde_json::json!({"mc_number": "MC999999", "area_code": "415"}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn create_assistant_empty_search_is_404() {
        let state = state_with(
            Arc::new(FakeGreeting::failing()),
            Arc::new(FakeLine::answering("CA900", None)),
            Arc::new(ScriptedBridges::with_transcript("")),
        );
        let app = build_router(state);
        register_carrier(&app).await;

        let resp = app
            .oneshot(json_post(
                "/assistants",
                serde_json::json!({"mc_number": "MC123456", "area_code": "999"}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body: serde_json::Value =
            serde_json::from_str(&body_string(resp).await).unwrap();
        assert!(body["detail"].as_str().unwrap().contains("999"));
    }

    #[tokio::test]
    async fn create_assistant_provisioning_failure_is_502() {
        let state = state_with(
            Arc::new(FakeGreeting::failing()),
            Arc::new(FakeLine::failing()),
            Arc::new(ScriptedBridges::with_transcript("")),
        );
        let app = build_router(state);
        register_carrier(&app).await;

        let resp = app
            .oneshot(json_post(
                "/assistants",
                serde_json::json!({"mc_number": "MC123456", "area_code": "415"}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn media_stream_session_persists_transcript() {
        let state = state_with(
            Arc::new(FakeGreeting::failing()),
            Arc::new(FakeLine::answering("CA900", None)),
            Arc::new(ScriptedBridges::with_transcript(
                "Caller: need invoicing help\nAlex: happy to walk you through it",
            )),
        );
        let db = state.db.clone();
        let registry = Arc::clone(&state.registry);
        let handle = crate::server::start(
            ServerConfig {
                port: 0,
                ..Default::default()
            },
            state,
        )
        .await
        .unwrap();

        let url = format!(
            "ws://127.0.0.1:{}/media-stream/CA123/+15551234567",
            handle.port
        );
        let (mut socket, resp) = tokio_tungstenite::connect_async(&url).await.unwrap();
        assert_eq!(resp.status().as_u16(), 101);

        // The scripted bridge finishes immediately, so the server tears
        // down and closes its side; drain until that close arrives.
        while let Some(Ok(_)) = socket.next().await {}

        let phone = PhoneNumber::parse("+15551234567").unwrap();
        let rows = ConversationRepo::new(db).recent(&phone, 5).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(
            rows[0].transcript,
            "Caller: need invoicing help\nAlex: happy to walk you through it"
        );
        assert!(rows[0]
            .system_instructions
            .as_deref()
            .unwrap()
            .starts_with(PERSONA));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn media_stream_empty_transcript_writes_nothing() {
        let state = state_with(
            Arc::new(FakeGreeting::failing()),
            Arc::new(FakeLine::answering("CA900", None)),
            Arc::new(ScriptedBridges::with_transcript("")),
        );
        let db = state.db.clone();
        let handle = crate::server::start(
            ServerConfig {
                port: 0,
                ..Default::default()
            },
            state,
        )
        .await
        .unwrap();

        let url = format!(
            "ws://127.0.0.1:{}/media-stream/CA123/+15551234567",
            handle.port
        );
        let (mut socket, _) = tokio_tungstenite::connect_async(&url).await.unwrap();
        while let Some(Ok(_)) = socket.next().await {}

        let phone = PhoneNumber::parse("+15551234567").unwrap();
        assert!(ConversationRepo::new(db).recent(&phone, 5).unwrap().is_empty());
    }

    #[tokio::test]
    async fn media_stream_rejects_malformed_phone() {
        let handle = crate::server::start(
            ServerConfig {
                port: 0,
                ..Default::default()
            },
            default_state(),
        )
        .await
        .unwrap();

        let url = format!(
            "ws://127.0.0.1:{}/media-stream/CA123/5551234567",
            handle.port
        );
        match tokio_tungstenite::connect_async(&url).await {
            Err(tokio_tungstenite::tungstenite::Error::Http(resp)) => {
                assert_eq!(resp.status().as_u16(), 400);
            }
            other => panic!("expected HTTP 400 rejection, got {other:?}"),
        }
    }
}
