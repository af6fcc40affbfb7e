use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tokio::sync::{mpsc, Notify};
use tokio_tungstenite::tungstenite::handshake::client::generate_key;
use tokio_tungstenite::tungstenite::http;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use convoy_core::collab::MediaBridge;
use convoy_core::config::Settings;
use convoy_core::errors::GatewayError;
use convoy_core::ids::CallSid;

const REALTIME_HOST: &str = "api.openai.com";
const TRANSCRIPTION_MODEL: &str = "whisper-1";

/// Frames read off the carrier's media-stream socket. Audio payloads are
/// base64 mu-law on both legs, so they pass through without decoding.
#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum CarrierFrame {
    Connected,
    Start { start: StreamStart },
    Media { media: MediaPayload },
    Mark,
    Stop,
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct StreamStart {
    #[serde(rename = "streamSid")]
    stream_sid: String,
}

#[derive(Debug, Deserialize)]
struct MediaPayload {
    payload: String,
}

/// Events we act on from the realtime endpoint. Everything else parses
/// into `Other` and is dropped.
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum UpstreamEvent {
    #[serde(rename = "session.created")]
    SessionCreated,
    #[serde(rename = "input_audio_buffer.speech_started")]
    SpeechStarted,
    #[serde(rename = "conversation.item.input_audio_transcription.completed")]
    CallerTranscript { transcript: String },
    #[serde(rename = "response.audio_transcript.done")]
    AgentTranscript { transcript: String },
    #[serde(rename = "response.audio.delta")]
    AudioDelta { delta: String },
    #[serde(rename = "error")]
    Error { error: serde_json::Value },
    #[serde(other)]
    Other,
}

/// One realtime audio session: relays carrier media frames up to the
/// model and model audio back down, collecting both sides' transcripts
/// as it goes.
///
/// The server layer owns the carrier socket and pumps its text frames
/// through the channel pair handed over at construction, which keeps
/// this type free of any HTTP framework types.
pub struct RealtimeVoiceBridge {
    api_key: SecretString,
    model: String,
    voice: String,
    instructions: String,
    call_sid: CallSid,
    carrier_in: tokio::sync::Mutex<Option<mpsc::Receiver<String>>>,
    carrier_out: mpsc::Sender<String>,
    transcript: parking_lot::Mutex<Vec<String>>,
    stopped: AtomicBool,
    stop_notify: Notify,
}

impl RealtimeVoiceBridge {
    pub fn new(
        settings: &Settings,
        call_sid: CallSid,
        instructions: String,
        carrier_in: mpsc::Receiver<String>,
        carrier_out: mpsc::Sender<String>,
    ) -> Self {
        Self {
            api_key: settings.openai_api_key.clone(),
            model: settings.realtime_model.clone(),
            voice: settings.voice.clone(),
            instructions,
            call_sid,
            carrier_in: tokio::sync::Mutex::new(Some(carrier_in)),
            carrier_out,
            transcript: parking_lot::Mutex::new(Vec::new()),
            stopped: AtomicBool::new(false),
            stop_notify: Notify::new(),
        }
    }

    fn session_update(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "session.update",
            "session": {
                "modalities": ["text", "audio"],
                "instructions": self.instructions,
                "voice": self.voice,
                "input_audio_format": "g711_ulaw",
                "output_audio_format": "g711_ulaw",
                "input_audio_transcription": {"model": TRANSCRIPTION_MODEL},
                "turn_detection": {"type": "server_vad"},
            }
        })
    }

    fn push_line(&self, speaker: &str, transcript: &str) {
        let line = transcript.trim();
        if !line.is_empty() {
            self.transcript.lock().push(format!("{speaker}: {line}"));
        }
    }
}

fn media_frame(stream_sid: &str, payload: &str) -> String {
    serde_json::json!({
        "event": "media",
        "streamSid": stream_sid,
        "media": {"payload": payload},
    })
    .to_string()
}

fn clear_frame(stream_sid: &str) -> String {
    serde_json::json!({"event": "clear", "streamSid": stream_sid}).to_string()
}

#[async_trait]
impl MediaBridge for RealtimeVoiceBridge {
    async fn start(&self) -> Result<(), GatewayError> {
        let mut carrier_in = self
            .carrier_in
            .lock()
            .await
            .take()
            .ok_or_else(|| GatewayError::InvalidRequest("bridge already started".into()))?;

        let url = format!("wss://{REALTIME_HOST}/v1/realtime?model={}", self.model);
        let request = http::Request::builder()
            .uri(&url)
            .header(
                "Authorization",
                format!("Bearer {}", self.api_key.expose_secret()),
            )
            .header("OpenAI-Beta", "realtime=v1")
            .header("Sec-WebSocket-Key", generate_key())
            .header("Sec-WebSocket-Version", "13")
            .header("Connection", "Upgrade")
            .header("Upgrade", "websocket")
            .header("Host", REALTIME_HOST)
            .body(())
            .map_err(|e| GatewayError::InvalidRequest(e.to_string()))?;

        let (upstream, _response) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| GatewayError::NetworkError(e.to_string()))?;
        info!(call_sid = %self.call_sid, model = %self.model, "realtime session connected");

        let (mut up_sink, mut up_stream) = upstream.split();

        up_sink
            .send(Message::Text(self.session_update().to_string().into()))
            .await
            .map_err(|e| GatewayError::StreamInterrupted(e.to_string()))?;

        let mut stream_sid: Option<String> = None;
        let result = loop {
            tokio::select! {
                _ = self.stop_notify.notified() => {
                    debug!(call_sid = %self.call_sid, "bridge stop requested");
                    break Ok(());
                }

                frame = carrier_in.recv() => {
                    let Some(text) = frame else {
                        debug!(call_sid = %self.call_sid, "carrier socket closed");
                        break Ok(());
                    };
                    match serde_json::from_str::<CarrierFrame>(&text) {
                        Ok(CarrierFrame::Start { start }) => {
                            debug!(
                                call_sid = %self.call_sid,
                                stream_sid = %start.stream_sid,
                                "media stream started"
                            );
                            stream_sid = Some(start.stream_sid);
                        }
                        Ok(CarrierFrame::Media { media }) => {
                            let append = serde_json::json!({
                                "type": "input_audio_buffer.append",
                                "audio": media.payload,
                            });
                            if let Err(e) =
                                up_sink.send(Message::Text(append.to_string().into())).await
                            {
                                break Err(GatewayError::StreamInterrupted(e.to_string()));
                            }
                        }
                        Ok(CarrierFrame::Stop) => {
                            debug!(call_sid = %self.call_sid, "carrier ended the stream");
                            break Ok(());
                        }
                        Ok(_) => {}
                        Err(e) => {
                            warn!(call_sid = %self.call_sid, error = %e, "unreadable carrier frame");
                        }
                    }
                }

                event = up_stream.next() => {
                    match event {
                        Some(Ok(Message::Text(text))) => {
                            match serde_json::from_str::<UpstreamEvent>(&text) {
                                Ok(UpstreamEvent::AudioDelta { delta }) => {
                                    if let Some(sid) = &stream_sid {
                                        if self.carrier_out.send(media_frame(sid, &delta)).await.is_err() {
                                            debug!(call_sid = %self.call_sid, "carrier writer gone");
                                            break Ok(());
                                        }
                                    }
                                }
                                Ok(UpstreamEvent::SpeechStarted) => {
                                    // Barge-in: flush queued playback on both legs.
                                    if let Some(sid) = &stream_sid {
                                        let _ = self.carrier_out.send(clear_frame(sid)).await;
                                    }
                                    let cancel = serde_json::json!({"type": "response.cancel"});
                                    if let Err(e) =
                                        up_sink.send(Message::Text(cancel.to_string().into())).await
                                    {
                                        break Err(GatewayError::StreamInterrupted(e.to_string()));
                                    }
                                }
                                Ok(UpstreamEvent::CallerTranscript { transcript }) => {
                                    self.push_line("Caller", &transcript);
                                }
                                Ok(UpstreamEvent::AgentTranscript { transcript }) => {
                                    self.push_line("Alex", &transcript);
                                }
                                Ok(UpstreamEvent::SessionCreated) => {
                                    debug!(call_sid = %self.call_sid, "realtime session created");
                                }
                                Ok(UpstreamEvent::Error { error }) => {
                                    warn!(
                                        call_sid = %self.call_sid,
                                        error = %error,
                                        "realtime endpoint reported an error"
                                    );
                                }
                                Ok(UpstreamEvent::Other) => {}
                                Err(e) => {
                                    debug!(call_sid = %self.call_sid, error = %e, "unhandled realtime event");
                                }
                            }
                        }
                        Some(Ok(Message::Ping(data))) => {
                            if let Err(e) = up_sink.send(Message::Pong(data)).await {
                                break Err(GatewayError::StreamInterrupted(e.to_string()));
                            }
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            info!(call_sid = %self.call_sid, "realtime session closed by upstream");
                            break Ok(());
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            break Err(GatewayError::StreamInterrupted(e.to_string()));
                        }
                    }
                }
            }
        };

        let _ = up_sink.send(Message::Close(None)).await;
        result
    }

    async fn stop(&self) -> Option<String> {
        if self
            .stopped
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return None;
        }
        self.stop_notify.notify_one();
        let lines = self.transcript.lock();
        Some(lines.join("\n"))
    }
}
