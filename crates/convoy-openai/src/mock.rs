use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;

use convoy_core::collab::{CarrierLine, ContactExtractor, GreetingSynthesizer, MediaBridge};
use convoy_core::errors::GatewayError;
use convoy_core::ids::CallSid;
use convoy_core::phone::PhoneNumber;

/// Greeting synthesizer that returns a fixed URL, or fails every call.
pub struct FakeGreeting {
    url: Option<String>,
    calls: AtomicUsize,
}

impl FakeGreeting {
    /// Always succeeds with the given relative audio URL.
    pub fn returning(url: &str) -> Self {
        Self {
            url: Some(url.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Always fails, for exercising the degraded greeting path.
    pub fn failing() -> Self {
        Self {
            url: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl GreetingSynthesizer for FakeGreeting {
    async fn synthesize(
        &self,
        _name: Option<&str>,
        _phone_digits: &str,
    ) -> Result<String, GatewayError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        match &self.url {
            Some(url) => Ok(url.clone()),
            None => Err(GatewayError::ServerError {
                status: 500,
                body: "synthesis unavailable".into(),
            }),
        }
    }
}

/// Extractor that returns a pre-programmed name/email pair.
pub struct FakeExtractor {
    name: Option<String>,
    email: Option<String>,
    calls: AtomicUsize,
}

impl FakeExtractor {
    pub fn returning(name: Option<&str>, email: Option<&str>) -> Self {
        Self {
            name: name.map(str::to_string),
            email: email.map(str::to_string),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ContactExtractor for FakeExtractor {
    async fn extract(&self, _text: &str) -> (Option<String>, Option<String>) {
        self.calls.fetch_add(1, Ordering::Relaxed);
        (self.name.clone(), self.email.clone())
    }
}

/// Carrier line that answers with a fixed SID and provisioned number.
pub struct FakeLine {
    sid: Option<String>,
    number: Option<String>,
    place_calls: AtomicUsize,
    provision_calls: AtomicUsize,
}

impl FakeLine {
    /// Place succeeds with `sid`; provisioning finds `number`.
    pub fn answering(sid: &str, number: Option<&str>) -> Self {
        Self {
            sid: Some(sid.to_string()),
            number: number.map(str::to_string),
            place_calls: AtomicUsize::new(0),
            provision_calls: AtomicUsize::new(0),
        }
    }

    /// Every operation fails, for exercising carrier-down handling.
    pub fn failing() -> Self {
        Self {
            sid: None,
            number: None,
            place_calls: AtomicUsize::new(0),
            provision_calls: AtomicUsize::new(0),
        }
    }

    pub fn place_calls(&self) -> usize {
        self.place_calls.load(Ordering::Relaxed)
    }

    pub fn provision_calls(&self) -> usize {
        self.provision_calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl CarrierLine for FakeLine {
    async fn place_call(&self, _to: &PhoneNumber) -> Result<CallSid, GatewayError> {
        self.place_calls.fetch_add(1, Ordering::Relaxed);
        match &self.sid {
            Some(sid) => Ok(CallSid::from_raw(sid)),
            None => Err(GatewayError::ServerError {
                status: 500,
                body: "carrier unavailable".into(),
            }),
        }
    }

    async fn provision_number(&self, _area_code: &str) -> Result<Option<String>, GatewayError> {
        self.provision_calls.fetch_add(1, Ordering::Relaxed);
        if self.sid.is_none() {
            return Err(GatewayError::ServerError {
                status: 500,
                body: "carrier unavailable".into(),
            });
        }
        Ok(self.number.clone())
    }
}

/// Media bridge whose start resolves immediately. Stop follows the real
/// contract: the first effective call yields the transcript, later calls
/// return `None`.
pub struct FakeBridge {
    transcript: String,
    fail_start: bool,
    starts: AtomicUsize,
    stopped: AtomicBool,
}

impl FakeBridge {
    pub fn with_transcript(transcript: &str) -> Self {
        Self {
            transcript: transcript.to_string(),
            fail_start: false,
            starts: AtomicUsize::new(0),
            stopped: AtomicBool::new(false),
        }
    }

    /// start() returns an upstream failure instead of running.
    pub fn failing() -> Self {
        Self {
            transcript: String::new(),
            fail_start: true,
            starts: AtomicUsize::new(0),
            stopped: AtomicBool::new(false),
        }
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl MediaBridge for FakeBridge {
    async fn start(&self) -> Result<(), GatewayError> {
        self.starts.fetch_add(1, Ordering::Relaxed);
        if self.fail_start {
            return Err(GatewayError::StreamInterrupted(
                "upstream refused connection".into(),
            ));
        }
        Ok(())
    }

    async fn stop(&self) -> Option<String> {
        if self
            .stopped
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            Some(self.transcript.clone())
        } else {
            None
        }
    }
}
