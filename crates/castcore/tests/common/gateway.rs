//! Scripted messaging gateway that records every call

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use castcore::gateway::{BotInfo, GatewayError, MessagingGateway, ReplyKeyboard};

/// One outbound call as the gateway saw it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayCall {
    Text {
        to: String,
        text: String,
        keyboard: ReplyKeyboard,
    },
    Photo {
        to: String,
        url: String,
        caption: String,
        keyboard: ReplyKeyboard,
    },
}

impl GatewayCall {
    pub fn recipient(&self) -> &str {
        match self {
            GatewayCall::Text { to, .. } | GatewayCall::Photo { to, .. } => to,
        }
    }
}

/// Succeeds unless told otherwise.
#[derive(Default)]
pub struct ScriptedGateway {
    calls: Mutex<Vec<GatewayCall>>,
    failures: Mutex<HashMap<String, String>>,
    photos_fail: AtomicBool,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every send to `handle` fails with `error` as its text.
    pub fn fail_for(&self, handle: &str, error: &str) {
        self.failures
            .lock()
            .unwrap()
            .insert(handle.to_string(), error.to_string());
    }

    /// Every `send_photo` fails.
    pub fn fail_photos(&self) {
        self.photos_fail.store(true, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<GatewayCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, handle: &str) -> Vec<GatewayCall> {
        self.calls().into_iter().filter(|c| c.recipient() == handle).collect()
    }

    fn outcome(&self, to: &str) -> Result<(), GatewayError> {
        match self.failures.lock().unwrap().get(to) {
            Some(error) => Err(GatewayError::Request(error.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl MessagingGateway for ScriptedGateway {
    async fn send_text(&self, recipient: &str, text: &str, keyboard: &ReplyKeyboard) -> Result<(), GatewayError> {
        self.calls.lock().unwrap().push(GatewayCall::Text {
            to: recipient.to_string(),
            text: text.to_string(),
            keyboard: keyboard.clone(),
        });
        self.outcome(recipient)
    }

    async fn send_photo(
        &self,
        recipient: &str,
        photo_url: &str,
        caption: &str,
        keyboard: &ReplyKeyboard,
    ) -> Result<(), GatewayError> {
        self.calls.lock().unwrap().push(GatewayCall::Photo {
            to: recipient.to_string(),
            url: photo_url.to_string(),
            caption: caption.to_string(),
            keyboard: keyboard.clone(),
        });
        if self.photos_fail.load(Ordering::SeqCst) {
            return Err(GatewayError::Request("wrong file identifier/HTTP URL specified".into()));
        }
        self.outcome(recipient)
    }

    async fn bot_info(&self) -> Result<BotInfo, GatewayError> {
        Ok(BotInfo {
            id: 42,
            username: Some("cast_test_bot".into()),
            first_name: "Cast Test".into(),
        })
    }
}
