//! Recording transport and fixtures shared by unit tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use warden_common::{BotPermissions, MemberStatus, WardenError};

use crate::config::AppConfig;
use crate::state::AppState;
use crate::store::{MemoryStore, Store};
use crate::transport::{
    ChatTarget, ChatTransport, InlineKeyboard, Payload, Permissions, SentMessage, TransportResult,
};

/// One outbound call observed by the mock
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    SendText {
        chat_id: i64,
        message_id: i32,
        text: String,
        keyboard: Option<InlineKeyboard>,
    },
    SendPayload {
        target: ChatTarget,
        payload: Payload,
    },
    Delete {
        chat_id: i64,
        message_id: i32,
    },
    Pin {
        chat_id: i64,
        message_id: i32,
    },
    Unpin {
        chat_id: i64,
        message_id: i32,
    },
    Restrict {
        chat_id: i64,
        user_id: u64,
        permissions: Permissions,
    },
    Ban {
        chat_id: i64,
        user_id: u64,
        until: DateTime<Utc>,
    },
    Unban {
        chat_id: i64,
        user_id: u64,
    },
    AnswerCallback {
        callback_id: String,
        text: String,
        alert: bool,
    },
}

/// In-memory chat platform that records every call
pub struct MockTransport {
    calls: Mutex<Vec<Call>>,
    next_message_id: AtomicI32,
    members: Mutex<HashMap<(i64, u64), MemberStatus>>,
    permissions: Mutex<BotPermissions>,
    /// Chats whose sends fail
    failing_chats: Mutex<HashSet<i64>>,
    documents: Mutex<HashMap<String, Vec<u8>>>,
    /// Whether restoring permissions actually turns a user back into a member
    lift_works: AtomicBool,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            next_message_id: AtomicI32::new(1000),
            members: Mutex::new(HashMap::new()),
            permissions: Mutex::new(BotPermissions {
                can_delete_messages: true,
                can_restrict_members: true,
                can_pin_messages: true,
                can_manage_chat: true,
            }),
            failing_chats: Mutex::new(HashSet::new()),
            documents: Mutex::new(HashMap::new()),
            lift_works: AtomicBool::new(true),
        }
    }
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_member(&self, chat_id: i64, user_id: u64, status: MemberStatus) {
        self.members
            .lock()
            .unwrap()
            .insert((chat_id, user_id), status);
    }

    pub fn member(&self, chat_id: i64, user_id: u64) -> MemberStatus {
        self.members
            .lock()
            .unwrap()
            .get(&(chat_id, user_id))
            .copied()
            .unwrap_or(MemberStatus::Member)
    }

    pub fn set_permissions(&self, permissions: BotPermissions) {
        *self.permissions.lock().unwrap() = permissions;
    }

    pub fn fail_chat(&self, chat_id: i64) {
        self.failing_chats.lock().unwrap().insert(chat_id);
    }

    pub fn set_lift_works(&self, works: bool) {
        self.lift_works.store(works, Ordering::SeqCst);
    }

    pub fn add_document(&self, file_id: &str, bytes: &[u8]) {
        self.documents
            .lock()
            .unwrap()
            .insert(file_id.to_string(), bytes.to_vec());
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    /// Texts sent to a chat, in order
    pub fn texts(&self, chat_id: i64) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::SendText { chat_id: id, text, .. } if id == chat_id => Some(text),
                _ => None,
            })
            .collect()
    }

    /// Messages sent with an inline keyboard: (message id, text, keyboard)
    pub fn keyboards(&self, chat_id: i64) -> Vec<(i32, String, InlineKeyboard)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::SendText {
                    chat_id: id,
                    message_id,
                    text,
                    keyboard: Some(kb),
                } if id == chat_id => Some((message_id, text, kb)),
                _ => None,
            })
            .collect()
    }

    pub fn deleted(&self, chat_id: i64) -> Vec<i32> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Delete { chat_id: id, message_id } if id == chat_id => Some(message_id),
                _ => None,
            })
            .collect()
    }

    pub fn bans(&self) -> Vec<(i64, u64)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Ban { chat_id, user_id, .. } => Some((chat_id, user_id)),
                _ => None,
            })
            .collect()
    }

    pub fn answers(&self) -> Vec<(String, bool)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::AnswerCallback { text, alert, .. } => Some((text, alert)),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn next_id(&self) -> i32 {
        self.next_message_id.fetch_add(1, Ordering::SeqCst)
    }

    fn check_chat(&self, chat_id: i64) -> TransportResult<()> {
        if self.failing_chats.lock().unwrap().contains(&chat_id) {
            return Err(WardenError::Transport(format!("chat {chat_id} unreachable")));
        }
        Ok(())
    }
}

#[async_trait]
impl ChatTransport for MockTransport {
    async fn send_text(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: Option<InlineKeyboard>,
    ) -> TransportResult<i32> {
        self.check_chat(chat_id)?;
        let message_id = self.next_id();
        self.record(Call::SendText {
            chat_id,
            message_id,
            text: text.to_string(),
            keyboard,
        });
        Ok(message_id)
    }

    async fn send_payload(
        &self,
        target: &ChatTarget,
        payload: &Payload,
    ) -> TransportResult<SentMessage> {
        let chat_id = match target {
            ChatTarget::Id(id) => *id,
            ChatTarget::Username(_) => 0,
        };
        self.check_chat(chat_id)?;
        self.record(Call::SendPayload {
            target: target.clone(),
            payload: payload.clone(),
        });
        Ok(SentMessage {
            chat_id,
            message_id: self.next_id(),
        })
    }

    async fn delete_message(&self, chat_id: i64, message_id: i32) -> TransportResult<()> {
        self.record(Call::Delete { chat_id, message_id });
        Ok(())
    }

    async fn pin_message(&self, chat_id: i64, message_id: i32) -> TransportResult<()> {
        self.record(Call::Pin { chat_id, message_id });
        Ok(())
    }

    async fn unpin_message(&self, chat_id: i64, message_id: i32) -> TransportResult<()> {
        self.check_chat(chat_id)?;
        self.record(Call::Unpin { chat_id, message_id });
        Ok(())
    }

    async fn restrict_member(
        &self,
        chat_id: i64,
        user_id: u64,
        permissions: Permissions,
    ) -> TransportResult<()> {
        self.record(Call::Restrict {
            chat_id,
            user_id,
            permissions,
        });
        let current = self.member(chat_id, user_id);
        match permissions {
            Permissions::Muted if current == MemberStatus::Member => {
                self.set_member(chat_id, user_id, MemberStatus::Restricted)
            }
            Permissions::Full
                if current == MemberStatus::Restricted
                    && self.lift_works.load(Ordering::SeqCst) =>
            {
                self.set_member(chat_id, user_id, MemberStatus::Member)
            }
            _ => {}
        }
        Ok(())
    }

    async fn ban_member(
        &self,
        chat_id: i64,
        user_id: u64,
        until: DateTime<Utc>,
    ) -> TransportResult<()> {
        self.record(Call::Ban {
            chat_id,
            user_id,
            until,
        });
        self.set_member(chat_id, user_id, MemberStatus::Banned);
        Ok(())
    }

    async fn unban_member(&self, chat_id: i64, user_id: u64) -> TransportResult<()> {
        self.record(Call::Unban { chat_id, user_id });
        if self.member(chat_id, user_id) == MemberStatus::Banned {
            self.set_member(chat_id, user_id, MemberStatus::Left);
        }
        Ok(())
    }

    async fn member_status(&self, chat_id: i64, user_id: u64) -> TransportResult<MemberStatus> {
        Ok(self.member(chat_id, user_id))
    }

    async fn bot_permissions(&self, _chat_id: i64) -> TransportResult<BotPermissions> {
        Ok(*self.permissions.lock().unwrap())
    }

    async fn answer_callback(
        &self,
        callback_id: &str,
        text: &str,
        alert: bool,
    ) -> TransportResult<()> {
        self.record(Call::AnswerCallback {
            callback_id: callback_id.to_string(),
            text: text.to_string(),
            alert,
        });
        Ok(())
    }

    async fn download_document(&self, file_id: &str) -> TransportResult<Vec<u8>> {
        self.documents
            .lock()
            .unwrap()
            .get(file_id)
            .cloned()
            .ok_or_else(|| WardenError::NotFound(format!("file {file_id}")))
    }
}

/// Admin user id used by fixtures
pub const ADMIN_ID: u64 = 1;

/// Application state over a memory store and a recording transport
pub fn test_state() -> (AppState, Arc<MockTransport>) {
    let transport = MockTransport::new();
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    let config = AppConfig {
        admin_ids: vec![ADMIN_ID],
        ..AppConfig::default()
    };
    let state = AppState::new(config, store, transport.clone());
    (state, transport)
}
