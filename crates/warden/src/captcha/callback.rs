//! Structured captcha button payload.
//!
//! Encoded as `captcha:a=<answer>;c=<chat_id>;u=<user_id>` and validated on
//! the way back in. Telegram caps callback data at 64 bytes.

use warden_common::WardenError;
use warden_common::constants::MAX_CALLBACK_DATA_LEN;

const PREFIX: &str = "captcha:";

/// What a captcha button says when pressed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptchaCallback {
    pub answer: u32,
    pub chat_id: i64,
    pub user_id: u64,
}

impl CaptchaCallback {
    /// Whether callback data belongs to the captcha at all
    pub fn matches(data: &str) -> bool {
        data.starts_with(PREFIX)
    }

    pub fn encode(&self) -> String {
        let data = format!(
            "{PREFIX}a={};c={};u={}",
            self.answer, self.chat_id, self.user_id
        );
        debug_assert!(data.len() <= MAX_CALLBACK_DATA_LEN);
        data
    }

    pub fn parse(data: &str) -> Result<Self, WardenError> {
        if data.len() > MAX_CALLBACK_DATA_LEN {
            return Err(malformed(data));
        }
        let body = data.strip_prefix(PREFIX).ok_or_else(|| malformed(data))?;

        let fields: Vec<&str> = body.split(';').collect();
        let [a, c, u] = fields.as_slice() else {
            return Err(malformed(data));
        };

        Ok(Self {
            answer: field(a, "a").ok_or_else(|| malformed(data))?,
            chat_id: field(c, "c").ok_or_else(|| malformed(data))?,
            user_id: field(u, "u").ok_or_else(|| malformed(data))?,
        })
    }
}

fn field<T: std::str::FromStr>(raw: &str, tag: &str) -> Option<T> {
    let (key, value) = raw.split_once('=')?;
    if key != tag {
        return None;
    }
    value.parse().ok()
}

fn malformed(data: &str) -> WardenError {
    WardenError::Captcha(format!("malformed callback data {data:?}"))
}
