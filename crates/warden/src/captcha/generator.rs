//! Math challenge generation.

use rand::Rng;
use rand::seq::SliceRandom;

use super::CaptchaCallback;
use crate::transport::{CallbackButton, InlineKeyboard};

/// Operand range, inclusive
const OPERAND_MIN: u32 = 1;
const OPERAND_MAX: u32 = 10;

/// A two-operand addition question with four answer options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    pub a: u32,
    pub b: u32,
    /// Correct sum plus three decoys, shuffled
    pub options: Vec<u32>,
}

impl Challenge {
    /// Generate a new challenge
    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let a = rng.random_range(OPERAND_MIN..=OPERAND_MAX);
        let b = rng.random_range(OPERAND_MIN..=OPERAND_MAX);
        Self::with_operands(a, b, rng)
    }

    /// Build a challenge for fixed operands; only the option order is random
    pub fn with_operands<R: Rng + ?Sized>(a: u32, b: u32, rng: &mut R) -> Self {
        let correct = a + b;
        // Operands are at least 1, so correct - 1 never underflows
        let mut options = vec![correct, correct + 1, correct - 1, correct + 2];
        options.shuffle(rng);
        Self { a, b, options }
    }

    pub fn answer(&self) -> u32 {
        self.a + self.b
    }

    pub fn question(&self) -> String {
        format!("What is {} + {}?", self.a, self.b)
    }

    /// Message body. The question must stay on line 1: answers are checked against it.
    pub fn render(&self, mention: &str, attempts_left: u32, timeout_secs: u32) -> String {
        format!(
            "{mention}, solve the captcha to write in this chat:\n\
             {}\n\
             Attempts left: {attempts_left}\n\
             The captcha expires in {timeout_secs} seconds.",
            self.question()
        )
    }

    /// Two rows of two buttons, each carrying its own answer
    pub fn keyboard(&self, chat_id: i64, user_id: u64) -> InlineKeyboard {
        let buttons: Vec<CallbackButton> = self
            .options
            .iter()
            .map(|&answer| CallbackButton {
                text: answer.to_string(),
                data: CaptchaCallback {
                    answer,
                    chat_id,
                    user_id,
                }
                .encode(),
            })
            .collect();

        InlineKeyboard {
            rows: buttons.chunks(2).map(<[CallbackButton]>::to_vec).collect(),
        }
    }
}
