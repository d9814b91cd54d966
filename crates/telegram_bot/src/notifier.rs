use async_trait::async_trait;
use server::{Notifier, NotifyError};
use teloxide::{prelude::*, types::ChatId};

/// Delivers rendered reports as chat messages. The user id is the private
/// chat id the request came from.
#[derive(Clone)]
pub struct TelegramNotifier {
    bot: Bot,
}

impl TelegramNotifier {
    pub fn new(token: &str) -> Self {
        Self {
            bot: Bot::new(token),
        }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify(&self, user_id: i64, text: String) -> Result<(), NotifyError> {
        self.bot
            .send_message(ChatId(user_id), text)
            .await
            .map(|_| ())
            .map_err(|err| NotifyError(err.to_string()))
    }
}
