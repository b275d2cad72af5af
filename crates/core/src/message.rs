/// A chat message as seen by the bot, discarded once it has been handled.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InboundMessage {
    pub sender_id: String,
    pub channel_id: String,
    pub text: String,
    /// Set when the message was posted by a bot integration rather than a person.
    pub bot_id: Option<String>,
    pub ts: String,
}

impl InboundMessage {
    pub fn is_from_bot(&self) -> bool {
        self.bot_id.as_deref().is_some_and(|bot_id| !bot_id.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::InboundMessage;

    fn message(bot_id: Option<&str>) -> InboundMessage {
        InboundMessage {
            sender_id: "U1".to_owned(),
            channel_id: "D1".to_owned(),
            text: "hello".to_owned(),
            bot_id: bot_id.map(str::to_owned),
            ts: "1730000000.0001".to_owned(),
        }
    }

    #[test]
    fn empty_bot_id_counts_as_human() {
        assert!(!message(None).is_from_bot());
        assert!(!message(Some("")).is_from_bot());
        assert!(message(Some("B123")).is_from_bot());
    }
}
