use crate::entity::SelectionResult;

pub const GREETING_TEXT: &str = "Hello user! How can I help you?";
pub const FAREWELL_TEXT: &str = "Bye user! See you later?";
pub const THANKS_TEXT: &str = "Thank you";
pub const FALLBACK_TEXT: &str = "¯\\_(o_o)_//¯";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Category {
    Greetings,
    Bye,
    Thanks,
    KnowledgeQuery,
    Unknown,
}

impl Category {
    pub fn from_name(name: &str) -> Self {
        match name {
            "greetings" => Self::Greetings,
            "bye" => Self::Bye,
            "thanks" => Self::Thanks,
            "wolfram_search_query" => Self::KnowledgeQuery,
            _ => Self::Unknown,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Greetings => "greetings",
            Self::Bye => "bye",
            Self::Thanks => "thanks",
            Self::KnowledgeQuery => "wolfram_search_query",
            Self::Unknown => "unknown",
        }
    }
}

/// What to answer for one selection, before any outbound call is made.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReplyAction {
    Canned(&'static str),
    Query(String),
    Fallback,
}

impl ReplyAction {
    pub fn for_selection(selection: &SelectionResult) -> Self {
        let Some(category) = selection.category.as_deref() else {
            return Self::Fallback;
        };

        match Category::from_name(category) {
            Category::Greetings => Self::Canned(GREETING_TEXT),
            Category::Bye => Self::Canned(FAREWELL_TEXT),
            Category::Thanks => Self::Canned(THANKS_TEXT),
            Category::KnowledgeQuery => selection
                .entity
                .as_ref()
                .and_then(|entity| entity.value.as_text())
                .filter(|query| !query.trim().is_empty())
                .map(|query| Self::Query(query.to_owned()))
                .unwrap_or(Self::Fallback),
            Category::Unknown => Self::Fallback,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Canned(_) => "canned",
            Self::Query(_) => "query",
            Self::Fallback => "fallback",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Category, ReplyAction, FALLBACK_TEXT, FAREWELL_TEXT, GREETING_TEXT, THANKS_TEXT};
    use crate::entity::{EntityCandidate, EntityValue, SelectionResult};

    fn selection(category: &str, value: EntityValue) -> SelectionResult {
        SelectionResult {
            category: Some(category.to_owned()),
            entity: Some(EntityCandidate { confidence: 0.9, value }),
        }
    }

    #[test]
    fn canned_categories_map_to_fixed_texts() {
        let text = EntityValue::Text("x".to_owned());
        assert_eq!(
            ReplyAction::for_selection(&selection("greetings", text.clone())),
            ReplyAction::Canned(GREETING_TEXT)
        );
        assert_eq!(
            ReplyAction::for_selection(&selection("bye", text.clone())),
            ReplyAction::Canned(FAREWELL_TEXT)
        );
        assert_eq!(
            ReplyAction::for_selection(&selection("thanks", EntityValue::Bool(true))),
            ReplyAction::Canned(THANKS_TEXT)
        );
    }

    #[test]
    fn knowledge_query_carries_the_string_value() {
        let action = ReplyAction::for_selection(&selection(
            "wolfram_search_query",
            EntityValue::Text("2+2".to_owned()),
        ));
        assert_eq!(action, ReplyAction::Query("2+2".to_owned()));
    }

    #[test]
    fn knowledge_query_is_forwarded_verbatim() {
        let action = ReplyAction::for_selection(&selection(
            "wolfram_search_query",
            EntityValue::Text("  distance to the moon ".to_owned()),
        ));
        assert_eq!(action, ReplyAction::Query("  distance to the moon ".to_owned()));
    }

    #[test]
    fn knowledge_query_fails_closed_on_non_string_value() {
        let action =
            ReplyAction::for_selection(&selection("wolfram_search_query", EntityValue::Number(4.0)));
        assert_eq!(action, ReplyAction::Fallback);

        let action = ReplyAction::for_selection(&selection(
            "wolfram_search_query",
            EntityValue::Text("   ".to_owned()),
        ));
        assert_eq!(action, ReplyAction::Fallback);
    }

    #[test]
    fn unknown_and_empty_selections_fall_back() {
        assert_eq!(ReplyAction::for_selection(&SelectionResult::none()), ReplyAction::Fallback);
        assert_eq!(
            ReplyAction::for_selection(&selection("weather", EntityValue::Text("rain".into()))),
            ReplyAction::Fallback
        );
        assert_eq!(FALLBACK_TEXT, "¯\\_(o_o)_//¯");
    }

    #[test]
    fn category_names_round_trip() {
        for category in
            [Category::Greetings, Category::Bye, Category::Thanks, Category::KnowledgeQuery]
        {
            assert_eq!(Category::from_name(category.label()), category);
        }
        assert_eq!(Category::from_name("Greetings"), Category::Unknown);
    }
}
