//! Web search classifier prompt and reply parsing.

use crate::collaborators::SearchDecision;
use tracing::warn;

/// Separator between verdict and topic in the classifier reply.
const SEPARATOR: &str = "+-+";
const DEFAULT_TOPIC: &str = "general search";

pub const CLASSIFIER_PROMPT: &str = "You are a classifier that determines whether a user's \
request requires an external web search.

Rules for deciding:
- Answer \"yes\" if the prompt is about facts, knowledge, history, current events, or \
time-sensitive information.
- Answer \"no\" if the request can be answered without external knowledge (general \
conversation, opinions, jokes, instructions, etc.).
- If answering \"yes\", provide the topic to be searched for in no more than 5 words.
- If answering \"no\", the topic should be \"None\".
- Correct the spelling of words in the topic if necessary, the input is the output of \
speech-to-text and may be slightly off.

Output format (no extra words, no punctuation except as shown):
<yes/no>+-+<topic>

Examples:
- \"How tall is the Empire State?\" -> yes+-+Empire State Height
- \"What is the price of Bitcoin currently?\" -> yes+-+Bitcoin Price
- \"How are you doing today?\" -> no+-+None
- \"Write me a poem about cats.\" -> no+-+None
- \"Tell me the weather in Tokyo.\" -> yes+-+Tokyo Weather";

/// Parse a sanitised classifier reply.
///
/// Replies without the separator fall back to a prefix check; anything
/// unparseable means no search.
pub fn parse_decision(reply: &str) -> SearchDecision {
    let reply = reply.trim().trim_matches('`').trim();
    if let Some((verdict, topic)) = reply.split_once(SEPARATOR) {
        let topic = topic.trim().trim_matches('`').trim();
        return if verdict.trim().eq_ignore_ascii_case("yes") {
            SearchDecision::Search {
                topic: non_empty_topic(topic),
            }
        } else {
            SearchDecision::NotNeeded
        };
    }

    warn!(reply, "classifier reply missing separator");
    let lower = reply.to_lowercase();
    match lower.strip_prefix("yes") {
        Some(rest) => SearchDecision::Search {
            topic: non_empty_topic(rest.trim_start_matches([',', ':', '.', ' '])),
        },
        None => SearchDecision::NotNeeded,
    }
}

fn non_empty_topic(topic: &str) -> String {
    let topic = topic.trim();
    if topic.is_empty() || topic.eq_ignore_ascii_case("none") {
        DEFAULT_TOPIC.to_owned()
    } else {
        topic.to_owned()
    }
}
