//! User-turn template shared with the language model.
//!
//! Layout (v1):
//!
//! ```text
//! <context>
//! {retrieved content}
//! </context>
//!
//! <interrupt>{earlier interrupted utterance}</interrupt>
//! {utterance}
//! ```
//!
//! The context block is omitted when there is no retrieved content and
//! interrupt lines are omitted when there were no interruptions. Only the
//! body (interrupt lines and utterance) is kept in the chat history; the
//! context block is sent once with the turn it was retrieved for.

use super::context::InterruptContext;
use crate::collaborators::RetrievedChunk;

/// Versioned user-turn layout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PromptTemplate {
    #[default]
    V1,
}

/// A rendered user turn.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserTurn {
    /// `<context>` block, when anything was retrieved.
    pub context: Option<String>,
    /// Interrupt lines followed by the utterance.
    pub body: String,
}

impl UserTurn {
    /// What is sent to the model for this turn.
    pub fn full(&self) -> String {
        match &self.context {
            Some(context) => format!("{context}{}", self.body),
            None => self.body.clone(),
        }
    }
}

impl PromptTemplate {
    pub fn render(
        self,
        text: &str,
        interrupts: &InterruptContext,
        context: &[RetrievedChunk],
    ) -> UserTurn {
        match self {
            Self::V1 => render_v1(text, interrupts, context),
        }
    }
}

fn render_v1(text: &str, interrupts: &InterruptContext, context: &[RetrievedChunk]) -> UserTurn {
    let retrieved: Vec<&str> = context
        .iter()
        .map(|c| c.content.trim())
        .filter(|c| !c.is_empty())
        .collect();
    let context = (!retrieved.is_empty())
        .then(|| format!("<context>\n{}\n</context>\n\n", retrieved.join("\n\n")));

    let mut body = String::new();
    for entry in interrupts.entries() {
        body.push_str("<interrupt>");
        body.push_str(entry);
        body.push_str("</interrupt>\n");
    }
    body.push_str(text);

    UserTurn { context, body }
}
