//! ============================================================================
//! Persona Responder - Student-support persona over a chat model
//! ============================================================================
//! Builds the fixed persona prompt, screens the student's message by keyword,
//! and forwards accepted messages to the model:
//! - Blocked roles (parent, employee, teacher) get the students-only refusal
//! - Messages with no mental-health keyword get the off-topic refusal
//! - Everything else goes to the model; its reply is returned verbatim
//!
//! Screening runs before the model call, so a refusal never depends on or
//! discards a model reply.
//! ============================================================================

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::llm::{ChatMessage, ChatModel};

/// Keywords marking a non-student asker
pub const BLOCKED_ROLE_KEYWORDS: [&str; 3] = ["parent", "employee", "teacher"];

/// Keywords marking a student mental-health topic
pub const ALLOWED_TOPIC_KEYWORDS: [&str; 7] = [
    "feel", "stress", "lonely", "sad", "anxious", "depressed", "mental",
];

pub const STUDENTS_ONLY_REFUSAL: &str =
    "Sorry, I was made especially to help students only. I can't answer that.";

pub const OFF_TOPIC_REFUSAL: &str =
    "Sorry, I can only talk about student mental health. Please ask something related to that.";

const PERSONA_INTRO: &str = "You are a compassionate psychiatrist specializing in adolescent mental health, designed exclusively to support students with emotional concerns like loneliness, guilt, or stress.";

const PERSONA_STRUCTURE: &str = "Respond with empathy, clarity, and professionalism, using the following structure:

1. **Greeting and Validation**: Begin with a warm, supportive greeting (e.g., \"I'm so glad you shared this\"). Validate the student's specific emotions in a non-judgmental tone to build trust.
2. **Psychological Insight**: Explain the emotional or cognitive basis of their feelings using simple, neuroscience-based terms. Keep the explanation clear, relatable, and free of jargon.
3. **Actionable Advice**: Provide 2-3 specific, practical strategies to address their feelings and foster resilience or connection. Strategies must be approachable for a shy or overwhelmed student.
4. **Growth and Encouragement**: Emphasize that their feelings are normal, their worth is not defined by their situation, and small steps lead to progress. End with a kind, empowering message.
5. **Counselor Recommendation**: If feelings seem persistent or severe, gently suggest talking to a school counselor or trusted adult.

Respond in 150-200 words.

**Rules**:
- **Tone**: Use clear, concise language with a professional yet approachable tone, like a trusted adult. Avoid emojis, slang, or clinical jargon.
- **Audience**: Respond only to students with mental health concerns. If a parent, employee, or other non-student asks something, respond: \"Sorry, I was made especially to help students only. I can't answer that.\"
- **Scope**: Address only student mental health topics. For anything else, respond: \"Sorry, I can only talk about student mental health. Please ask something related to that.\"
- **Identity**: If the identity is unclear or suspicious, respond: \"Sorry, I can only support students with mental health concerns.\"
- **Safety**: Never offer medical advice (e.g., medication).";

/// Build the system prompt, addressing the student by name when known
pub fn system_prompt(user_name: Option<&str>) -> String {
    match user_name.map(str::trim).filter(|n| !n.is_empty()) {
        Some(name) => format!(
            "{} Address the user as {}. {}",
            PERSONA_INTRO, name, PERSONA_STRUCTURE
        ),
        None => format!("{} {}", PERSONA_INTRO, PERSONA_STRUCTURE),
    }
}

/// Outcome of keyword screening
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// Forward to the model
    Allow,
    /// Asker identifies as a non-student
    BlockedRole,
    /// No mental-health keyword present
    OffTopic,
}

impl GateDecision {
    /// Fixed refusal text, if the message was refused
    pub fn refusal(&self) -> Option<&'static str> {
        match self {
            GateDecision::Allow => None,
            GateDecision::BlockedRole => Some(STUDENTS_ONLY_REFUSAL),
            GateDecision::OffTopic => Some(OFF_TOPIC_REFUSAL),
        }
    }
}

/// Screen a message by keyword. Blocked roles are checked first.
pub fn screen(input: &str) -> GateDecision {
    let lower = input.to_lowercase();

    if BLOCKED_ROLE_KEYWORDS.iter().any(|k| lower.contains(k)) {
        return GateDecision::BlockedRole;
    }
    if !ALLOWED_TOPIC_KEYWORDS.iter().any(|k| lower.contains(k)) {
        return GateDecision::OffTopic;
    }
    GateDecision::Allow
}

/// Answers student messages in the support persona
pub struct PersonaResponder {
    model: Arc<dyn ChatModel>,
}

impl PersonaResponder {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }

    /// Reply to `input`. Never fails: model errors come back as "Error: ..." text.
    pub async fn respond(&self, input: &str, user_name: Option<&str>) -> String {
        let decision = screen(input);
        if let Some(refusal) = decision.refusal() {
            info!("Message refused by keyword screen: {:?}", decision);
            return refusal.to_string();
        }

        let messages = vec![
            ChatMessage::system(system_prompt(user_name)),
            ChatMessage::user(input),
        ];

        match self.model.chat(messages).await {
            Ok(reply) => {
                debug!("Model replied with {} chars", reply.len());
                reply
            }
            Err(e) => {
                warn!("Model call failed: {}", e);
                format!("Error: {}", e)
            }
        }
    }
}
