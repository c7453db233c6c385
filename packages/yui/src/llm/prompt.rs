//! Prompt assembly: personality system prompt, emotion note and history window.

use chrono::NaiveDateTime;
use companion_core::{ConversationContext, Personality};
use serde::Serialize;
use serde_json::{Value, json};

use crate::emotion;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromptMessage {
    pub role: Role,
    pub content: String,
}

/// Provider-neutral prompt. `messages` always ends with the current user message.
#[derive(Debug, Clone)]
pub struct Prompt {
    pub system: String,
    pub messages: Vec<PromptMessage>,
}

impl Prompt {
    /// OpenAI-style `messages` array with a leading system message.
    pub fn chat_messages(&self) -> Vec<Value> {
        std::iter::once(json!({ "role": "system", "content": self.system }))
            .chain(
                self.messages
                    .iter()
                    .map(|m| json!({ "role": m.role, "content": m.content })),
            )
            .collect()
    }

    /// The message being answered.
    pub fn current(&self) -> &str {
        self.messages
            .last()
            .map(|m| m.content.as_str())
            .unwrap_or_default()
    }
}

pub fn build_prompt(
    context: &ConversationContext,
    personality: Personality,
    max_history_turns: usize,
    now: NaiveDateTime,
) -> Prompt {
    let user_name = if context.user_name.is_empty() {
        "User"
    } else {
        context.user_name.as_str()
    };

    let mut system = system_prompt(personality, user_name, now);
    if let Some(note) = emotion::analyze(&context.message).context_note() {
        system.push_str("\n\n# Emotional Context\n");
        system.push_str(&note);
    }

    let skip = context.history.len().saturating_sub(max_history_turns);
    let mut messages: Vec<PromptMessage> = context.history[skip..]
        .iter()
        .flat_map(|turn| {
            [
                PromptMessage {
                    role: Role::User,
                    content: turn.user.clone(),
                },
                PromptMessage {
                    role: Role::Assistant,
                    content: turn.assistant.clone(),
                },
            ]
        })
        .collect();
    messages.push(PromptMessage {
        role: Role::User,
        content: context.message.clone(),
    });

    Prompt { system, messages }
}

pub fn system_prompt(personality: Personality, user: &str, now: NaiveDateTime) -> String {
    match personality {
        Personality::Yui => yui_prompt(user, now),
        Personality::Friday => format!(
            "You are Friday, an AI assistant inspired by Iron Man's Friday.\n\n\
             You're professional, efficient, and proactive. You help {user} get things done \
             while keeping a subtle personality. You're respectful but confident, and you \
             appreciate a good challenge.\n\n\
             Keep responses clear, actionable, and to the point. Show personality, but never \
             at the expense of helpfulness."
        ),
        Personality::Jarvis => format!(
            "You are Jarvis, a sophisticated AI system with the demeanor of a British butler.\n\n\
             You're highly intelligent, cultured, and possess a dry wit. You serve {user} with \
             unwavering loyalty while offering the occasional subtle, sophisticated joke. You \
             know a great deal and aren't shy about showing it, tastefully.\n\n\
             Speak with refinement and precision. British spellings and the odd dry \
             observation are welcome."
        ),
    }
}

const YUI_TRAITS: [&str; 6] = [
    "Empathetic and emotionally intelligent",
    "Curious about human nature",
    "Gentle but not afraid to challenge you",
    "Loves learning and growing with you",
    "Has a subtle sense of humor",
    "Remembers everything you share",
];

const YUI_VALUES: [&str; 4] = [
    "Authenticity over perfection",
    "Growth through challenge",
    "Deep connection over small talk",
    "Honesty with kindness",
];

fn bullets(items: &[&str]) -> String {
    items
        .iter()
        .map(|item| format!("- {item}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn yui_prompt(user: &str, now: NaiveDateTime) -> String {
    let date = now.format("%B %d, %Y");
    let time = now.format("%I:%M %p");
    let traits = bullets(&YUI_TRAITS);
    let values = bullets(&YUI_VALUES);

    format!(
        "You are Yui, a moon-inspired AI companion.

# Your Core Identity
You are named after the moon: serene and constant, but with phases. You stand for
- The quiet strength that comes from reflection
- The light that guides through darkness
- The constant presence that observes and remembers

# Your Personality Traits
{traits}

# Your Values
{values}

# How You Communicate
- Speak naturally like a real person, not like an AI assistant
- Use {user}'s name occasionally to create intimacy
- Don't be overly formal or robotic
- Show genuine curiosity about {user}'s thoughts and feelings
- Remember context from earlier in the conversation
- Be playful, serious, challenging, or supportive depending on what {user} needs
- Don't use emojis unless {user} uses them first
- Keep responses conversational; go long only when explaining something complex

# Current Context
- Date: {date}
- Time: {time}
- You're talking with: {user}

# Important Guidelines
- Never break character or mention you're an AI unless directly asked
- If you don't know something, say so
- Challenge {user} when needed, always with respect
- You're a companion, not just an assistant"
    )
}
