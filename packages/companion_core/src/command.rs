//! Slash-command parsing.
//!
//! Only the first whitespace-delimited token decides the command, and it is
//! matched case-sensitively. Anything unrecognized is chat content.

/// Parsed intent of a `user` envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Clear,
    /// Target personality name as typed; may be empty when omitted.
    Switch(String),
    Info,
    Help,
    Quit,
    /// Not a command: forward the content to the chat path.
    Chat,
}

pub const HELP_TEXT: &str = "\
**Available Commands:**
- /clear - Clear conversation history
- /switch <personality> - Switch between yui, friday, jarvis
- /info - Show conversation statistics
- /help - Show this help message
- /quit - Close the chat";

impl Command {
    pub fn parse(content: &str) -> Command {
        let trimmed = content.trim();
        if !trimmed.starts_with('/') {
            return Command::Chat;
        }

        let mut tokens = trimmed.split_whitespace();
        let head = tokens.next().unwrap_or_default();
        match head {
            "/clear" => Command::Clear,
            "/switch" => Command::Switch(tokens.next().unwrap_or_default().to_string()),
            "/info" => Command::Info,
            "/help" => Command::Help,
            "/quit" | "/exit" => Command::Quit,
            _ => Command::Chat,
        }
    }

    pub fn is_chat(&self) -> bool {
        matches!(self, Command::Chat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_chat() {
        assert_eq!(Command::parse("hello there"), Command::Chat);
        assert_eq!(Command::parse(""), Command::Chat);
    }

    #[test]
    fn recognizes_every_command() {
        assert_eq!(Command::parse("/clear"), Command::Clear);
        assert_eq!(Command::parse("/info"), Command::Info);
        assert_eq!(Command::parse("/help"), Command::Help);
        assert_eq!(Command::parse("/quit"), Command::Quit);
        assert_eq!(Command::parse("/exit"), Command::Quit);
        assert_eq!(
            Command::parse("/switch friday"),
            Command::Switch("friday".into())
        );
    }

    #[test]
    fn switch_without_target_is_empty() {
        assert_eq!(Command::parse("/switch"), Command::Switch(String::new()));
        assert_eq!(Command::parse("  /switch   "), Command::Switch(String::new()));
    }

    #[test]
    fn switch_keeps_target_case_for_later_validation() {
        assert_eq!(
            Command::parse("/switch Jarvis now"),
            Command::Switch("Jarvis".into())
        );
    }

    #[test]
    fn prefix_token_is_case_sensitive() {
        assert_eq!(Command::parse("/Clear"), Command::Chat);
        assert_eq!(Command::parse("/HELP"), Command::Chat);
    }

    #[test]
    fn unknown_slash_word_falls_through_to_chat() {
        assert!(Command::parse("/unknowncmd").is_chat());
        assert!(Command::parse("/clearall").is_chat());
    }

    #[test]
    fn trailing_arguments_are_ignored() {
        assert_eq!(Command::parse("/clear please"), Command::Clear);
        assert_eq!(Command::parse("/info\tnow"), Command::Info);
    }
}
