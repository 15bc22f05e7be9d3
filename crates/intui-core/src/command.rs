//! Inbound commands and callback tokens, decoded once at the transport boundary.

/// Slash commands understood by the bot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Start,
    Style,
    Reset,
    History,
    Help,
    Stats,
    Unknown(String),
}

impl Command {
    /// Parse `/cmd`, `/cmd@botname` or `/cmd args`; `None` if not a command.
    pub fn parse(text: &str) -> Option<Self> {
        let first = text.trim().split_whitespace().next()?;
        let name = first.strip_prefix('/')?;
        let name = name.split('@').next().unwrap_or("").to_lowercase();

        Some(match name.as_str() {
            "start" => Command::Start,
            "style" | "styles" => Command::Style,
            "reset" => Command::Reset,
            "history" => Command::History,
            "help" => Command::Help,
            "stats" => Command::Stats,
            _ => Command::Unknown(name),
        })
    }
}

const STYLE_PREFIX: &str = "style:";

/// Button callbacks.
///
/// Styles travel as their registry index, so the token never depends on what
/// characters a style name contains.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallbackAction {
    SelectStyle(usize),
}

impl CallbackAction {
    pub fn encode(&self) -> String {
        match self {
            CallbackAction::SelectStyle(idx) => format!("{STYLE_PREFIX}{idx}"),
        }
    }

    pub fn decode(data: &str) -> Option<Self> {
        let idx = data.strip_prefix(STYLE_PREFIX)?;
        if idx.is_empty() || !idx.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        idx.parse().ok().map(CallbackAction::SelectStyle)
    }
}
