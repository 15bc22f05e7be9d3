use crate::{command::CallbackAction, persona::PersonaRegistry};

/// Outgoing "chat action" (typing indicator).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChatAction {
    Typing,
}

/// Inline keyboard (buttons) used for the style selection menu.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InlineKeyboard {
    pub buttons: Vec<InlineButton>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InlineButton {
    pub label: String,
    pub callback_data: String,
}

impl InlineKeyboard {
    /// One button per style, in registry order.
    ///
    /// Callback data carries the style's index, never its name, so names may
    /// contain any characters.
    pub fn style_menu(registry: &PersonaRegistry, active: Option<&str>) -> Self {
        let buttons = registry
            .list_styles()
            .enumerate()
            .map(|(idx, name)| {
                let label = if active == Some(name) {
                    format!("✓ {name}")
                } else {
                    name.to_string()
                };
                InlineButton {
                    label,
                    callback_data: CallbackAction::SelectStyle(idx).encode(),
                }
            })
            .collect();
        Self { buttons }
    }
}

/// What a messenger can do with outgoing replies.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MessagingCapabilities {
    /// Sent messages can be replaced in place.
    pub supports_edit: bool,
    /// Longest message body, in chars, the transport accepts.
    pub max_message_len: usize,
}
