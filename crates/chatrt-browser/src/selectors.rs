//! Named CSS selectors the adapter drives, with per-deployment overrides.
//!
//! Every chat web app renders its DOM differently, so nothing here is load
//! bearing on its own; the defaults describe a plausible `data-testid`-keyed
//! layout and exist only so a deployment with none of its own overrides
//! still does *something* sensible against a real target.

use std::collections::HashMap;

/// The named selectors the adapter queries, each overridable independently
/// via [`crate::config::BrowserConfig::selector_overrides`].
#[derive(Clone, Debug)]
pub struct Selectors {
    /// Username/identifier field on the login form.
    pub login_username: String,
    /// Password field on the login form.
    pub login_password: String,
    /// Login form submit control.
    pub login_submit: String,
    /// An element present only once the session is authenticated, used to
    /// confirm login succeeded.
    pub authenticated_marker: String,
    /// One message card within the open conversation's message list.
    pub message_item: String,
    /// The text body within a [`Self::message_item`].
    pub message_text: String,
    /// The sender label within a [`Self::message_item`].
    pub message_sender: String,
    /// An outgoing-message marker within a [`Self::message_item`], present
    /// only on messages the local session sent.
    pub message_outgoing_marker: String,
    /// The message composer's text input.
    pub composer_input: String,
    /// The composer's send control.
    pub send_button: String,
    /// A file input accepting attachment uploads.
    pub file_input: String,
    /// The reaction-picker trigger on a message card.
    pub reaction_trigger: String,
    /// A reaction-picker entry for a specific emoji, with `{emoji}`
    /// substituted in.
    pub reaction_picker_item: String,
    /// The delete control on a message card.
    pub delete_button: String,
    /// The forward control on a message card.
    pub forward_button: String,
    /// A conversation-search input within the forward dialog opened by
    /// [`Self::forward_button`].
    pub forward_search_input: String,
    /// The confirm control within the forward dialog.
    pub forward_confirm_button: String,
    /// One entry in the conversation sidebar, used for enumeration.
    pub conversation_list_item: String,
}

impl Default for Selectors {
    fn default() -> Self {
        Self {
            login_username: "input[name='username']".into(),
            login_password: "input[name='password']".into(),
            login_submit: "button[type='submit']".into(),
            authenticated_marker: "[data-testid='conversation-list']".into(),
            message_item: "[data-testid='message']".into(),
            message_text: "[data-testid='message-text']".into(),
            message_sender: "[data-testid='message-sender']".into(),
            message_outgoing_marker: "[data-testid='message-outgoing']".into(),
            composer_input: "[data-testid='composer-input']".into(),
            send_button: "[data-testid='send-button']".into(),
            file_input: "input[type='file']".into(),
            reaction_trigger: "[data-testid='reaction-trigger']".into(),
            reaction_picker_item: "[data-emoji='{emoji}']".into(),
            delete_button: "[data-testid='delete-message']".into(),
            forward_button: "[data-testid='forward-message']".into(),
            forward_search_input: "[data-testid='forward-search']".into(),
            forward_confirm_button: "[data-testid='forward-confirm']".into(),
            conversation_list_item: "[data-testid='conversation-item']".into(),
        }
    }
}

impl Selectors {
    /// Build the default table, applying any named overrides. Unknown
    /// override keys are logged and otherwise ignored rather than rejected,
    /// since a typo in deployment config shouldn't be fatal.
    #[must_use]
    pub fn with_overrides(overrides: &HashMap<String, String>) -> Self {
        let mut selectors = Self::default();
        for (key, value) in overrides {
            let slot = match key.as_str() {
                "login_username" => &mut selectors.login_username,
                "login_password" => &mut selectors.login_password,
                "login_submit" => &mut selectors.login_submit,
                "authenticated_marker" => &mut selectors.authenticated_marker,
                "message_item" => &mut selectors.message_item,
                "message_text" => &mut selectors.message_text,
                "message_sender" => &mut selectors.message_sender,
                "message_outgoing_marker" => &mut selectors.message_outgoing_marker,
                "composer_input" => &mut selectors.composer_input,
                "send_button" => &mut selectors.send_button,
                "file_input" => &mut selectors.file_input,
                "reaction_trigger" => &mut selectors.reaction_trigger,
                "reaction_picker_item" => &mut selectors.reaction_picker_item,
                "delete_button" => &mut selectors.delete_button,
                "forward_button" => &mut selectors.forward_button,
                "forward_search_input" => &mut selectors.forward_search_input,
                "forward_confirm_button" => &mut selectors.forward_confirm_button,
                "conversation_list_item" => &mut selectors.conversation_list_item,
                other => {
                    tracing::warn!(key = other, "ignoring unknown selector override");
                    continue;
                }
            };
            *slot = value.clone();
        }
        selectors
    }

    /// The reaction-picker-item selector for a specific emoji.
    #[must_use]
    pub fn reaction_picker_item_for(&self, emoji: &str) -> String {
        self.reaction_picker_item.replace("{emoji}", emoji)
    }
}
