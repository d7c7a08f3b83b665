/// Confirmation prompts shown before boot configuration changes and quitting
use rfd::{MessageButtons, MessageDialog, MessageDialogResult, MessageLevel};

/// A yes/no question for the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub message: String,
    pub title: String,
    /// Label of the affirmative button (None = plain "OK")
    pub confirm_label: Option<String>,
}

impl Prompt {
    pub fn question(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            title: String::new(),
            confirm_label: None,
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn ok_button(mut self, label: impl Into<String>) -> Self {
        self.confirm_label = Some(label.into());
        self
    }
}

/// Blocking yes/no gate. Cancelling or dismissing answers `false`.
pub trait ConfirmationGate: Send + Sync {
    fn ask(&self, prompt: &Prompt) -> bool;
}

/// Native message dialog
#[derive(Debug, Default, Clone, Copy)]
pub struct DialogGate;

impl ConfirmationGate for DialogGate {
    fn ask(&self, prompt: &Prompt) -> bool {
        let buttons = match &prompt.confirm_label {
            Some(label) => MessageButtons::OkCancelCustom(label.clone(), "Cancel".to_string()),
            None => MessageButtons::OkCancel,
        };

        let result = MessageDialog::new()
            .set_level(MessageLevel::Info)
            .set_title(&prompt.title)
            .set_description(&prompt.message)
            .set_buttons(buttons)
            .show();

        let confirmed = is_affirmative(&result, prompt.confirm_label.as_deref());
        tracing::debug!("Prompt {:?} answered {:?}", prompt.title, result);
        confirmed
    }
}

fn is_affirmative(result: &MessageDialogResult, confirm_label: Option<&str>) -> bool {
    match result {
        MessageDialogResult::Ok | MessageDialogResult::Yes => true,
        MessageDialogResult::Custom(clicked) => Some(clicked.as_str()) == confirm_label,
        _ => false,
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted gate for session tests

    use super::*;
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    /// Answers prompts from a script and records what was asked.
    /// An exhausted script answers `false`.
    #[derive(Default)]
    pub struct ScriptedGate {
        answers: Mutex<VecDeque<bool>>,
        asked: Mutex<Vec<Prompt>>,
    }

    impl ScriptedGate {
        pub fn answering(answers: &[bool]) -> Self {
            Self {
                answers: Mutex::new(answers.iter().copied().collect()),
                asked: Mutex::new(Vec::new()),
            }
        }

        pub fn asked(&self) -> Vec<Prompt> {
            self.asked.lock().clone()
        }
    }

    impl ConfirmationGate for ScriptedGate {
        fn ask(&self, prompt: &Prompt) -> bool {
            self.asked.lock().push(prompt.clone());
            self.answers.lock().pop_front().unwrap_or(false)
        }
    }
}
