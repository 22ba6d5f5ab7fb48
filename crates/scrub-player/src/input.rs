use crate::player::PlaybackController;

/// Keys the window layer forwards to the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Key {
    Space,
    Enter,
    Char(char),
    Other(String),
}

impl From<&winit::keyboard::Key> for Key {
    fn from(key: &winit::keyboard::Key) -> Self {
        use winit::keyboard::{Key as WinitKey, NamedKey};

        match key {
            WinitKey::Named(NamedKey::Space) => Key::Space,
            WinitKey::Named(NamedKey::Enter) => Key::Enter,
            // Some platforms report space as a character
            WinitKey::Character(s) if s.as_str() == " " => Key::Space,
            WinitKey::Character(s) => {
                let mut chars = s.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Key::Char(c),
                    _ => Key::Other(s.to_string()),
                }
            }
            other => Key::Other(format!("{other:?}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    Key(Key),
    WindowClosed,
}

/// What the session should do after an input was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Continue,
    Quit,
    /// Start a reverse export of the open video.
    Export,
}

/// Keyboard shortcut definitions.
pub struct Shortcuts;

impl Shortcuts {
    pub const TOGGLE_PAUSE: &str = "Space";
    pub const QUIT: &str = "Enter";
    pub const EXPORT: &str = "E";
    const EXPORT_CHAR: char = 'e';

    pub fn legend(export_enabled: bool) -> &'static [(&'static str, &'static str)] {
        if export_enabled {
            &[
                (Self::TOGGLE_PAUSE, "Pause / play"),
                (Self::QUIT, "Quit"),
                (Self::EXPORT, "Export reversed copy"),
            ]
        } else {
            &[(Self::TOGGLE_PAUSE, "Pause / play"), (Self::QUIT, "Quit")]
        }
    }
}

/// Maps one input event per tick onto player operations.
pub struct Dispatcher {
    export_enabled: bool,
}

impl Dispatcher {
    pub fn new(export_enabled: bool) -> Self {
        Self { export_enabled }
    }

    /// Handle one input event, applying pause toggles to `player` directly.
    pub fn dispatch(&self, event: &InputEvent, player: &PlaybackController) -> Dispatch {
        match event {
            InputEvent::WindowClosed | InputEvent::Key(Key::Enter) => {
                log::info!("end");
                Dispatch::Quit
            }
            InputEvent::Key(Key::Space) => {
                player.toggle_pause();
                Dispatch::Continue
            }
            InputEvent::Key(Key::Char(c))
                if self.export_enabled && *c == Shortcuts::EXPORT_CHAR =>
            {
                Dispatch::Export
            }
            InputEvent::Key(key) => {
                log::debug!("Ignoring key {key:?}");
                Dispatch::Continue
            }
        }
    }
}
