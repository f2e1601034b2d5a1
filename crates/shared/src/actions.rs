//! Desktop actions the backend knows how to execute, plus the emoji palette
//! offered when naming a gesture.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DesktopAction {
    pub id: &'static str,
    pub label: &'static str,
    pub shortcut: &'static str,
}

pub const NO_ACTION: &str = "None";

pub const DESKTOP_ACTIONS: &[DesktopAction] = &[
    DesktopAction { id: NO_ACTION, label: "No Action", shortcut: "-" },
    DesktopAction { id: "switch_tab", label: "Switch Tab", shortcut: "Alt+Tab" },
    DesktopAction { id: "play_pause", label: "Play / Pause", shortcut: "Space" },
    DesktopAction { id: "volume_up", label: "Volume Up", shortcut: "Vol+" },
    DesktopAction { id: "volume_down", label: "Volume Down", shortcut: "Vol-" },
    DesktopAction { id: "mute", label: "Mute", shortcut: "M" },
    DesktopAction { id: "next_track", label: "Next Track", shortcut: "Ctrl+Right" },
    DesktopAction { id: "prev_track", label: "Previous Track", shortcut: "Ctrl+Left" },
    DesktopAction { id: "screenshot", label: "Screenshot", shortcut: "PrtScr" },
    DesktopAction { id: "scroll_up", label: "Scroll Up", shortcut: "ScrollUp" },
    DesktopAction { id: "scroll_down", label: "Scroll Down", shortcut: "ScrollDown" },
    DesktopAction { id: "brightness_up", label: "Brightness Up", shortcut: "Bright+" },
    DesktopAction { id: "brightness_down", label: "Brightness Down", shortcut: "Bright-" },
    DesktopAction { id: "toggle_cursor", label: "Toggle Cursor Mode", shortcut: "Gesture" },
    DesktopAction { id: "switch_desktop_left", label: "Desktop Left", shortcut: "Ctrl+←" },
    DesktopAction { id: "switch_desktop_right", label: "Desktop Right", shortcut: "Ctrl+→" },
];

pub const GESTURE_EMOJIS: [&str; 12] = [
    "👋", "✌️", "👍", "👎", "🤞", "🤟", "🖐️", "👈", "👉", "☝️", "👆", "🤘",
];

pub const DEFAULT_EMOJI: &str = "👋";

pub fn find_action(id: &str) -> Option<&'static DesktopAction> {
    DESKTOP_ACTIONS.iter().find(|action| action.id == id)
}

pub fn is_known_action(id: &str) -> bool {
    find_action(id).is_some()
}

/// Human label for an action id; unknown ids are shown verbatim.
pub fn action_label(id: &str) -> &str {
    find_action(id).map_or(id, |action| action.label)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_ids_are_unique() {
        for (i, action) in DESKTOP_ACTIONS.iter().enumerate() {
            assert!(
                DESKTOP_ACTIONS[i + 1..].iter().all(|other| other.id != action.id),
                "duplicate action id {}",
                action.id
            );
        }
    }

    #[test]
    fn labels_fall_back_to_id() {
        assert_eq!(action_label("mute"), "Mute");
        assert_eq!(action_label("launch_rocket"), "launch_rocket");
        assert!(!is_known_action(""));
    }
}
