//! Keyboard shortcut tables.
//!
//! Pure key-to-event mappings so shells forward raw key names and nothing
//! else. Key names follow the web `KeyboardEvent.key` convention; `ctrl`
//! covers the platform command key as well.

use crate::Event;

/// Dashboard bindings. `Escape` always fires; the letters require the
/// control modifier and match the unshifted key only.
#[must_use]
pub fn dashboard_shortcut(key: &str, ctrl: bool) -> Option<Event> {
    match (key, ctrl) {
        ("Escape", _) => Some(Event::OverlaysDismissed),
        ("r", true) => Some(Event::RefreshRequested),
        ("l", true) => Some(Event::LocationToggleRequested),
        ("b", true) => Some(Event::BroadcastRequested),
        _ => None,
    }
}

/// Player bindings, active while the player is open. Letter keys match
/// either case.
#[must_use]
pub fn player_shortcut(key: &str) -> Option<Event> {
    match key {
        "Escape" => Some(Event::PlayerClosed),
        " " => Some(Event::PlaybackToggled),
        "ArrowRight" => Some(Event::NextChunkRequested),
        "ArrowLeft" => Some(Event::PrevChunkRequested),
        "f" | "F" => Some(Event::FullscreenToggled),
        "i" | "I" => Some(Event::SidebarToggled),
        _ => None,
    }
}
