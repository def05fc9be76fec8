//! Light and dark color palettes
//!
//! The terminal view paints with 24-bit ANSI escapes built from these hex values.

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Hex color representation (0xRRGGBB)
pub type HexColor = u32;

pub const ANSI_RESET: &str = "\x1b[0m";

/// Colors for every surface the view paints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorScheme {
    /// Main window background
    pub background: HexColor,
    /// Labels and tree entries
    pub text: HexColor,
    /// Console background
    pub console_background: HexColor,
    /// Console output text
    pub console_text: HexColor,
    /// Script list background
    pub list_background: HexColor,
    /// Script list text
    pub list_text: HexColor,
    /// Selected row background
    pub selection: HexColor,
    /// Placeholder rows ("no files") and the idle selection label
    pub muted: HexColor,
    /// Selection label while the selected script runs
    pub running: HexColor,
    /// Selection label while the selected script is idle
    pub selected: HexColor,
    /// Warning notices
    pub warning: HexColor,
    /// Error notices and the "access denied" row
    pub error: HexColor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Theme {
    pub dark: bool,
    pub colors: ColorScheme,
}

impl Theme {
    pub fn dark_default() -> Self {
        Theme {
            dark: true,
            colors: ColorScheme {
                background: 0x2b2b2b,
                text: 0xffffff,
                console_background: 0x1e1e1e,
                console_text: 0x00ff00,
                list_background: 0x3c3c3c,
                list_text: 0xffffff,
                selection: 0x404040,
                muted: 0x808080,
                running: 0x00c000,
                selected: 0xffff00,
                warning: 0xffb000,
                error: 0xff4040,
            },
        }
    }

    pub fn light_default() -> Self {
        Theme {
            dark: false,
            colors: ColorScheme {
                background: 0xf0f0f0,
                text: 0x000000,
                console_background: 0xffffff,
                console_text: 0x000000,
                list_background: 0xffffff,
                list_text: 0x000000,
                selection: 0x0078d7,
                muted: 0x808080,
                running: 0x008000,
                selected: 0xb8860b,
                warning: 0xc07000,
                error: 0xff0000,
            },
        }
    }

    pub fn from_dark_mode(dark_mode: bool) -> Self {
        let theme = if dark_mode {
            Self::dark_default()
        } else {
            Self::light_default()
        };
        debug!(dark = theme.dark, "Theme selected");
        theme
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self::light_default()
    }
}

fn rgb(hex: HexColor) -> (u8, u8, u8) {
    (
        ((hex >> 16) & 0xff) as u8,
        ((hex >> 8) & 0xff) as u8,
        (hex & 0xff) as u8,
    )
}

/// 24-bit foreground escape
pub fn ansi_fg(hex: HexColor) -> String {
    let (r, g, b) = rgb(hex);
    format!("\x1b[38;2;{};{};{}m", r, g, b)
}

/// 24-bit background escape
pub fn ansi_bg(hex: HexColor) -> String {
    let (r, g, b) = rgb(hex);
    format!("\x1b[48;2;{};{};{}m", r, g, b)
}

/// Wrap `text` in a foreground color
pub fn paint(text: &str, fg: HexColor) -> String {
    format!("{}{}{}", ansi_fg(fg), text, ANSI_RESET)
}

/// Wrap `text` in a foreground and background color
pub fn paint_on(text: &str, fg: HexColor, bg: HexColor) -> String {
    format!("{}{}{}{}", ansi_bg(bg), ansi_fg(fg), text, ANSI_RESET)
}
