use serde::{Serialize, Serializer};
use std::fmt;
use std::sync::Arc;

use crate::ratio::Ratio;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Color {
    /// No forecast applies: past date, missing data, or failed fetch.
    #[default]
    Neutral,
    Rgb(u8, u8, u8),
}

impl Color {
    /// CSS color string used for the icon fill.
    pub fn css(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Color::Neutral => f.write_str("black"),
            Color::Rgb(r, g, b) => write!(f, "rgb({}, {}, {})", r, g, b),
        }
    }
}

impl Serialize for Color {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Continuous red (empty) to green (full) gradient. Each channel is rounded
/// half away from zero, so 0.5 gives `rgb(128, 128, 0)`.
pub fn color_for(ratio: Ratio, is_future_and_valid: bool) -> Color {
    if !is_future_and_valid {
        return Color::Neutral;
    }

    match ratio {
        Ratio::NoData => Color::Neutral,
        Ratio::Value(r) => {
            let r = r.clamp(0.0, 1.0);
            Color::Rgb(channel(1.0 - r), channel(r), 0)
        }
    }
}

fn channel(share: f64) -> u8 {
    (255.0 * share).round() as u8
}

// ============================================================================
// Marker icon
// ============================================================================

pub const ICON_SIZE: [i32; 2] = [20, 20];
pub const ICON_ANCHOR: [i32; 2] = [20, 40];
pub const POPUP_ANCHOR: [i32; 2] = [0, -40];

/// Opaque pin icon handed to the map layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IconHandle {
    pub color: Color,
    #[serde(skip)]
    svg: Arc<str>,
    pub icon_size: [i32; 2],
    pub icon_anchor: [i32; 2],
    pub popup_anchor: [i32; 2],
}

impl IconHandle {
    pub fn svg(&self) -> &str {
        &self.svg
    }
}

impl Default for IconHandle {
    fn default() -> Self {
        render_icon(Color::Neutral)
    }
}

pub fn render_icon(color: Color) -> IconHandle {
    let svg = format!(
        concat!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="40" height="40" viewBox="0 0 16 16" fill="none">"#,
            r#"<path fill-rule="evenodd" clip-rule="evenodd" "#,
            r#"d="M3.37892 10.2236L8 16L12.6211 10.2236C13.5137 9.10788 14 7.72154 14 6.29266V6C14 2.68629 "#,
            r#"11.3137 0 8 0C4.68629 0 2 2.68629 2 6V6.29266C2 7.72154 2.4863 9.10788 3.37892 10.2236ZM8 "#,
            r#"8C9.10457 8 10 7.10457 10 6C10 4.89543 9.10457 4 8 4C6.89543 4 6 4.89543 6 6C6 7.10457 6.89543 8 8 8Z" "#,
            r#"fill="{}" stroke="black" stroke-width="1"/></svg>"#
        ),
        color
    );

    IconHandle {
        color,
        svg: Arc::from(svg),
        icon_size: ICON_SIZE,
        icon_anchor: ICON_ANCHOR,
        popup_anchor: POPUP_ANCHOR,
    }
}
