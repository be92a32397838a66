//! Serialized form of a recorded 3270 terminal session.
//!
//! One archive holds one [`Capture`]: the terminal id plus every screen image
//! recorded for it, in the order the screens were seen.

use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Capture {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sequence: Option<u32>,
    pub images: Vec<Screen>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_size: Option<ScreenSize>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Screen {
    pub id: String,
    pub sequence: u32,
    pub inbound: bool,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    pub image_size: ScreenSize,
    pub cursor_row: u32,
    pub cursor_column: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aid: Option<String>,
    pub fields: Vec<Field>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenSize {
    pub rows: u32,
    pub columns: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Field {
    pub row: u32,
    pub column: u32,
    pub unformatted: bool,
    pub field_protected: bool,
    pub field_numeric: bool,
    pub field_display: bool,
    pub field_intense_display: bool,
    pub field_selector_pen: bool,
    pub field_modified: bool,
    #[serde(rename = "foregroundColour", alias = "foregroundColor")]
    pub foreground_color: String,
    #[serde(
        rename = "backgroundColour",
        alias = "backgroundColor",
        skip_serializing_if = "Option::is_none"
    )]
    pub background_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub highlight: Option<String>,
    pub contents: Vec<FieldContents>,
}

/// A run of field text, either as one string or as individual characters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldContents {
    #[serde(rename = "chars", skip_serializing_if = "Option::is_none")]
    pub characters: Option<Vec<String>>,
    pub text: String,
}

impl FieldContents {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            characters: None,
            text: text.into(),
        }
    }

    /// Characters of this run. `chars` wins over `text` when both are present.
    pub fn characters(&self) -> Vec<char> {
        match &self.characters {
            Some(chars) => chars.iter().flat_map(|s| s.chars()).collect(),
            None => self.text.chars().collect(),
        }
    }
}

impl Field {
    pub fn color(&self) -> ColorCode {
        ColorCode::from_code(&self.foreground_color)
    }

    pub fn characters(&self) -> impl Iterator<Item = char> + '_ {
        self.contents.iter().flat_map(FieldContents::characters)
    }
}

/// Foreground colors a 3270 field can ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorCode {
    Default,
    Neutral,
    Red,
    Green,
    Blue,
    Pink,
    Turquoise,
    Yellow,
}

impl ColorCode {
    /// Unknown or empty codes fall back to [`ColorCode::Default`].
    pub fn from_code(code: &str) -> Self {
        match code {
            "n" => Self::Neutral,
            "r" => Self::Red,
            "g" => Self::Green,
            "b" => Self::Blue,
            "p" => Self::Pink,
            "t" => Self::Turquoise,
            "y" => Self::Yellow,
            _ => Self::Default,
        }
    }

    pub fn rgba(self) -> [u8; 4] {
        match self {
            Self::Default => [0, 255, 0, 255],
            Self::Neutral => [255, 255, 255, 255],
            Self::Red => [255, 0, 0, 255],
            Self::Green => [0, 255, 0, 255],
            Self::Blue => [0, 0, 255, 255],
            Self::Pink => [255, 0, 204, 255],
            Self::Turquoise => [64, 224, 208, 255],
            Self::Yellow => [255, 255, 0, 255],
        }
    }
}

pub fn parse_capture(json_bytes: &[u8]) -> Result<Capture> {
    Ok(serde_json::from_slice(json_bytes)?)
}

/// Output file name for one screen: `<captureId>-<sequence:05>.png`.
pub fn image_file_name(capture_id: &str, sequence: u32) -> String {
    format!("{capture_id}-{sequence:05}.png")
}
