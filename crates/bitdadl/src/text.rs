//! Character encodings and text-number justification.

use crate::errors::ErrorKind;

/// Character encoding of text fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Encoding {
    /// UTF-8. Any valid UTF-8 byte sequence is accepted.
    #[default]
    Utf8,
    /// ASCII. Every byte must be in 0..=0x7F.
    Ascii,
    /// ISO-8859-1. Every byte maps to the code point of the same value.
    Latin1,
}

impl Encoding {
    pub fn name(&self) -> &'static str {
        match self {
            Encoding::Utf8 => "UTF-8",
            Encoding::Ascii => "US-ASCII",
            Encoding::Latin1 => "ISO-8859-1",
        }
    }

    /// Looks up an encoding by its IANA name, ignoring case.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "UTF-8" | "UTF8" => Some(Encoding::Utf8),
            "US-ASCII" | "ASCII" => Some(Encoding::Ascii),
            "ISO-8859-1" | "LATIN1" => Some(Encoding::Latin1),
            _ => None,
        }
    }

    pub fn decode(&self, bytes: Vec<u8>) -> Result<String, ErrorKind> {
        let invalid = || ErrorKind::InvalidText(self.name().to_string());

        match self {
            Encoding::Utf8 => String::from_utf8(bytes).map_err(|_| invalid()),
            Encoding::Ascii => {
                if !bytes.is_ascii() {
                    return Err(invalid());
                }

                String::from_utf8(bytes).map_err(|_| invalid())
            }
            Encoding::Latin1 => Ok(bytes.into_iter().map(char::from).collect()),
        }
    }

    pub fn encode(&self, text: &str) -> Result<Vec<u8>, ErrorKind> {
        let invalid = || ErrorKind::InvalidText(self.name().to_string());

        match self {
            Encoding::Utf8 => Ok(text.as_bytes().to_vec()),
            Encoding::Ascii => {
                if !text.is_ascii() {
                    return Err(invalid());
                }

                Ok(text.as_bytes().to_vec())
            }
            Encoding::Latin1 => text
                .chars()
                .map(|c| u8::try_from(u32::from(c)).map_err(|_| invalid()))
                .collect(),
        }
    }
}

/// Placement of a text number within its fixed-width field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Justification {
    /// Text first, padding after.
    #[default]
    Left,
    /// Padding first, text after.
    Right,
    /// Padding split around the text; an odd pad unit goes to the left.
    Center,
}

impl Justification {
    /// Number of pad units to put (before, after) a text of `len` units in a field of `width` units.
    pub fn padding(&self, width: usize, len: usize) -> (usize, usize) {
        let total = width.saturating_sub(len);

        match self {
            Justification::Left => (0, total),
            Justification::Right => (total, 0),
            Justification::Center => {
                let mut left = total / 2;
                let right = left;
                if left + right < total {
                    left += 1;
                }
                (left, right)
            }
        }
    }

    /// Removes padding from the side(s) this justification pads.
    pub fn strip<'a>(&self, text: &'a str, pad: &str) -> &'a str {
        if pad.is_empty() {
            return text;
        }

        match self {
            Justification::Left => text.trim_end_matches(pad),
            Justification::Right => text.trim_start_matches(pad),
            Justification::Center => text.trim_start_matches(pad).trim_end_matches(pad),
        }
    }
}
