//! Character encoding support for MARC records.
//!
//! MARC records can use different character encodings:
//! - **MARC-8** (legacy) - Mixed character sets with escape sequences (ISO 2022)
//! - **UTF-8** (modern) - Unicode standard encoding
//!
//! The encoding is indicated in position 9 of the MARC leader:
//! - Space character = MARC-8
//! - 'a' = UTF-8
//!
//! Decoding here is permissive and never fails. Records flagged as UTF-8
//! have invalid sequences replaced with U+FFFD. Records flagged as MARC-8
//! are kept as UTF-8 when the bytes are valid UTF-8 and carry no escape
//! sequence (vendors routinely mislabel them); otherwise they run through
//! [`Marc8Decoder`]. Decoded text is NFC-normalized. Output is always UTF-8.

use std::borrow::Cow;
use unicode_normalization::UnicodeNormalization;

const ESC: u8 = 0x1B;

/// Character encoding for MARC records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarcEncoding {
    /// MARC-8 encoding (legacy, mixed character sets)
    Marc8,
    /// UTF-8 encoding (modern standard)
    Utf8,
}

impl MarcEncoding {
    /// Detect encoding from the leader's character coding position.
    ///
    /// Only `'a'` means UTF-8; any other value is treated as legacy MARC-8.
    #[must_use]
    pub fn from_leader_char(c: char) -> Self {
        if c == 'a' {
            MarcEncoding::Utf8
        } else {
            MarcEncoding::Marc8
        }
    }

    /// Get the leader character for this encoding
    #[must_use]
    pub fn as_leader_char(&self) -> char {
        match self {
            MarcEncoding::Marc8 => ' ',
            MarcEncoding::Utf8 => 'a',
        }
    }
}

/// MARC-8 graphic character sets, named by their designation final byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CharacterSet {
    BasicLatin,
    AnselExtendedLatin,
    Subscript,
    Superscript,
    GreekSymbols,
    /// East Asian Character Code, three bytes per character
    Eacc,
    /// Hebrew, Cyrillic, Arabic and Greek; decoded as U+FFFD
    Unmapped,
}

impl CharacterSet {
    fn from_final_byte(byte: u8) -> Self {
        match byte {
            b'B' | b's' => CharacterSet::BasicLatin,
            b'E' => CharacterSet::AnselExtendedLatin,
            b'b' => CharacterSet::Subscript,
            b'p' => CharacterSet::Superscript,
            b'g' => CharacterSet::GreekSymbols,
            b'1' => CharacterSet::Eacc,
            _ => CharacterSet::Unmapped,
        }
    }

    /// Look up a graphic byte. The second value is true for combining marks.
    fn lookup(self, byte: u8) -> Option<(char, bool)> {
        let low = byte & 0x7F;
        match self {
            CharacterSet::BasicLatin => {
                (0x20..0x7F).contains(&low).then_some((char::from(low), false))
            },
            CharacterSet::AnselExtendedLatin => ansel(low | 0x80),
            CharacterSet::Subscript => script_digit(
                low,
                0x2080,
                ['\u{2081}', '\u{2082}', '\u{2083}'],
                ['\u{208D}', '\u{208E}', '\u{208A}', '\u{208B}'],
            ),
            CharacterSet::Superscript => script_digit(
                low,
                0x2070,
                ['\u{00B9}', '\u{00B2}', '\u{00B3}'],
                ['\u{207D}', '\u{207E}', '\u{207A}', '\u{207B}'],
            ),
            CharacterSet::GreekSymbols => match low {
                0x61 => Some(('\u{03B1}', false)),
                0x62 => Some(('\u{03B2}', false)),
                0x63 => Some(('\u{03B3}', false)),
                _ => None,
            },
            CharacterSet::Eacc | CharacterSet::Unmapped => None,
        }
    }
}

/// Subscript and superscript sets: digits plus `( ) + -`.
///
/// `one_to_three` overrides digits 1-3, which superscripts take from Latin-1.
fn script_digit(
    low: u8,
    zero: u32,
    one_to_three: [char; 3],
    punctuation: [char; 4],
) -> Option<(char, bool)> {
    let ch = match low {
        b'0' => char::from_u32(zero)?,
        b'1'..=b'3' => one_to_three[usize::from(low - b'1')],
        b'4'..=b'9' => char::from_u32(zero + u32::from(low - b'0'))?,
        b'(' => punctuation[0],
        b')' => punctuation[1],
        b'+' => punctuation[2],
        b'-' => punctuation[3],
        _ => return None,
    };
    Some((ch, false))
}

/// ANSEL (ANSI/NISO Z39.47) extended Latin, as the MARC-8 G1 default.
fn ansel(byte: u8) -> Option<(char, bool)> {
    let spacing = match byte {
        0xA1 => '\u{0141}',
        0xA2 => '\u{00D8}',
        0xA3 => '\u{0110}',
        0xA4 => '\u{00DE}',
        0xA5 => '\u{00C6}',
        0xA6 => '\u{0152}',
        0xA7 => '\u{02B9}',
        0xA8 => '\u{00B7}',
        0xA9 => '\u{266D}',
        0xAA => '\u{00AE}',
        0xAB => '\u{00B1}',
        0xAC => '\u{01A0}',
        0xAD => '\u{01AF}',
        0xAE => '\u{02BC}',
        0xB0 => '\u{02BB}',
        0xB1 => '\u{0142}',
        0xB2 => '\u{00F8}',
        0xB3 => '\u{0111}',
        0xB4 => '\u{00FE}',
        0xB5 => '\u{00E6}',
        0xB6 => '\u{0153}',
        0xB7 => '\u{02BA}',
        0xB8 => '\u{0131}',
        0xB9 => '\u{00A3}',
        0xBA => '\u{00F0}',
        0xBC => '\u{01A1}',
        0xBD => '\u{01B0}',
        0xC0 => '\u{00B0}',
        0xC1 => '\u{2113}',
        0xC2 => '\u{2117}',
        0xC3 => '\u{00A9}',
        0xC4 => '\u{266F}',
        0xC5 => '\u{00BF}',
        0xC6 => '\u{00A1}',
        0xC7 => '\u{00DF}',
        0xC8 => '\u{20AC}',
        _ => return ansel_combining(byte).map(|mark| (mark, true)),
    };
    Some((spacing, false))
}

/// ANSEL non-spacing marks (0xE0-0xFE). In MARC-8 they precede the base letter.
fn ansel_combining(byte: u8) -> Option<char> {
    let mark = match byte {
        0xE0 => '\u{0309}',
        0xE1 => '\u{0300}',
        0xE2 => '\u{0301}',
        0xE3 => '\u{0302}',
        0xE4 => '\u{0303}',
        0xE5 => '\u{0304}',
        0xE6 => '\u{0306}',
        0xE7 => '\u{0307}',
        0xE8 => '\u{0308}',
        0xE9 => '\u{030C}',
        0xEA => '\u{030A}',
        0xEB => '\u{FE20}',
        0xEC => '\u{FE21}',
        0xED => '\u{0315}',
        0xEE => '\u{030B}',
        0xEF => '\u{0310}',
        0xF0 => '\u{0327}',
        0xF1 => '\u{0328}',
        0xF2 => '\u{0323}',
        0xF3 => '\u{0324}',
        0xF4 => '\u{0325}',
        0xF5 => '\u{0333}',
        0xF6 => '\u{0332}',
        0xF7 => '\u{0326}',
        0xF8 => '\u{031C}',
        0xF9 => '\u{032E}',
        0xFA => '\u{FE22}',
        0xFB => '\u{FE23}',
        0xFE => '\u{0313}',
        _ => return None,
    };
    Some(mark)
}

/// MARC-8 decoder state machine.
///
/// Tracks the G0 (bytes 0x21-0x7E) and G1 (0xA1-0xFE) character sets across
/// escape sequences and moves each combining mark after the base character
/// it precedes in MARC-8. Designations persist between calls, so one decoder
/// serves all subfields of a field. Bytes with no mapping become U+FFFD.
#[derive(Debug, Clone)]
pub struct Marc8Decoder {
    g0: CharacterSet,
    g1: CharacterSet,
}

impl Default for Marc8Decoder {
    fn default() -> Self {
        Marc8Decoder {
            g0: CharacterSet::BasicLatin,
            g1: CharacterSet::AnselExtendedLatin,
        }
    }
}

impl Marc8Decoder {
    /// Decoder with the MARC-8 defaults: Basic Latin in G0, ANSEL in G1.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn is_default(&self) -> bool {
        self.g0 == CharacterSet::BasicLatin && self.g1 == CharacterSet::AnselExtendedLatin
    }

    /// Decode MARC-8 bytes. The result is not normalized.
    pub fn decode(&mut self, bytes: &[u8]) -> String {
        let mut out = String::with_capacity(bytes.len());
        let mut marks: Vec<char> = Vec::new();
        let mut i = 0;

        while i < bytes.len() {
            let byte = bytes[i];

            if byte == ESC {
                match self.escape(&bytes[i + 1..]) {
                    Some(consumed) => i += 1 + consumed,
                    None => {
                        out.push('\u{FFFD}');
                        break;
                    },
                }
                continue;
            }

            // C0/C1 controls carry no text
            if byte < 0x20 || byte == 0x7F || (0x80..0xA0).contains(&byte) {
                i += 1;
                continue;
            }

            let set = if byte >= 0xA0 { self.g1 } else { self.g0 };
            if set == CharacterSet::Eacc {
                out.push('\u{FFFD}');
                i += 3;
                continue;
            }

            let decoded = if byte == b' ' {
                Some((' ', false))
            } else {
                set.lookup(byte)
            };
            match decoded {
                Some((mark, true)) => marks.push(mark),
                Some((base, false)) => {
                    out.push(base);
                    out.extend(marks.drain(..));
                },
                None => {
                    out.push('\u{FFFD}');
                    out.extend(marks.drain(..));
                },
            }
            i += 1;
        }

        out.extend(marks);
        out
    }

    /// Apply the escape sequence following an ESC byte. Returns the number of
    /// bytes consumed after ESC, or `None` when the sequence is cut off.
    fn escape(&mut self, rest: &[u8]) -> Option<usize> {
        let (&intermediate, tail) = rest.split_first()?;
        match intermediate {
            // ESC ( F / ESC , F: designate G0
            b'(' | b',' => {
                self.g0 = CharacterSet::from_final_byte(*tail.first()?);
                Some(2)
            },
            // ESC ) F / ESC - F: designate G1
            b')' | b'-' => {
                self.g1 = CharacterSet::from_final_byte(*tail.first()?);
                Some(2)
            },
            // ESC $ F, ESC $ ( F, ESC $ ) F: multibyte designations
            b'$' => match *tail.first()? {
                b'(' | b',' => {
                    self.g0 = CharacterSet::from_final_byte(*tail.get(1)?);
                    Some(3)
                },
                b')' | b'-' => {
                    self.g1 = CharacterSet::from_final_byte(*tail.get(1)?);
                    Some(3)
                },
                final_byte => {
                    self.g0 = CharacterSet::from_final_byte(final_byte);
                    Some(2)
                },
            },
            // Locking shifts of G0 to MARC's own technique sets
            b's' | b'b' | b'p' | b'g' => {
                self.g0 = CharacterSet::from_final_byte(intermediate);
                Some(1)
            },
            _ => Some(1),
        }
    }
}

/// Decodes the text of one field.
///
/// Create one per field and feed it each subfield value in order.
#[derive(Debug, Clone)]
pub struct FieldDecoder {
    encoding: MarcEncoding,
    marc8: Marc8Decoder,
}

impl FieldDecoder {
    /// Decoder for a record with the given encoding.
    #[must_use]
    pub fn new(encoding: MarcEncoding) -> Self {
        FieldDecoder {
            encoding,
            marc8: Marc8Decoder::new(),
        }
    }

    /// Decode one value into normalized UTF-8 text. Never fails.
    pub fn decode(&mut self, bytes: &[u8]) -> String {
        let text = match self.encoding {
            MarcEncoding::Utf8 => String::from_utf8_lossy(bytes),
            MarcEncoding::Marc8 => match std::str::from_utf8(bytes) {
                Ok(text) if self.marc8.is_default() && !bytes.contains(&ESC) => {
                    Cow::Borrowed(text)
                },
                _ => Cow::Owned(self.marc8.decode(bytes)),
            },
        };

        if text.is_ascii() {
            text.into_owned()
        } else {
            text.nfc().collect()
        }
    }
}

/// Decode a standalone value into normalized UTF-8 text. Never fails.
#[must_use]
pub fn decode_lossy(bytes: &[u8], encoding: MarcEncoding) -> String {
    FieldDecoder::new(encoding).decode(bytes)
}
