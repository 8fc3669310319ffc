//! Windows-1252 conversion for the 8-bit strings carried in query replies.
//!
//! SA-MP servers advertise their name, mode and language as raw single-byte
//! text. Windows-1252 matches what the stock client renders; the five code
//! points it leaves undefined decode to U+FFFD instead of failing.

const REPLACEMENT: char = '\u{FFFD}';

/// Mapping for bytes 0x80..=0x9F, the only range where Windows-1252 and
/// Latin-1 disagree.
const HIGH_CONTROL_RANGE: [char; 32] = [
    '\u{20AC}', REPLACEMENT, '\u{201A}', '\u{0192}', '\u{201E}', '\u{2026}', '\u{2020}', '\u{2021}',
    '\u{02C6}', '\u{2030}', '\u{0160}', '\u{2039}', '\u{0152}', REPLACEMENT, '\u{017D}', REPLACEMENT,
    REPLACEMENT, '\u{2018}', '\u{2019}', '\u{201C}', '\u{201D}', '\u{2022}', '\u{2013}', '\u{2014}',
    '\u{02DC}', '\u{2122}', '\u{0161}', '\u{203A}', '\u{0153}', REPLACEMENT, '\u{017E}', '\u{0178}',
];

/// Decodes every byte to exactly one char. Never fails.
pub fn decode(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&byte| match byte {
            0x80..=0x9F => HIGH_CONTROL_RANGE[(byte - 0x80) as usize],
            _ => byte as char,
        })
        .collect()
}

/// Encodes text for the wire. Chars with no Windows-1252 byte become `?`.
pub fn encode(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c as u32 {
            0x00..=0x7F | 0xA0..=0xFF => c as u8,
            _ => HIGH_CONTROL_RANGE
                .iter()
                .position(|&mapped| mapped == c && mapped != REPLACEMENT)
                .map(|offset| 0x80 + offset as u8)
                .unwrap_or(b'?'),
        })
        .collect()
}
