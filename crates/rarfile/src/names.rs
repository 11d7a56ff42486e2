//! Entry name handling shared by both decoders.
//!
//! Names are compared and stored in one canonical form: `/` separators, no
//! trailing NULs. Lookups are case-insensitive so that callers can use names
//! coming from case-insensitive sources (document links, user input).

/// Replace `\` separators with `/`.
pub fn normalize_separators(name: &str) -> String {
    name.replace('\\', "/")
}

/// Case-insensitive equality using Unicode lowercase mappings.
pub fn eq_ignore_case(a: &str, b: &str) -> bool {
    a.chars()
        .flat_map(char::to_lowercase)
        .eq(b.chars().flat_map(char::to_lowercase))
}

/// Decode the raw name field of a RAR 1.5-4.x file header.
///
/// When the header carries the Unicode flag the field holds an 8-bit name,
/// a NUL, then a compact UTF-16 encoding that references the 8-bit name. A
/// Unicode-flagged field without a NUL is plain UTF-8.
pub fn decode_file_name(raw: &[u8], unicode: bool) -> String {
    let name = if unicode {
        match raw.iter().position(|&b| b == 0) {
            Some(nul) => String::from_utf16_lossy(&decode_unicode(&raw[..nul], &raw[nul + 1..])),
            None => String::from_utf8_lossy(raw).into_owned(),
        }
    } else {
        let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
        decode_oem(&raw[..end])
    };
    normalize_separators(&name)
}

/// Decode a name without the Unicode flag.
///
/// Such names are written in the creator's OEM code page. UTF-8 is kept as
/// is; anything else is read as code page 437.
fn decode_oem(raw: &[u8]) -> String {
    match std::str::from_utf8(raw) {
        Ok(name) => name.to_string(),
        Err(_) => raw
            .iter()
            .map(|&b| match b {
                0x00..=0x7F => char::from(b),
                _ => CP437_HIGH[usize::from(b - 0x80)],
            })
            .collect(),
    }
}

/// Code page 437, bytes 0x80 to 0xFF.
const CP437_HIGH: [char; 128] = [
    'Ç', 'ü', 'é', 'â', 'ä', 'à', 'å', 'ç', 'ê', 'ë', 'è', 'ï', 'î', 'ì', 'Ä', 'Å',
    'É', 'æ', 'Æ', 'ô', 'ö', 'ò', 'û', 'ù', 'ÿ', 'Ö', 'Ü', '¢', '£', '¥', '₧', 'ƒ',
    'á', 'í', 'ó', 'ú', 'ñ', 'Ñ', 'ª', 'º', '¿', '⌐', '¬', '½', '¼', '¡', '«', '»',
    '░', '▒', '▓', '│', '┤', '╡', '╢', '╖', '╕', '╣', '║', '╗', '╝', '╜', '╛', '┐',
    '└', '┴', '┬', '├', '─', '┼', '╞', '╟', '╚', '╔', '╩', '╦', '╠', '═', '╬', '╧',
    '╨', '╤', '╥', '╙', '╘', '╒', '╓', '╫', '╪', '┘', '┌', '█', '▄', '▌', '▐', '▀',
    'α', 'ß', 'Γ', 'π', 'Σ', 'σ', 'µ', 'τ', 'Φ', 'Θ', 'Ω', 'δ', '∞', 'φ', 'ε', '∩',
    '≡', '±', '≥', '≤', '⌠', '⌡', '÷', '≈', '°', '∙', '·', '√', 'ⁿ', '²', '■', '\u{a0}',
];

fn decode_unicode(name: &[u8], enc: &[u8]) -> Vec<u16> {
    let mut out: Vec<u16> = Vec::with_capacity(name.len());
    let Some(&high) = enc.first() else {
        return out;
    };
    let high = u16::from(high) << 8;
    let mut pos = 1;
    let mut flags = 0u8;
    let mut flag_bits = 0;

    while pos < enc.len() {
        if flag_bits == 0 {
            flags = enc[pos];
            pos += 1;
            flag_bits = 8;
        }
        match flags >> 6 {
            0 => {
                let Some(&b) = enc.get(pos) else { break };
                out.push(u16::from(b));
                pos += 1;
            }
            1 => {
                let Some(&b) = enc.get(pos) else { break };
                out.push(u16::from(b) | high);
                pos += 1;
            }
            2 => {
                let (Some(&lo), Some(&hi)) = (enc.get(pos), enc.get(pos + 1)) else {
                    break;
                };
                out.push(u16::from_le_bytes([lo, hi]));
                pos += 2;
            }
            _ => {
                let Some(&length) = enc.get(pos) else { break };
                pos += 1;
                if length & 0x80 != 0 {
                    let Some(&correction) = enc.get(pos) else { break };
                    pos += 1;
                    for _ in 0..usize::from(length & 0x7f) + 2 {
                        let Some(&c) = name.get(out.len()) else { break };
                        out.push(u16::from(c.wrapping_add(correction)) | high);
                    }
                } else {
                    for _ in 0..usize::from(length) + 2 {
                        let Some(&c) = name.get(out.len()) else { break };
                        out.push(u16::from(c));
                    }
                }
            }
        }
        flags <<= 2;
        flag_bits -= 2;
    }

    out
}
