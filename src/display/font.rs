/// Column bitmaps of the 5x7 display font. Bit `n` of a column is row `n`
/// from the top; only the low seven bits are drawn.
pub(crate) const GLYPH_WIDTH: i32 = 5;
pub(crate) const GLYPH_HEIGHT: i32 = 7;

/// Horizontal cursor advance per character: glyph width plus one blank column.
pub(crate) const GLYPH_ADVANCE: i32 = GLYPH_WIDTH + 1;

const BLANK: [u8; 5] = [0x00, 0x00, 0x00, 0x00, 0x00];

/// Looks up the glyph of `c`, matched case-insensitively.
/// Characters outside the table render blank.
pub(crate) fn glyph(c: char) -> &'static [u8; 5] {
    match c.to_ascii_uppercase() {
        'A' => &[0x7C, 0x12, 0x11, 0x12, 0x7C],
        'B' => &[0x7F, 0x49, 0x49, 0x49, 0x36],
        'C' => &[0x3E, 0x41, 0x41, 0x41, 0x22],
        'D' => &[0x7F, 0x41, 0x41, 0x22, 0x1C],
        'E' => &[0x7F, 0x49, 0x49, 0x49, 0x41],
        'F' => &[0x7F, 0x09, 0x09, 0x09, 0x01],
        'G' => &[0x3E, 0x41, 0x49, 0x49, 0x7A],
        'H' => &[0x7F, 0x08, 0x08, 0x08, 0x7F],
        'I' => &[0x00, 0x41, 0x7F, 0x41, 0x00],
        'J' => &[0x20, 0x40, 0x41, 0x3F, 0x01],
        'K' => &[0x7F, 0x08, 0x14, 0x22, 0x41],
        'L' => &[0x7F, 0x40, 0x40, 0x40, 0x40],
        'M' => &[0x7F, 0x02, 0x0C, 0x02, 0x7F],
        'N' => &[0x7F, 0x04, 0x08, 0x10, 0x7F],
        'O' => &[0x3E, 0x41, 0x41, 0x41, 0x3E],
        'P' => &[0x7F, 0x09, 0x09, 0x09, 0x06],
        'Q' => &[0x3E, 0x41, 0x51, 0x21, 0x5E],
        'R' => &[0x7F, 0x09, 0x19, 0x29, 0x46],
        'S' => &[0x46, 0x49, 0x49, 0x49, 0x31],
        'T' => &[0x01, 0x01, 0x7F, 0x01, 0x01],
        'U' => &[0x3F, 0x40, 0x40, 0x40, 0x3F],
        'V' => &[0x1F, 0x20, 0x40, 0x20, 0x1F],
        'W' => &[0x3F, 0x40, 0x38, 0x40, 0x3F],
        'X' => &[0x63, 0x14, 0x08, 0x14, 0x63],
        'Y' => &[0x07, 0x08, 0x70, 0x08, 0x07],
        'Z' => &[0x61, 0x51, 0x49, 0x45, 0x43],
        '0' => &[0x3E, 0x51, 0x49, 0x45, 0x3E],
        '1' => &[0x00, 0x42, 0x7F, 0x40, 0x00],
        '2' => &[0x42, 0x61, 0x51, 0x49, 0x46],
        '3' => &[0x21, 0x41, 0x45, 0x4B, 0x31],
        '4' => &[0x18, 0x14, 0x12, 0x7F, 0x10],
        '5' => &[0x27, 0x45, 0x45, 0x45, 0x39],
        '6' => &[0x3C, 0x4A, 0x49, 0x49, 0x30],
        '7' => &[0x01, 0x71, 0x09, 0x05, 0x03],
        '8' => &[0x36, 0x49, 0x49, 0x49, 0x36],
        '9' => &[0x06, 0x49, 0x49, 0x29, 0x1E],
        '!' => &[0x00, 0x00, 0x5F, 0x00, 0x00],
        '?' => &[0x02, 0x01, 0x51, 0x09, 0x06],
        '.' => &[0x00, 0x60, 0x60, 0x00, 0x00],
        ',' => &[0x00, 0x80, 0x60, 0x00, 0x00],
        ':' => &[0x00, 0x36, 0x36, 0x00, 0x00],
        ';' => &[0x00, 0x80, 0x36, 0x00, 0x00],
        '-' => &[0x08, 0x08, 0x08, 0x08, 0x08],
        '+' => &[0x08, 0x08, 0x3E, 0x08, 0x08],
        '=' => &[0x14, 0x14, 0x14, 0x14, 0x14],
        '/' => &[0x20, 0x10, 0x08, 0x04, 0x02],
        '\\' => &[0x02, 0x04, 0x08, 0x10, 0x20],
        '*' => &[0x14, 0x08, 0x3E, 0x08, 0x14],
        '(' => &[0x00, 0x1C, 0x22, 0x41, 0x00],
        ')' => &[0x00, 0x41, 0x22, 0x1C, 0x00],
        '[' => &[0x00, 0x7F, 0x41, 0x41, 0x00],
        ']' => &[0x00, 0x41, 0x41, 0x7F, 0x00],
        '{' => &[0x00, 0x08, 0x36, 0x41, 0x00],
        '}' => &[0x00, 0x41, 0x36, 0x08, 0x00],
        '#' => &[0x14, 0x7F, 0x14, 0x7F, 0x14],
        '$' => &[0x24, 0x2A, 0x7F, 0x2A, 0x12],
        '%' => &[0x23, 0x13, 0x08, 0x64, 0x62],
        '&' => &[0x36, 0x49, 0x56, 0x20, 0x50],
        '<' => &[0x08, 0x14, 0x22, 0x41, 0x00],
        '>' => &[0x00, 0x41, 0x22, 0x14, 0x08],
        '\'' => &[0x00, 0x00, 0x07, 0x00, 0x00],
        '"' => &[0x00, 0x07, 0x00, 0x07, 0x00],
        '`' => &[0x00, 0x01, 0x02, 0x00, 0x00],
        '~' => &[0x04, 0x02, 0x04, 0x08, 0x04],
        '_' => &[0x40, 0x40, 0x40, 0x40, 0x40],
        '|' => &[0x00, 0x00, 0x7F, 0x00, 0x00],
        _ => &BLANK,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_ignores_case() {
        assert_eq!(glyph('a'), glyph('A'));
        assert_eq!(glyph('q'), &[0x3E, 0x41, 0x51, 0x21, 0x5E]);
    }

    #[test]
    fn unmapped_characters_are_blank() {
        assert_eq!(glyph(' '), &BLANK);
        assert_eq!(glyph('\u{e9}'), &BLANK);
        assert_eq!(glyph('@'), &BLANK);
    }
}
