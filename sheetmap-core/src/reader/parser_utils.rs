//! Cell reference helpers shared by the XML parsers and the validator boundary

/// Parse a cell reference like "A1" into (row, col) as 0-based indices
pub fn parse_cell_ref(cell_ref: &str) -> Option<(u32, u32)> {
    let mut col = 0u32;
    let mut row_str = String::new();

    for ch in cell_ref.chars() {
        if ch.is_ascii_alphabetic() {
            col = col
                .checked_mul(26)?
                .checked_add(ch.to_ascii_uppercase() as u32 - 'A' as u32 + 1)?;
        } else if ch.is_ascii_digit() {
            row_str.push(ch);
        }
    }

    if row_str.is_empty() || col == 0 {
        return None;
    }

    let row = row_str.parse::<u32>().ok()?;

    // Convert to 0-based
    Some((row.saturating_sub(1), col - 1))
}

/// Convert column number to letter (0 -> A, 1 -> B, 26 -> AA)
pub fn col_to_letter(mut col: u32) -> String {
    let mut result = String::new();
    loop {
        result.insert(0, (b'A' + (col % 26) as u8) as char);
        if col < 26 {
            break;
        }
        col = col / 26 - 1;
    }
    result
}

/// Render 0-based (row, col) as an A1-style reference
pub fn to_cell_ref(row: u32, col: u32) -> String {
    format!("{}{}", col_to_letter(col), row + 1)
}
