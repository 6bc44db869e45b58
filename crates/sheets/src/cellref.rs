//! A1 표기 셀 주소 유틸리티

/// 0-기반 열 인덱스를 A1 표기 열 문자로 변환 (0 -> "A", 25 -> "Z", 26 -> "AA")
pub fn column_letter(mut idx: usize) -> String {
    let mut letters = Vec::new();
    loop {
        letters.push(b'A' + (idx % 26) as u8);
        if idx < 26 {
            break;
        }
        idx = idx / 26 - 1;
    }
    letters.reverse();
    String::from_utf8(letters).expect("ascii letters")
}

/// "시트명!L5" 형태의 셀 주소 생성. row는 1-기반 시트 행 번호.
pub fn cell_ref(sheet: &str, col: usize, row: usize) -> String {
    format!("{}!{}{}", sheet, column_letter(col), row)
}

/// 셀 주소를 (시트명, 0-기반 열, 1-기반 행)으로 분해
pub fn parse_cell_ref(cell: &str) -> Option<(&str, usize, usize)> {
    let (sheet, addr) = cell.split_once('!')?;
    let letters: String = addr.chars().take_while(|c| c.is_ascii_alphabetic()).collect();
    let digits = &addr[letters.len()..];
    if letters.is_empty() || digits.is_empty() {
        return None;
    }

    let mut col = 0usize;
    for c in letters.chars() {
        col = col * 26 + (c.to_ascii_uppercase() as usize - 'A' as usize + 1);
    }
    let row: usize = digits.parse().ok()?;
    Some((sheet, col - 1, row))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_letters_roundtrip() {
        assert_eq!(column_letter(0), "A");
        assert_eq!(column_letter(11), "L");
        assert_eq!(column_letter(19), "T");
        assert_eq!(column_letter(25), "Z");
        assert_eq!(column_letter(26), "AA");
    }

    #[test]
    fn cell_ref_format_and_parse() {
        let cell = cell_ref("당일작업", 11, 5);
        assert_eq!(cell, "당일작업!L5");
        assert_eq!(parse_cell_ref(&cell), Some(("당일작업", 11, 5)));
    }

    #[test]
    fn parse_rejects_malformed() {
        assert_eq!(parse_cell_ref("당일작업"), None);
        assert_eq!(parse_cell_ref("당일작업!5"), None);
        assert_eq!(parse_cell_ref("당일작업!L"), None);
    }
}
