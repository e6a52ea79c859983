//! +3DOS BASIC program files
//!
//! esxdos only autoboots a tokenized program that carries the 128 byte
//! `PLUS3DOS` header. Listings are kept readable in `embedded/autoboot/` and
//! encoded here: `REM` becomes its keyword token, any other line text (the
//! dot commands) is stored as typed.

use crate::error::{LayoutError, Result};

pub const HEADER_LEN: usize = 128;

const SIGNATURE: &[u8; 8] = b"PLUS3DOS";
const SOFT_EOF: u8 = 0x1A;
const ISSUE: u8 = 1;
const VERSION: u8 = 0;
const BASIC_PROGRAM: u8 = 0;
const TOKEN_REM: u8 = 0xEA;
const ENTER: u8 = 0x0D;
const MAX_LINE_NUMBER: u16 = 9999;

/// Encode `listing` as a +3DOS BASIC file that autostarts at its first line
///
/// Each non-blank line is `<number> <text>` with strictly increasing numbers
/// in 1..=9999 and printable ASCII text. `name` only labels errors.
pub fn encode_program(name: &str, listing: &str) -> Result<Vec<u8>> {
    let mut program = Vec::new();
    let mut autostart = None;
    let mut previous = 0u16;

    for (index, raw) in listing.lines().enumerate() {
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }
        let bad_line = |message: &str| LayoutError::template(name, format!("line {}: {}", index + 1, message));

        let (number, text) = split_line(raw).ok_or_else(|| bad_line("missing line number"))?;
        if number == 0 || number > MAX_LINE_NUMBER || number <= previous {
            return Err(bad_line("line numbers must increase within 1-9999"));
        }
        if !text.bytes().all(|b| (0x20..0x7F).contains(&b)) {
            return Err(bad_line("only printable ASCII is supported"));
        }
        previous = number;
        autostart.get_or_insert(number);

        let body = tokenize(text);
        let body_len = u16::try_from(body.len() + 1).map_err(|_| bad_line("line too long"))?;
        program.extend_from_slice(&number.to_be_bytes());
        program.extend_from_slice(&body_len.to_le_bytes());
        program.extend_from_slice(&body);
        program.push(ENTER);
    }

    let autostart = autostart.ok_or_else(|| LayoutError::template(name, "program has no lines"))?;
    let program_len =
        u16::try_from(program.len()).map_err(|_| LayoutError::template(name, "program too long"))?;
    let file_len = (HEADER_LEN + program.len()) as u32;

    let mut header = [0u8; HEADER_LEN];
    header[0..8].copy_from_slice(SIGNATURE);
    header[8] = SOFT_EOF;
    header[9] = ISSUE;
    header[10] = VERSION;
    header[11..15].copy_from_slice(&file_len.to_le_bytes());
    header[15] = BASIC_PROGRAM;
    header[16..18].copy_from_slice(&program_len.to_le_bytes());
    header[18..20].copy_from_slice(&autostart.to_le_bytes());
    // No variables follow the program
    header[20..22].copy_from_slice(&program_len.to_le_bytes());
    header[HEADER_LEN - 1] = checksum(&header[..HEADER_LEN - 1]);

    let mut file = Vec::with_capacity(HEADER_LEN + program.len());
    file.extend_from_slice(&header);
    file.extend_from_slice(&program);
    Ok(file)
}

/// Sum of the first 127 header bytes, modulo 256
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |sum, b| sum.wrapping_add(*b))
}

fn split_line(line: &str) -> Option<(u16, &str)> {
    let digits = line.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return None;
    }
    let number = line[..digits].parse().ok()?;
    Some((number, line[digits..].trim_start()))
}

fn tokenize(text: &str) -> Vec<u8> {
    let is_rem = text.len() >= 3
        && text[..3].eq_ignore_ascii_case("REM")
        && text[3..].chars().next().map_or(true, |c| c == ' ');
    if is_rem {
        let mut body = vec![TOKEN_REM];
        body.extend_from_slice(text[3..].trim_start().as_bytes());
        body
    } else {
        text.as_bytes().to_vec()
    }
}
