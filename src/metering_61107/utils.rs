use super::{structs::MeterIdentification, FrameError};
use log::debug;

pub const SOH: u8 = 0x01;
pub const STX: u8 = 0x02;
pub const ETX: u8 = 0x03;
pub const ACK: u8 = 0x06;

/// Header of a read request in programming mode
pub const READ_HEADER: &str = "R1";
/// Position of the baud rate / protocol indicator in the sign-on reply
pub const MODE_BYTE_OFFSET: usize = 4;

const FIELD_SEPARATOR: &str = "\r\n";

/// Block check character as this meter family computes it: the 7 bit sum of every
/// byte following the leading SOH/STX up to and including ETX.
pub fn block_check(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, b| acc.wrapping_add(*b)) & 0x7F
}

pub fn sign_on_frame(address: &str) -> Vec<u8> {
    format!("/?{}!\r\n", address).into_bytes()
}

/// ACK '0' <mode> '1' selects programming mode at the speed announced by the meter
pub fn acknowledge_frame(mode: u8) -> Vec<u8> {
    vec![ACK, b'0', mode, b'1', b'\r', b'\n']
}

/// SOH 'B' '0' ETX BCC, ends the session
pub fn break_frame() -> Vec<u8> {
    encode_frame("B0", None)
}

/// SOH <header> STX <body> ETX BCC, e.g. `R1` + `VOLTA()`
pub fn encode_command_frame(header: &str, body: &str) -> Vec<u8> {
    encode_frame(header, Some(body))
}

fn encode_frame(header: &str, body: Option<&str>) -> Vec<u8> {
    let mut frame = vec![SOH];
    frame.extend_from_slice(header.as_bytes());
    if let Some(body) = body {
        frame.push(STX);
        frame.extend_from_slice(body.as_bytes());
    }
    frame.push(ETX);
    let bcc = block_check(&frame[1..]);
    frame.push(bcc);
    frame
}

/// Splits a SOH framed message back into header and body, checking the BCC.
/// Also used for the `P0` reply the meter sends after the acknowledgement.
pub fn decode_command_frame(frame: &[u8]) -> Result<(String, String), FrameError> {
    if frame.first() != Some(&SOH) {
        return Err(FrameError::MissingMarker("SOH"));
    }

    let stx = frame.iter().position(|b| *b == STX)
        .ok_or(FrameError::MissingMarker("STX"))?;
    let etx = stx + frame[stx..].iter().position(|b| *b == ETX)
        .ok_or(FrameError::MissingMarker("ETX"))?;
    let provided = *frame.get(etx + 1).ok_or(FrameError::Truncated)?;

    let calculated = block_check(&frame[1..=etx]);
    if calculated != provided {
        return Err(FrameError::Checksum { calculated, provided });
    }

    let header = String::from_utf8_lossy(&frame[1..stx]).to_string();
    let body = String::from_utf8_lossy(&frame[stx + 1..etx]).to_string();
    Ok((header, body))
}

/// Checks the BCC of a STX framed reply. `None` when the reply carries no
/// ETX/BCC pair, which happens on short reads.
pub fn verify_reply_check(reply: &[u8]) -> Option<bool> {
    if reply.first() != Some(&STX) {
        return None;
    }
    let etx = reply.iter().position(|b| *b == ETX)?;
    let provided = *reply.get(etx + 1)?;
    Some(block_check(&reply[1..=etx]) == provided)
}

/// Splits a command reply into its text fields.
///
/// Example reply: `\x02VOLTA(230.1)\r\nVOLTA(230.5)\r\nVOLTA(229.9)\r\n\x03<bcc>`
///
/// The leading framing byte is dropped, everything from ETX on is cut away and the
/// rest is split on CR-LF. Field positions are kept, only the empty piece after a
/// trailing separator is removed.
pub fn split_reply(reply: &[u8]) -> Vec<String> {
    let body = match reply.first() {
        Some(&STX) | Some(&SOH) => &reply[1..],
        _ => reply,
    };
    let body = match body.iter().position(|b| *b == ETX) {
        Some(etx) => &body[..etx],
        None => body,
    };

    let text = String::from_utf8_lossy(body);
    let mut fields: Vec<String> = text.split(FIELD_SEPARATOR)
        .map(|field| field.trim().to_string())
        .collect();

    if fields.last().map_or(false, |f| f.is_empty()) {
        fields.pop();
    }
    fields
}

/// Removes the `<COMMAND>(` prefix and `)` suffix around a value. Both are optional,
/// a bare `(` prefix is accepted as well.
pub fn strip_wrapper<'a>(field: &'a str, command: &str) -> &'a str {
    let inner = field.strip_prefix(command).unwrap_or(field);
    let inner = inner.strip_prefix('(').unwrap_or(inner);
    inner.strip_suffix(')').unwrap_or(inner).trim()
}

/// Parses the sign-on reply byte by byte.
///
/// Example formats:
/// /EKT5CE303v12
/// /EKT5CE102Mv01
pub fn parse_identification(reply: &[u8]) -> Result<MeterIdentification, FrameError> {
    let line_end = reply.iter()
        .position(|b| *b == b'\r' || *b == b'\n')
        .unwrap_or(reply.len());
    let line = &reply[..line_end];

    if line.len() <= MODE_BYTE_OFFSET {
        return Err(FrameError::Identification { length: line.len() });
    }

    let mode = line[MODE_BYTE_OFFSET];
    if !mode.is_ascii_graphic() {
        return Err(FrameError::InvalidModeByte(mode));
    }

    let manufacturer = if line[0] == b'/' {
        String::from_utf8_lossy(&line[1..MODE_BYTE_OFFSET]).to_string()
    } else {
        String::new()
    };
    let identification = String::from_utf8_lossy(&line[MODE_BYTE_OFFSET + 1..]).to_string();

    debug!("Parsed identification - Manufacturer: {}, Mode: {}, ID: {}",
           manufacturer, mode as char, identification);

    Ok(MeterIdentification {
        manufacturer,
        mode,
        identification,
    })
}
