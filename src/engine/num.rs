//! Script number encoding
//!
//! Numbers on the stack are little-endian, sign-magnitude, with the sign in
//! the high bit of the last byte. Zero is the empty vector.

use super::EngineError;

/// Default operand size for arithmetic opcodes
pub const DEFAULT_NUM_LEN: usize = 4;

/// Operand size accepted by the time-lock opcodes
pub const LOCKTIME_NUM_LEN: usize = 5;

/// Decode a stack element as a script number no longer than `max_len` bytes
pub fn decode(item: &[u8], max_len: usize) -> Result<i64, EngineError> {
    if item.len() > max_len {
        return Err(EngineError::NumberTooBig(item.to_vec()));
    }
    if item.is_empty() {
        return Ok(0);
    }

    let mut result: i64 = 0;
    for (i, byte) in item.iter().enumerate() {
        result |= (*byte as i64) << (8 * i);
    }

    // Sign bit lives in the last byte
    let last = item[item.len() - 1];
    if last & 0x80 != 0 {
        let mask = !(0x80_i64 << (8 * (item.len() - 1)));
        return Ok(-(result & mask));
    }

    Ok(result)
}

/// Encode a number in minimal script form
pub fn encode(value: i64) -> Vec<u8> {
    if value == 0 {
        return Vec::new();
    }

    let negative = value < 0;
    let mut magnitude = value.unsigned_abs();
    let mut result = Vec::new();
    while magnitude > 0 {
        result.push((magnitude & 0xff) as u8);
        magnitude >>= 8;
    }

    // An extra byte is needed when the high bit is already taken
    let last = result.len() - 1;
    if result[last] & 0x80 != 0 {
        result.push(if negative { 0x80 } else { 0x00 });
    } else if negative {
        result[last] |= 0x80;
    }

    result
}

/// Encode a boolean the way comparison opcodes push it
pub fn from_bool(value: bool) -> Vec<u8> {
    if value {
        vec![1]
    } else {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_small_values() {
        assert_eq!(encode(0), Vec::<u8>::new());
        assert_eq!(encode(1), vec![0x01]);
        assert_eq!(encode(-1), vec![0x81]);
        assert_eq!(encode(127), vec![0x7f]);
        assert_eq!(encode(128), vec![0x80, 0x00]);
        assert_eq!(encode(-128), vec![0x80, 0x80]);
        assert_eq!(encode(256), vec![0x00, 0x01]);
    }

    #[test]
    fn test_decode_sign_bit() {
        assert_eq!(decode(&[0x81], 4).unwrap(), -1);
        assert_eq!(decode(&[0x80, 0x80], 4).unwrap(), -128);
        assert_eq!(decode(&[0x00, 0x80], 4).unwrap(), 0);
        assert_eq!(decode(&[0xff, 0xff, 0xff, 0x7f], 4).unwrap(), i32::MAX as i64);
    }

    #[test]
    fn test_decode_rejects_oversized_operand() {
        let err = decode(&[0x01, 0x02, 0x03, 0x04, 0x05], DEFAULT_NUM_LEN).unwrap_err();
        assert!(matches!(err, EngineError::NumberTooBig(_)));
        assert_eq!(
            decode(&[0x00, 0x00, 0x00, 0x00, 0x01], LOCKTIME_NUM_LEN).unwrap(),
            1 << 32
        );
    }
}
