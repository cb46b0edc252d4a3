//! Moving text across the boundary.
//!
//! Host strings go into module-allocated buffers as UTF-8. The initial
//! allocation is sized by the UTF-16 length of the string, so a pure ASCII
//! string needs exactly one allocation and no resize. The first non-ASCII
//! character forces a resize sized by the configured [`StringPassing`].

use tracing::trace;

use crate::config::StringPassing;
use crate::error::BridgeError;
use crate::guest::Guest;

/// Where an encoded string landed. `len` is what the module must use;
/// `capacity` is what was allocated and may be larger.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Transcoded {
    pub ptr: u32,
    pub len: u32,
    pub capacity: u32,
}

/// Worst-case UTF-8 bytes per UTF-16 code unit.
const MAX_BYTES_PER_UNIT: u32 = 3;

pub fn encode<G: Guest + ?Sized>(guest: &mut G, text: &str) -> Result<Transcoded, BridgeError> {
    let strategy = guest.bridge_mut().config().strings;
    let mut capacity = utf16_len(text);
    let mut ptr = guest.malloc(capacity)?;

    let ascii = text.bytes().take_while(u8::is_ascii).count();
    {
        let (memory, bridge) = guest.parts();
        bridge.views.bytes(memory).set(ptr, &text.as_bytes()[..ascii])?;
    }
    let mut len = ascii as u32;
    if ascii == text.len() {
        return Ok(Transcoded { ptr, len, capacity });
    }

    let rest = &text[ascii..];
    match strategy {
        StringPassing::EncodeInto => {
            let grown = len + utf16_len(rest) * MAX_BYTES_PER_UNIT;
            ptr = guest.realloc(ptr, capacity, grown)?;
            capacity = grown;
            let (memory, bridge) = guest.parts();
            let mut view = bridge.views.bytes(memory);
            let tail = view.slice_mut(ptr + len, capacity - len)?;
            len += encode_into(rest, tail) as u32;
        }
        StringPassing::Encode => {
            let encoded = rest.as_bytes();
            let grown = len + encoded.len() as u32;
            ptr = guest.realloc(ptr, capacity, grown)?;
            capacity = grown;
            let (memory, bridge) = guest.parts();
            bridge.views.bytes(memory).set(ptr + len, encoded)?;
            len = grown;
        }
    }
    trace!(ptr, len, capacity, ?strategy, "passed non-ascii string");
    Ok(Transcoded { ptr, len, capacity })
}

/// Writes as many whole characters of `text` as fit and returns the number
/// of bytes written.
pub fn encode_into(text: &str, dest: &mut [u8]) -> usize {
    let mut written = 0;
    for ch in text.chars() {
        let width = ch.len_utf8();
        if written + width > dest.len() {
            break;
        }
        ch.encode_utf8(&mut dest[written..written + width]);
        written += width;
    }
    written
}

/// Reads `len` bytes at `ptr` as UTF-8, replacing invalid sequences.
pub fn decode<G: Guest + ?Sized>(guest: &mut G, ptr: u32, len: u32) -> Result<String, BridgeError> {
    let (memory, bridge) = guest.parts();
    let bytes = bridge.views.bytes(memory).into_slice(ptr, len)?;
    Ok(String::from_utf8_lossy(bytes).into_owned())
}

/// Writes an encoded string as a `(ptr, len)` word pair at `ret`, or a
/// zero pair when there is no string.
pub fn return_string<G: Guest + ?Sized>(
    guest: &mut G,
    ret: u32,
    text: Option<&str>,
) -> Result<(), BridgeError> {
    let (ptr, len) = match text {
        Some(text) => {
            let passed = encode(guest, text)?;
            (passed.ptr, passed.len)
        }
        None => (0, 0),
    };
    let (memory, bridge) = guest.parts();
    let mut words = bridge.views.words(memory);
    words.set(ret / 4, ptr)?;
    words.set(ret / 4 + 1, len)?;
    Ok(())
}

fn utf16_len(text: &str) -> u32 {
    text.encode_utf16().count() as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BridgeConfig;
    use crate::sim::SimGuest;

    fn guest(strings: StringPassing) -> SimGuest {
        SimGuest::new(BridgeConfig {
            strings,
            ..BridgeConfig::default()
        })
    }

    fn read(guest: &SimGuest, passed: Transcoded) -> &str {
        let start = passed.ptr as usize;
        std::str::from_utf8(&guest.memory()[start..start + passed.len as usize]).unwrap()
    }

    #[test]
    fn ascii_needs_no_resize() {
        let mut sim = guest(StringPassing::EncodeInto);
        let passed = encode(&mut sim, "Hello").unwrap();
        assert_eq!(passed.len, 5);
        assert_eq!(passed.capacity, 5);
        assert_eq!(read(&sim, passed), "Hello");
        assert_eq!(sim.reallocs(), 0);
    }

    #[test]
    fn encode_into_overallocates_remainder() {
        let mut sim = guest(StringPassing::EncodeInto);
        let passed = encode(&mut sim, "héllo").unwrap();
        assert_eq!(passed.len, 6);
        assert_eq!(passed.capacity, 1 + 4 * 3);
        assert_eq!(read(&sim, passed), "héllo");
        assert_eq!(sim.reallocs(), 1);
    }

    #[test]
    fn encode_resizes_exactly() {
        let mut sim = guest(StringPassing::Encode);
        let passed = encode(&mut sim, "héllo").unwrap();
        assert_eq!(passed.len, 6);
        assert_eq!(passed.capacity, 6);
        assert_eq!(read(&sim, passed), "héllo");
    }

    #[test]
    fn astral_characters_fit_worst_case_bound() {
        let mut sim = guest(StringPassing::EncodeInto);
        let text = "a\u{1F600}\u{4E2D}";
        let passed = encode(&mut sim, text).unwrap();
        assert_eq!(passed.len as usize, text.len());
        assert!(passed.capacity >= passed.len);
        assert_eq!(read(&sim, passed), text);
    }

    #[test]
    fn empty_string_allocates_nothing_to_write() {
        let mut sim = guest(StringPassing::EncodeInto);
        let passed = encode(&mut sim, "").unwrap();
        assert_eq!((passed.len, passed.capacity), (0, 0));
    }

    #[test]
    fn decode_replaces_invalid_sequences() {
        let mut sim = guest(StringPassing::EncodeInto);
        let (ptr, len) = sim.write_bytes(&[b'o', b'k', 0xFF]);
        assert_eq!(decode(&mut sim, ptr, len).unwrap(), "ok\u{FFFD}");
    }

    #[test]
    fn return_string_writes_word_pair() {
        let mut sim = guest(StringPassing::EncodeInto);
        let ret = sim.malloc(8).unwrap();
        return_string(&mut sim, ret, Some("log")).unwrap();
        let ptr = sim.read_u32(ret);
        let len = sim.read_u32(ret + 4);
        assert_eq!(len, 3);
        assert_eq!(decode(&mut sim, ptr, len).unwrap(), "log");

        return_string(&mut sim, ret, None).unwrap();
        assert_eq!((sim.read_u32(ret), sim.read_u32(ret + 4)), (0, 0));
    }

    #[test]
    fn encode_into_stops_at_char_boundary() {
        let mut dest = [0u8; 3];
        assert_eq!(encode_into("a€", &mut dest), 1);
        assert_eq!(encode_into("€", &mut dest), 3);
    }
}
