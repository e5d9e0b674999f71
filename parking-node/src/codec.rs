/**
 * MESH CODEC - text format of the section reports exchanged between peers
 *
 * ROLE :
 * Decodes the compact single-line payloads peers broadcast on the mesh and
 * encodes records for both directions (compact line for the mesh, one record
 * per line for the display controller).
 *
 * FORMAT :
 * - grouped : "<id> <free> <entrance> <elevator>" repeated on one line
 * - legacy  : "<id> <free>", one section per message
 *
 * Decoding never fails: non-numeric fields read as 0 and an incomplete
 * trailing group is dropped and counted.
 */

use crate::models::{SectionMetrics, SectionRecord};
use serde::{Deserialize, Serialize};

/// Shape of the section payloads on the mesh. Fixed per node, never sniffed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireFormat {
    #[default]
    Grouped,
    Legacy,
}

/// Result of decoding one payload.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Decoded {
    /// Records in the order they appeared on the line.
    pub records: Vec<SectionRecord>,
    /// Trailing groups dropped because they were incomplete.
    pub discarded: usize,
}

pub fn decode(payload: &str, format: WireFormat) -> Decoded {
    match format {
        WireFormat::Grouped => decode_grouped(payload),
        WireFormat::Legacy => decode_legacy(payload),
    }
}

fn decode_grouped(payload: &str) -> Decoded {
    let mut out = Decoded::default();
    let mut rest = payload;

    while !rest.is_empty() {
        let Some((id, after_id)) = rest.split_once(' ') else {
            out.discarded += 1;
            break;
        };
        let Some((free, after_free)) = after_id.split_once(' ') else {
            out.discarded += 1;
            break;
        };
        let Some((entrance, after_entrance)) = after_free.split_once(' ') else {
            out.discarded += 1;
            break;
        };
        // last field runs to the next space or to end of line
        let (elevator, next) = after_entrance.split_once(' ').unwrap_or((after_entrance, ""));

        out.records.push((
            id.to_string(),
            SectionMetrics::new(parse_lenient(free), parse_lenient(entrance), parse_lenient(elevator)),
        ));
        rest = next;
    }

    out
}

fn decode_legacy(payload: &str) -> Decoded {
    match payload.split_once(' ') {
        Some((id, spots)) => Decoded {
            records: vec![(id.to_string(), SectionMetrics::spots_only(parse_lenient(spots)))],
            discarded: 0,
        },
        None => Decoded {
            records: Vec::new(),
            discarded: usize::from(!payload.is_empty()),
        },
    }
}

/// Integer parse that never fails.
///
/// Leading whitespace and an optional sign are accepted, then the longest run
/// of ASCII digits. Anything after the digits is ignored, no digits at all
/// gives 0, and out-of-range values saturate.
pub fn parse_lenient(token: &str) -> i32 {
    let s = token.trim_start();
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };

    let mut value: i64 = 0;
    for b in digits.bytes().take_while(u8::is_ascii_digit) {
        value = value * 10 + i64::from(b - b'0');
        if value > i64::from(i32::MAX) + 1 {
            break;
        }
    }
    let value = if negative { -value } else { value };
    value.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

/// Whether `id` survives the wire: spaces separate fields, so an id must be
/// non-empty and free of whitespace.
pub fn is_wire_id(id: &str) -> bool {
    !id.is_empty() && !id.chars().any(char::is_whitespace)
}

/// One record as a single line, without terminator.
pub fn encode_record(id: &str, metrics: &SectionMetrics, format: WireFormat) -> String {
    match format {
        WireFormat::Grouped => format!(
            "{} {} {} {}",
            id, metrics.free_spots, metrics.entrance_score, metrics.elevator_score
        ),
        WireFormat::Legacy => format!("{} {}", id, metrics.free_spots),
    }
}

/// Mesh payloads for a set of records.
///
/// Grouped mode packs every record into one line; legacy mode can only carry
/// one section per message.
pub fn encode_messages<'a, I>(records: I, format: WireFormat) -> Vec<String>
where
    I: IntoIterator<Item = (&'a str, &'a SectionMetrics)>,
{
    let lines = records
        .into_iter()
        .map(|(id, m)| encode_record(id, m, format));

    match format {
        WireFormat::Grouped => {
            let line = lines.collect::<Vec<_>>().join(" ");
            if line.is_empty() { Vec::new() } else { vec![line] }
        }
        WireFormat::Legacy => lines.collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(id: &str, f: i32, e: i32, v: i32) -> SectionRecord {
        (id.to_string(), SectionMetrics::new(f, e, v))
    }

    #[test]
    fn test_decode_two_groups() {
        let d = decode("A 3 10 2 B 5 0 1", WireFormat::Grouped);
        assert_eq!(d.records, vec![rec("A", 3, 10, 2), rec("B", 5, 0, 1)]);
        assert_eq!(d.discarded, 0);
    }

    #[test]
    fn test_decode_legacy_single_field() {
        let d = decode("A 5", WireFormat::Legacy);
        assert_eq!(d.records, vec![rec("A", 5, 0, 0)]);
    }

    #[test]
    fn test_identifier_alone_is_discarded() {
        for format in [WireFormat::Grouped, WireFormat::Legacy] {
            let d = decode("A", format);
            assert!(d.records.is_empty());
            assert_eq!(d.discarded, 1);
        }
    }

    #[test]
    fn test_empty_payload_is_a_noop() {
        assert_eq!(decode("", WireFormat::Grouped), Decoded::default());
        assert_eq!(decode("", WireFormat::Legacy), Decoded::default());
    }

    #[test]
    fn test_incomplete_trailing_group_keeps_leading_groups() {
        let d = decode("A 1 2 3 B 4 5", WireFormat::Grouped);
        assert_eq!(d.records, vec![rec("A", 1, 2, 3)]);
        assert_eq!(d.discarded, 1);
    }

    #[test]
    fn test_trailing_space_after_last_group() {
        let d = decode("A 1 2 3 ", WireFormat::Grouped);
        assert_eq!(d.records, vec![rec("A", 1, 2, 3)]);
        assert_eq!(d.discarded, 0);
    }

    #[test]
    fn test_non_numeric_fields_read_as_zero() {
        let d = decode("A x 7 ?? B 2 y 9", WireFormat::Grouped);
        assert_eq!(d.records, vec![rec("A", 0, 7, 0), rec("B", 2, 0, 9)]);
    }

    #[test]
    fn test_legacy_takes_remainder_as_spots() {
        let d = decode("Level-2 12 extra", WireFormat::Legacy);
        assert_eq!(d.records, vec![rec("Level-2", 12, 0, 0)]);
    }

    #[test]
    fn test_ids_are_case_sensitive() {
        let d = decode("a 1 0 0 A 2 0 0", WireFormat::Grouped);
        assert_eq!(d.records.len(), 2);
        assert_ne!(d.records[0].0, d.records[1].0);
    }

    #[test]
    fn test_parse_lenient() {
        assert_eq!(parse_lenient("42"), 42);
        assert_eq!(parse_lenient("-1"), -1);
        assert_eq!(parse_lenient("+7"), 7);
        assert_eq!(parse_lenient("  12abc"), 12);
        assert_eq!(parse_lenient("abc"), 0);
        assert_eq!(parse_lenient(""), 0);
        assert_eq!(parse_lenient("-"), 0);
        assert_eq!(parse_lenient("99999999999"), i32::MAX);
        assert_eq!(parse_lenient("-99999999999"), i32::MIN);
    }

    #[test]
    fn test_encode_record_both_formats() {
        let m = SectionMetrics::new(3, 10, 2);
        assert_eq!(encode_record("A", &m, WireFormat::Grouped), "A 3 10 2");
        assert_eq!(encode_record("A", &m, WireFormat::Legacy), "A 3");
    }

    #[test]
    fn test_encoded_groups_decode_back() {
        let records = vec![rec("P1", -1, 4, 0), rec("P2", 17, 0, 3), rec("Roof", 0, 9, 9)];
        let msgs = encode_messages(
            records.iter().map(|(id, m)| (id.as_str(), m)),
            WireFormat::Grouped,
        );
        assert_eq!(msgs.len(), 1);

        let d = decode(&msgs[0], WireFormat::Grouped);
        assert_eq!(d.records, records);
    }

    #[test]
    fn test_legacy_encoding_is_one_message_per_section() {
        let a = SectionMetrics::new(3, 10, 2);
        let b = SectionMetrics::new(5, 0, 1);
        let msgs = encode_messages([("A", &a), ("B", &b)], WireFormat::Legacy);
        assert_eq!(msgs, vec!["A 3".to_string(), "B 5".to_string()]);
    }

    #[test]
    fn test_wire_ids() {
        assert!(is_wire_id("P1"));
        assert!(is_wire_id("Level-2"));
        assert!(!is_wire_id(""));
        assert!(!is_wire_id("North lot"));
        assert!(!is_wire_id("P1\t"));
    }

    #[test]
    fn test_encode_nothing() {
        assert!(encode_messages(std::iter::empty(), WireFormat::Grouped).is_empty());
    }
}
