//! Key report decoding
//!
//! Each report layout carries a fixed table of `(byte, mask, key)` entries.
//! The layout is chosen once per read from the report length and, for the
//! G13, the first byte. A decoded report is the full set of keys held down
//! at that moment, not a delta against the previous one.

use bitflags::bitflags;
use g15_transport::Capabilities;

/// Bytes requested per key read
pub const KEY_READ_LENGTH: usize = 9;

/// First byte of a regular key report
pub const REPORT_MARKER: u8 = 0x02;
/// First byte of the extended 5-byte report (G1-G18)
pub const EXTENDED_REPORT_MARKER: u8 = 0x03;
/// First byte of a G13 report
pub const G13_REPORT_MARKER: u8 = 0x25;
/// First byte meaning "nothing new yet"
pub const NO_DATA_MARKER: u8 = 0x01;

bitflags! {
    /// Set of logical keys held down
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct KeyState: u64 {
        const G1  = 1 << 0;
        const G2  = 1 << 1;
        const G3  = 1 << 2;
        const G4  = 1 << 3;
        const G5  = 1 << 4;
        const G6  = 1 << 5;
        const G7  = 1 << 6;
        const G8  = 1 << 7;
        const G9  = 1 << 8;
        const G10 = 1 << 9;
        const G11 = 1 << 10;
        const G12 = 1 << 11;
        const G13 = 1 << 12;
        const G14 = 1 << 13;
        const G15 = 1 << 14;
        const G16 = 1 << 15;
        const G17 = 1 << 16;
        const G18 = 1 << 17;
        const G19 = 1 << 18;
        const G20 = 1 << 19;
        const G21 = 1 << 20;
        const G22 = 1 << 21;

        const M1 = 1 << 22;
        const M2 = 1 << 23;
        const M3 = 1 << 24;
        const MR = 1 << 25;

        const L1 = 1 << 26;
        const L2 = 1 << 27;
        const L3 = 1 << 28;
        const L4 = 1 << 29;
        const L5 = 1 << 30;

        const LIGHT        = 1 << 31;
        const HEADSET_MUTE = 1 << 32;

        // G13 joystick buttons
        const JOY_LEFT  = 1 << 33;
        const JOY_DOWN  = 1 << 34;
        const JOY_STICK = 1 << 35;
    }
}

impl KeyState {
    /// Names of the held keys, in declaration order
    pub fn key_names(&self) -> Vec<&'static str> {
        self.iter_names().map(|(name, _)| name).collect()
    }

    /// Keys in `self` that are not in `previous`
    pub fn pressed_since(&self, previous: KeyState) -> KeyState {
        self.difference(previous)
    }

    /// Keys in `previous` that are not in `self`
    pub fn released_since(&self, previous: KeyState) -> KeyState {
        previous.difference(*self)
    }
}

impl std::fmt::Display for KeyState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            return f.write_str("(none)");
        }
        f.write_str(&self.key_names().join(" "))
    }
}

/// One bit of a report
type BitEntry = (usize, u8, KeyState);

const FOUR_BYTE_TABLE: &[BitEntry] = &[
    (1, 0x01, KeyState::G1),
    (1, 0x02, KeyState::G2),
    (1, 0x04, KeyState::G3),
    (1, 0x08, KeyState::G4),
    (1, 0x10, KeyState::G5),
    (1, 0x20, KeyState::G6),
    (1, 0x40, KeyState::G7),
    (1, 0x80, KeyState::G8),
    (2, 0x01, KeyState::G9),
    (2, 0x02, KeyState::G10),
    (2, 0x04, KeyState::G11),
    (2, 0x08, KeyState::G12),
    (2, 0x10, KeyState::M1),
    (2, 0x20, KeyState::M2),
    (2, 0x40, KeyState::M3),
    (2, 0x80, KeyState::MR),
    (3, 0x01, KeyState::LIGHT),
    (3, 0x02, KeyState::HEADSET_MUTE),
];

const FIVE_BYTE_STANDARD_TABLE: &[BitEntry] = &[
    (1, 0x01, KeyState::G1),
    (1, 0x02, KeyState::G2),
    (1, 0x04, KeyState::G3),
    (1, 0x08, KeyState::G4),
    (1, 0x10, KeyState::G5),
    (1, 0x20, KeyState::G6),
    (1, 0x40, KeyState::M1),
    (1, 0x80, KeyState::M2),
    (2, 0x01, KeyState::LIGHT),
    (2, 0x02, KeyState::L2),
    (2, 0x04, KeyState::L3),
    (2, 0x08, KeyState::L4),
    (2, 0x10, KeyState::L5),
    (2, 0x20, KeyState::M3),
    (2, 0x40, KeyState::MR),
    (2, 0x80, KeyState::L1),
];

const FIVE_BYTE_EXTENDED_TABLE: &[BitEntry] = &[
    (1, 0x01, KeyState::G1),
    (1, 0x02, KeyState::G2),
    (1, 0x04, KeyState::G3),
    (1, 0x08, KeyState::G4),
    (1, 0x10, KeyState::G5),
    (1, 0x20, KeyState::G6),
    (1, 0x40, KeyState::G7),
    (1, 0x80, KeyState::G8),
    (2, 0x01, KeyState::G9),
    (2, 0x02, KeyState::G10),
    (2, 0x04, KeyState::G11),
    (2, 0x08, KeyState::G12),
    (2, 0x10, KeyState::G13),
    (2, 0x20, KeyState::G14),
    (2, 0x40, KeyState::G15),
    (2, 0x80, KeyState::G16),
    (3, 0x01, KeyState::G17),
    (3, 0x02, KeyState::G18),
    (3, 0x08, KeyState::LIGHT),
    (3, 0x10, KeyState::M1),
    (3, 0x20, KeyState::M2),
    (3, 0x40, KeyState::M3),
    (3, 0x80, KeyState::MR),
    (4, 0x01, KeyState::L1),
    (4, 0x02, KeyState::L2),
    (4, 0x04, KeyState::L3),
    (4, 0x08, KeyState::L4),
    (4, 0x10, KeyState::L5),
];

// Non-contiguous on purpose: this is the bit order the hardware sends
const NINE_BYTE_TABLE: &[BitEntry] = &[
    (1, 0x01, KeyState::G1),
    (2, 0x02, KeyState::G2),
    (3, 0x04, KeyState::G3),
    (4, 0x08, KeyState::G4),
    (5, 0x10, KeyState::G5),
    (6, 0x20, KeyState::G6),
    (2, 0x01, KeyState::G7),
    (3, 0x02, KeyState::G8),
    (4, 0x04, KeyState::G9),
    (5, 0x08, KeyState::G10),
    (6, 0x10, KeyState::G11),
    (7, 0x20, KeyState::G12),
    (1, 0x04, KeyState::G13),
    (2, 0x08, KeyState::G14),
    (3, 0x10, KeyState::G15),
    (4, 0x20, KeyState::G16),
    (5, 0x40, KeyState::G17),
    (8, 0x40, KeyState::G18),
    (6, 0x01, KeyState::M1),
    (7, 0x02, KeyState::M2),
    (8, 0x04, KeyState::M3),
    (7, 0x40, KeyState::MR),
    (8, 0x80, KeyState::L1),
    (2, 0x80, KeyState::L2),
    (3, 0x80, KeyState::L3),
    (4, 0x80, KeyState::L4),
    (5, 0x80, KeyState::L5),
    (1, 0x80, KeyState::LIGHT),
];

const G13_TABLE: &[BitEntry] = &[
    (3, 0x01, KeyState::G1),
    (3, 0x02, KeyState::G2),
    (3, 0x04, KeyState::G3),
    (3, 0x08, KeyState::G4),
    (3, 0x10, KeyState::G5),
    (3, 0x20, KeyState::G6),
    (3, 0x40, KeyState::G7),
    (3, 0x80, KeyState::G8),
    (4, 0x01, KeyState::G9),
    (4, 0x02, KeyState::G10),
    (4, 0x04, KeyState::G11),
    (4, 0x08, KeyState::G12),
    (4, 0x10, KeyState::G13),
    (4, 0x20, KeyState::G14),
    (4, 0x40, KeyState::G15),
    (4, 0x80, KeyState::G16),
    (5, 0x01, KeyState::G17),
    (5, 0x02, KeyState::G18),
    (5, 0x04, KeyState::G19),
    (5, 0x08, KeyState::G20),
    (5, 0x10, KeyState::G21),
    (5, 0x20, KeyState::G22),
    (5, 0x80, KeyState::LIGHT),
    (6, 0x01, KeyState::L1),
    (6, 0x02, KeyState::L2),
    (6, 0x04, KeyState::L3),
    (6, 0x08, KeyState::L4),
    (6, 0x10, KeyState::L5),
    (6, 0x20, KeyState::M1),
    (6, 0x40, KeyState::M2),
    (6, 0x80, KeyState::M3),
    (7, 0x01, KeyState::MR),
    (7, 0x02, KeyState::JOY_LEFT),
    (7, 0x04, KeyState::JOY_DOWN),
    (7, 0x08, KeyState::JOY_STICK),
];

/// Key report layouts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportLayout {
    /// G15 (4 bytes, marker 0x02)
    FourByte,
    /// G15 v2 and friends (5 bytes, marker 0x02)
    FiveByteStandard,
    /// Extended G1-G18 (5 bytes, marker 0x03)
    FiveByteExtended,
    /// G11 / G510 (9 bytes, marker 0x02)
    NineByte,
    /// G13 (marker 0x25, any length)
    G13,
}

impl ReportLayout {
    /// Pick the layout for a report, or `None` when the shape is unknown
    pub fn select(report: &[u8], caps: Capabilities) -> Option<Self> {
        let first = *report.first()?;
        if caps.is_g13() && first == G13_REPORT_MARKER {
            return Some(ReportLayout::G13);
        }
        match report.len() {
            4 => Some(ReportLayout::FourByte),
            5 if first == EXTENDED_REPORT_MARKER => Some(ReportLayout::FiveByteExtended),
            5 => Some(ReportLayout::FiveByteStandard),
            9 => Some(ReportLayout::NineByte),
            _ => None,
        }
    }

    /// Expected first byte
    pub const fn marker(&self) -> u8 {
        match self {
            ReportLayout::FiveByteExtended => EXTENDED_REPORT_MARKER,
            ReportLayout::G13 => G13_REPORT_MARKER,
            _ => REPORT_MARKER,
        }
    }

    const fn table(&self) -> &'static [BitEntry] {
        match self {
            ReportLayout::FourByte => FOUR_BYTE_TABLE,
            ReportLayout::FiveByteStandard => FIVE_BYTE_STANDARD_TABLE,
            ReportLayout::FiveByteExtended => FIVE_BYTE_EXTENDED_TABLE,
            ReportLayout::NineByte => NINE_BYTE_TABLE,
            ReportLayout::G13 => G13_TABLE,
        }
    }

    /// Decode a report; a wrong marker decodes to no keys
    pub fn decode(&self, report: &[u8]) -> KeyState {
        if report.first() != Some(&self.marker()) {
            return KeyState::empty();
        }
        self.table()
            .iter()
            .filter(|(byte, mask, _)| report.get(*byte).is_some_and(|b| b & mask != 0))
            .fold(KeyState::empty(), |acc, (_, _, key)| acc | *key)
    }
}

/// Result of decoding one read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyReport {
    /// Complete set of keys currently held
    Keys(KeyState),
    /// Report shape not recognised, nothing changed
    NoChange,
    /// Device has no data yet
    TryAgain,
}

/// Decode one raw read the way the poll path does
pub fn decode_report(report: &[u8], caps: Capabilities) -> KeyReport {
    match report.first() {
        None => KeyReport::NoChange,
        Some(&NO_DATA_MARKER) => KeyReport::TryAgain,
        Some(_) => match ReportLayout::select(report, caps) {
            Some(layout) => KeyReport::Keys(layout.decode(report)),
            None => KeyReport::NoChange,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_LAYOUTS: [ReportLayout; 5] = [
        ReportLayout::FourByte,
        ReportLayout::FiveByteStandard,
        ReportLayout::FiveByteExtended,
        ReportLayout::NineByte,
        ReportLayout::G13,
    ];

    fn report_len(layout: ReportLayout) -> usize {
        match layout {
            ReportLayout::FourByte => 4,
            ReportLayout::FiveByteStandard | ReportLayout::FiveByteExtended => 5,
            ReportLayout::NineByte | ReportLayout::G13 => 9,
        }
    }

    /// Every table bit decodes to exactly its own key
    #[test]
    fn test_every_bit_maps_to_one_key() {
        for layout in ALL_LAYOUTS {
            for &(byte, mask, key) in layout.table() {
                let mut report = vec![0u8; report_len(layout)];
                report[0] = layout.marker();
                report[byte] = mask;
                assert_eq!(
                    layout.decode(&report),
                    key,
                    "{:?} byte {} mask {:#04x}",
                    layout,
                    byte,
                    mask
                );
            }
        }
    }

    #[test]
    fn test_tables_have_no_duplicate_bits_or_keys() {
        for layout in ALL_LAYOUTS {
            let table = layout.table();
            for (i, a) in table.iter().enumerate() {
                for b in &table[i + 1..] {
                    assert!((a.0, a.1) != (b.0, b.1), "{:?} duplicate bit", layout);
                    assert_ne!(a.2, b.2, "{:?} duplicate key", layout);
                }
            }
        }
    }

    #[test]
    fn test_unmapped_bits_are_ignored() {
        // 4-byte layout uses only two bits of byte 3
        let report = [REPORT_MARKER, 0, 0, 0xFC];
        assert!(ReportLayout::FourByte.decode(&report).is_empty());
    }

    #[test]
    fn test_four_byte_g1() {
        assert_eq!(
            decode_report(&[0x02, 0x01, 0x00, 0x00], Capabilities::empty()),
            KeyReport::Keys(KeyState::G1)
        );
    }

    #[test]
    fn test_no_data_marker() {
        assert_eq!(
            decode_report(&[0x01, 0, 0, 0], Capabilities::empty()),
            KeyReport::TryAgain
        );
    }

    #[test]
    fn test_unknown_lengths() {
        let caps = Capabilities::empty();
        assert_eq!(decode_report(&[], caps), KeyReport::NoChange);
        assert_eq!(decode_report(&[0x02, 0xFF], caps), KeyReport::NoChange);
        assert_eq!(decode_report(&[0x02; 7], caps), KeyReport::NoChange);
    }

    #[test]
    fn test_wrong_marker_is_empty_set() {
        assert_eq!(
            decode_report(&[0x05, 0xFF, 0xFF, 0xFF], Capabilities::empty()),
            KeyReport::Keys(KeyState::empty())
        );
    }

    #[test]
    fn test_five_byte_variants() {
        let caps = Capabilities::FIVE_BYTE_REPORT;
        assert_eq!(
            decode_report(&[0x02, 0x40, 0x80, 0, 0], caps),
            KeyReport::Keys(KeyState::M1 | KeyState::L1)
        );
        assert_eq!(
            decode_report(&[0x03, 0, 0, 0x03, 0x10], caps),
            KeyReport::Keys(KeyState::G17 | KeyState::G18 | KeyState::L5)
        );
    }

    #[test]
    fn test_nine_byte_combination() {
        let report = [0x02, 0x81, 0x00, 0x00, 0x00, 0x00, 0x00, 0x42, 0x00];
        assert_eq!(
            decode_report(&report, Capabilities::KEYS),
            KeyReport::Keys(KeyState::G1 | KeyState::LIGHT | KeyState::M2 | KeyState::MR)
        );
    }

    #[test]
    fn test_g13_requires_capability() {
        let report = [0x25, 0, 0, 0x01, 0, 0, 0, 0x02];
        assert_eq!(
            decode_report(&report, Capabilities::MODEL_G13),
            KeyReport::Keys(KeyState::G1 | KeyState::JOY_LEFT)
        );
        // Without the G13 flag an 8-byte report has no layout
        assert_eq!(
            decode_report(&report, Capabilities::KEYS),
            KeyReport::NoChange
        );
    }

    #[test]
    fn test_g13_short_report_is_safe() {
        assert_eq!(
            decode_report(&[0x25, 0, 0, 0x80], Capabilities::MODEL_G13),
            KeyReport::Keys(KeyState::G8)
        );
    }

    #[test]
    fn test_g13_marker_on_other_models() {
        // Without the capability a 0x25 4-byte report falls through to the
        // 4-byte layout and its marker does not match
        assert_eq!(
            decode_report(&[0x25, 0xFF, 0xFF, 0xFF], Capabilities::KEYS),
            KeyReport::Keys(KeyState::empty())
        );
    }

    #[test]
    fn test_display_and_diff() {
        let now = KeyState::G1 | KeyState::M1;
        let before = KeyState::M1 | KeyState::L2;
        assert_eq!(now.to_string(), "G1 M1");
        assert_eq!(KeyState::empty().to_string(), "(none)");
        assert_eq!(now.pressed_since(before), KeyState::G1);
        assert_eq!(now.released_since(before), KeyState::L2);
    }
}
