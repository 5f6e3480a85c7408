extern crate strum;
#[macro_use]
extern crate strum_macros;

extern crate packed_struct;
#[macro_use]
extern crate packed_struct_codegen;
use packed_struct::prelude::*;

use strum::IntoEnumIterator;

/// Address lines of the display ROM: A10 signed, A9..A8 place, A7..A0 value.
pub const ROM_SIZE: usize = 2048;

/// Common-cathode segment patterns for 0 through 9.
pub const SEGMENT_DIGITS: [u8; 10] = [
    0b0111_1110,
    0b0011_0000,
    0b0110_1101,
    0b0111_1001,
    0b0011_0011,
    0b0101_1011,
    0b0101_1111,
    0b0111_0000,
    0b0111_1111,
    0b0111_1011,
];

#[derive(Clone, Copy, Display, Debug, PartialEq, Eq)]
#[derive(EnumCount, EnumIter, EnumString)]
#[derive(PrimitiveEnum_u8)]
#[strum(serialize_all = "lowercase")]
pub enum DigitPlace {
    Ones = 0,
    Tens = 1,
    Hundreds = 2,
    Sign = 3,
}

#[derive(Debug, PackedStruct)]
#[packed_struct(size_bytes = "2", endian = "lsb", bit_numbering = "lsb0")]
pub struct SegmentEntry {
    #[packed_field(bits = "0..=7")]
    pub value: u8,
    #[packed_field(bits = "8..=9", ty = "enum")]
    pub place: DigitPlace,
    #[packed_field(bits = "10")]
    pub signed: bool,
    #[packed_field(bits = "11..=15")]
    pub reserved: Integer<u8, packed_bits::Bits::<5>>,
}

impl SegmentEntry {
    pub fn new(value: u8, place: DigitPlace, signed: bool) -> SegmentEntry {
        SegmentEntry { value, place, signed, reserved: 0.into() }
    }

    pub fn pack_lsb(&self) -> Result<[u8; 2], PackingError> {
        let bytes = self.pack()?;
        Ok([bytes[1], bytes[0]])
    }

    pub fn to_index(&self) -> Result<u16, PackingError> {
        Ok(u16::from_le_bytes(self.pack_lsb()?))
    }

    pub fn from_index(index: u16) -> Result<SegmentEntry, PackingError> {
        let bytes = index.to_le_bytes();
        let entry = SegmentEntry::unpack(&[bytes[1], bytes[0]])?;
        if *entry.reserved != 0 {
            return Err(PackingError::InvalidValue);
        }
        Ok(entry)
    }

    /// The byte to drive the display with.
    pub fn output(&self) -> u8 {
        let (magnitude, negative) = if self.signed {
            let v = self.value as i8;
            (v.unsigned_abs() as u16, v < 0)
        } else {
            (self.value as u16, false)
        };

        let digit = |n: u16| SEGMENT_DIGITS[(n % 10) as usize];
        match self.place {
            DigitPlace::Ones => digit(magnitude),
            DigitPlace::Tens => digit(magnitude / 10),
            DigitPlace::Hundreds => digit(magnitude / 100),
            DigitPlace::Sign => negative as u8,
        }
    }
}

/// The full display lookup ROM.
pub fn segment_rom() -> Result<Vec<u8>, PackingError> {
    let mut out_bytes = Vec::with_capacity(ROM_SIZE);
    for index in 0..ROM_SIZE as u16 {
        let entry = SegmentEntry::from_index(index)?;
        out_bytes.push(entry.output());
    }

    log::debug!("segment rom: {} bytes, {} places", out_bytes.len(), DigitPlace::iter().count());
    Ok(out_bytes)
}
