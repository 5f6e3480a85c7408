use common::Flags;

use crate::RomError;

/// Widest address a layout may describe (a 64 KiB EEPROM).
pub const MAX_ADDRESS_BITS: u32 = 16;

/// Every decoded field value is held in a byte.
pub const MAX_FIELD_BITS: u32 = 8;

#[derive(Clone, Copy, Display, Debug, PartialEq, Eq, Hash)]
#[strum(serialize_all = "lowercase")]
pub enum FieldKind {
    /// High address lines the hardware ties low; any address with them set
    /// holds the zero word.
    Unused,
    Flags,
    Select,
    Opcode,
    Step,
}

/// One contiguous run of address bits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Field {
    pub kind: FieldKind,
    pub width: u32,
    pub offset: u32,
}

impl Field {
    pub fn mask(&self) -> u32 {
        ((1u32 << self.width) - 1) << self.offset
    }

    fn extract(&self, address: u32) -> u32 {
        (address & self.mask()) >> self.offset
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct AddressParts {
    pub unused: u8,
    pub flags: Flags,
    pub select: u8,
    pub opcode: u8,
    pub step: u8,
}

impl AddressParts {
    fn value(&self, kind: FieldKind) -> u32 {
        match kind {
            FieldKind::Unused => self.unused as u32,
            FieldKind::Flags => self.flags.bits() as u32,
            FieldKind::Select => self.select as u32,
            FieldKind::Opcode => self.opcode as u32,
            FieldKind::Step => self.step as u32,
        }
    }
}

/// The bit layout of a control ROM address. Encoding and decoding both walk
/// the same field list, so the two directions cannot drift apart.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AddressLayout {
    fields: Vec<Field>,
    address_bits: u32,
}

impl AddressLayout {
    /// Validates that `fields` tile `0..address_bits` exactly once.
    pub fn new(fields: Vec<Field>, address_bits: u32) -> Result<AddressLayout, RomError> {
        if address_bits > MAX_ADDRESS_BITS {
            return Err(RomError::AddressTooWide(address_bits));
        }

        let widths: Vec<_> = fields.iter().map(|f| (f.kind, f.width)).collect();
        AddressLayout::check_widths(&widths)?;

        let total: u32 = fields.iter().map(|f| f.width).sum();
        if total != address_bits {
            return Err(RomError::LayoutWidth { fields: total, address_bits });
        }

        let mut seen_kinds = Vec::new();
        let mut covered = 0u32;
        for field in &fields {
            if seen_kinds.contains(&field.kind) {
                return Err(RomError::DuplicateField(field.kind));
            }
            seen_kinds.push(field.kind);

            if field.width == 0 {
                continue;
            }
            let past_end = field.offset.checked_add(field.width).map_or(true, |end| end > address_bits);
            if past_end || covered & field.mask() != 0 {
                return Err(RomError::LayoutOverlap(field.kind));
            }
            covered |= field.mask();
        }

        for kind in [FieldKind::Opcode, FieldKind::Step] {
            if !fields.iter().any(|f| f.kind == kind && f.width > 0) {
                return Err(RomError::MissingField(kind));
            }
        }

        let flag_width = Flags::all().bits().count_ones();
        if let Some(f) = fields.iter().find(|f| f.kind == FieldKind::Flags) {
            if f.width != 0 && f.width != flag_width {
                return Err(RomError::FlagWidth { expected: flag_width, found: f.width });
            }
        }

        let fields: Vec<Field> = fields.into_iter().filter(|f| f.width > 0).collect();
        log::debug!("address layout: {} bits {:?}", address_bits, fields);

        Ok(AddressLayout { fields, address_bits })
    }

    /// Packs fields from most to least significant in the order given.
    pub fn from_widths(widths: &[(FieldKind, u32)]) -> Result<AddressLayout, RomError> {
        AddressLayout::check_widths(widths)?;
        let address_bits = widths.iter().map(|(_, w)| *w).sum();
        AddressLayout::new(AddressLayout::stack(widths), address_bits)
    }

    pub(crate) fn check_widths(widths: &[(FieldKind, u32)]) -> Result<(), RomError> {
        match widths.iter().find(|(_, w)| *w > MAX_FIELD_BITS) {
            Some((kind, width)) => Err(RomError::FieldTooWide { field: *kind, width: *width, max: MAX_FIELD_BITS }),
            None => Ok(()),
        }
    }

    /// Callers bound the widths with `check_widths` first.
    pub(crate) fn stack(widths: &[(FieldKind, u32)]) -> Vec<Field> {
        let mut offset = 0;
        let mut fields: Vec<Field> = widths.iter().rev().map(|(kind, width)| {
            let f = Field { kind: *kind, width: *width, offset };
            offset += width;
            f
        }).collect();
        fields.reverse();
        fields
    }

    pub fn address_bits(&self) -> u32 {
        self.address_bits
    }

    /// Number of addresses, which is also the image size in bytes.
    pub fn size(&self) -> usize {
        1 << self.address_bits
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field(&self, kind: FieldKind) -> Option<&Field> {
        self.fields.iter().find(|f| f.kind == kind)
    }

    pub fn width(&self, kind: FieldKind) -> u32 {
        self.field(kind).map(|f| f.width).unwrap_or(0)
    }

    pub fn opcode_count(&self) -> usize {
        1 << self.width(FieldKind::Opcode)
    }

    pub fn step_count(&self) -> usize {
        1 << self.width(FieldKind::Step)
    }

    pub fn decode(&self, address: u32) -> Result<AddressParts, RomError> {
        if address as usize >= self.size() {
            return Err(RomError::AddressOutOfRange { address, size: self.size() });
        }

        let mut parts = AddressParts::default();
        for field in &self.fields {
            let value = field.extract(address);
            match field.kind {
                FieldKind::Unused => parts.unused = value as u8,
                FieldKind::Flags => parts.flags = Flags::from_bits_truncate(value as u8),
                FieldKind::Select => parts.select = value as u8,
                FieldKind::Opcode => parts.opcode = value as u8,
                FieldKind::Step => parts.step = value as u8,
            }
        }
        Ok(parts)
    }

    pub fn encode(&self, parts: &AddressParts) -> Result<u32, RomError> {
        let mut address = 0;
        for kind in [FieldKind::Unused, FieldKind::Flags, FieldKind::Select, FieldKind::Opcode, FieldKind::Step] {
            let value = parts.value(kind);
            let (width, offset) = match self.field(kind) {
                Some(f) => (f.width, f.offset),
                None => (0, 0),
            };
            if value >> width != 0 {
                return Err(RomError::FieldOverflow { field: kind, value, width });
            }
            address |= value << offset;
        }
        Ok(address)
    }
}
