use super::MemoryBank;

/// Selects which tag(s) in the field a command applies to.
///
/// Filters are passed to the [`TagOpExecutor`](crate::connection::TagOpExecutor)
/// unchanged.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TagFilter {
    /// Match tags by their full EPC.
    Epc(Vec<u8>),
    /// Match tags by a bit mask over a memory bank (a Gen2 Select).
    Select {
        bank: MemoryBank,
        bit_pointer: u32,
        bit_length: u16,
        mask: Vec<u8>,
        invert: bool,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub enum ParseFilterError {
    InvalidHex(hex::FromHexError),
    Empty,
}

impl From<hex::FromHexError> for ParseFilterError {
    fn from(value: hex::FromHexError) -> Self {
        Self::InvalidHex(value)
    }
}

impl core::fmt::Display for ParseFilterError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ParseFilterError::InvalidHex(e) => write!(f, "Invalid EPC: {e}"),
            ParseFilterError::Empty => write!(f, "Empty EPC"),
        }
    }
}

impl std::error::Error for ParseFilterError {}

impl TagFilter {
    /// Parse an EPC filter from a hex string such as `"112233445566"`.
    ///
    /// An optional `0x` prefix is ignored.
    pub fn epc_hex(epc: &str) -> Result<Self, ParseFilterError> {
        let epc = epc.trim();
        let epc = epc
            .strip_prefix("0x")
            .or_else(|| epc.strip_prefix("0X"))
            .unwrap_or(epc);

        if epc.is_empty() {
            return Err(ParseFilterError::Empty);
        }

        Ok(Self::Epc(hex::decode(epc)?))
    }

    /// Create a select filter on `mask`, covering all of its bits.
    pub fn select(bank: MemoryBank, bit_pointer: u32, mask: Vec<u8>) -> Self {
        let bit_length = (mask.len() * 8).min(u16::MAX as usize) as u16;

        Self::Select {
            bank,
            bit_pointer,
            bit_length,
            mask,
            invert: false,
        }
    }

    /// Whether a tag with the given EPC and bank contents matches this filter.
    ///
    /// `bank_bytes` returns the contents of a bank, or `None` if the bank
    /// cannot be read.
    pub fn matches<'a, F>(&self, epc: &[u8], bank_bytes: F) -> bool
    where
        F: FnOnce(MemoryBank) -> Option<&'a [u8]>,
    {
        match self {
            TagFilter::Epc(expected) => expected.as_slice() == epc,
            TagFilter::Select {
                bank,
                bit_pointer,
                bit_length,
                mask,
                invert,
            } => {
                let matched = bank_bytes(*bank)
                    .map(|data| Self::bits_match(data, *bit_pointer, *bit_length, mask))
                    .unwrap_or(false);

                matched != *invert
            }
        }
    }

    fn bits_match(data: &[u8], bit_pointer: u32, bit_length: u16, mask: &[u8]) -> bool {
        let bit = |bytes: &[u8], idx: usize| -> Option<bool> {
            bytes.get(idx / 8).map(|b| (b >> (7 - (idx % 8))) & 1 == 1)
        };

        (0..bit_length as usize).all(|i| {
            let expected = bit(mask, i);
            let actual = bit(data, bit_pointer as usize + i);
            expected.is_some() && expected == actual
        })
    }
}

impl core::fmt::Display for TagFilter {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            TagFilter::Epc(epc) => write!(f, "EPC={}", hex::encode_upper(epc)),
            TagFilter::Select {
                bank,
                bit_pointer,
                bit_length,
                mask,
                invert,
            } => {
                let not = if *invert { "!" } else { "" };
                write!(
                    f,
                    "{not}Select({bank}, ptr={bit_pointer}, len={bit_length}, mask={})",
                    hex::encode_upper(mask)
                )
            }
        }
    }
}
