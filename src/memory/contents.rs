use crate::{
    connection::FaultKind,
    fmt::{LogItem, Loggable},
    log_vec,
};

use super::{MemoryBank, TagFilter};

/// Why a bank read stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Termination {
    /// The tag reported the end of the bank.
    EndOfMemory,
    /// A fault occurred after some data had already been read.
    ///
    /// The data read up to that point is returned as-is, but there may
    /// be more memory behind it.
    Truncated(FaultKind),
}

impl core::fmt::Display for Termination {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Termination::EndOfMemory => write!(f, "End of memory"),
            Termination::Truncated(kind) => write!(f, "Truncated ({kind})"),
        }
    }
}

/// The words read from one memory bank.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BankRead {
    pub bank: MemoryBank,
    pub words: Vec<u16>,
    pub termination: Termination,
}

impl BankRead {
    pub fn is_truncated(&self) -> bool {
        matches!(self.termination, Termination::Truncated(_))
    }

    /// The bank contents as big-endian bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.words.iter().flat_map(|w| w.to_be_bytes()).collect()
    }

    pub fn to_hex(&self) -> String {
        hex::encode_upper(self.to_bytes())
    }
}

impl Loggable for BankRead {
    fn as_log(&self) -> Vec<LogItem> {
        let data = if self.words.is_empty() {
            "(empty)".to_string()
        } else {
            self.to_hex()
        };

        log_vec![
            (0, format!("{} bank", self.bank)),
            (1, "Words", self.words.len()),
            (1, "Data", data),
            (1, "Termination", self.termination),
        ]
    }
}

/// The contents of the reserved bank.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReservedBank {
    pub kill_password: Option<u32>,
    pub access_password: Option<u32>,
}

impl ReservedBank {
    pub fn from_words(words: &[u16]) -> Self {
        let password = |at: usize| {
            let hi = *words.get(at)?;
            let lo = *words.get(at + 1)?;
            Some(((hi as u32) << 16) | lo as u32)
        };

        Self {
            kill_password: password(0),
            access_password: password(2),
        }
    }
}

impl Loggable for ReservedBank {
    fn as_log(&self) -> Vec<LogItem> {
        let password = |v: Option<u32>| match v {
            Some(v) => format!("{v:08X}"),
            None => "Unavailable".into(),
        };

        log_vec![
            (0, "Reserved bank"),
            (1, "Kill password", password(self.kill_password)),
            (1, "Access password", password(self.access_password)),
        ]
    }
}

/// The contents of the EPC bank.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EpcBank {
    pub crc: u16,
    pub pc: u16,
    /// The EPC, as long as the PC word says it is, or as
    /// much of it as was read.
    pub epc: Vec<u8>,
}

impl EpcBank {
    /// Parse the EPC bank from its words.
    ///
    /// Returns `None` if the CRC and PC words are not present.
    pub fn from_words(words: &[u16]) -> Option<Self> {
        if words.len() < 2 {
            return None;
        }

        let crc = words[0];
        let pc = words[1];

        let epc_len = ((pc >> 11) & 0x1F) as usize;
        let epc_end = (2 + epc_len).min(words.len());

        let epc = words[2..epc_end]
            .iter()
            .flat_map(|w| w.to_be_bytes())
            .collect();

        Some(Self { crc, pc, epc })
    }

    /// The EPC length in words, as indicated by the PC word.
    pub fn epc_words(&self) -> u8 {
        ((self.pc >> 11) & 0x1F) as u8
    }

    /// Whether the tag has user memory.
    pub fn user_memory_indicator(&self) -> bool {
        (self.pc & 0x0400) == 0x0400
    }

    pub fn xpc_indicator(&self) -> bool {
        (self.pc & 0x0200) == 0x0200
    }

    pub fn numbering_system_toggle(&self) -> bool {
        (self.pc & 0x0100) == 0x0100
    }
}

impl Loggable for EpcBank {
    fn as_log(&self) -> Vec<LogItem> {
        let numbering_system = if self.numbering_system_toggle() {
            "ISO"
        } else {
            "EPCglobal"
        };

        log_vec![
            (0, "EPC bank"),
            (1, "CRC", format!("{:04X}", self.crc)),
            (1, "PC", format!("{:04X}", self.pc)),
            (1, "EPC length", format!("{} words", self.epc_words())),
            (1, "User memory", self.user_memory_indicator()),
            (1, "XPC", self.xpc_indicator()),
            (1, "Numbering system", numbering_system),
            (1, "EPC", hex::encode_upper(&self.epc)),
        ]
    }
}

/// The contents of the TID bank.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TidBank {
    pub allocation_class: u8,
    pub extended_tid: bool,
    pub mask_designer_id: u16,
    pub model_number: u16,
    /// Everything after the first two words, usually a serial number.
    pub serial: Vec<u16>,
}

impl TidBank {
    /// Parse a TID bank with an EPCglobal (`0xE2`) or ISO (`0xE0`/`0xE3`)
    /// class identifier.
    ///
    /// Returns `None` if fewer than two words were read.
    pub fn from_words(words: &[u16]) -> Option<Self> {
        if words.len() < 2 {
            return None;
        }

        let raw = ((words[0] as u32) << 16) | words[1] as u32;

        Some(Self {
            allocation_class: (raw >> 24) as u8,
            extended_tid: (raw >> 23) & 1 == 1,
            mask_designer_id: ((raw >> 12) & 0x1FF) as u16,
            model_number: (raw & 0xFFF) as u16,
            serial: words[2..].to_vec(),
        })
    }

    /// The name of the chip vendor, if known.
    pub fn vendor(&self) -> Option<&'static str> {
        let name = match self.mask_designer_id {
            0x001 => "Impinj",
            0x003 => "Alien Technology",
            0x004 => "Atmel",
            0x006 => "NXP Semiconductors",
            0x008 => "EM Microelectronic",
            _ => return None,
        };

        Some(name)
    }
}

impl Loggable for TidBank {
    fn as_log(&self) -> Vec<LogItem> {
        let mdid = match self.vendor() {
            Some(vendor) => format!("0x{:03X} ({vendor})", self.mask_designer_id),
            None => format!("0x{:03X}", self.mask_designer_id),
        };

        let serial: Vec<u8> = self.serial.iter().flat_map(|w| w.to_be_bytes()).collect();

        log_vec![
            (0, "TID bank"),
            (1, "Class", format!("0x{:02X}", self.allocation_class)),
            (1, "Extended TID", self.extended_tid),
            (1, "Mask designer", mdid),
            (1, "Model", format!("0x{:03X}", self.model_number)),
            (1, "Serial", hex::encode_upper(serial)),
        ]
    }
}

/// The result of reading one bank as part of a [`TagMemory`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BankOutcome {
    Read(BankRead),
    /// The bank is read-locked.
    Locked,
    Failed(FaultKind),
}

/// All banks that were read from one tag.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TagMemory {
    pub filter: Option<TagFilter>,
    pub banks: Vec<(MemoryBank, BankOutcome)>,
}

impl TagMemory {
    pub fn get(&self, bank: MemoryBank) -> Option<&BankOutcome> {
        self.banks
            .iter()
            .find(|(b, _)| *b == bank)
            .map(|(_, outcome)| outcome)
    }

    /// The words read from `bank`, if it was read successfully.
    pub fn words(&self, bank: MemoryBank) -> Option<&[u16]> {
        match self.get(bank)? {
            BankOutcome::Read(read) => Some(&read.words),
            _ => None,
        }
    }

    pub fn reserved(&self) -> Option<ReservedBank> {
        self.words(MemoryBank::Reserved)
            .map(ReservedBank::from_words)
    }

    pub fn epc(&self) -> Option<EpcBank> {
        self.words(MemoryBank::Epc).and_then(EpcBank::from_words)
    }

    pub fn tid(&self) -> Option<TidBank> {
        self.words(MemoryBank::Tid).and_then(TidBank::from_words)
    }
}

impl Loggable for TagMemory {
    fn as_log(&self) -> Vec<LogItem> {
        let title = match &self.filter {
            Some(filter) => format!("Tag memory ({filter})"),
            None => "Tag memory (first tag)".to_string(),
        };

        let mut log = log_vec![(0, title)];

        for (bank, outcome) in &self.banks {
            match outcome {
                BankOutcome::Read(read) => {
                    let items = match bank {
                        MemoryBank::Reserved => ReservedBank::from_words(&read.words).as_log(),
                        MemoryBank::Epc => EpcBank::from_words(&read.words)
                            .map(|epc| epc.as_log())
                            .unwrap_or_else(|| read.as_log()),
                        MemoryBank::Tid => TidBank::from_words(&read.words)
                            .map(|tid| tid.as_log())
                            .unwrap_or_else(|| read.as_log()),
                        MemoryBank::User => read.as_log(),
                    };

                    log.extend(items.into_iter().map(LogItem::indented));

                    if read.is_truncated() {
                        log.push((2, "Termination", read.termination).into());
                    }
                }
                BankOutcome::Locked => log.push((1, format!("{bank} bank"), "Locked").into()),
                BankOutcome::Failed(kind) => {
                    log.push((1, format!("{bank} bank"), format!("Failed: {kind}")).into())
                }
            }
        }

        log
    }
}
