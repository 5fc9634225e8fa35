use std::collections::VecDeque;

use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::{
    connection::{Fault, FaultKind, ModelClass, ReadData, StatusCode, TagOpExecutor, WordCount},
    memory::{BankSet, MemoryBank, TagFilter},
};

/// A tag in the field of a [`Simulated`] reader.
#[derive(Clone, Debug, PartialEq)]
pub struct SimulatedTag {
    epc: Vec<u8>,
    banks: [Vec<u16>; 4],
    locked: BankSet,
}

impl SimulatedTag {
    /// Create a tag with the given EPC, an all-zero reserved bank, an
    /// Impinj-style TID and no user memory.
    ///
    /// Odd-length EPCs are padded with a zero byte.
    pub fn new(epc: &[u8]) -> Self {
        let mut epc = epc.to_vec();
        if epc.len() % 2 == 1 {
            epc.push(0);
        }

        let epc_words: Vec<u16> = epc
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();

        let mut tid = vec![0xE280, 0x1160];
        tid.extend(epc_words.iter().take(4));

        let mut me = Self {
            epc,
            banks: [vec![0; 4], Vec::new(), tid, Vec::new()],
            locked: BankSet::empty(),
        };

        me.update_epc_bank();
        me
    }

    pub fn with_bank(mut self, bank: MemoryBank, words: Vec<u16>) -> Self {
        self.banks[bank.value() as usize] = words;

        if bank == MemoryBank::User {
            self.update_epc_bank();
        }

        self
    }

    pub fn with_user_memory(self, words: Vec<u16>) -> Self {
        self.with_bank(MemoryBank::User, words)
    }

    /// Read-lock `bank`.
    pub fn lock(mut self, bank: MemoryBank) -> Self {
        self.locked |= BankSet::from(bank);
        self
    }

    pub fn epc(&self) -> &[u8] {
        &self.epc
    }

    pub fn bank(&self, bank: MemoryBank) -> &[u16] {
        &self.banks[bank.value() as usize]
    }

    fn is_locked(&self, bank: MemoryBank) -> bool {
        self.locked.contains(BankSet::from(bank))
    }

    fn readable_bytes(&self, bank: MemoryBank) -> Option<Vec<u8>> {
        if self.is_locked(bank) {
            None
        } else {
            Some(self.bank(bank).iter().flat_map(|w| w.to_be_bytes()).collect())
        }
    }

    fn update_epc_bank(&mut self) {
        let epc_words = (self.epc.len() / 2).min(0x1F) as u16;
        let umi = if self.bank(MemoryBank::User).is_empty() {
            0
        } else {
            0x0400
        };
        let pc = (epc_words << 11) | umi;

        let mut crc_input = pc.to_be_bytes().to_vec();
        crc_input.extend_from_slice(&self.epc);

        let mut bank = vec![crc16(&crc_input), pc];
        bank.extend(
            self.epc
                .chunks_exact(2)
                .map(|c| u16::from_be_bytes([c[0], c[1]])),
        );

        self.banks[MemoryBank::Epc.value() as usize] = bank;
    }
}

/// The Gen2 CRC-16 (CCITT polynomial, preset `0xFFFF`, inverted).
fn crc16(data: &[u8]) -> u16 {
    let mut crc = 0xFFFFu16;

    for byte in data {
        crc ^= (*byte as u16) << 8;
        for _ in 0..8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ 0x1021
            } else {
                crc << 1
            };
        }
    }

    !crc
}

/// A reader simulated in memory, with a fixed population of tags.
///
/// Faults are reported the way reader firmware reports them, including
/// optional random bit decoding failures.
pub struct Simulated {
    tags: Vec<SimulatedTag>,
    model: ModelClass,
    bit_error_rate: f64,
    rng: StdRng,
    full_bank_limit: Option<usize>,
    transient_overruns: bool,
    injected: VecDeque<Fault>,
    requests: Vec<ReadData>,
}

impl Simulated {
    pub fn new(model: ModelClass, tags: Vec<SimulatedTag>) -> Self {
        Self {
            tags,
            model,
            bit_error_rate: 0.0,
            rng: StdRng::seed_from_u64(0),
            full_bank_limit: None,
            transient_overruns: false,
            injected: VecDeque::new(),
            requests: Vec::new(),
        }
    }

    /// Fail each request with a bit decoding fault with probability `rate`.
    pub fn with_bit_errors(mut self, rate: f64, seed: u64) -> Self {
        self.bit_error_rate = rate.clamp(0.0, 1.0);
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Return at most `words` words for full bank reads, like tags
    /// that misreport their bank length.
    pub fn with_full_bank_limit(mut self, words: usize) -> Self {
        self.full_bank_limit = Some(words);
        self
    }

    /// Report reads past the end of a bank as a non-specific tag error
    /// instead of a memory overrun, like some older firmware does.
    pub fn with_transient_overruns(mut self) -> Self {
        self.transient_overruns = true;
        self
    }

    /// Fail the next request with `fault`. Injected faults are reported in
    /// the order they were injected, one per request.
    pub fn inject(&mut self, fault: Fault) {
        self.injected.push_back(fault);
    }

    pub fn model(&self) -> ModelClass {
        self.model
    }

    /// All requests executed so far.
    pub fn requests(&self) -> &[ReadData] {
        &self.requests
    }

    pub fn tags(&self) -> &[SimulatedTag] {
        &self.tags
    }

    fn fault(code: StatusCode, message: &str) -> Fault {
        Fault {
            kind: code.kind(),
            status: Some(code),
            message: message.to_string(),
        }
    }

    fn overrun(&self) -> Fault {
        if self.transient_overruns {
            Fault::from_legacy_message("General Tag Error")
        } else {
            Self::fault(StatusCode::MemoryOverrunBadPc, "Gen2 memory overrun")
        }
    }

    fn find_tag(&self, filter: Option<&TagFilter>) -> Option<&SimulatedTag> {
        let Some(filter) = filter else {
            return self.tags.first();
        };

        self.tags.iter().find(|tag| {
            let select_bytes = match filter {
                TagFilter::Select { bank, .. } => tag.readable_bytes(*bank),
                TagFilter::Epc(_) => None,
            };

            filter.matches(&tag.epc, |_| select_bytes.as_deref())
        })
    }
}

impl TagOpExecutor for Simulated {
    type Error = Fault;

    fn execute(&mut self, op: &ReadData, filter: Option<&TagFilter>) -> Result<Vec<u16>, Fault> {
        self.requests.push(*op);

        if let Some(fault) = self.injected.pop_front() {
            return Err(fault);
        }

        if self.bit_error_rate > 0.0 && self.rng.gen_bool(self.bit_error_rate) {
            return Err(Self::fault(
                StatusCode::BitDecodingFailed,
                "Bit decoding failed",
            ));
        }

        let tag = self
            .find_tag(filter)
            .ok_or_else(|| Self::fault(StatusCode::NoTagsFound, "No tags found"))?;

        if tag.is_locked(op.bank) {
            return Err(Self::fault(StatusCode::MemoryLocked, "Gen2 memory locked"));
        }

        let bank = tag.bank(op.bank);
        let start = op.word_address as usize;

        match op.word_count {
            WordCount::FullBank if !self.model.supports_full_bank_reads() => Err(Fault::new(
                FaultKind::Other,
                "Zero-length reads are not supported by this reader",
            )),
            WordCount::FullBank => {
                let end = self
                    .full_bank_limit
                    .map(|limit| limit.min(bank.len()))
                    .unwrap_or(bank.len());

                if start >= end && start > 0 {
                    return Err(self.overrun());
                }

                Ok(bank[start.min(end)..end].to_vec())
            }
            WordCount::Words(count) => {
                let end = start + count.get() as usize;

                if end > bank.len() {
                    Err(self.overrun())
                } else {
                    Ok(bank[start..end].to_vec())
                }
            }
        }
    }
}
