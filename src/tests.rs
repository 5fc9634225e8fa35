use crate::{
    connection::{Fault, FaultKind, ModelClass, ReadData, TagOpExecutor, WordCount},
    memory::{self, Termination},
    MemoryBank, ReadError, Reader, TagFilter,
};

/// A device that answers each request with a closure, and remembers
/// every request it was given.
struct Scripted<F> {
    respond: F,
    requests: Vec<(ReadData, Option<TagFilter>)>,
}

impl<F> Scripted<F>
where
    F: FnMut(&ReadData, usize) -> Result<Vec<u16>, FaultKind>,
{
    fn new(respond: F) -> Self {
        Self {
            respond,
            requests: Vec::new(),
        }
    }

    fn addresses(&self) -> Vec<(u32, u8)> {
        self.requests
            .iter()
            .map(|(op, _)| (op.word_address, op.word_count.value()))
            .collect()
    }
}

impl<F> TagOpExecutor for Scripted<F>
where
    F: FnMut(&ReadData, usize) -> Result<Vec<u16>, FaultKind>,
{
    type Error = FaultKind;

    fn execute(
        &mut self,
        op: &ReadData,
        filter: Option<&TagFilter>,
    ) -> Result<Vec<u16>, FaultKind> {
        let idx = self.requests.len();
        self.requests.push((*op, filter.cloned()));
        (self.respond)(op, idx)
    }
}

fn words(start: u32, count: u32) -> Vec<u16> {
    (start..start + count).map(|a| a as u16).collect()
}

/// A well-behaved bank of `len` words, where each word holds its own address.
fn bank_of(len: u32) -> impl FnMut(&ReadData, usize) -> Result<Vec<u16>, FaultKind> {
    move |op: &ReadData, _: usize| match op.word_count {
        WordCount::FullBank => Ok(words(0, len)),
        WordCount::Words(n) => {
            let n = n.get() as u32;
            if op.word_address + n > len {
                Err(FaultKind::MemoryOverrun)
            } else {
                Ok(words(op.word_address, n))
            }
        }
    }
}

fn read(
    device: &mut impl TagOpExecutor<Error = FaultKind>,
    model: ModelClass,
) -> Result<memory::BankRead, ReadError<FaultKind>> {
    memory::read_bank(device, MemoryBank::User, None, model)
}

#[test]
fn legacy_pages_then_words() {
    let mut device = Scripted::new(bank_of(150));

    let read = read(&mut device, ModelClass::Legacy).unwrap();

    assert_eq!(read.words, words(0, 150));
    assert_eq!(read.termination, Termination::EndOfMemory);

    let mut expected = vec![(0, 64), (64, 64), (128, 64)];
    expected.extend((128..=150).map(|a| (a, 1)));
    assert_eq!(device.addresses(), expected);
}

#[test]
fn successful_words_are_never_requested_twice() {
    let mut device = Scripted::new(bank_of(200));
    read(&mut device, ModelClass::Legacy).unwrap();

    let mut next = 0;
    for (op, _) in &device.requests {
        assert_eq!(op.word_address, next, "gap or overlap at {op}");
        if op.word_address + op.word_count.value() as u32 <= 200 {
            next += op.word_count.value() as u32;
        }
    }
}

#[test]
fn repeated_reads_are_identical() {
    let first = read(&mut Scripted::new(bank_of(97)), ModelClass::Modern).unwrap();
    let second = read(&mut Scripted::new(bank_of(97)), ModelClass::Modern).unwrap();

    assert_eq!(first, second);
    assert_eq!(first.words.len(), 97);
}

#[test]
fn legacy_falls_back_to_single_words() {
    const N: u32 = 23;

    let mut device = Scripted::new(|op: &ReadData, _| match op.word_count.value() {
        1 if op.word_address < N => Ok(vec![0xA000 | op.word_address as u16]),
        _ => Err(FaultKind::MemoryOverrun),
    });

    let read = read(&mut device, ModelClass::Legacy).unwrap();

    assert_eq!(read.words.len(), N as usize);
    assert_eq!(read.words[22], 0xA016);
    assert_eq!(read.termination, Termination::EndOfMemory);
}

#[test]
fn first_fault_without_data_propagates() {
    for model in [ModelClass::Legacy, ModelClass::Modern] {
        let mut device = Scripted::new(|_: &ReadData, _| Err(FaultKind::MemoryOverrun));

        let err = read(&mut device, model).unwrap_err();

        assert_eq!(err.fault_kind(), FaultKind::MemoryOverrun);
        assert_eq!(err.bank(), MemoryBank::User);
    }
}

#[test]
fn repeated_bit_errors_end_large_bank_read() {
    let mut device = Scripted::new(|op: &ReadData, _| match op.word_count {
        WordCount::FullBank => Ok(words(0, 64)),
        WordCount::Words(n) if op.word_address < 192 => Ok(words(op.word_address, n.get() as u32)),
        WordCount::Words(_) => Err(FaultKind::BitDecodingFailed),
    });

    let read = read(&mut device, ModelClass::Modern).unwrap();

    assert_eq!(read.words, words(0, 192));
    assert_eq!(
        read.termination,
        Termination::Truncated(FaultKind::BitDecodingFailed)
    );
    assert_eq!(
        device.addresses(),
        [(0, 0), (64, 64), (128, 64), (192, 64), (192, 64)]
    );
}

#[test]
fn single_bit_error_is_retried() {
    let mut device = Scripted::new(|op: &ReadData, idx| match op.word_count {
        WordCount::FullBank => Ok(words(0, 64)),
        _ if idx == 2 => Err(FaultKind::BitDecodingFailed),
        _ => bank_of(256)(op, idx),
    });

    let read = read(&mut device, ModelClass::Modern).unwrap();

    assert_eq!(read.words, words(0, 256));
    assert_eq!(
        &device.addresses()[..4],
        [(0, 0), (64, 64), (128, 64), (128, 64)]
    );
}

#[test]
fn short_full_bank_read_is_refined() {
    let mut device = Scripted::new(|op: &ReadData, _| match op.word_count {
        WordCount::FullBank => Ok(words(0, 40)),
        WordCount::Words(_) if op.word_address < 48 => Ok(words(op.word_address, 1)),
        WordCount::Words(_) => Err(FaultKind::MemoryOverrun),
    });

    let read = read(&mut device, ModelClass::Modern).unwrap();

    assert!(read.words.len() >= 40);
    assert_eq!(&read.words[..40], &words(0, 40)[..]);
    assert_eq!(read.words, words(0, 48));
    assert_eq!(device.addresses()[1], (40, 1));
}

#[test]
fn exact_page_continues_at_word_64() {
    let filter = TagFilter::epc_hex("112233445566").unwrap();

    let mut device = Scripted::new(|op: &ReadData, _| match op.word_count {
        WordCount::FullBank => Ok(words(0, 64)),
        WordCount::Words(_) => Err(FaultKind::MemoryOverrun),
    });

    let read = memory::read_bank(
        &mut device,
        MemoryBank::User,
        Some(&filter),
        ModelClass::Modern,
    )
    .unwrap();

    assert_eq!(read.words.len(), 64);
    assert_eq!(device.requests[1].0.word_address, 64);
    assert_eq!(device.requests[1].0.word_count.value(), 64);
    assert!(device
        .requests
        .iter()
        .all(|(op, f)| op.bank == MemoryBank::User && f.as_ref() == Some(&filter)));
}

#[test]
fn full_bank_decode_failure_falls_back() {
    for fault in [FaultKind::BitDecodingFailed, FaultKind::NoTagsFound] {
        let mut device = Scripted::new(move |op: &ReadData, idx| match op.word_count {
            WordCount::FullBank => Err(fault),
            _ => bank_of(6)(op, idx),
        });

        let read = read(&mut device, ModelClass::Modern).unwrap();

        assert_eq!(read.words, words(0, 6));
        assert_eq!(device.addresses()[1], (0, 1));
    }
}

#[test]
fn full_bank_locked_propagates() {
    let mut device = Scripted::new(|_: &ReadData, _| Err(FaultKind::MemoryLocked));

    let err = read(&mut device, ModelClass::Modern).unwrap_err();

    assert_eq!(err.fault_kind(), FaultKind::MemoryLocked);
    assert_eq!(device.requests.len(), 1);
}

#[test]
fn full_bank_fallback_keeps_words_read() {
    let mut device = Scripted::new(|op: &ReadData, _| match op.word_count {
        WordCount::FullBank => Err(FaultKind::BitDecodingFailed),
        WordCount::Words(_) if op.word_address < 5 => Ok(words(op.word_address, 1)),
        WordCount::Words(_) => Err(FaultKind::BitDecodingFailed),
    });

    let read = read(&mut device, ModelClass::Modern).unwrap();

    assert_eq!(read.words, words(0, 5));
    assert_eq!(
        read.termination,
        Termination::Truncated(FaultKind::BitDecodingFailed)
    );
    assert_eq!(device.addresses().last(), Some(&(5, 1)));
}

#[test]
fn large_bank_continuation_ends_on_other_faults() {
    for fault in [FaultKind::NoTagsFound, FaultKind::MemoryLocked] {
        let mut device = Scripted::new(move |op: &ReadData, _| match op.word_count {
            WordCount::FullBank => Ok(words(0, 64)),
            WordCount::Words(n) if op.word_address < 128 => {
                Ok(words(op.word_address, n.get() as u32))
            }
            WordCount::Words(_) => Err(fault),
        });

        let read = read(&mut device, ModelClass::Modern).unwrap();

        assert_eq!(read.words, words(0, 128));
        assert_eq!(read.termination, Termination::Truncated(fault));
        assert_eq!(device.addresses(), [(0, 0), (64, 64), (128, 64)]);
    }
}

#[test]
fn legacy_swallows_fault_after_data() {
    let mut device = Scripted::new(|op: &ReadData, idx| match idx {
        0 => bank_of(1000)(op, idx),
        _ => Err(FaultKind::NoTagsFound),
    });

    let read = read(&mut device, ModelClass::Legacy).unwrap();

    assert_eq!(read.words.len(), 64);
    assert_eq!(read.termination, Termination::Truncated(FaultKind::NoTagsFound));
}

#[test]
fn legacy_word_fault_after_overrun_is_swallowed() {
    let mut device = Scripted::new(|op: &ReadData, _| match (op.word_address, op.word_count.value()) {
        (0, 64) => Ok(words(0, 64)),
        (64, 1) => Ok(words(64, 1)),
        (_, 64) => Err(FaultKind::MemoryOverrun),
        _ => Err(FaultKind::MemoryLocked),
    });

    let read = read(&mut device, ModelClass::Legacy).unwrap();

    assert_eq!(read.words, words(0, 65));
    assert_eq!(read.termination, Termination::Truncated(FaultKind::MemoryLocked));
    assert_eq!(device.addresses(), [(0, 64), (64, 64), (64, 1), (65, 1)]);
}

#[test]
fn legacy_first_page_other_fault_propagates() {
    let mut device = Scripted::new(|_: &ReadData, _| Err(FaultKind::Other));

    let err = read(&mut device, ModelClass::Legacy).unwrap_err();
    assert_eq!(err.fault_kind(), FaultKind::Other);
    assert_eq!(device.requests.len(), 1);
}

#[test]
fn word_by_word_skips_seed() {
    let mut device = Scripted::new(bank_of(8));

    let result =
        memory::read_word_by_word(&mut device, MemoryBank::Tid, None, &[0, 1, 2]).unwrap();

    assert_eq!(result, words(0, 8));
    assert_eq!(device.addresses()[0], (3, 1));
}

#[test]
fn word_by_word_other_faults_propagate_with_data() {
    let mut device = Scripted::new(|_: &ReadData, _| Err(FaultKind::MemoryLocked));

    let err = memory::read_word_by_word(&mut device, MemoryBank::Tid, None, &[7, 7]).unwrap_err();

    assert_eq!(err.fault_kind(), FaultKind::MemoryLocked);
    assert_eq!(err, ReadError::device(MemoryBank::Tid, 2, FaultKind::MemoryLocked));
}

#[test]
fn word_by_word_empty_overrun_propagates() {
    let mut device = Scripted::new(bank_of(0));

    let err = memory::read_word_by_word(&mut device, MemoryBank::User, None, &[]).unwrap_err();
    assert_eq!(err.fault_kind(), FaultKind::MemoryOverrun);
}

#[test]
fn legacy_firmware_messages_end_the_bank() {
    struct Legacy(u32);

    impl TagOpExecutor for Legacy {
        type Error = Fault;

        fn execute(&mut self, op: &ReadData, _: Option<&TagFilter>) -> Result<Vec<u16>, Fault> {
            let count = op.word_count.value() as u32;
            if op.word_address + count > self.0 {
                Err(Fault::from_legacy_message("Non-specific reader error"))
            } else {
                Ok(words(op.word_address, count))
            }
        }
    }

    let mut reader = Reader::new(Legacy(70), ModelClass::Legacy);
    let read = reader.read_bank(MemoryBank::User, None).unwrap();

    assert_eq!(read.words, words(0, 70));
    assert_eq!(read.termination, Termination::EndOfMemory);
}

#[cfg(feature = "simulated")]
mod simulated {
    use super::*;
    use crate::{
        connection::{Simulated, SimulatedTag},
        memory::BankOutcome,
        BankSet,
    };

    fn user_memory(len: u16) -> Vec<u16> {
        (0..len).map(|w| w.wrapping_mul(0x0101)).collect()
    }

    fn population() -> Vec<SimulatedTag> {
        vec![
            SimulatedTag::new(&hex::decode("112233445566").unwrap())
                .with_user_memory(user_memory(100)),
            SimulatedTag::new(&hex::decode("AABBCCDDEEFF").unwrap())
                .with_user_memory(user_memory(32))
                .lock(MemoryBank::Reserved),
        ]
    }

    #[test]
    fn large_bank_tail_is_recovered() {
        let device = Simulated::new(ModelClass::Modern, population()).with_full_bank_limit(64);
        let mut reader = Reader::new(device, ModelClass::Modern);

        let read = reader.read_bank(MemoryBank::User, None).unwrap();

        assert_eq!(read.words, user_memory(100));
        assert_eq!(read.termination, Termination::EndOfMemory);
    }

    #[test]
    fn read_whole_tag() {
        let device = Simulated::new(ModelClass::Legacy, population());
        let mut reader = Reader::for_model(device, "M5e");
        let filter = TagFilter::epc_hex("AABBCCDDEEFF").unwrap();

        let memory = reader.read_tag(Some(&filter), BankSet::all());

        assert_eq!(memory.get(MemoryBank::Reserved), Some(&BankOutcome::Locked));
        assert_eq!(memory.epc().unwrap().epc, hex::decode("AABBCCDDEEFF").unwrap());
        assert!(memory.epc().unwrap().user_memory_indicator());
        assert_eq!(memory.tid().unwrap().vendor(), Some("Impinj"));
        assert_eq!(memory.words(MemoryBank::User), Some(&user_memory(32)[..]));

        let requests = reader.release().requests().len();
        assert!(requests > 4);
    }

    #[test]
    fn missing_tag_fails_every_bank() {
        let device = Simulated::new(ModelClass::Modern, population());
        let mut reader = Reader::new(device, ModelClass::Modern);
        let filter = TagFilter::epc_hex("000000").unwrap();

        let memory = reader.read_tag(Some(&filter), BankSet::EPC | BankSet::TID);

        assert_eq!(
            memory.banks,
            [
                (MemoryBank::Epc, BankOutcome::Failed(FaultKind::NoTagsFound)),
                (MemoryBank::Tid, BankOutcome::Failed(FaultKind::NoTagsFound)),
            ]
        );
    }

    #[test]
    fn transient_overruns_and_bit_errors() {
        let device = Simulated::new(ModelClass::Legacy, population())
            .with_transient_overruns()
            .with_bit_errors(0.05, 7);
        let mut reader = Reader::new(device, ModelClass::Legacy);

        let read = reader.read_bank(MemoryBank::Epc, None);

        // With random faults the read may end early, but never returns
        // data that was not on the tag.
        if let Ok(read) = read {
            let expected = reader.inner_mut().tags()[0].bank(MemoryBank::Epc).to_vec();
            assert!(expected.starts_with(&read.words));
        }
    }

    #[test]
    fn each_tag_in_turn() {
        let device = Simulated::new(ModelClass::Modern, population());
        let mut reader = Reader::new(device, ModelClass::Modern);

        let filters = [
            TagFilter::epc_hex("112233445566").unwrap(),
            TagFilter::epc_hex("AABBCCDDEEFF").unwrap(),
        ];

        let results = reader.read_bank_of_each(MemoryBank::User, &filters);

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].1.as_ref().unwrap().words.len(), 100);
        assert_eq!(results[1].1.as_ref().unwrap().words.len(), 32);
    }
}
