use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tagmem::{
    connection::{ModelClass, Simulated, SimulatedTag},
    memory::{BankOutcome, TagMemory},
    BankSet, LogOutput, MemoryBank, Reader, TagFilter,
};

#[derive(Parser)]
struct CliOpts {
    /// The model name the simulated reader reports
    #[clap(default_value = "M6e Micro", long, short)]
    model: String,
    /// The EPC of the simulated tag, and the filter used to read it
    #[clap(default_value = "112233445566", long, short)]
    epc: String,
    /// The banks to read (reserved, epc, tid, user)
    #[clap(long, value_delimiter = ',', default_value = "reserved,epc,tid,user")]
    banks: Vec<MemoryBank>,
    /// Banks of the simulated tag that are read-locked
    #[clap(long, value_delimiter = ',')]
    locked: Vec<MemoryBank>,
    /// The number of words of user memory on the simulated tag
    #[clap(default_value = "96", long)]
    user_words: u16,
    /// The probability that any single request fails with a bit decoding error
    #[clap(default_value = "0.0", long)]
    bit_error_rate: f64,
    /// Seed for simulated bit errors
    #[clap(default_value = "0", long)]
    seed: u64,
    /// Read the first tag to respond instead of filtering on the EPC
    #[clap(long)]
    no_filter: bool,
}

fn error<T>(val: T) -> std::io::Error
where
    T: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    std::io::Error::new(std::io::ErrorKind::Other, val)
}

fn main() -> std::io::Result<()> {
    pretty_env_logger::formatted_builder()
        .parse_filters(&std::env::var("RUST_LOG").unwrap_or("info".to_string()))
        .init();

    let opts = CliOpts::parse();

    let filter = TagFilter::epc_hex(&opts.epc).map_err(error)?;
    let TagFilter::Epc(epc) = &filter else {
        unreachable!("epc_hex returns an EPC filter");
    };

    let mut tag = SimulatedTag::new(epc)
        .with_user_memory((0..opts.user_words).map(|w| w.wrapping_mul(0x0101)).collect());
    for bank in &opts.locked {
        tag = tag.lock(*bank);
    }

    let model = ModelClass::from_model_name(&opts.model);
    let device =
        Simulated::new(model, vec![tag]).with_bit_errors(opts.bit_error_rate, opts.seed);

    let mut reader = Reader::for_model(device, &opts.model);
    let filter = if opts.no_filter { None } else { Some(&filter) };

    log::info!("Reading tag with a {} reader ({})", opts.model, reader.model());

    let banks = opts
        .banks
        .iter()
        .fold(BankSet::empty(), |set, bank| set | BankSet::from(*bank));

    let template = "[{bar:.green/white}] {prefix} ({pos}/{len})";

    let progress_bar = ProgressBar::new(banks.banks().count() as u64)
        .with_style(
            ProgressStyle::with_template(template)
                .map_err(error)?
                .progress_chars("#>-"),
        )
        .with_prefix("Reading banks");

    // Read bank by bank to report progress.
    let mut memory = TagMemory {
        filter: filter.cloned(),
        banks: Vec::new(),
    };

    for bank in banks.banks() {
        let single = reader.read_tag(filter, bank.into());
        memory.banks.extend(single.banks);
        progress_bar.inc(1);
    }

    progress_bar.finish();

    let log_output = &LogOutput::LogTarget(log::Level::Info, "read_tag".into());
    tagmem::Logger::log(log_output, &memory);

    for (bank, outcome) in &memory.banks {
        if let BankOutcome::Read(read) = outcome {
            log::debug!("{bank}: {}", read.to_hex());
        }
    }

    let requests = reader.release().requests().len();
    log::info!("Done after {requests} reader requests");

    Ok(())
}
