use clap::{ArgAction, Parser};
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use tcpflow::capture::Packet;
use tcpflow::flow::{
    ClassifierConfig, CloseType, Flow, FlowClassifier, FlowError, FlowFilter, FlowSummary, FlowTracker, InvalidReason,
};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "tcpflow",
    version,
    about = "Rebuild TCP connections from packet metadata and classify how they opened and closed"
)]
struct Cli {
    /// Packets as a JSON array or JSON Lines; stdin if omitted
    #[arg(short, long, value_name = "PACKETS")]
    input: Option<PathBuf>,

    /// Where to write flows; stdout if omitted
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Write one flow per line instead of a pretty JSON array
    #[arg(long)]
    jsonl: bool,

    /// Feed time-ordered JSON Lines packets through the streaming tracker,
    /// writing flows as JSON Lines once they go idle
    #[arg(long)]
    stream: bool,

    /// Classifier configuration file (JSON)
    #[arg(long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    #[arg(long)]
    handshake_timeout_ms: Option<u64>,

    #[arg(long)]
    reorder_window_pkts: Option<usize>,

    #[arg(long)]
    reorder_window_ms: Option<u64>,

    #[arg(long)]
    idle_timeout_ms: Option<u64>,

    /// Only flows between these two IPs, in either direction
    #[arg(long, num_args = 2, value_names = ["IP_A", "IP_B"])]
    ip: Option<Vec<IpAddr>>,

    /// Only flows with this close type (repeatable)
    #[arg(long = "close-type", value_name = "TYPE")]
    close_types: Vec<CloseType>,

    /// Only invalid flows with this reason (repeatable)
    #[arg(long = "invalid-reason", value_name = "REASON")]
    invalid_reasons: Vec<InvalidReason>,

    /// Verbosity (-v, -vv)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(&cli) {
        error!("{e}");
        std::process::exit(1);
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(true)
        .with_line_number(true)
        .init();
}

fn run(cli: &Cli) -> Result<(), FlowError> {
    let config = load_config(cli)?;
    info!(
        handshake_timeout_ms = config.handshake_timeout_ms,
        reorder_window_pkts = config.reorder_window_pkts,
        reorder_window_ms = config.reorder_window_ms,
        idle_timeout_ms = config.idle_timeout_ms,
        "effective classifier configuration"
    );

    let filter = build_filter(cli);
    let mut writer = open_output(cli.output.as_deref())?;
    let mut summary = FlowSummary::default();

    if cli.stream {
        let reader = open_input(cli.input.as_deref())?;
        let mut tracker = FlowTracker::new(config);
        let mut sink = FlowSink { writer: &mut writer, filter: &filter, summary: &mut summary };

        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            let Some(packet) = parse_line(index + 1, &line) else {
                continue;
            };
            tracker.ingest(packet);
            if (index + 1) % EXPIRE_EVERY == 0 {
                let now = tracker.last_timestamp();
                sink.emit(tracker.expire_idle(now))?;
            }
        }

        if tracker.skipped() > 0 {
            warn!(skipped = tracker.skipped(), "packets without ports ignored");
        }
        let end = tracker.last_timestamp();
        sink.emit(tracker.finalize(end))?;
    } else {
        let packets = read_packets(cli.input.as_deref())?;
        info!(packets = packets.len(), "packets loaded");

        let flows = FlowClassifier::new(config).classify(packets);
        let flows = filter.apply(flows);
        for flow in &flows {
            summary.add(flow);
        }

        if cli.jsonl {
            for flow in &flows {
                serde_json::to_writer(&mut writer, flow)?;
                writeln!(writer)?;
            }
        } else {
            serde_json::to_writer_pretty(&mut writer, &flows)?;
            writeln!(writer)?;
        }
    }

    writer.flush()?;
    log_summary(&summary);
    Ok(())
}

/// Packets between idle sweeps in streaming mode.
const EXPIRE_EVERY: usize = 10_000;

/// Filters, counts and writes flows as JSON Lines.
struct FlowSink<'a, W: Write> {
    writer: &'a mut W,
    filter: &'a FlowFilter,
    summary: &'a mut FlowSummary,
}

impl<W: Write> FlowSink<'_, W> {
    fn emit(&mut self, flows: Vec<Flow>) -> Result<(), FlowError> {
        for flow in self.filter.apply(flows) {
            self.summary.add(&flow);
            serde_json::to_writer(&mut *self.writer, &flow)?;
            writeln!(self.writer)?;
        }
        Ok(())
    }
}

fn load_config(cli: &Cli) -> Result<ClassifierConfig, FlowError> {
    let mut config = match &cli.config {
        Some(path) => {
            let text = fs::read_to_string(path)?;
            serde_json::from_str(&text)?
        }
        None => ClassifierConfig::default(),
    };

    if let Some(v) = cli.handshake_timeout_ms {
        config.handshake_timeout_ms = v;
    }
    if let Some(v) = cli.reorder_window_pkts {
        config.reorder_window_pkts = v;
    }
    if let Some(v) = cli.reorder_window_ms {
        config.reorder_window_ms = v;
    }
    if let Some(v) = cli.idle_timeout_ms {
        config.idle_timeout_ms = v;
    }

    config.validate()?;
    Ok(config)
}

fn build_filter(cli: &Cli) -> FlowFilter {
    let mut filter = FlowFilter::new()
        .close_types(cli.close_types.iter().copied())
        .invalid_reasons(cli.invalid_reasons.iter().copied());
    if let Some([a, b]) = cli.ip.as_deref() {
        filter = filter.between(*a, *b);
    }
    if !filter.is_empty() {
        debug!(?filter, "flow filter active");
    }
    filter
}

fn open_input(path: Option<&Path>) -> Result<Box<dyn BufRead>, FlowError> {
    Ok(match path {
        Some(path) => Box::new(BufReader::new(File::open(path)?)),
        None => Box::new(BufReader::new(io::stdin())),
    })
}

fn open_output(path: Option<&Path>) -> Result<Box<dyn Write>, FlowError> {
    Ok(match path {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(BufWriter::new(io::stdout())),
    })
}

/// A JSON array if the input starts with `[`, JSON Lines otherwise.
fn read_packets(path: Option<&Path>) -> Result<Vec<Packet>, FlowError> {
    let mut text = String::new();
    open_input(path)?.read_to_string(&mut text)?;

    if text.trim_start().starts_with('[') {
        return Ok(serde_json::from_str(&text)?);
    }

    Ok(text
        .lines()
        .enumerate()
        .filter_map(|(index, line)| parse_line(index + 1, line))
        .collect())
}

fn parse_line(line_no: usize, line: &str) -> Option<Packet> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match serde_json::from_str(line) {
        Ok(packet) => Some(packet),
        Err(e) => {
            warn!(line = line_no, error = %e, "skipping malformed packet");
            None
        }
    }
}

fn log_summary(summary: &FlowSummary) {
    info!(flows = summary.flows, packets = summary.packets, bytes = summary.bytes, "classification summary");
    for (state, count) in &summary.by_state {
        info!(%state, count, "flows by state");
    }
    for (close_type, count) in &summary.by_close_type {
        info!(%close_type, count, "flows by close type");
    }
    for (reason, count) in &summary.by_invalid_reason {
        info!(%reason, count, "invalid flows by reason");
    }
}
