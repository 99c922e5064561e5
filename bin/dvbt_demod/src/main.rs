use std::collections::VecDeque;
use std::io::{BufReader, BufWriter, Read, Write};

use anyhow::Context;
use clap::Parser;

use dvbt_core::dvbt_parameters::{get_dvbt_parameters, DvbtTransmissionMode};
use dvbt_core::dvbt_tps_frame::TpsGuardInterval;
use dvbt_ofdm::dvbt_receiver::DvbtReceiver;
use dvbt_radio::viterbi_decoder::ViterbiDecoder;
use ofdm::sample_source::IqSampleReader;
use ofdm::symbol_sync::{SymbolSyncSettings, SyncError};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct AppArguments {
    /// Guard interval as a fraction of the symbol length. Valid divisors are [4,8,16,32]
    #[arg(short, long, default_value_t = 32)]
    guard_divisor: usize,
    /// Assumed signal to noise ratio in dB for symbol timing estimation
    #[arg(short, long, default_value_t = 20.0)]
    snr_db: f64,
    /// Calibration constant added to the carrier recovery phase, in radians
    #[arg(long, default_value_t = 0.0)]
    phase_bias: f64,
    /// Write the demultiplexed bits without running the convolutional decoder
    #[arg(long)]
    raw_bits: bool,
    /// Input filepath. If not provided uses stdin by default.
    #[arg(short, long)]
    input_filepath: Option<String>,
    /// Output filepath. If not provided uses stdout by default.
    #[arg(short, long)]
    output_filepath: Option<String>,
}

/// Buffers demultiplexed bits between the per-symbol demux output and the
/// three-bit consumption pattern of the convolutional decoder.
#[derive(Default)]
struct BitQueue {
    bits: VecDeque<u8>,
}

impl BitQueue {
    fn push_bytes(&mut self, bytes: &[u8], bit_length: usize) {
        for index in 0..bit_length {
            self.bits.push_back((bytes[index / 8] >> (7 - (index % 8))) & 1);
        }
    }

    fn pop3(&mut self) -> Option<(u8, u8, u8)> {
        if self.bits.len() < 3 {
            return None;
        }
        let x = self.bits.pop_front().unwrap();
        let y0 = self.bits.pop_front().unwrap();
        let y1 = self.bits.pop_front().unwrap();
        Some((x, y0, y1))
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = AppArguments::parse();

    let input_file: Box<dyn Read> = match &args.input_filepath {
        None => Box::new(std::io::stdin()),
        Some(filepath) => Box::new(
            std::fs::File::open(filepath)
                .with_context(|| format!("Failed to open input file {}", filepath))?,
        ),
    };
    let output_file: Box<dyn Write> = match &args.output_filepath {
        None => Box::new(BufWriter::new(std::io::stdout())),
        Some(filepath) => Box::new(BufWriter::new(
            std::fs::File::create(filepath)
                .with_context(|| format!("Failed to open output file {}", filepath))?,
        )),
    };
    run(&args, input_file, output_file)
}

fn run(
    args: &AppArguments,
    input: Box<dyn Read>,
    mut output: Box<dyn Write>,
) -> anyhow::Result<()> {
    let guard = match args.guard_divisor {
        32 => TpsGuardInterval::Guard1_32,
        16 => TpsGuardInterval::Guard1_16,
        8 => TpsGuardInterval::Guard1_8,
        4 => TpsGuardInterval::Guard1_4,
        divisor => anyhow::bail!("Invalid guard interval divisor {}", divisor),
    };
    let params = get_dvbt_parameters(DvbtTransmissionMode::Mode2k, guard)?;
    let settings = SymbolSyncSettings {
        snr: 10.0f64.powf(args.snr_db / 10.0),
        phase_bias: args.phase_bias,
        ..Default::default()
    };
    let mut receiver = DvbtReceiver::new(params, settings);
    let mut source = IqSampleReader::new(BufReader::new(input));

    let mut queue = BitQueue::default();
    let mut decoder = ViterbiDecoder::new();
    let mut truncated = None;
    loop {
        let symbol = match receiver.process_symbol(&mut source) {
            Ok(Some(symbol)) => symbol,
            Ok(None) => break,
            Err(error @ SyncError::ShortRead { .. }) => {
                truncated = Some(error);
                break;
            }
            Err(error) => return Err(error).context("Receiving a symbol failed"),
        };
        if let Some(event) = &symbol.tps {
            log::info!("TPS: {}", event);
        }
        let Some(bits) = symbol.bits else { continue };
        if args.raw_bits {
            output
                .write_all(bits)
                .context("Failed to write demultiplexed bits")?;
            continue;
        }
        queue.push_bytes(bits, bits.len() * 8);
        while let Some((x, y0, y1)) = queue.pop3() {
            decoder.consume(true, x, y0);
            decoder.consume(false, 0, y1);
        }
        output
            .write_all(&decoder.drain_bytes())
            .context("Failed to write decoded bits")?;
    }

    if !args.raw_bits {
        let metric = decoder.finish();
        log::info!("Final path metric was {}", metric);
        let mut tail = decoder.drain_bytes();
        // Zero pad the trailing partial byte so every decoded bit is written
        let remainder = decoder.decoded_bit_length();
        if remainder > 0 {
            let mut byte = 0u8;
            for index in 0..remainder {
                byte |= decoder.decoded_bit(index) << (7 - index);
            }
            tail.push(byte);
        }
        output
            .write_all(&tail)
            .context("Failed to write decoded bits")?;
    }
    output.flush().context("Failed to flush output")?;
    // A capture cut mid symbol is still an error, reported only after the
    // decoder has flushed its best effort output
    if let Some(error) = truncated {
        return Err(error).context("Sample stream ended mid symbol");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arguments() -> AppArguments {
        AppArguments {
            guard_divisor: 32,
            snr_db: 20.0,
            phase_bias: 0.0,
            raw_bits: false,
            input_filepath: None,
            output_filepath: None,
        }
    }

    #[test]
    fn truncated_capture_exits_with_an_error() {
        // 1000 samples is well short of the first receive window
        let mut bytes = Vec::new();
        for index in 0..1000 {
            let value = (index as f64 * 0.01).cos();
            bytes.extend_from_slice(&value.to_le_bytes());
            bytes.extend_from_slice(&0.0f64.to_le_bytes());
        }
        let input = Box::new(std::io::Cursor::new(bytes));
        let error = run(&arguments(), input, Box::new(Vec::new())).unwrap_err();
        assert!(matches!(
            error.downcast_ref::<SyncError>(),
            Some(SyncError::ShortRead { .. })
        ));
    }

    #[test]
    fn empty_capture_ends_cleanly() {
        let input = Box::new(std::io::empty());
        assert!(run(&arguments(), input, Box::new(Vec::new())).is_ok());
    }
}
