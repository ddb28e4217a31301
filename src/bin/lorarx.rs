use std::env;
use std::process;
use std::sync::mpsc;

use lorarx::{read_capture, run, Decoder, DecoderConfig, DemodMethod, Frame};

fn usage() -> ! {
    eprintln!("Usage:");
    eprintln!("  lorarx decode <capture> <sf> [sample-rate]   Decode LoRa frames from an I/Q capture");
    eprintln!();
    eprintln!("  <capture>      .wav (2-channel I/Q) or raw interleaved f32 I/Q");
    eprintln!("  <sf>           spreading factor, 6-12");
    eprintln!("  [sample-rate]  Hz; required for raw captures, ignored for WAV");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --json         print frames as JSON instead of hex");
    eprintln!("  --fft          use the frequency-domain demodulator");
    eprintln!("  --threshold T  energy threshold (clamped to [0, 20])");
    eprintln!("  -v, -vv        log verbosity");
    process::exit(1);
}

fn hex_string(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02X}", b)).collect()
}

struct Options {
    capture: String,
    sf: u8,
    sample_rate: f32,
    json: bool,
    fft: bool,
    threshold: Option<f32>,
    verbosity: usize,
}

fn parse_args(args: &[String]) -> Result<Options, String> {
    let mut positional = Vec::new();
    let mut json = false;
    let mut fft = false;
    let mut threshold = None;
    let mut verbosity = 0;

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--json" => json = true,
            "--fft" => fft = true,
            "--threshold" => {
                let value = iter.next().ok_or("--threshold needs a value")?;
                threshold = Some(
                    value
                        .parse::<f32>()
                        .map_err(|e| format!("invalid threshold '{}': {}", value, e))?,
                );
            }
            "-v" => verbosity = 1,
            "-vv" => verbosity = 2,
            other if other.starts_with('-') => return Err(format!("unknown option {}", other)),
            other => positional.push(other.to_string()),
        }
    }

    if positional.len() < 2 || positional.len() > 3 {
        return Err("expected <capture> <sf> [sample-rate]".into());
    }

    let sf: u8 = positional[1]
        .parse()
        .map_err(|e| format!("invalid spreading factor '{}': {}", positional[1], e))?;
    let sample_rate = match positional.get(2) {
        Some(value) => value
            .parse::<f32>()
            .map_err(|e| format!("invalid sample rate '{}': {}", value, e))?,
        None => 0.0,
    };

    Ok(Options {
        capture: positional[0].clone(),
        sf,
        sample_rate,
        json,
        fft,
        threshold,
        verbosity,
    })
}

fn cmd_decode(options: Options) -> Result<(), Box<dyn std::error::Error>> {
    let (samples, sample_rate) = read_capture(&options.capture, options.sample_rate)?;
    if sample_rate <= 0.0 {
        return Err("raw captures need an explicit sample rate".into());
    }
    eprintln!(
        "{}: {} samples at {} Hz, sf {}",
        options.capture,
        samples.len(),
        sample_rate,
        options.sf
    );

    let mut config = DecoderConfig::new(sample_rate, options.sf);
    if options.fft {
        config.demod = DemodMethod::FrequencyDomain;
    }

    let (tx, rx) = mpsc::channel::<Frame>();
    let mut decoder = Decoder::new(config, Box::new(tx))?;
    if let Some(threshold) = options.threshold {
        decoder.set_abs_threshold(threshold);
    }

    run(&mut decoder, &samples);

    let mut count = 0;
    for frame in rx.try_iter() {
        count += 1;
        if options.json {
            println!("{}", serde_json::to_string(&frame)?);
        } else {
            println!("{}", hex_string(&frame.to_bytes()));
        }
    }
    eprintln!("{} frame(s) decoded", count);
    Ok(())
}

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 3 || args[1] != "decode" {
        usage();
    }

    let options = match parse_args(&args[2..]) {
        Ok(options) => options,
        Err(e) => {
            eprintln!("Error: {}", e);
            usage();
        }
    };

    if stderrlog::new()
        .module("lorarx")
        .verbosity(options.verbosity + 1)
        .init()
        .is_err()
    {
        eprintln!("Warning: logger already initialized");
    }

    if let Err(e) = cmd_decode(options) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
