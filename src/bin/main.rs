use std::process::exit;

use ratiotone::midi::core::create_smf;
use ratiotone::notation::rhythm::{expand_tracks, total_beats, Event};
use ratiotone::notation::scale::ratios;

use clap::*;

#[derive(Debug, Parser)]
#[command(name = "rtone")]
#[command(version = "0.1")]
#[command(about = "Just-intonation scale and polyrhythm notation player", long_about = None)]
struct Cli {
    /// Scale ratios, e.g. "1,9/8,5/4,3/2"
    #[arg(short = 'r', default_value = None)]
    ratios: Option<String>,

    /// Rhythm notation, tracks separated by ';', e.g. "[3,4]x2;(2),5"
    #[arg(short = 'b', default_value = None)]
    beats: Option<String>,

    /// Base frequency in Hz
    #[arg(short = 'f', default_value = "440")]
    base_frequency: String,

    /// Length of one beat in milliseconds
    #[arg(short = 't', default_value = "500")]
    beat_ms: String,

    #[arg(short = 'o', default_value = None)]
    output: Option<String>,
}

fn show_events(events: &[Event]) -> String {
    let shown: Vec<String> = events
        .iter()
        .map(|e| {
            if e.is_rest {
                format!("({})", e.value)
            } else {
                format!("{}", e.value)
            }
        })
        .collect();
    shown.join(" , ")
}

fn main() {
    let matches = Cli::parse();
    match matches {
        Cli {
            ratios: ratio_input,
            beats,
            base_frequency,
            beat_ms,
            output,
        } => {
            if ratio_input == None && beats == None {
                println!("No scale or rhythm notation was supplied, exiting...");
                exit(1)
            }

            let base = match base_frequency.parse::<f64>() {
                Err(e) => panic!("Can't parse the base frequency: {}", e),
                Ok(f) if f <= 0.0 => panic!("The base frequency must be positive."),
                Ok(f) => f,
            };
            let beat = match beat_ms.parse::<u32>() {
                Err(e) => panic!("Can't parse the beat length: {}", e),
                Ok(ms) if ms == 0 || ms > 16_000 => {
                    panic!("The beat length must be between 1 and 16000 milliseconds.")
                }
                Ok(ms) => ms,
            };

            let scale = match &ratio_input {
                None => Vec::new(),
                Some(raw) => {
                    let parsed = ratios(raw);
                    if parsed.is_empty() {
                        println!("No valid ratios were found in {:?}.", raw);
                        exit(1)
                    }
                    parsed
                }
            };
            let tracks = match &beats {
                None => Vec::new(),
                Some(raw) => {
                    let expanded = expand_tracks(raw);
                    if expanded.iter().all(|track| track.is_empty()) {
                        println!("No valid beats were found in {:?}.", raw);
                        exit(1)
                    }
                    expanded
                }
            };

            if !scale.is_empty() {
                let shown: Vec<String> = scale.iter().map(|r| format!("{:.3}", r.0)).collect();
                println!("Scale: {}", shown.join(" , "));
            }
            for (index, track) in tracks.iter().enumerate() {
                println!(
                    "Track {}: {} ({} beats)",
                    index + 1,
                    show_events(track),
                    total_beats(track)
                );
            }

            let smf = create_smf(&scale, &tracks, base, beat);
            match output {
                None => {
                    println!("No output file path was supplied, running a dry run...");
                }
                Some(path) => {
                    match smf.save(path.clone()) {
                        Ok(_) => {
                            println!("{} was written successfully", path);
                            exit(0)
                        }
                        Err(e) => {
                            println!("Failed to write {}: {}", path, e);
                            exit(1)
                        }
                    };
                }
            };
        }
    }
}
