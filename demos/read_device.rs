//! Print the events of one input device.
//!
//! Run with: cargo run --example read_device -- /dev/input/event3
//!
//! Without an argument the available event nodes are listed.
//! Note: reading device nodes requires root or membership in the `input` group.

use evstream::{EventType, StreamReader};
use std::fs::{self, File};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

fn list_devices() {
    let Ok(dir) = fs::read_dir("/dev/input") else {
        eprintln!("Cannot access /dev/input");
        return;
    };
    let mut nodes: Vec<_> = dir
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .is_some_and(|name| name.to_string_lossy().starts_with("event"))
        })
        .collect();
    nodes.sort();

    println!("Usage: read_device <device>\n\nAvailable devices:");
    for node in nodes {
        println!("  {}", node.display());
    }
}

fn main() {
    let Some(path) = std::env::args().nth(1) else {
        list_devices();
        return;
    };

    let file = match File::open(&path) {
        Ok(file) => file,
        Err(e) => {
            eprintln!("Failed to open {path}: {e}");
            std::process::exit(1);
        }
    };

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
        println!("\nStopping...");
    })
    .expect("Error setting Ctrl-C handler");

    println!("Reading {path}");
    println!("Press Ctrl+C to exit\n");

    let mut reader = StreamReader::new(file);

    while running.load(Ordering::SeqCst) {
        let mut overflowed = false;
        for result in reader.drain() {
            match result {
                Ok(event) if event.is_dropped() => {
                    println!("{event}  <-- events lost");
                    overflowed = true;
                }
                Ok(event) if event.matches_type(EventType::Syn) => {
                    println!("{event} ----------");
                }
                Ok(event) => println!("{event}"),
                Err(e) => eprintln!("Error: {e}"),
            }
        }

        if overflowed {
            // The device is not queried, so the resync keeps the state seen so
            // far and only clears the overflow.
            let snapshot = reader.tracker().snapshot();
            reader.resync(snapshot);
            println!("Overflow cleared; tracked values may be stale until the keys and axes change again");
        }

        std::thread::sleep(Duration::from_millis(10));
    }

    println!("Tracked {} codes", reader.tracker().len());
}
