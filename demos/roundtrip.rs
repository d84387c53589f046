//! Minimal producer/consumer round trip against a real file on disk.
//!
//! Run with `cargo run --example roundtrip -- /tmp/roundtrip.dq`.

use std::env;
use std::process;

use dqueue::{OpenMode, Queue};

fn main() {
    env_logger::init();

    let path = env::args().nth(1).unwrap_or_else(|| "roundtrip.dq".into());

    if let Err(err) = run(&path) {
        eprintln!("roundtrip failed: {}", err);
        process::exit(1);
    }
}

fn run(path: &str) -> dqueue::Result<()> {
    let mut producer = Queue::open(path, 64)?;
    producer.push(vec![&b"hello"[..], &b"from"[..], &b"dqueue"[..]])?;
    producer.flush(dqueue::Flush::Sync)?;

    let mut consumer = Queue::open_with_mode(path, 64, OpenMode::Reopen)?;
    for packet in consumer.pop()? {
        println!("{}", String::from_utf8_lossy(packet));
    }

    Ok(())
}
