use clap::Parser;
use spmcbuf::{SlotRing, SpmcBufError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Parser, Debug)]
#[clap(name = "monitor")]
#[clap(about = "Producer/consumer/reader demo over one slot ring", long_about = None)]
struct Args {
    #[clap(short, long, default_value_t = 10)]
    capacity: usize,

    #[clap(short, long, default_value_t = 10)]
    duration_secs: u64,

    #[clap(long, default_value_t = 500)]
    produce_interval_ms: u64,

    #[clap(long, default_value_t = 2000)]
    consume_interval_ms: u64,

    #[clap(long, default_value_t = 600)]
    read_interval_ms: u64,
}

fn main() -> Result<(), SpmcBufError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    info!(capacity = args.capacity, "starting slot ring demo");
    debug!(?args, "demo configuration");

    let ring = SlotRing::<u64>::new(args.capacity)?;
    let stop = AtomicBool::new(false);

    thread::scope(|s| {
        s.spawn(|| {
            let mut sequence = 0u64;
            while !stop.load(Ordering::Relaxed) {
                match ring.write_next() {
                    Ok(mut wa) => {
                        *wa = sequence;
                        if wa.overwritten() {
                            warn!(slot = wa.index(), "overwrote an undrained slot");
                        }
                        sequence += 1;
                    }
                    Err(e) => debug!(error = %e, "write lock timeout"),
                }
                thread::sleep(Duration::from_millis(args.produce_interval_ms));
            }
            info!(produced = sequence, "producer done");
        });

        s.spawn(|| {
            while !stop.load(Ordering::Relaxed) {
                match ring.consume_next_available() {
                    Ok(ca) => debug!(slot = ca.index(), value = *ca, "consumed"),
                    Err(e) => debug!(error = %e, "nothing to consume"),
                }
                thread::sleep(Duration::from_millis(args.consume_interval_ms));
            }
        });

        s.spawn(|| {
            while !stop.load(Ordering::Relaxed) {
                match ring.read_newest_available() {
                    Ok(ra) => debug!(slot = ra.index(), value = *ra, "peeked newest"),
                    Err(e) => debug!(error = %e, "nothing to peek"),
                }
                thread::sleep(Duration::from_millis(args.read_interval_ms));
            }
        });

        for _ in 0..args.duration_secs * 10 {
            info!(
                snapshot = %ring,
                consumable = ring.num_consumable_slots(),
                "ring state"
            );
            thread::sleep(Duration::from_millis(100));
        }
        stop.store(true, Ordering::Relaxed);
    });

    info!("demo done");
    Ok(())
}
