use spmcbuf::{SlotRing, SpmcBufError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

const SHORT: Duration = Duration::from_millis(50);

#[test]
fn lossless_fifo_when_ring_outlasts_the_burst() {
    let ring = SlotRing::<u64>::new(64).unwrap();
    let produced: u64 = 50;

    thread::scope(|s| {
        s.spawn(|| {
            for i in 0..produced {
                let mut wa = loop {
                    match ring.write_next() {
                        Ok(wa) => break wa,
                        Err(_) => continue,
                    }
                };
                *wa = i;
            }
        });

        let mut received = Vec::new();
        while received.len() < produced as usize {
            match ring.consume_next_available() {
                Ok(ca) => received.push(*ca),
                Err(SpmcBufError::DataAvailableTimeout) => continue,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!(received, (0..produced).collect::<Vec<_>>());
    });

    assert_eq!(ring.num_consumable_slots(), 0);
}

#[test]
fn writer_blocks_reader_across_threads() {
    let ring = SlotRing::<u64>::with_lock_timeout(2, SHORT).unwrap();

    thread::scope(|s| {
        let writer = s.spawn(|| {
            let wa = ring.write_next().unwrap();
            thread::sleep(Duration::from_millis(200));
            drop(wa);
        });

        // Give the writer time to win slot 0, then fail to share it.
        thread::sleep(Duration::from_millis(50));
        assert!(matches!(
            ring.read_slot(0),
            Err(SpmcBufError::SlotAcqTimeout)
        ));
        writer.join().unwrap();
    });

    let ra = ring.read_slot(0).unwrap();
    assert_eq!(ring.num_concurrent_read(0), 1);
    drop(ra);
}

#[test]
fn consume_wakes_on_production() {
    let ring = SlotRing::<u64>::with_lock_timeout(4, Duration::from_secs(2)).unwrap();

    thread::scope(|s| {
        let consumer = s.spawn(|| {
            let start = Instant::now();
            let ca = ring.consume_next_available().unwrap();
            (*ca, start.elapsed())
        });

        thread::sleep(Duration::from_millis(100));
        {
            let mut wa = ring.write_next().unwrap();
            *wa = 99;
        }

        let (value, waited) = consumer.join().unwrap();
        assert_eq!(value, 99);
        assert!(waited < Duration::from_secs(2));
    });
}

#[test]
fn concurrent_peek_readers_share_the_newest_slot() {
    let ring = SlotRing::<u64>::new(4).unwrap();
    {
        let mut wa = ring.write_next().unwrap();
        *wa = 7;
    }

    thread::scope(|s| {
        for _ in 0..3 {
            s.spawn(|| {
                let ra = ring.read_newest_available().unwrap();
                assert_eq!(*ra, 7);
                assert_eq!(ra.index(), 0);
                thread::sleep(Duration::from_millis(50));
            });
        }
    });

    // Peeking drained nothing.
    assert_eq!(ring.num_consumable_slots(), 1);
    assert!(ring.is_dirty(0));
    assert!(!ring.is_read(0));
}

#[test]
fn producer_release_is_not_blocked_by_waiting_consumer() {
    let ring = SlotRing::<u64>::with_lock_timeout(1, Duration::from_secs(2)).unwrap();
    drop(ring.write_next().unwrap());

    // Overwrite in progress: the queued slot is write-locked again.
    let mut wa = ring.write_next().unwrap();
    assert!(wa.overwritten());
    *wa = 1;

    thread::scope(|s| {
        let consumer = s.spawn(|| ring.consume_next_available().map(|ca| *ca));

        // Let the consumer block on the slot lock, then release the write
        // handle. The release must not wait out the consumer's attempt.
        thread::sleep(Duration::from_millis(100));
        let released = Instant::now();
        drop(wa);
        let release_took = released.elapsed();

        let value = consumer.join().unwrap().unwrap();
        assert_eq!(value, 1);
        assert!(
            release_took < Duration::from_millis(100),
            "write release stalled for {release_took:?}"
        );
    });

    assert_eq!(ring.num_consumable_slots(), 0);
}

#[test]
fn handle_released_on_panic() {
    let ring = SlotRing::<u64>::new(1).unwrap();

    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        let _wa = ring.write_next().unwrap();
        panic!("boom");
    }));
    assert!(result.is_err());

    // The unwound handle still ran the release protocol.
    assert!(!ring.is_written(0));
    assert_eq!(ring.num_consumable_slots(), 1);
    let ca = ring.consume_next_available().unwrap();
    assert_eq!(ca.index(), 0);
}

#[test]
fn stress_producer_consumers_reader() {
    let ring = SlotRing::<u64>::with_lock_timeout(10, SHORT).unwrap();
    let stop = AtomicBool::new(false);

    thread::scope(|s| {
        s.spawn(|| {
            let mut sequence = 0u64;
            while !stop.load(Ordering::Relaxed) {
                if let Ok(mut wa) = ring.write_next() {
                    *wa = sequence;
                    sequence += 1;
                }
            }
        });

        for _ in 0..2 {
            s.spawn(|| {
                while !stop.load(Ordering::Relaxed) {
                    let _ = ring.consume_next_available();
                }
            });
        }

        s.spawn(|| {
            while !stop.load(Ordering::Relaxed) {
                if let Ok(ra) = ring.read_newest_available() {
                    let _ = *ra;
                }
            }
        });

        thread::sleep(Duration::from_millis(200));
        stop.store(true, Ordering::Relaxed);
    });

    // All handles are gone once the scope joins.
    for i in 0..ring.capacity() {
        assert!(!ring.is_written(i));
        assert_eq!(ring.num_concurrent_read(i), 0);
    }
    assert!(ring.num_consumable_slots() <= ring.capacity());
}
