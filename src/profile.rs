//! Block-profiling hooks.
//!
//! The primitives report how long a task stayed parked. Events flow to an
//! installed sink; nothing is recorded while the process-wide rate is zero
//! or no sink is installed, and the hot paths only pay for a load.

use core::sync::atomic::{AtomicI64, Ordering};

/// Receives one event per sampled block. `cycles` is the time spent parked
/// in [`Park::cputicks`](crate::park::Park::cputicks) units, `skip` the
/// number of stack frames between the sink and the blocking call.
pub type BlockEventSink = fn(cycles: i64, skip: usize);

static BLOCK_RATE: AtomicI64 = AtomicI64::new(0);
static mut EVENT_SINK: Option<BlockEventSink> = None;

/// Set the sampling rate: `rate <= 0` disables profiling, `1` records every
/// block event, and a larger value records only events of at least `rate`
/// ticks.
pub fn set_block_rate(rate: i64) {
    BLOCK_RATE.store(rate, Ordering::SeqCst);
}

pub fn block_rate() -> i64 {
    BLOCK_RATE.load(Ordering::SeqCst)
}

/// Install the process-wide block-event sink.
///
/// # Safety
/// Must only be called while no other thread can block on one of the
/// primitives, typically during single-threaded startup.
pub unsafe fn set_event_sink(sink: BlockEventSink) {
    EVENT_SINK = Some(sink);
}

/// # Safety
/// Same requirements as [`set_event_sink`].
pub unsafe fn clear_event_sink() {
    EVENT_SINK = None;
}

pub fn blockevent(cycles: i64, skip: usize) {
    let rate = block_rate();
    if rate <= 0 || (rate > 1 && cycles < rate) {
        return;
    }
    let sink = unsafe { EVENT_SINK };
    if let Some(sink) = sink {
        sink(cycles, skip);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::thread;
    use std::vec::Vec;

    use super::*;
    use crate::park::ThreadPark;
    use crate::sema::SemaTable;

    // The sink and the rate are process-wide; tests touching them must not
    // overlap.
    static SERIAL: Mutex<()> = Mutex::new(());

    static EVENTS: Mutex<Vec<(i64, usize)>> = Mutex::new(Vec::new());

    fn record(cycles: i64, skip: usize) {
        EVENTS.lock().unwrap().push((cycles, skip));
    }

    // Tests elsewhere may block while the rate is nonzero here, so only
    // count events carrying this module's marker skip values.
    fn marked(skip: usize) -> Vec<(i64, usize)> {
        EVENTS
            .lock()
            .unwrap()
            .iter()
            .copied()
            .filter(|&(_, s)| s == skip)
            .collect()
    }

    #[test]
    fn rate_gates_events() {
        let _serial = SERIAL.lock().unwrap();
        unsafe { set_event_sink(record) };
        EVENTS.lock().unwrap().clear();

        set_block_rate(0);
        blockevent(1000, 91);
        assert!(marked(91).is_empty());

        set_block_rate(1);
        blockevent(1000, 91);
        assert_eq!(marked(91), [(1000, 91)]);

        set_block_rate(500);
        blockevent(499, 92);
        blockevent(501, 92);
        assert_eq!(marked(92), [(501, 92)]);

        set_block_rate(0);
        unsafe { clear_event_sink() };
    }

    #[test]
    fn parked_acquire_reports_block_time() {
        let _serial = SERIAL.lock().unwrap();
        static SAMPLES: AtomicUsize = AtomicUsize::new(0);
        fn count(cycles: i64, _skip: usize) {
            assert!(cycles >= 0);
            SAMPLES.fetch_add(1, Ordering::SeqCst);
        }
        unsafe { set_event_sink(count) };
        set_block_rate(1);

        let table = SemaTable::<ThreadPark>::new();
        let sema = AtomicU32::new(0);
        thread::scope(|s| {
            let t = s.spawn(|| table.acquire(&sema, true));
            while table.waiter_count(&sema) == 0 {
                thread::yield_now();
            }
            table.release(&sema);
            t.join().unwrap();
        });
        assert!(SAMPLES.load(Ordering::SeqCst) >= 1);

        set_block_rate(0);
        unsafe { clear_event_sink() };
    }
}
