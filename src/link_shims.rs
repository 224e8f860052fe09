//! Runtime symbol providers for third-party crates.
//!
//! `async_io_mini::Timer` sits on `embassy-time-driver`, which resolves
//! `_embassy_time_now` / `_embassy_time_schedule_wake` at link time.  The
//! `embassy-sync` channel behind [`BrokerEvents`](crate::app::events::BrokerEvents)
//! needs a `critical-section` implementation the same way.
//!
//! | Symbol                          | espidf                 | host                  |
//! |---------------------------------|------------------------|-----------------------|
//! | `_embassy_time_now`             | `esp_timer_get_time`   | `Instant` since first call |
//! | `_embassy_time_schedule_wake`   | sleeper thread         | sleeper thread        |
//! | `_critical_section_1_0_*`       | pthread mutex          | `critical-section/std` (dev) |
//!
//! Ticks are microseconds (the driver's default 1 MHz tick rate).

use core::task::Waker;
use core::time::Duration;

#[cfg(target_os = "espidf")]
fn now_us() -> u64 {
    unsafe { esp_idf_svc::sys::esp_timer_get_time() as u64 }
}

#[cfg(not(target_os = "espidf"))]
fn now_us() -> u64 {
    use std::sync::OnceLock;
    use std::time::Instant;

    static EPOCH: OnceLock<Instant> = OnceLock::new();
    EPOCH.get_or_init(Instant::now).elapsed().as_micros() as u64
}

#[unsafe(no_mangle)]
fn _embassy_time_now() -> u64 {
    now_us()
}

/// Wake `waker` once the clock reaches `at`.
///
/// One short-lived thread per armed timer; the pipeline keeps at most a
/// handful armed at once.
#[unsafe(no_mangle)]
fn _embassy_time_schedule_wake(at: u64, waker: &Waker) {
    let waker = waker.clone();
    std::thread::spawn(move || {
        let now = now_us();
        if at > now {
            std::thread::sleep(Duration::from_micros(at - now));
        }
        waker.wake();
    });
}

#[cfg(target_os = "espidf")]
mod critical {
    use core::cell::{Cell, RefCell};
    use std::sync::{Mutex, MutexGuard, PoisonError};

    static LOCK: Mutex<()> = Mutex::new(());

    thread_local! {
        static DEPTH: Cell<u8> = const { Cell::new(0) };
        static GUARD: RefCell<Option<MutexGuard<'static, ()>>> = const { RefCell::new(None) };
    }

    /// Re-entrant per thread: only the outermost acquire takes the lock.
    #[unsafe(no_mangle)]
    pub extern "C" fn _critical_section_1_0_acquire() -> u8 {
        DEPTH.with(|depth| {
            let d = depth.get();
            if d == 0 {
                let guard = LOCK.lock().unwrap_or_else(PoisonError::into_inner);
                GUARD.with(|g| *g.borrow_mut() = Some(guard));
            }
            let d = d.saturating_add(1);
            depth.set(d);
            d
        })
    }

    #[unsafe(no_mangle)]
    pub extern "C" fn _critical_section_1_0_release(_token: u8) {
        DEPTH.with(|depth| {
            let d = depth.get();
            if d == 0 {
                return;
            }
            depth.set(d - 1);
            if d == 1 {
                GUARD.with(|g| *g.borrow_mut() = None);
            }
        });
    }
}
