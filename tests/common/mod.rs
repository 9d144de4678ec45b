//! Helpers shared by the scenario tests.
#![allow(dead_code)]

use rtkernel::port::dummy::DummyPort;
use rtkernel::{Config, Kernel};

pub fn body(_: usize) {}

pub fn kernel() -> Kernel<DummyPort> {
    kernel_with(Config::DEFAULT)
}

pub fn kernel_with(config: Config) -> Kernel<DummyPort> {
    Kernel::new(config, DummyPort::new()).unwrap()
}

/// Let the timer service run while it is the current task.
pub fn service(k: &mut Kernel<DummyPort>) {
    #[cfg(feature = "timers")]
    for _ in 0..8 {
        if k.current().is_none() || k.current() != k.timer_task() {
            break;
        }
        k.run_timer_service().unwrap();
    }
    #[cfg(not(feature = "timers"))]
    let _ = k;
}

/// Start the scheduler and settle the timer service.
pub fn start(k: &mut Kernel<DummyPort>) {
    k.start().unwrap();
    service(k);
}

/// One tick interrupt, then whatever the timer service has to do.
pub fn tick(k: &mut Kernel<DummyPort>) -> bool {
    let switched = k.tick_interrupt().unwrap();
    service(k);
    switched
}

pub fn ticks(k: &mut Kernel<DummyPort>, n: u32) {
    for _ in 0..n {
        tick(k);
    }
}
