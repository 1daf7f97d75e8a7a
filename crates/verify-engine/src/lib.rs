pub mod driver;
pub mod engine;
pub mod queue;
pub mod virtual_time;

#[cfg(test)]
mod test_support;

pub use engine::Verifier;
pub use virtual_time::VirtualScheduler;

/// Install the process-wide virtual-time scheduler. Idempotent.
pub fn enable_virtual_time(all_schedulers: bool) {
    VirtualScheduler::global().enable(all_schedulers);
}

/// Uninstall the virtual-time scheduler and clear its pending tasks.
pub fn disable_virtual_time() {
    VirtualScheduler::global().disable();
}
