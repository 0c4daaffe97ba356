//! Asynchronous timer abstraction driving the periodic dispatch tick.

/// Timer trait abstraction; must remain thread-safe when applicable.
pub trait TickTimer {
    /// Asynchronously wait for `millis` milliseconds.
    fn delay_ms<'a>(&'a mut self, millis: u32) -> impl core::future::Future<Output = ()> + 'a;
}

/// Timer backed by the embassy time driver. Suitable on any target with
/// an embassy executor running.
#[derive(Default)]
pub struct EmbassyTickTimer;

impl TickTimer for EmbassyTickTimer {
    fn delay_ms<'a>(&'a mut self, millis: u32) -> impl core::future::Future<Output = ()> + 'a {
        embassy_time::Timer::after(embassy_time::Duration::from_millis(millis as u64))
    }
}
