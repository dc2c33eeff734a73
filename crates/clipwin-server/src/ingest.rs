#![forbid(unsafe_code)]

//! Input ingestion: interrupt hand-off to a sampling thread.
//!
//! A device's interrupt handler calls [`IrqHandoff::interrupt`], which masks
//! further interrupts and releases an [`InterruptSemaphore`]. The
//! [`IngestWorker`] thread waits on the semaphore, drains every available
//! sample from the [`InputDevice`], posts one router event per sample and
//! finally unmasks the interrupt. Samples therefore reach the server in
//! device order through a single consumer.
//!
//! Touch gestures get a fresh [`PressId`] on each down sample, reused by the
//! following move and up samples. Pointer samples carry absolute position and
//! held buttons; the worker derives press/release/motion events by comparing
//! with the previous held state.

use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use clipwin_core::input::{MouseButtons, MouseEvent, PressId, RawSample, TouchEvent, TouchPhase};
use tracing::{debug, info, trace, warn};

use crate::config::IngestConfig;
use crate::error::ServerError;
use crate::event::Event;
use crate::server::ServerHandle;

/// Counting semaphore released from interrupt context.
#[derive(Debug, Default)]
pub struct InterruptSemaphore {
    count: Mutex<u32>,
    cvar: Condvar,
}

impl InterruptSemaphore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn release(&self) {
        let mut count = self.count.lock().unwrap_or_else(PoisonError::into_inner);
        *count = count.saturating_add(1);
        self.cvar.notify_one();
    }

    /// Take one permit, waiting at most `timeout`. Returns `false` on timeout.
    pub fn acquire_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut count = self.count.lock().unwrap_or_else(PoisonError::into_inner);
        while *count == 0 {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (guard, _) = self
                .cvar
                .wait_timeout(count, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            count = guard;
        }
        *count -= 1;
        true
    }

    /// Permits currently available.
    pub fn available(&self) -> u32 {
        *self.count.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A sampled input device.
pub trait InputDevice: Send {
    /// Mask or unmask the device interrupt.
    fn set_interrupt_enabled(&self, enabled: bool);

    /// Next buffered sample, or `None` when the device is drained.
    fn read_sample(&self) -> Option<RawSample>;
}

/// The device-side half of the hand-off, given to the interrupt handler.
pub struct IrqHandoff<D> {
    device: Arc<D>,
    semaphore: Arc<InterruptSemaphore>,
}

impl<D> Clone for IrqHandoff<D> {
    fn clone(&self) -> Self {
        Self {
            device: Arc::clone(&self.device),
            semaphore: Arc::clone(&self.semaphore),
        }
    }
}

impl<D: InputDevice> IrqHandoff<D> {
    /// Interrupt entry: mask the interrupt and wake the worker.
    pub fn interrupt(&self) {
        self.device.set_interrupt_enabled(false);
        self.semaphore.release();
    }
}

/// Signal for stopping the worker. Also serves as the worker's
/// interruptible sleep.
struct StopSignal {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl StopSignal {
    fn new() -> (Self, StopTrigger) {
        let inner = Arc::new((Mutex::new(false), Condvar::new()));
        let signal = Self {
            inner: Arc::clone(&inner),
        };
        (signal, StopTrigger { inner })
    }

    fn is_stopped(&self) -> bool {
        let (lock, _) = &*self.inner;
        *lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sleep for `duration` unless stopped first. Returns `true` if stopped.
    fn wait_timeout(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        let (lock, cvar) = &*self.inner;
        let mut stopped = lock.lock().unwrap_or_else(PoisonError::into_inner);
        while !*stopped {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (guard, _) = cvar
                .wait_timeout(stopped, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            stopped = guard;
        }
        true
    }
}

struct StopTrigger {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl StopTrigger {
    fn stop(&self) {
        let (lock, cvar) = &*self.inner;
        let mut stopped = lock.lock().unwrap_or_else(PoisonError::into_inner);
        *stopped = true;
        cvar.notify_all();
    }
}

/// Converts raw samples into router events.
#[derive(Debug, Clone, Default)]
pub struct SampleTranslator {
    press: Option<PressId>,
    held: MouseButtons,
}

impl SampleTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events for one sample, in delivery order.
    pub fn translate(&mut self, sample: RawSample) -> Vec<Event> {
        match sample {
            RawSample::Touch(sample) => {
                let press_id = match (sample.phase, self.press) {
                    (TouchPhase::Down, _) | (_, None) => PressId::next(),
                    (_, Some(id)) => id,
                };
                self.press = match sample.phase {
                    TouchPhase::Up => None,
                    TouchPhase::Down | TouchPhase::Move => Some(press_id),
                };
                vec![Event::Touch(TouchEvent { sample, press_id })]
            }
            RawSample::Pointer { x, y, held } => {
                let held = held.held();
                let pressed = held - self.held;
                let released = self.held - held;
                let mut events = Vec::new();
                if !released.is_empty() {
                    events.push(Event::MouseButton(self.pointer(x, y, released | MouseButtons::UP)));
                }
                if !pressed.is_empty() {
                    self.press = Some(PressId::next());
                    events.push(Event::MouseButton(self.pointer(x, y, pressed | MouseButtons::DOWN)));
                }
                if events.is_empty() {
                    events.push(Event::MouseMotion(self.pointer(x, y, held)));
                }
                self.held = held;
                if held.is_empty() && !released.is_empty() {
                    self.press = None;
                }
                events
            }
            RawSample::Key(key) => vec![Event::Keyboard(key)],
        }
    }

    fn pointer(&self, x: i32, y: i32, buttons: MouseButtons) -> MouseEvent {
        MouseEvent::new(x, y, buttons).with_press_id(self.press.unwrap_or_default())
    }
}

/// A running ingestion thread.
pub struct IngestWorker {
    trigger: StopTrigger,
    semaphore: Arc<InterruptSemaphore>,
    thread: Option<JoinHandle<u64>>,
}

impl IngestWorker {
    /// Start sampling `device` on a thread named `name`, posting to `server`.
    /// Returns the worker and the hand-off for the device's interrupt handler.
    pub fn spawn<D: InputDevice + Sync + 'static>(
        name: &str,
        device: D,
        server: ServerHandle,
        config: IngestConfig,
    ) -> Result<(Self, IrqHandoff<D>), ServerError> {
        let device = Arc::new(device);
        let semaphore = Arc::new(InterruptSemaphore::new());
        let (stop, trigger) = StopSignal::new();
        let handoff = IrqHandoff {
            device: Arc::clone(&device),
            semaphore: Arc::clone(&semaphore),
        };

        let worker_semaphore = Arc::clone(&semaphore);
        let thread_name = name.to_owned();
        let thread = thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || {
                ingest_loop(&thread_name, &*device, &worker_semaphore, &server, &config, &stop)
            })
            .map_err(ServerError::Spawn)?;

        device_armed(&handoff);
        Ok((
            Self {
                trigger,
                semaphore,
                thread: Some(thread),
            },
            handoff,
        ))
    }

    /// Stop the thread and return the number of samples it posted.
    pub fn stop(mut self) -> u64 {
        self.trigger.stop();
        self.semaphore.release();
        self.thread
            .take()
            .and_then(|handle| handle.join().ok())
            .unwrap_or(0)
    }
}

impl Drop for IngestWorker {
    fn drop(&mut self) {
        self.trigger.stop();
        self.semaphore.release();
    }
}

fn device_armed<D: InputDevice>(handoff: &IrqHandoff<D>) {
    handoff.device.set_interrupt_enabled(true);
}

fn ingest_loop<D: InputDevice>(
    name: &str,
    device: &D,
    semaphore: &InterruptSemaphore,
    server: &ServerHandle,
    config: &IngestConfig,
    stop: &StopSignal,
) -> u64 {
    info!(source = name, "input ingestion started");
    let mut translator = SampleTranslator::new();
    let mut posted = 0u64;

    'outer: loop {
        if !semaphore.acquire_timeout(config.wait_timeout) {
            if stop.is_stopped() {
                break;
            }
            continue;
        }
        if stop.is_stopped() {
            break;
        }

        let mut drained = 0usize;
        while let Some(sample) = device.read_sample() {
            trace!(source = name, ?sample, "sample");
            drained += 1;
            for event in translator.translate(sample) {
                match server.post(event) {
                    Ok(()) => posted += 1,
                    Err(ServerError::NotRunning) => {
                        debug!(source = name, "server gone");
                        break 'outer;
                    }
                    Err(err) => warn!(source = name, error = %err, "sample dropped"),
                }
            }
            if stop.wait_timeout(config.sample_interval) {
                break 'outer;
            }
        }
        trace!(source = name, drained, "interrupt serviced");
        device.set_interrupt_enabled(true);
    }

    device.set_interrupt_enabled(true);
    info!(source = name, posted, "input ingestion stopped");
    posted
}
