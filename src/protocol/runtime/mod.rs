//! Dispatch runtime tying registry, E2E validation, and scheduler to a
//! concrete CAN bus. One runner drives one physical bus.
//!
//! It offers:
//!
//! * a trigger handle (`TxHandle`) for application tasks to request
//!   event-driven transmissions;
//! * a notification receiver (`RxFrames`) delivering validated inbound
//!   frames to the application.
//!
//! Firmware decides the queue depths by providing pre-allocated
//! [`embassy_sync::Channel`] instances. No allocation is performed by the
//! library and there is no dependency on a particular BSP.

use core::fmt::Debug;
use core::sync::atomic::{AtomicU32, Ordering};

use embassy_sync::{
    blocking_mutex::raw::CriticalSectionRawMutex,
    channel::{Channel, Receiver, Sender},
};
use futures_util::{future::select, future::Either, pin_mut};

use crate::core::{Direction, FrameDescriptor, HandlerIndex, FRAME_MAX_BYTES};
use crate::error::{RegistryError, SendFrameError};
use crate::infra::codec::traits::FrameCodec;
use crate::protocol::e2e::{
    protect_in_place, validate_bytes, E2eState, SharedStatus, TransmissionStatus,
};
use crate::protocol::registry::Registry;
use crate::protocol::scheduler::TxScheduler;
use crate::protocol::transport::can_frame::CanFrame;
use crate::protocol::transport::traits::can_bus::CanBus;
use crate::protocol::transport::traits::tick_timer::TickTimer;

//==================================================================================SHARED_STATE

/// Global dispatch counters, shared between the runner and any task that
/// wants to observe bus health. All counters saturate at `u32::MAX`.
#[derive(Debug, Default)]
pub struct StackStats {
    rx_frames: AtomicU32,
    tx_frames: AtomicU32,
    rx_unknown_id: AtomicU32,
    rx_queue_full: AtomicU32,
    tx_send_buf_full: AtomicU32,
}

impl StackStats {
    pub const fn new() -> Self {
        Self {
            rx_frames: AtomicU32::new(0),
            tx_frames: AtomicU32::new(0),
            rx_unknown_id: AtomicU32::new(0),
            rx_queue_full: AtomicU32::new(0),
            tx_send_buf_full: AtomicU32::new(0),
        }
    }

    fn incr(counter: &AtomicU32) {
        let _ = counter.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| {
            v.checked_add(1)
        });
    }

    /// Frames received on the bus, mapped or not.
    pub fn rx_frames(&self) -> u32 {
        self.rx_frames.load(Ordering::Relaxed)
    }

    /// Frames handed to the bus driver.
    pub fn tx_frames(&self) -> u32 {
        self.tx_frames.load(Ordering::Relaxed)
    }

    /// Received frames whose identifier is not in the registry.
    pub fn rx_unknown_id(&self) -> u32 {
        self.rx_unknown_id.load(Ordering::Relaxed)
    }

    /// Notifications dropped because the application queue was full.
    pub fn rx_queue_full(&self) -> u32 {
        self.rx_queue_full.load(Ordering::Relaxed)
    }

    /// Sends refused by the bus driver.
    pub fn tx_send_buf_full(&self) -> u32 {
        self.tx_send_buf_full.load(Ordering::Relaxed)
    }
}

/// Per-frame shared state: one status cell and one reception timestamp
/// per handler, readable by application tasks without locking.
///
/// The runner only records when each inbound frame was last seen; it does
/// not declare timeouts itself. A supervision task compares the recorded
/// tick against the current one and sets
/// [`TransmissionStatus::TIMEOUT`] through the status cell.
pub struct StatusBoard<const N: usize> {
    status: [SharedStatus; N],
    last_seen_tick: [AtomicU32; N],
}

impl<const N: usize> StatusBoard<N> {
    /// Build the board over a descriptor table. Inbound cells start with
    /// the never-received marker, outbound cells start clean.
    pub fn new(frames: &[FrameDescriptor]) -> Result<Self, RegistryError> {
        if frames.len() != N {
            return Err(RegistryError::CapacityMismatch {
                capacity: N,
                count: frames.len(),
            });
        }
        Ok(Self {
            status: core::array::from_fn(|i| match frames[i].direction {
                Direction::Inbound => SharedStatus::new(),
                Direction::Outbound => SharedStatus::new_ok(),
            }),
            last_seen_tick: core::array::from_fn(|_| AtomicU32::new(0)),
        })
    }

    /// Status cell of a frame.
    pub fn status(&self, handler: HandlerIndex) -> &SharedStatus {
        &self.status[handler.as_usize()]
    }

    /// Tick at which the frame was last received.
    pub fn last_seen(&self, handler: HandlerIndex) -> u32 {
        self.last_seen_tick[handler.as_usize()].load(Ordering::Relaxed)
    }

    fn mark_seen(&self, handler: HandlerIndex, tick: u32) {
        self.last_seen_tick[handler.as_usize()].store(tick, Ordering::Relaxed);
    }
}

//==================================================================================APPLICATION_SEAM

/// Supplies outbound payload bytes at the moment a frame is due.
///
/// Implementations typically run the generated pack function over the
/// current signal values. The returned length is clamped to the buffer;
/// returning the frame's DLC is expected.
pub trait PayloadSource {
    fn load(&mut self, desc: &FrameDescriptor, buffer: &mut [u8; FRAME_MAX_BYTES]) -> usize;
}

/// Pack, protect, and transmit one frame outside the dispatch loop.
///
/// Intended for single-shot frames an application sends on its own, for
/// example diagnostic responses. Frames owned by a running dispatch loop
/// must go through [`TxHandle::trigger`] instead, so that counter state
/// and scheduling stay consistent.
pub async fn send_frame<B, C>(
    bus: &mut B,
    desc: &FrameDescriptor,
    state: &mut E2eState,
    signals: &C::Signals,
) -> Result<(), SendFrameError<B::Error>>
where
    B: CanBus,
    C: FrameCodec,
{
    let mut buffer = [0u8; FRAME_MAX_BYTES];
    let len = C::pack(signals, &mut buffer).map_err(SendFrameError::Pack)?;
    protect_in_place(desc, state, &mut buffer[..len]).map_err(SendFrameError::Protect)?;
    let frame = CanFrame::new(desc.id, &buffer[..len]);
    bus.send(&frame).await.map_err(SendFrameError::Send)
}

/// Validated inbound frame forwarded to the application.
#[derive(Debug, Clone)]
pub struct RxNotification {
    /// Handler of the resolved frame.
    pub handler: HandlerIndex,
    /// The raw frame as received.
    pub frame: CanFrame,
    /// Outcome of the E2E validation for this reception.
    pub status: TransmissionStatus,
}

/// Commands queued by producer tasks.
#[derive(Clone)]
pub enum StackCommand {
    /// Request an event-driven transmission.
    Trigger(HandlerIndex),
}

//==================================================================================SERVICE

/// Service assembling the dispatch components for one bus.
pub struct CanStackService<
    'a,
    C: CanBus,
    T: TickTimer,
    P: PayloadSource,
    const N: usize,
    const CMD_CAP: usize,
    const RX_CAP: usize,
> where
    C::Error: Debug,
{
    registry: &'a Registry<'a>,
    bus: C,
    timer: T,
    source: P,
    idx_bus: u8,
    tick_ms: u32,
    board: &'a StatusBoard<N>,
    stats: &'a StackStats,
    command_channel: &'a Channel<CriticalSectionRawMutex, StackCommand, CMD_CAP>,
    rx_channel: &'a Channel<CriticalSectionRawMutex, RxNotification, RX_CAP>,
}

impl<'a, C, T, P, const N: usize, const CMD_CAP: usize, const RX_CAP: usize>
    CanStackService<'a, C, T, P, N, CMD_CAP, RX_CAP>
where
    C: CanBus,
    C::Error: Debug,
    T: TickTimer,
    P: PayloadSource,
{
    /// Assemble the service from its pre-allocated parts.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        registry: &'a Registry<'a>,
        bus: C,
        timer: T,
        source: P,
        idx_bus: u8,
        tick_ms: u32,
        board: &'a StatusBoard<N>,
        stats: &'a StackStats,
        command_channel: &'a Channel<CriticalSectionRawMutex, StackCommand, CMD_CAP>,
        rx_channel: &'a Channel<CriticalSectionRawMutex, RxNotification, RX_CAP>,
    ) -> Self {
        Self {
            registry,
            bus,
            timer,
            source,
            idx_bus,
            tick_ms,
            board,
            stats,
            command_channel,
            rx_channel,
        }
    }

    /// Split into handle/receiver/runner components.
    pub fn into_parts(self) -> StackParts<'a, C, T, P, N, CMD_CAP, RX_CAP> {
        StackParts {
            tx: TxHandle {
                sender: self.command_channel.sender(),
            },
            rx: RxFrames {
                receiver: self.rx_channel.receiver(),
            },
            runner: StackRunner {
                registry: self.registry,
                bus: self.bus,
                timer: self.timer,
                source: self.source,
                idx_bus: self.idx_bus,
                tick_ms: self.tick_ms,
                board: self.board,
                stats: self.stats,
                command_channel: self.command_channel,
                rx_channel: self.rx_channel,
            },
        }
    }
}

/// Bundle returned by [`CanStackService::into_parts`].
pub struct StackParts<'a, C, T, P, const N: usize, const CMD_CAP: usize, const RX_CAP: usize>
where
    C: CanBus,
    C::Error: Debug,
    T: TickTimer,
    P: PayloadSource,
{
    pub tx: TxHandle<'a, CMD_CAP>,
    pub rx: RxFrames<'a, RX_CAP>,
    pub runner: StackRunner<'a, C, T, P, N, CMD_CAP, RX_CAP>,
}

//==================================================================================HANDLES

/// Trigger handle for application tasks.
pub struct TxHandle<'a, const CMD_CAP: usize> {
    sender: Sender<'a, CriticalSectionRawMutex, StackCommand, CMD_CAP>,
}

impl<'a, const CMD_CAP: usize> TxHandle<'a, CMD_CAP> {
    /// Queue an event trigger, waiting when the command queue is full.
    pub async fn trigger(&self, handler: HandlerIndex) {
        self.sender.send(StackCommand::Trigger(handler)).await;
    }

    /// Queue an event trigger without waiting. Returns `false` when the
    /// command queue is full.
    pub fn try_trigger(&self, handler: HandlerIndex) -> bool {
        self.sender
            .try_send(StackCommand::Trigger(handler))
            .is_ok()
    }
}

/// Receiver of validated inbound frames.
pub struct RxFrames<'a, const RX_CAP: usize> {
    receiver: Receiver<'a, CriticalSectionRawMutex, RxNotification, RX_CAP>,
}

impl<'a, const RX_CAP: usize> RxFrames<'a, RX_CAP> {
    pub async fn next(&mut self) -> RxNotification {
        self.receiver.receive().await
    }
}

//==================================================================================RUNNER

#[derive(Debug)]
pub enum StackRunError<E: Debug> {
    /// Registry and compile-time capacities disagree.
    Config(RegistryError),
    /// The bus driver reported an unrecoverable receive failure.
    Receive(E),
}

/// Runner that drives the dispatch loop of one bus.
pub struct StackRunner<'a, C, T, P, const N: usize, const CMD_CAP: usize, const RX_CAP: usize>
where
    C: CanBus,
    C::Error: Debug,
    T: TickTimer,
    P: PayloadSource,
{
    registry: &'a Registry<'a>,
    bus: C,
    timer: T,
    source: P,
    idx_bus: u8,
    tick_ms: u32,
    board: &'a StatusBoard<N>,
    stats: &'a StackStats,
    command_channel: &'a Channel<CriticalSectionRawMutex, StackCommand, CMD_CAP>,
    rx_channel: &'a Channel<CriticalSectionRawMutex, RxNotification, RX_CAP>,
}

impl<'a, C, T, P, const N: usize, const CMD_CAP: usize, const RX_CAP: usize>
    StackRunner<'a, C, T, P, N, CMD_CAP, RX_CAP>
where
    C: CanBus,
    C::Error: Debug,
    T: TickTimer,
    P: PayloadSource,
{
    /// Drive reception and transmission until the bus fails.
    ///
    /// The loop races inbound frames against the dispatch tick. The tick
    /// deadline is armed once per period and held across receptions, so
    /// a busy bus cannot push it out indefinitely; only its expiry
    /// re-arms it. Each tick drains the pending triggers, advances the
    /// scheduler, and sends every frame that came due.
    pub async fn run(self) -> Result<(), StackRunError<C::Error>> {
        let Self {
            registry,
            mut bus,
            mut timer,
            mut source,
            idx_bus,
            tick_ms,
            board,
            stats,
            command_channel,
            rx_channel,
        } = self;

        let frames = registry.frames();
        let mut scheduler = TxScheduler::<N>::new(frames).map_err(StackRunError::Config)?;
        let mut e2e: [E2eState; N] = core::array::from_fn(|i| E2eState::new(&frames[i]));
        let mut tick: u32 = 0;

        loop {
            {
                let tick_future = timer.delay_ms(tick_ms);
                pin_mut!(tick_future);

                loop {
                    let recv_future = bus.recv();
                    pin_mut!(recv_future);

                    match select(recv_future, tick_future.as_mut()).await {
                        Either::Left((result, _)) => {
                            let frame = result.map_err(StackRunError::Receive)?;
                            process_rx(
                                registry, board, stats, rx_channel, idx_bus, &mut e2e, tick,
                                frame,
                            );
                        }
                        Either::Right(((), _)) => break,
                    }
                }
            }

            tick = tick.wrapping_add(1);
            while let Ok(StackCommand::Trigger(handler)) = command_channel.try_receive() {
                scheduler.trigger(handler);
            }
            run_tick(
                &mut bus,
                &mut source,
                registry,
                board,
                stats,
                &mut scheduler,
                &mut e2e,
                tick_ms,
            )
            .await;
        }
    }
}

/// Resolve, validate, publish, and forward one inbound frame.
#[allow(clippy::too_many_arguments)]
fn process_rx<const N: usize, const RX_CAP: usize>(
    registry: &Registry<'_>,
    board: &StatusBoard<N>,
    stats: &StackStats,
    rx_channel: &Channel<CriticalSectionRawMutex, RxNotification, RX_CAP>,
    idx_bus: u8,
    e2e: &mut [E2eState; N],
    tick: u32,
    frame: CanFrame,
) {
    StackStats::incr(&stats.rx_frames);

    let Some(handler) = registry.resolve(idx_bus, frame.id) else {
        StackStats::incr(&stats.rx_unknown_id);
        #[cfg(feature = "defmt")]
        defmt::warn!("Unmapped CAN ID {=u32:#x} on bus {}", frame.id.value(), idx_bus);
        return;
    };

    let desc = registry.descriptor(handler);
    let status = validate_bytes(desc, &mut e2e[handler.as_usize()], frame.payload());

    // Reception clears any timeout verdict along with stale error bits.
    board.status(handler).store(status);
    board.mark_seen(handler, tick);

    #[cfg(feature = "defmt")]
    if !status.is_ok() {
        defmt::debug!(
            "Frame {} validation status {=u8:#x}",
            handler.get(),
            status.raw()
        );
    }

    let notification = RxNotification {
        handler,
        frame,
        status,
    };
    if rx_channel.try_send(notification).is_err() {
        // Dropping beats stalling the bus loop behind a slow consumer.
        StackStats::incr(&stats.rx_queue_full);
        #[cfg(feature = "defmt")]
        defmt::warn!("Rx queue full, notification for frame {} dropped", handler.get());
    }
}

/// Send every frame the scheduler reports due. A refused send leaves
/// the frame due and flags the buffer-full condition; the next tick
/// retries it.
#[allow(clippy::too_many_arguments)]
async fn run_tick<C, P, const N: usize>(
    bus: &mut C,
    source: &mut P,
    registry: &Registry<'_>,
    board: &StatusBoard<N>,
    stats: &StackStats,
    scheduler: &mut TxScheduler<'_, N>,
    e2e: &mut [E2eState; N],
    tick_ms: u32,
) where
    C: CanBus,
    C::Error: Debug,
    P: PayloadSource,
{
    scheduler.advance(tick_ms);

    let mut due: [Option<HandlerIndex>; N] = [None; N];
    let mut count = 0;
    for handler in scheduler.due() {
        due[count] = Some(handler);
        count += 1;
    }

    for handler in due.iter().take(count).flatten() {
        let desc = registry.descriptor(*handler);
        let mut buffer = [0u8; FRAME_MAX_BYTES];
        let len = source.load(desc, &mut buffer).min(FRAME_MAX_BYTES);
        let state = &mut e2e[handler.as_usize()];
        if protect_in_place(desc, state, &mut buffer[..len]).is_err() {
            // Placement was validated at registry build; a failure here
            // means the payload source returned a short payload.
            #[cfg(feature = "defmt")]
            defmt::error!("E2E protection failed for frame {}", handler.get());
            continue;
        }

        let frame = CanFrame::new(desc.id, &buffer[..len]);
        match bus.send(&frame).await {
            Ok(()) => {
                scheduler.mark_sent(*handler);
                StackStats::incr(&stats.tx_frames);
                board
                    .status(*handler)
                    .clear(TransmissionStatus::SEND_BUFFER_FULL);
            }
            Err(_err) => {
                StackStats::incr(&stats.tx_send_buf_full);
                board
                    .status(*handler)
                    .set(TransmissionStatus::SEND_BUFFER_FULL);
                #[cfg(feature = "defmt")]
                defmt::warn!("Send buffer full for frame {}", handler.get());
            }
        }
    }
}
