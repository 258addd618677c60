//! Async runtime — runs an [`Interpreter`] as a tokio actor.
//!
//! Events queue on an unbounded channel and are processed one at a time.
//! Snapshots are published on a `watch` channel, actions are forwarded to
//! the host on an mpsc channel, and timed transitions run as a spawned
//! sleeper that is aborted whenever its state is exited.

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::interpreter::{Interpreter, Outcome, TimerCommand};
use super::{MachineSnapshot, StateMachine};
use crate::error::MachineError;

pub type Snapshot<M> = MachineSnapshot<<M as StateMachine>::State, <M as StateMachine>::Context>;

enum Envelope<E> {
    Event(E),
    Timeout { epoch: u64, event: E },
    Shutdown,
}

/// The single pending timer of a machine. Aborted on replace and on drop.
#[derive(Default)]
struct TimerSlot {
    handle: Option<JoinHandle<()>>,
}

impl TimerSlot {
    fn replace(&mut self, handle: Option<JoinHandle<()>>) {
        if let Some(old) = std::mem::replace(&mut self.handle, handle) {
            old.abort();
        }
    }
}

impl Drop for TimerSlot {
    fn drop(&mut self) {
        self.replace(None);
    }
}

/// Owner handle for a running machine. Dropping it tears the machine down.
pub struct MachineHandle<M: StateMachine> {
    tx: mpsc::UnboundedSender<Envelope<M::Event>>,
    state_rx: watch::Receiver<Snapshot<M>>,
    task: Option<JoinHandle<()>>,
}

impl<M: StateMachine> MachineHandle<M> {
    /// Start `machine` on a new task. Returns the handle and the receiver
    /// for actions the host must perform.
    pub fn spawn(machine: M) -> (Self, mpsc::UnboundedReceiver<M::Action>) {
        let mut interpreter = Interpreter::new(machine);
        let (tx, rx) = mpsc::unbounded_channel();
        let (action_tx, action_rx) = mpsc::unbounded_channel();

        let started = interpreter.start();
        let (state_tx, state_rx) = watch::channel(interpreter.snapshot());

        let actor = Actor {
            interpreter,
            rx,
            self_tx: tx.downgrade(),
            state_tx,
            action_tx,
            timer: TimerSlot::default(),
        };
        let task = tokio::spawn(actor.run(started));
        info!(machine = M::NAME, "State machine started");

        (
            Self {
                tx,
                state_rx,
                task: Some(task),
            },
            action_rx,
        )
    }

    /// Queue an event. Fails once the machine has stopped.
    pub fn send(&self, event: M::Event) -> Result<(), MachineError> {
        if self.task.as_ref().is_none_or(|t| t.is_finished()) {
            return Err(MachineError::Stopped { machine: M::NAME });
        }
        self.tx
            .send(Envelope::Event(event))
            .map_err(|_| MachineError::Stopped { machine: M::NAME })
    }

    /// Latest published snapshot.
    pub fn state(&self) -> Snapshot<M> {
        self.state_rx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Snapshot<M>> {
        self.state_rx.clone()
    }

    /// Wait until a published snapshot satisfies `pred`.
    pub async fn wait_for(
        &self,
        mut pred: impl FnMut(&Snapshot<M>) -> bool,
    ) -> Result<Snapshot<M>, MachineError> {
        let mut rx = self.subscribe();
        let snapshot = rx
            .wait_for(|s| pred(s))
            .await
            .map_err(|_| MachineError::Stopped { machine: M::NAME })?;
        Ok(snapshot.clone())
    }

    /// Stop after the events already queued. Later sends are rejected.
    pub async fn shutdown(&mut self) {
        let _ = self.tx.send(Envelope::Shutdown);
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl<M: StateMachine> Drop for MachineHandle<M> {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

struct Actor<M: StateMachine> {
    interpreter: Interpreter<M>,
    rx: mpsc::UnboundedReceiver<Envelope<M::Event>>,
    self_tx: mpsc::WeakUnboundedSender<Envelope<M::Event>>,
    state_tx: watch::Sender<Snapshot<M>>,
    action_tx: mpsc::UnboundedSender<M::Action>,
    timer: TimerSlot,
}

impl<M: StateMachine> Actor<M> {
    async fn run(mut self, started: Outcome<M::Action, M::Event>) {
        self.apply(started);

        while let Some(envelope) = self.rx.recv().await {
            let outcome = match envelope {
                Envelope::Event(event) => self.interpreter.send(event),
                Envelope::Timeout { epoch, event } => self.interpreter.fire_timer(epoch, event),
                Envelope::Shutdown => break,
            };
            self.apply(outcome);
        }

        debug!(machine = M::NAME, "State machine stopped");
    }

    fn apply(&mut self, outcome: Outcome<M::Action, M::Event>) {
        if !outcome.handled {
            return;
        }

        self.state_tx.send_replace(self.interpreter.snapshot());

        for action in outcome.actions {
            if self.action_tx.send(action).is_err() {
                debug!(machine = M::NAME, "Action receiver dropped");
            }
        }

        match outcome.timer {
            Some(TimerCommand::Arm { epoch, delayed }) => {
                let tx = self.self_tx.clone();
                let handle = tokio::spawn(async move {
                    tokio::time::sleep(delayed.delay).await;
                    if let Some(tx) = tx.upgrade() {
                        let _ = tx.send(Envelope::Timeout {
                            epoch,
                            event: delayed.event,
                        });
                    }
                });
                self.timer.replace(Some(handle));
            }
            Some(TimerCommand::Cancel) => self.timer.replace(None),
            None => {}
        }
    }
}
