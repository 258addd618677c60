//! Synchronous interpreter: owns state and context, applies one event at a
//! time, follows pass-through states and reports timer commands.

use tracing::{debug, warn};

use super::{Delayed, MachineSnapshot, StateMachine, Transition};

/// Upper bound on consecutive pass-through hops per event.
const MAX_PASS_THROUGH: usize = 16;

/// What the runtime must do with the pending timer after a step.
#[derive(Debug, Clone, PartialEq)]
pub enum TimerCommand<E> {
    /// Replace any pending timer. `epoch` identifies the state entry that
    /// armed it.
    Arm { epoch: u64, delayed: Delayed<E> },
    /// Drop any pending timer.
    Cancel,
}

/// Effects of one processed event.
#[derive(Debug)]
pub struct Outcome<A, E> {
    /// False when the event was ignored (or a stale timer).
    pub handled: bool,
    pub actions: Vec<A>,
    /// `None` when the state was not re-entered.
    pub timer: Option<TimerCommand<E>>,
}

impl<A, E> Outcome<A, E> {
    fn ignored() -> Self {
        Self {
            handled: false,
            actions: Vec::new(),
            timer: None,
        }
    }
}

pub struct Interpreter<M: StateMachine> {
    machine: M,
    state: M::State,
    context: M::Context,
    /// Incremented on every state entry.
    epoch: u64,
}

impl<M: StateMachine> Interpreter<M> {
    pub fn new(machine: M) -> Self {
        let state = machine.initial_state();
        let context = machine.initial_context();
        Self {
            machine,
            state,
            context,
            epoch: 0,
        }
    }

    pub fn machine(&self) -> &M {
        &self.machine
    }

    pub fn state(&self) -> &M::State {
        &self.state
    }

    pub fn context(&self) -> &M::Context {
        &self.context
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn snapshot(&self) -> MachineSnapshot<M::State, M::Context> {
        MachineSnapshot {
            value: self.state.clone(),
            context: self.context.clone(),
        }
    }

    /// Enter the initial state.
    pub fn start(&mut self) -> Outcome<M::Action, M::Event> {
        let initial = self.state.clone();
        self.enter(initial, Vec::new())
    }

    /// Apply one event.
    pub fn send(&mut self, event: M::Event) -> Outcome<M::Action, M::Event> {
        let mut context = self.context.clone();
        match self.machine.transition(&self.state, &mut context, &event) {
            Transition::Ignored => {
                debug!(machine = M::NAME, state = %self.state, ?event, "Event ignored");
                Outcome::ignored()
            }
            Transition::Stay { actions } => {
                self.context = context;
                Outcome {
                    handled: true,
                    actions,
                    timer: None,
                }
            }
            Transition::Goto { target, actions } => {
                self.context = context;
                self.enter(target, actions)
            }
        }
    }

    /// Deliver a timed event armed at `epoch`. Stale deliveries (the state
    /// has been exited since) are dropped.
    pub fn fire_timer(&mut self, epoch: u64, event: M::Event) -> Outcome<M::Action, M::Event> {
        if epoch != self.epoch {
            debug!(
                machine = M::NAME,
                epoch,
                current = self.epoch,
                "Dropping stale timer"
            );
            return Outcome::ignored();
        }
        self.send(event)
    }

    fn enter(
        &mut self,
        target: M::State,
        mut actions: Vec<M::Action>,
    ) -> Outcome<M::Action, M::Event> {
        let from = std::mem::replace(&mut self.state, target);

        for hop in 0.. {
            if hop == MAX_PASS_THROUGH {
                warn!(machine = M::NAME, state = %self.state, "Pass-through limit reached");
                break;
            }
            match self.machine.resolve(&self.state, &mut self.context) {
                None | Some(Transition::Ignored) => break,
                Some(Transition::Stay { actions: more }) => {
                    actions.extend(more);
                    break;
                }
                Some(Transition::Goto {
                    target,
                    actions: more,
                }) => {
                    actions.extend(more);
                    self.state = target;
                }
            }
        }

        self.epoch += 1;
        debug!(machine = M::NAME, from = %from, to = %self.state, "Transition");

        let timer = match self.machine.after(&self.state) {
            Some(delayed) => TimerCommand::Arm {
                epoch: self.epoch,
                delayed,
            },
            None => TimerCommand::Cancel,
        };

        Outcome {
            handled: true,
            actions,
            timer: Some(timer),
        }
    }
}
