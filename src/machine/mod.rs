//! Progression state machines.
//!
//! A machine is a plain value implementing [`StateMachine`]: an initial
//! state and context plus a pure transition function. The [`Interpreter`]
//! applies events synchronously and reports timer commands; the
//! [`MachineHandle`] runs an interpreter as a tokio actor with real timers.
//!
//! Three machines are defined on top of it: workout logging
//! ([`workout`]), tier progression ([`tier`]) and buddy matching
//! ([`buddy`]).

pub mod buddy;
pub mod interpreter;
pub mod runtime;
pub mod tier;
pub mod workout;

use std::fmt::{Debug, Display};
use std::time::Duration;

pub use interpreter::{Interpreter, Outcome, TimerCommand};
pub use runtime::MachineHandle;

/// Result of handling one event.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition<S, A> {
    /// No handler in this state. State and context are left untouched.
    Ignored,
    /// Internal transition: context may change, the state is not re-entered.
    Stay { actions: Vec<A> },
    /// External transition: exit the current state and enter `target`.
    Goto { target: S, actions: Vec<A> },
}

impl<S, A> Transition<S, A> {
    pub fn stay() -> Self {
        Self::Stay { actions: Vec::new() }
    }

    pub fn goto(target: S) -> Self {
        Self::Goto {
            target,
            actions: Vec::new(),
        }
    }

    /// Attach an action to a `Stay` or `Goto`. No effect on `Ignored`.
    pub fn with_action(mut self, action: A) -> Self {
        match &mut self {
            Self::Ignored => {}
            Self::Stay { actions } | Self::Goto { actions, .. } => actions.push(action),
        }
        self
    }

    pub fn is_ignored(&self) -> bool {
        matches!(self, Self::Ignored)
    }
}

/// An event delivered automatically after a state has been occupied for
/// `delay`.
#[derive(Debug, Clone, PartialEq)]
pub struct Delayed<E> {
    pub delay: Duration,
    pub event: E,
}

impl<E> Delayed<E> {
    pub fn new(delay: Duration, event: E) -> Self {
        Self { delay, event }
    }
}

/// Current state tag plus context.
#[derive(Debug, Clone, PartialEq)]
pub struct MachineSnapshot<S, C> {
    pub value: S,
    pub context: C,
}

/// A finite-state machine definition.
pub trait StateMachine: Send + Sync + 'static {
    type State: Clone + PartialEq + Debug + Display + Send + Sync + 'static;
    type Context: Clone + Debug + Send + Sync + 'static;
    type Event: Clone + Debug + Send + 'static;
    type Action: Debug + Send + 'static;

    /// Name used in logs and errors.
    const NAME: &'static str;

    fn initial_state(&self) -> Self::State;

    fn initial_context(&self) -> Self::Context;

    /// Handle `event` in `state`. Changes to `context` are discarded when
    /// the result is [`Transition::Ignored`].
    fn transition(
        &self,
        state: &Self::State,
        context: &mut Self::Context,
        event: &Self::Event,
    ) -> Transition<Self::State, Self::Action>;

    /// Transient routing for pass-through states. Returning `Some` on entry
    /// moves the machine on immediately, without waiting for an event.
    fn resolve(
        &self,
        _state: &Self::State,
        _context: &mut Self::Context,
    ) -> Option<Transition<Self::State, Self::Action>> {
        None
    }

    /// Timed transition armed when `state` is entered.
    fn after(&self, _state: &Self::State) -> Option<Delayed<Self::Event>> {
        None
    }
}

/// Guard predicate over a machine context.
pub type Guard<C> = fn(&C) -> bool;

/// Evaluate `(guard, target)` branches in order. The first passing guard
/// wins; `default` otherwise.
pub fn first_match<C, S: Clone>(context: &C, branches: &[(Guard<C>, S)], default: S) -> S {
    branches
        .iter()
        .find(|(guard, _)| guard(context))
        .map(|(_, target)| target.clone())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum Light {
        Red,
        Amber,
        Green,
    }

    #[test]
    fn first_match_takes_first_passing_guard() {
        let branches: [(Guard<u32>, Light); 2] =
            [(|n| *n > 10, Light::Red), (|n| *n > 5, Light::Amber)];
        assert_eq!(first_match(&20, &branches, Light::Green), Light::Red);
        assert_eq!(first_match(&7, &branches, Light::Green), Light::Amber);
        assert_eq!(first_match(&1, &branches, Light::Green), Light::Green);
    }

    #[test]
    fn with_action_ignores_ignored() {
        let t: Transition<Light, &str> = Transition::Ignored.with_action("beep");
        assert!(t.is_ignored());

        let t: Transition<Light, &str> = Transition::goto(Light::Green).with_action("beep");
        assert_eq!(
            t,
            Transition::Goto {
                target: Light::Green,
                actions: vec!["beep"]
            }
        );
    }
}
