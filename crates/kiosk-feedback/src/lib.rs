//! Button-driven feedback cycler.
//!
//! Each accepted press on the button line advances a three-state counter,
//! lights the matching lamp and chirps the buzzer once. After a quiet period
//! the final state is published on a read-once status channel, confirmed
//! with three beeps and reset to zero.
//!
//! The pieces are usable on their own ([`FeedbackMachine`], [`StatusChannel`],
//! [`Sequencer`]) but most callers only need [`Cycler`], which claims the
//! lines, wires everything together and tears it down again.

pub mod channel;
pub mod config;
pub mod cycler;
pub mod indicator;
pub mod scheduler;
pub mod sequencer;
pub mod state_machine;

pub use channel::{Readiness, ReadinessPolicy, StatusChannel, StatusEndpoint};
pub use config::CyclerConfig;
pub use cycler::Cycler;
pub use indicator::Indicator;
pub use scheduler::{DeferredScheduler, TimerCallback, TimerHandle, TokioScheduler};
pub use sequencer::{BeepPattern, BeepTiming, Sequencer};
pub use state_machine::{CyclerStats, EdgeOutcome, FeedbackMachine, MachineTiming, Phase};
