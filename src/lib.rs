//! In-process typed event emitter.
//!
//! ```no_run
//! use eventide::{Emitter, Listener};
//!
//! let emitter = Emitter::<&str, String>::new();
//! let subscription = emitter.on("greet", Listener::sync(|name: &String| {
//!     println!("hello, {name}");
//!     Ok(())
//! }));
//! emitter.emit(&"greet", "world".to_string()).unwrap();
//! subscription.unsubscribe();
//! ```

mod channel;
mod emitter;
mod error;
mod event;
mod fire;
mod handle;
mod listener;
mod logger;
mod options;
mod pipeline;
mod registry;
mod task;
mod wait;

pub use {
    channel::Channel,
    emitter::Emitter,
    error::{Error, ParsePolicyError, WaitError},
    event::{Key, Payload},
    fire::{Fire, Fired, Settled, fire_async_listeners, fire_listeners},
    handle::{ScopedSubscription, Subscription},
    listener::*,
    logger::{Logger, TracingLogger},
    options::{DEFAULT_MAX_LISTENERS, ErrorPolicy, OnOptions, Options, WrapPolicy},
    pipeline::{Flow, Next, Step, Waterfall, run_waterfall},
    wait::{WaitCanceller, WaitFor, WaitOptions},
};
