//! Core Emitter Functionality: Emission and Continuous Listening
//!
//! This example shows the simplest usage of eventide:
//! 1. Defining a payload type.
//! 2. Initializing the Emitter.
//! 3. Registering a continuous listener using `Emitter::on`.
//! 4. Emitting events.
//! 5. Removing the listener through its subscription.
use eventide::{Emitter, from_fn};

// Payload
#[derive(Debug, Clone)]
struct UserAction(String);

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    // 1. Initialize the Emitter, keyed by string slices
    let emitter = Emitter::<&str, UserAction>::new();

    // 2. Register a continuous listener using `Emitter::on`
    let subscription = emitter.on(
        "user",
        from_fn(|action: &UserAction| {
            println!("[Listener] Received action: {}", action.0);
            Ok(())
        }),
    );

    // 3. Emit events
    emitter.emit(&"user", UserAction("Login".to_string()))?;
    emitter.emit(&"user", UserAction("UpdateProfile".to_string()))?;

    // 4. Unsubscribe; later emits reach nobody
    subscription.unsubscribe();
    let delivered = emitter.emit(&"user", UserAction("Logout".to_string()))?;
    println!("Logout delivered to {delivered} listeners.");
    Ok(())
}
