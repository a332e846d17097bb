use eventide::{Emitter, Listener, WaitOptions};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Event {
    A,
    B,
    C,
    D,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let emitter = Emitter::<Event, u32>::new();

    // Register Event::A listener for a single call
    emitter.once(
        Event::A,
        Listener::sync(|n| {
            println!("Handled  Event A ({n})");
            Ok(())
        }),
    );

    // Register Event::B listener
    let handle2 = emitter.on(
        Event::B,
        Listener::future(|n| {
            let n = *n;
            async move {
                println!("Handled  Event B ({n})");
                Ok(())
            }
        }),
    );

    // Register Event::C listener for three calls, counting only even payloads
    emitter.when(Event::C, |n| n % 2 == 0).many(
        3,
        Listener::sync(|n| {
            println!("Handled  Event C ({n})");
            Ok(())
        }),
    );

    // Emit events
    emitter.emit(&Event::A, 1)?;
    emitter.emit(&Event::B, 2)?;
    for n in 0..8 {
        emitter.emit(&Event::C, n)?;
    }
    emitter.emit(&Event::D, 3)?;

    // Cancel Event::B listener and wait for Event::D
    handle2.unsubscribe();
    let options = WaitOptions::new().with_timeout(Duration::from_millis(100));
    let wait = emitter.wait_for(Event::D, options);
    {
        let emitter = emitter.clone();
        tokio::spawn(async move { emitter.emit(&Event::D, 4) });
    }
    println!("Waited for Event D: {:?}", wait.await);

    // Emit again
    emitter.emit(&Event::A, 5)?;
    emitter.emit(&Event::B, 6)?;
    println!("Remaining events: {:?}", emitter.event_names());
    Ok(())
}
