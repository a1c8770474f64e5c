//! Demonstration of iterable-emitter features.
//!
//! Run with: `cargo run --bin demo`

use iterable_emitter::{EventEmitter, IterableEmitter, LogLevel, Options, StreamError, StreamExt};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    println!("=== iterable-emitter Demo ===\n");

    demo_filter_and_transform().await?;
    demo_backpressure().await?;
    demo_competing_handles().await?;
    demo_rejection().await?;
    demo_watchdog().await?;

    println!("\n=== All demos completed successfully! ===");
    Ok(())
}

/// Emitter producing consecutive numbers on a timer until paused or stopped.
struct Ticker {
    emitter: Arc<EventEmitter<u64>>,
    paused: Arc<AtomicBool>,
    produced: Arc<AtomicU64>,
}

impl Ticker {
    fn new() -> Self {
        let emitter = Arc::new(EventEmitter::new());
        let paused = Arc::new(AtomicBool::new(false));
        let p = Arc::clone(&paused);
        emitter.register_control("pause", move || p.store(true, Ordering::SeqCst));
        let r = Arc::clone(&paused);
        emitter.register_control("resume", move || r.store(false, Ordering::SeqCst));
        Self {
            emitter,
            paused,
            produced: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Emits `count` numbers, one per `every`, skipping ticks while paused,
    /// then emits `done`.
    fn start(&self, count: u64, every: Duration) -> tokio::task::JoinHandle<()> {
        let emitter = Arc::clone(&self.emitter);
        let paused = Arc::clone(&self.paused);
        let produced = Arc::clone(&self.produced);
        tokio::spawn(async move {
            let mut ticks = tokio::time::interval(every);
            while produced.load(Ordering::SeqCst) < count {
                ticks.tick().await;
                if !paused.load(Ordering::SeqCst) {
                    let n = produced.fetch_add(1, Ordering::SeqCst) + 1;
                    emitter.emit("data", &[n]);
                }
            }
            emitter.emit("done", &[]);
        })
    }
}

/// Demo 1: pre-filter and transform
async fn demo_filter_and_transform() -> Result<(), Box<dyn std::error::Error>> {
    println!("--- Demo 1: Filter and Transform ---");

    let ticker = Ticker::new();
    let adapter = IterableEmitter::new(
        Arc::clone(&ticker.emitter),
        Options::new("data", "done")
            .pause_by_name("pause")
            .resume_by_name("resume")
            .with_high_water_mark(175)
            .with_low_water_mark(50)
            .with_pre_filter(|args: &[u64]| args[0] % 3 == 0)
            .with_transform(|args: &[u64]| args[0] * 13),
    )?;

    ticker.start(13, Duration::from_millis(1)).await?;

    let mut iter = adapter.iter();
    let mut items = Vec::new();
    while let Some(item) = iter.next().await {
        items.push(item?);
    }

    println!("  Items: {:?}", items);
    println!(
        "  Ingested {}, filtered {}, returned {}",
        adapter.total_ingested(),
        adapter.total_filtered(),
        adapter.total_returned()
    );
    println!("  ✓ Filter and transform complete\n");
    Ok(())
}

/// Demo 2: watermark backpressure against a slow consumer
async fn demo_backpressure() -> Result<(), Box<dyn std::error::Error>> {
    println!("--- Demo 2: Backpressure ---");

    let ticker = Ticker::new();
    let adapter = IterableEmitter::new(
        Arc::clone(&ticker.emitter),
        Options::new("data", "done")
            .pause_by_name("pause")
            .resume_by_name("resume")
            .with_high_water_mark(16)
            .with_low_water_mark(4)
            .with_transform(|args: &[u64]| args[0]),
    )?;

    let producer = ticker.start(100, Duration::from_micros(200));

    let mut stream = Box::pin(adapter.stream());
    let mut max_buffered = 0;
    let mut count = 0;
    while let Some(item) = stream.next().await {
        item?;
        count += 1;
        max_buffered = max_buffered.max(adapter.len());
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    producer.await?;

    println!("  Consumed {} items, buffer never exceeded {}", count, max_buffered);
    println!("  ✓ Backpressure complete\n");
    Ok(())
}

/// Demo 3: several handles share one buffer
async fn demo_competing_handles() -> Result<(), Box<dyn std::error::Error>> {
    println!("--- Demo 3: Competing Handles ---");

    let ticker = Ticker::new();
    let adapter = IterableEmitter::new(
        Arc::clone(&ticker.emitter),
        Options::new("data", "done")
            .pause_by_name("pause")
            .resume_by_name("resume")
            .with_transform(|args: &[u64]| args[0]),
    )?;

    let producer = ticker.start(30, Duration::from_micros(100));

    let mut handles = Vec::new();
    for worker in 0..3 {
        let mut iter = adapter.iter();
        handles.push(tokio::spawn(async move {
            let mut taken = Vec::new();
            while let Some(Ok(item)) = iter.next().await {
                taken.push(item);
            }
            (worker, taken)
        }));
    }

    producer.await?;
    let mut total = 0;
    for handle in handles {
        let (worker, taken) = handle.await?;
        total += taken.len();
        println!("  Worker {} took {:?}", worker, taken);
    }

    println!("  {} items delivered exactly once", total);
    println!("  ✓ Competing handles complete\n");
    Ok(())
}

/// Demo 4: rejection discards buffered items
async fn demo_rejection() -> Result<(), Box<dyn std::error::Error>> {
    println!("--- Demo 4: Rejection ---");

    let emitter = Arc::new(EventEmitter::<String>::new());
    let adapter = IterableEmitter::new(
        Arc::clone(&emitter),
        Options::new("line", "eof")
            .pause_with(|| {})
            .resume_with(|| {})
            .with_logger(
                |record| println!("  [{}] {}", record.level, record.message),
                LogLevel::Error,
            ),
    )?;
    let mut errors = adapter.subscribe_errors();

    emitter.emit("line", &["first".to_owned()]);
    emitter.emit("line", &["second".to_owned()]);
    emitter.emit("error", &["connection reset".to_owned()]);

    println!("  Buffered after rejection: {}", adapter.len());
    if let Ok(err) = errors.recv().await {
        println!("  Broadcast: {}", err);
    }
    match adapter.iter().next().await {
        Some(Err(err)) => println!("  Handle surfaced: {}", err),
        other => println!("  Unexpected: {:?}", other),
    }

    println!("  ✓ Rejection complete\n");
    Ok(())
}

/// Demo 5: inactivity watchdog
async fn demo_watchdog() -> Result<(), Box<dyn std::error::Error>> {
    println!("--- Demo 5: Inactivity Watchdog ---");

    let emitter = Arc::new(EventEmitter::<u64>::new());
    let adapter = IterableEmitter::new(
        Arc::clone(&emitter),
        Options::new("data", "done")
            .pause_with(|| {})
            .resume_with(|| {})
            .with_timeout(Duration::from_millis(50)),
    )?;

    emitter.emit("data", &[1]);

    let mut iter = adapter.iter();
    while let Some(item) = iter.next().await {
        match item {
            Ok(item) => println!("  Received: {:?}", item),
            Err(err @ StreamError::Stalled { .. }) => println!("  Stalled: {}", err),
            Err(err) => return Err(err.into()),
        }
    }

    println!("  ✓ Watchdog complete\n");
    Ok(())
}
