use batchpay::{EngineConfig, SubmitRequest, TransferEngine};
use clap::Parser;
use miette::{IntoDiagnostic, Result, miette};
use rand::Rng;
use rust_decimal::Decimal;
use std::time::Duration;

/// Load-generating demo: submits random transfers between a handful of
/// seeded accounts and reports engine throughput.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Number of transfers to submit.
    #[arg(long, default_value_t = 10_000)]
    count: u32,

    /// Number of distinct addresses to trade between.
    #[arg(long, default_value_t = 16)]
    addresses: u32,

    /// Transactions drained per dispatch tick.
    #[arg(long, default_value_t = 1000)]
    batch_size: usize,

    /// Process batch items sequentially instead of concurrently.
    #[arg(long)]
    sequential: bool,

    /// Seed balance granted to every address (staging behavior).
    #[arg(long, default_value = "1000000")]
    seed_balance: Decimal,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[cfg(feature = "storage-rocksdb")]
    #[arg(long)]
    db_path: Option<std::path::PathBuf>,
}

fn random_token() -> String {
    const HEX: &[u8] = b"0123456789abcdef";
    let mut rng = rand::thread_rng();
    (0..128).map(|_| HEX[rng.gen_range(0..16)] as char).collect()
}

#[cfg_attr(not(feature = "storage-rocksdb"), allow(unused_variables))]
fn build_engine(cli: &Cli, config: EngineConfig) -> Result<TransferEngine> {
    #[cfg(feature = "storage-rocksdb")]
    if let Some(db_path) = &cli.db_path {
        use batchpay::domain::signature::EntropyValidator;
        use batchpay::infrastructure::rocksdb::RocksDbStore;
        use std::sync::Arc;

        let store = RocksDbStore::open(db_path, config.default_balance).into_diagnostic()?;
        return Ok(TransferEngine::new(
            config,
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            Arc::new(store),
            Arc::new(EntropyValidator::new()),
        ));
    }

    Ok(TransferEngine::in_memory(config))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "batchpay=info".into()),
        )
        .init();

    let cli = Cli::parse();
    if cli.addresses < 2 {
        return Err(miette!("need at least two addresses"));
    }

    let config = EngineConfig::default()
        .with_seed_balance(cli.seed_balance)
        .with_batch_size(cli.batch_size)
        .with_parallel_processing(!cli.sequential);
    let engine = build_engine(&cli, config)?;
    let handle = engine.start();

    let mut rng = rand::thread_rng();
    let started = std::time::Instant::now();
    let mut admitted = 0u32;
    for _ in 0..cli.count {
        let from = rng.gen_range(0..cli.addresses);
        let mut to = rng.gen_range(0..cli.addresses);
        if to == from {
            to = (to + 1) % cli.addresses;
        }
        let request = SubmitRequest {
            from: format!("addr-{from:04}"),
            to: format!("addr-{to:04}"),
            amount: Decimal::from(rng.gen_range(1..1000)),
            asset: "XAU".to_string(),
            auth_token: random_token(),
        };
        match engine.submit(request).await {
            Ok(_) => admitted += 1,
            Err(err) => eprintln!("submit rejected: {err}"),
        }
    }

    // Wait for the dispatcher to drain everything we admitted.
    loop {
        let (_, completed, failed) = engine.metrics().totals();
        if completed + failed >= admitted as u64 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    let elapsed = started.elapsed();

    let stats = engine.stats().await.into_diagnostic()?;
    handle.shutdown().await;

    println!("submitted:        {admitted}");
    println!("stored rows:      {}", stats.total_transactions);
    println!("max tps:          {:.1}", stats.max_tps);
    println!(
        "avg processing:   {:.3} ms",
        engine.metrics().average_processing_time()
    );
    println!("success rate:     {:.1} %", engine.metrics().success_rate());
    println!("wall time:        {:.2?}", elapsed);

    Ok(())
}
