use anyhow::{bail, Context, Result};
use std::env;
use std::path::Path;
use tracing_subscriber::EnvFilter;

use identity_risk::{import_csv, Config, Pipeline, SqliteStore, TableStore, VERSION};

fn main() -> Result<()> {
    let config = Config::from_env().context("loading configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    let args: Vec<String> = env::args().collect();

    match args.get(1).map(String::as_str) {
        Some("import") => {
            let Some(csv_path) = args.get(2) else {
                bail!("usage: identity-risk import <cleaned_transactions.csv>");
            };
            run_import(&config, Path::new(csv_path))
        }
        Some("resolve") => run_resolve(&config),
        Some("profile") => run_profile(&config),
        _ => {
            print_usage();
            Ok(())
        }
    }
}

fn open_store(config: &Config) -> Result<SqliteStore> {
    let store = SqliteStore::open(&config.db_path)
        .with_context(|| format!("opening {}", config.db_path.display()))?;
    Ok(store.with_read_limit(config.read_limit))
}

fn run_import(config: &Config, csv_path: &Path) -> Result<()> {
    println!("📂 Importing {} → {}", csv_path.display(), config.input_table);

    let mut store = open_store(config)?;
    let rows = import_csv(&mut store, &config.input_table, csv_path)
        .with_context(|| format!("importing {}", csv_path.display()))?;

    println!("✓ {} rows in {}", rows, config.input_table);
    Ok(())
}

fn run_resolve(config: &Config) -> Result<()> {
    println!("🔗 Resolving identities from {}", config.input_table);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let mut store = open_store(config)?;
    let pipeline = Pipeline::new(config);
    let report = pipeline.run(&mut store).context("resolution run failed")?;

    println!("✓ {}", report.summary());
    println!("✓ Unresolved transactions: {}", report.unresolved_transactions);
    println!("✓ Partition fingerprint: {}", report.fingerprint);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn run_profile(config: &Config) -> Result<()> {
    println!("🎯 Recomputing risk profiles from stored entities");

    let mut store = open_store(config)?;
    let profiles = Pipeline::new(config)
        .profile(&mut store)
        .context("profile run failed")?;

    println!("✓ {} profiles written", profiles);
    // Sanity check against what storage now holds
    let stored = store.read_table(identity_risk::schema::USER_RISK_PROFILE)?;
    println!("✓ user_risk_profile holds {} rows", stored.len());
    Ok(())
}

fn print_usage() {
    println!("identity-risk {}", VERSION);
    println!();
    println!("USAGE:");
    println!("    identity-risk import <csv>   Load a cleaned-transaction CSV");
    println!("    identity-risk resolve        Cluster, attribute, re-key and profile");
    println!("    identity-risk profile        Recompute profiles from stored entities");
    println!();
    println!("Configuration comes from the environment (or .env):");
    println!("    RISK_DB_PATH, RISK_INPUT_TABLE, RISK_READ_LIMIT,");
    println!("    RISK_LOCAL_REGIONS, RISK_CASH_TYPE, RUST_LOG");
}
