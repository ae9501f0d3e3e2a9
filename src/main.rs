use cheque_ledger::{
    config::{database, operators, settings},
    core::{report, safe},
    errors::Result,
};
use dotenvy::dotenv;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file; env vars can also be set externally
    dotenv().ok();

    // 3. Load application settings
    let app_config = settings::load_default_config()
        .inspect_err(|e| error!("Failed to load configuration: {e}"))?;

    // 4. Resolve the operator running this process
    let operator_id = std::env::var("CHEQUE_OPERATOR").unwrap_or_else(|_| "system".to_string());
    let operator = operators::operator_context(&operator_id);
    info!(
        operator = %operator.operator_id,
        can_cancel = operator.can_cancel,
        "Operator context loaded"
    );

    // 5. Connect and make sure the schema exists
    std::fs::create_dir_all("data")?;
    let db = database::create_connection()
        .await
        .inspect_err(|e| error!("Failed to connect to database: {e}"))?;
    database::create_tables(&db)
        .await
        .inspect(|()| info!("Database schema ready."))
        .inspect_err(|e| error!("Failed to create tables: {e}"))?;

    // 6. Seed configured safes
    let seeded = safe::seed_safes(&db, &app_config.safes).await?;
    if !seeded.is_empty() {
        info!("Seeded {} safe(s) from config.toml", seeded.len());
    }

    // 7. Log the reconciliation report
    let report = report::generate_reconciliation_report(&db).await?;
    info!("\n{}", report::format_report(&report));

    Ok(())
}
