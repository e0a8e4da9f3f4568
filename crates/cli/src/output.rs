use crate::error::CliError;
use engine_runtime::execution::session::MigrationOutcome;
use std::path::Path;

fn generate_report_json(outcome: &MigrationOutcome) -> Result<String, CliError> {
    serde_json::to_string_pretty(outcome).map_err(CliError::JsonSerialize)
}

pub async fn write_report(outcome: &MigrationOutcome, path: &Path) -> Result<(), CliError> {
    let report_json = generate_report_json(outcome)?;
    tokio::fs::write(path, report_json).await?;
    Ok(())
}

pub fn print_report(outcome: &MigrationOutcome) -> Result<(), CliError> {
    let report_json = generate_report_json(outcome)?;
    println!("{report_json}");
    Ok(())
}
