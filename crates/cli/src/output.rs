use crate::error::CliError;
use engine_runtime::execution::TransactionOutcome;

fn report_json(outcome: &TransactionOutcome) -> Result<String, CliError> {
    serde_json::to_string_pretty(outcome).map_err(CliError::JsonSerialize)
}

pub async fn write_report(outcome: &TransactionOutcome, path: &str) -> Result<(), CliError> {
    let json = report_json(outcome)?;
    tokio::fs::write(path, json).await?;
    Ok(())
}

pub fn print_report(outcome: &TransactionOutcome) -> Result<(), CliError> {
    println!("{}", report_json(outcome)?);
    Ok(())
}
