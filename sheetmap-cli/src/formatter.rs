//! Output formatters for read workbooks and validation results

use anyhow::Result;
use colored::*;
use sheetmap_core::{Failure, ValidationOutcome, Workbook};
use std::collections::BTreeMap;
use std::path::Path;

/// Print a per-sheet summary and any validation failures
pub fn print_human(file_path: &Path, workbook: &Workbook, outcome: &ValidationOutcome) {
    println!("{}", format!("Read: {}", file_path.display()).bold());
    println!();

    for (index, sheet) in workbook.sheets.iter().enumerate() {
        let name = sheet
            .name
            .clone()
            .unwrap_or_else(|| format!("(unnamed #{})", index + 1));
        let comments = sheet
            .rows
            .iter()
            .flat_map(|r| &r.cells)
            .filter(|c| c.comment.is_some())
            .count();
        println!(
            "{} {}  {} rows x {} columns, {} comment(s)",
            "Sheet:".bold(),
            name.cyan().bold(),
            sheet.rows.len(),
            sheet.column_count(),
            comments
        );
    }
    if workbook.sheets.is_empty() {
        println!("{}", "No sheets".bright_black());
    }
    println!();

    if outcome.passed() {
        println!("{}", "✓ All dates use supported formats".green().bold());
        return;
    }

    // Group failures by sheet for display
    let mut by_sheet: BTreeMap<usize, Vec<&Failure>> = BTreeMap::new();
    for failure in outcome.failures() {
        by_sheet.entry(failure.cell.sheet).or_default().push(failure);
    }

    for (sheet_index, failures) in &by_sheet {
        let name = workbook
            .sheets
            .get(*sheet_index)
            .and_then(|s| s.name.clone())
            .unwrap_or_else(|| format!("#{}", sheet_index + 1));
        println!("{} {}", "Sheet:".bold(), name.cyan().bold());
        for failure in failures {
            println!(
                "  {} {} [{}] {}",
                "Cell:".bold(),
                failure.cell.to_excel_ref().yellow(),
                failure.validator_id.bright_black(),
                failure.message
            );
        }
        println!();
    }

    println!("{}", "Summary:".bold().underline());
    println!("  {} {}", "Failures:".red().bold(), outcome.failures().len());
}

/// Print the model and validation result in JSON format
pub fn print_json(file_path: &Path, workbook: &Workbook, outcome: &ValidationOutcome) -> Result<()> {
    let output = serde_json::json!({
        "file": file_path.display().to_string(),
        "workbook": workbook,
        "passed": outcome.passed(),
        "failures": outcome.failures(),
    });

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
