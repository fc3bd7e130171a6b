//! The `adaptest validate` command.

use std::path::PathBuf;

use anyhow::Result;

use adaptest_core::parser::{load_item_bank_directory, parse_item_bank, validate_item_bank};

pub fn execute(item_bank_path: PathBuf) -> Result<()> {
    let banks = if item_bank_path.is_dir() {
        load_item_bank_directory(&item_bank_path)?
    } else {
        vec![parse_item_bank(&item_bank_path)?]
    };

    let mut total_warnings = 0;

    for bank in &banks {
        println!(
            "Item bank: {} ({} items, {} active)",
            bank.name,
            bank.items.len(),
            bank.active_items().count()
        );

        let warnings = validate_item_bank(bank);
        for w in &warnings {
            let prefix = w
                .item_id
                .as_ref()
                .map(|id| format!("  [{id}]"))
                .unwrap_or_else(|| "  ".to_string());
            println!("{prefix} WARNING: {}", w.message);
        }
        total_warnings += warnings.len();
    }

    if total_warnings == 0 {
        println!("All item banks valid.");
    } else {
        println!("\n{total_warnings} warning(s) found.");
    }

    Ok(())
}
