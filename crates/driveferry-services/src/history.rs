use driveferry_core::models::LedgerEntry;

use crate::messages::LINK_UNAVAILABLE;

pub const EMPTY_HISTORY: &str = "You haven't uploaded any files yet using this bot.";

/// Render the most recent `cap` ledger entries, oldest first.
///
/// Entries keep their absolute position in the ledger as their number, and a
/// footer is added when older entries were left out.
pub fn render_history(entries: &[LedgerEntry], cap: usize) -> String {
    if entries.is_empty() {
        return EMPTY_HISTORY.to_string();
    }

    let cap = cap.max(1);
    let start = entries.len().saturating_sub(cap);

    let mut text = String::from("📂 Your Uploaded Files:\n\n");
    for (i, entry) in entries.iter().enumerate().skip(start) {
        let link = entry.link.as_deref().unwrap_or(LINK_UNAVAILABLE);
        text.push_str(&format!("{}. {} - {}\n", i + 1, entry.name, link));
    }

    if start > 0 {
        text.push_str(&format!("\nShowing the latest {} files.", cap));
    }

    text
}
