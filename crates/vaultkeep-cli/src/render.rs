//! Terminal rendering utilities.

use console::style;
use vaultkeep_audit::{AuditReport, Issue};
use vaultkeep_core::{ItemDetails, SecretString, VaultItem};
use vaultkeep_sync::VaultEntry;

const MASK: &str = "••••••••";

/// Print entries as a table.
pub fn render_table(entries: &[VaultEntry]) {
    if entries.is_empty() {
        println!("No items.");
        return;
    }

    println!("{:<38} {:<12} {:<28} {}", "ID", "CATEGORY", "NAME", "MODIFIED");
    println!("{}", "-".repeat(96));
    for entry in entries {
        match entry {
            VaultEntry::Item(item) => {
                let star = if item.favorite { "*" } else { " " };
                println!(
                    "{:<38} {:<12} {}{:<27} {}",
                    item.id.as_str(),
                    item.category().as_str(),
                    star,
                    truncate(&item.name, 27),
                    item.last_modified.format("%Y-%m-%d %H:%M")
                );
            }
            VaultEntry::Unreadable { id, .. } => {
                println!("{:<38} {}", id.as_str(), style("(unreadable)").red());
            }
        }
    }
    println!("\n{} item(s) total.", entries.len());
}

/// Print every field of an item. Secrets are masked unless `reveal` is set.
pub fn render_item(item: &VaultItem, reveal: bool) {
    println!("{}", style(&item.name).bold());
    field("id", Some(item.id.as_str()));
    field("category", Some(item.category().as_str()));

    match &item.details {
        ItemDetails::Login(login) => {
            field("username", login.username.as_deref());
            secret("password", login.password.as_ref(), reveal);
            field("url", login.url.as_deref());
        }
        ItemDetails::SecureNote => {}
        ItemDetails::CreditCard(card) => {
            field("cardholder", card.cardholder.as_deref());
            secret("number", card.number.as_ref(), reveal);
            secret("cvv", card.cvv.as_ref(), reveal);
            field("expiry", card.expiry.as_deref());
        }
        ItemDetails::Identity(identity) => {
            field("title", identity.title.as_deref());
            field("first name", identity.first_name.as_deref());
            field("last name", identity.last_name.as_deref());
            field("email", identity.email.as_deref());
            field("phone", identity.phone.as_deref());
            field("company", identity.company.as_deref());
            field("address", identity.address.as_deref());
            secret("ssn", identity.ssn.as_ref(), reveal);
        }
    }

    field("notes", item.notes.as_deref());
    if !item.tags.is_empty() {
        let tags: Vec<&str> = item.tags.iter().map(String::as_str).collect();
        field("tags", Some(tags.join(", ").as_str()));
    }
    if item.favorite {
        field("favorite", Some("yes"));
    }
    let created = item.created.format("%Y-%m-%d %H:%M:%S UTC").to_string();
    let modified = item.last_modified.format("%Y-%m-%d %H:%M:%S UTC").to_string();
    field("created", Some(created.as_str()));
    field("modified", Some(modified.as_str()));
}

/// Print an audit report, naming flagged items from `items`.
pub fn render_report(report: &AuditReport, items: &[VaultItem]) {
    let score = match report.score {
        90..=100 => style(report.score).green(),
        60..=89 => style(report.score).yellow(),
        _ => style(report.score).red(),
    };
    println!("{} {}/100", style("Security score:").bold(), score);
    println!("  Items:     {}", report.total_items);
    println!("  Weak:      {}", report.weak);
    println!("  Reused:    {}", report.duplicate);
    println!("  Old:       {}", report.old);
    println!("  Missing:   {}", report.missing);

    if report.is_clean() {
        return;
    }

    println!();
    for (id, issues) in &report.issues {
        let name = items
            .iter()
            .find(|item| &item.id == id)
            .map(|item| item.name.as_str())
            .unwrap_or_else(|| id.as_str());
        let described: Vec<String> = issues.iter().map(Issue::to_string).collect();
        println!("  {} {}: {}", style("!").yellow(), name, described.join(", "));
    }
}

fn field(label: &str, value: Option<&str>) {
    if let Some(value) = value.filter(|v| !v.is_empty()) {
        println!("  {:<12} {}", style(label).dim(), value);
    }
}

fn secret(label: &str, value: Option<&SecretString>, reveal: bool) {
    if let Some(value) = value.filter(|v| !v.is_empty()) {
        let shown = if reveal { value.expose_secret() } else { MASK };
        field(label, Some(shown));
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max.saturating_sub(1)).collect();
        format!("{cut}…")
    }
}
