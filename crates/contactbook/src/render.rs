//! Text rendering of the contact table, detail view, and form feedback.

use std::fmt::Write as _;

use crate::contact::{Contact, Field};
use crate::form::{Notice, NoticeLevel};
use crate::photo::data_url_mime;
use crate::validate::ValidationErrors;

const TABLE_HEADERS: [&str; 6] = ["Photo", "Name", "DOB", "Email", "Mobile", "ID"];

/// Shown instead of an empty table.
pub const EMPTY_TABLE: &str = "No contacts yet.";

/// Render contacts as an aligned table, one row per record.
#[must_use]
pub fn render_table(contacts: &[Contact]) -> String {
    if contacts.is_empty() {
        return format!("{EMPTY_TABLE}\n");
    }

    let rows: Vec<[String; 6]> = contacts
        .iter()
        .map(|c| {
            [
                if c.has_photo() { "yes" } else { "" }.to_string(),
                c.fields.name.clone(),
                c.fields.dob.clone(),
                c.fields.email.clone(),
                c.fields.mobile.clone(),
                c.id.clone(),
            ]
        })
        .collect();

    let mut widths = TABLE_HEADERS.map(|h| h.chars().count());
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    push_row(&mut out, &TABLE_HEADERS.map(String::from), &widths);
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    push_row(&mut out, &rule, &widths);
    for row in &rows {
        push_row(&mut out, row, &widths);
    }
    out
}

fn push_row(out: &mut String, cells: &[String], widths: &[usize]) {
    let line = cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| {
            let pad = width.saturating_sub(cell.chars().count());
            format!("{cell}{}", " ".repeat(pad))
        })
        .collect::<Vec<_>>()
        .join("  ");
    out.push_str(line.trim_end());
    out.push('\n');
}

/// Render contacts one per line.
#[must_use]
pub fn render_plain(contacts: &[Contact]) -> String {
    contacts.iter().fold(String::new(), |mut out, c| {
        let _ = writeln!(
            out,
            "{}\t{}\t{}\t{}\t{}",
            c.id, c.fields.name, c.fields.dob, c.fields.email, c.fields.mobile
        );
        out
    })
}

/// Render a single record with field labels.
#[must_use]
pub fn render_contact(contact: &Contact) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{:<15} {}", "ID", contact.id);
    for field in Field::ALL {
        let value = match (field, contact.fields.value(field)) {
            (Field::Photo, Some(photo)) => {
                format!("{} ({} bytes)", data_url_mime(photo).unwrap_or("image"), photo.len())
            }
            (_, Some(value)) => value.to_string(),
            (_, None) => "-".to_string(),
        };
        let _ = writeln!(out, "{:<15} {}", field.label(), value);
    }
    let _ = writeln!(
        out,
        "{:<15} {}",
        "Created",
        contact.created_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    out
}

/// Render field errors, one per line, labelled as the form labels them.
#[must_use]
pub fn render_errors(errors: &ValidationErrors) -> String {
    errors.iter().fold(String::new(), |mut out, (field, message)| {
        let _ = writeln!(out, "  {}: {message}", field.label());
        out
    })
}

/// Render a notice as a single line.
#[must_use]
pub fn render_notice(notice: &Notice) -> String {
    let tag = match notice.level {
        NoticeLevel::Success => "ok",
        NoticeLevel::Error => "error",
    };
    format!("[{tag}] {}", notice.message)
}
