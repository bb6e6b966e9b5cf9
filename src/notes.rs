use std::fmt::Write;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct Note {
    pub id: Uuid,
    pub period_label: String,
    pub store_id: Option<String>,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

pub fn render_notes(notes: &[Note]) -> String {
    let mut output = String::new();
    if notes.is_empty() {
        let _ = writeln!(output, "No notes recorded.");
        return output;
    }
    for note in notes {
        let scope = note.store_id.as_deref().unwrap_or("all stores");
        let _ = writeln!(
            output,
            "- [{}] {} ({}): {}",
            note.created_at.format("%Y-%m-%d"),
            note.period_label,
            scope,
            note.body
        );
    }
    output
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn renders_store_scope() {
        let notes = vec![
            Note {
                id: Uuid::new_v4(),
                period_label: "P3 FY2026".into(),
                store_id: Some("1002".into()),
                body: "Patio closed for repairs".into(),
                created_at: Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap(),
            },
            Note {
                id: Uuid::new_v4(),
                period_label: "P3 FY2026".into(),
                store_id: None,
                body: "Menu price increase".into(),
                created_at: Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap(),
            },
        ];
        let rendered = render_notes(&notes);
        assert!(rendered.contains("- [2026-03-02] P3 FY2026 (1002): Patio closed for repairs"));
        assert!(rendered.contains("(all stores): Menu price increase"));
        assert_eq!(render_notes(&[]), "No notes recorded.\n");
    }
}
