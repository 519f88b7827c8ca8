//! Offer letter generation. One document per student, latest write wins.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::io::{self, OFFERS_DIR};
use crate::models::StudentRow;
use crate::view;

pub fn offer_path(student_id: Uuid) -> PathBuf {
    PathBuf::from(OFFERS_DIR).join(format!("offer_{}.html", student_id))
}

pub fn render(name: &str, allocated_branch: Option<&str>, issued_at: DateTime<Utc>) -> String {
    let branch = allocated_branch.unwrap_or("Not allocated");
    format!(
        "<!doctype html><html><head><meta charset=\"utf-8\"><title>Offer Letter</title></head>\
         <body><h1>Offer Letter</h1>\
         <p>Student: {}</p>\
         <p>Allocated Branch: {}</p>\
         <p>Date: {}</p></body></html>",
        view::escape(name),
        view::escape(branch),
        issued_at.format("%Y-%m-%d %H:%M:%S UTC"),
    )
}

/// Writes the letter under a path keyed by the student id, creating the
/// directory on first use. There is no rollback pairing this write with the
/// `offer_generated` flag; a failed write after the flag is set leaves the
/// two out of step, which is a known gap of the verification flow.
pub async fn generate(student: &StudentRow) -> anyhow::Result<()> {
    let letter = render(&student.name, student.allocated_branch.as_deref(), Utc::now());
    io::write_io_file(offer_path(student.id), letter.as_bytes()).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn letter_names_the_allocated_branch() {
        let letter = render("Asha", Some("CSE"), Utc::now());
        assert!(letter.contains("Asha"));
        assert!(letter.contains("CSE"));
    }

    #[test]
    fn unallocated_students_get_the_placeholder() {
        let letter = render("Asha", None, Utc::now());
        assert!(letter.contains("Not allocated"));
    }

    #[test]
    fn letter_escapes_user_supplied_values() {
        let letter = render("A <b>sha</b>", Some("CSE & EE"), Utc::now());
        assert!(!letter.contains("<b>sha</b>"));
        assert!(letter.contains("CSE &amp; EE"));
    }

    #[test]
    fn paths_are_keyed_by_student_id() {
        let id = Uuid::new_v4();
        assert_eq!(
            offer_path(id),
            PathBuf::from("offers").join(format!("offer_{}.html", id))
        );
    }
}
