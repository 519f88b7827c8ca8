use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct StudentRow {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub password_hash: String,
    pub highschool_marks: Option<String>,
    pub plus2_marks: Option<String>,
    pub branch_choice1: Option<String>,
    pub branch_choice2: Option<String>,
    pub allocated_branch: Option<String>,
    pub allocated_by_admin: Option<Uuid>,
    pub accepted_allocation: bool,
    pub payment_receipt: Option<String>,
    pub payment_verified: bool,
    pub offer_generated: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AdminRow {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// Denormalized display copy kept in the session. Dashboards always re-read
/// the row itself, since marks and allocation state mutate independently.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

impl StudentRow {
    pub fn identity(&self) -> Identity {
        Identity {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
        }
    }

    pub fn highschool(&self) -> HighschoolMarks {
        HighschoolMarks::decode(self.highschool_marks.as_deref().unwrap_or(""))
    }

    pub fn plus2(&self) -> Plus2Marks {
        Plus2Marks::decode(self.plus2_marks.as_deref().unwrap_or(""))
    }
}

impl AdminRow {
    pub fn identity(&self) -> Identity {
        Identity {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HighschoolMarks {
    pub math: f64,
    pub science: f64,
    pub english: f64,
    pub hindi: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Plus2Marks {
    pub physics: f64,
    pub chemistry: f64,
    pub math: f64,
}

impl HighschoolMarks {
    pub fn decode(text: &str) -> Self {
        let doc = parse_doc(text);
        Self {
            math: subject_score(&doc, "Math"),
            science: subject_score(&doc, "Science"),
            english: subject_score(&doc, "English"),
            hindi: subject_score(&doc, "Hindi"),
        }
    }

    pub fn encode(&self) -> String {
        serde_json::json!({
            "Math": self.math,
            "Science": self.science,
            "English": self.english,
            "Hindi": self.hindi,
        })
        .to_string()
    }
}

impl Plus2Marks {
    pub fn decode(text: &str) -> Self {
        let doc = parse_doc(text);
        Self {
            physics: subject_score(&doc, "Physics"),
            chemistry: subject_score(&doc, "Chemistry"),
            math: subject_score(&doc, "Math"),
        }
    }

    pub fn encode(&self) -> String {
        serde_json::json!({
            "Physics": self.physics,
            "Chemistry": self.chemistry,
            "Math": self.math,
        })
        .to_string()
    }

    pub fn total(&self) -> f64 {
        self.physics + self.chemistry + self.math
    }
}

fn parse_doc(text: &str) -> Value {
    serde_json::from_str(text).unwrap_or(Value::Null)
}

// Missing or non-numeric subjects score zero. Ranking has to survive
// whatever JSON ended up in old rows, so decoding is lenient by policy.
fn subject_score(doc: &Value, subject: &str) -> f64 {
    match doc.get(subject) {
        Some(Value::Number(number)) => number.as_f64().unwrap_or(0.0),
        Some(Value::String(text)) => text.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

pub fn parse_mark(input: &str) -> f64 {
    input.trim().parse().unwrap_or(0.0)
}

// Letters, spaces and a little punctuation. Checked before any insert.
pub fn valid_name(name: &str) -> bool {
    let trimmed = name.trim();
    !trimmed.is_empty()
        && trimmed
            .chars()
            .all(|ch| ch.is_alphabetic() || matches!(ch, ' ' | '\'' | '-' | '.'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plus2_decode_defaults_missing_subjects_to_zero() {
        let marks = Plus2Marks::decode(r#"{"Physics": 80}"#);
        assert_eq!(marks.physics, 80.0);
        assert_eq!(marks.chemistry, 0.0);
        assert_eq!(marks.math, 0.0);
    }

    #[test]
    fn plus2_decode_accepts_numeric_strings() {
        let marks = Plus2Marks::decode(r#"{"Physics":"80","Chemistry":"70","Math":"90"}"#);
        assert_eq!(marks.total(), 240.0);
    }

    #[test]
    fn plus2_decode_survives_malformed_documents() {
        assert_eq!(Plus2Marks::decode("not json at all").total(), 0.0);
        assert_eq!(Plus2Marks::decode("").total(), 0.0);
        assert_eq!(Plus2Marks::decode(r#"{"Physics":{"nested":1}}"#).total(), 0.0);
    }

    #[test]
    fn plus2_encode_round_trips_through_decode() {
        let marks = Plus2Marks {
            physics: 80.0,
            chemistry: 70.0,
            math: 90.0,
        };
        assert_eq!(Plus2Marks::decode(&marks.encode()), marks);
    }

    #[test]
    fn highschool_decode_fills_all_fixed_subjects() {
        let marks = HighschoolMarks::decode(r#"{"Math":91,"Hindi":"77"}"#);
        assert_eq!(marks.math, 91.0);
        assert_eq!(marks.science, 0.0);
        assert_eq!(marks.english, 0.0);
        assert_eq!(marks.hindi, 77.0);
    }

    #[test]
    fn form_marks_parse_leniently() {
        assert_eq!(parse_mark(" 84.5 "), 84.5);
        assert_eq!(parse_mark(""), 0.0);
        assert_eq!(parse_mark("eighty"), 0.0);
    }

    #[test]
    fn names_are_restricted_to_the_allow_list() {
        assert!(valid_name("Asha"));
        assert!(valid_name("Mary-Jane O'Neil"));
        assert!(valid_name("A. P. J. Abdul Kalam"));
        assert!(!valid_name("1234"));
        assert!(!valid_name("Asha123"));
        assert!(!valid_name("<script>"));
        assert!(!valid_name(""));
        assert!(!valid_name("   "));
    }
}
