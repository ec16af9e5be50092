use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Initial grade level text of a fresh draft.
const DEFAULT_GRADE_TEXT: &str = "1";

/// One student document from the roster collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentRecord {
    #[serde(rename = "$id")]
    pub id: String,
    #[serde(rename = "$createdAt", default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(rename = "StudentNumber", default)]
    pub student_number: String,
    #[serde(rename = "FirstName", default)]
    pub first_name: String,
    #[serde(rename = "LastName", default)]
    pub last_name: String,
    #[serde(rename = "Section", default)]
    pub section: String,
    #[serde(rename = "GradeLevel", default)]
    pub grade_level: Option<i64>,
}

impl StudentRecord {
    /// "Last, First" for list display
    pub fn display_name(&self) -> String {
        match (self.last_name.is_empty(), self.first_name.is_empty()) {
            (false, false) => format!("{}, {}", self.last_name, self.first_name),
            (false, true) => self.last_name.clone(),
            (true, false) => self.first_name.clone(),
            (true, true) => String::new(),
        }
    }

    pub fn grade_str(&self) -> String {
        self.grade_level.map(|g| g.to_string()).unwrap_or_default()
    }
}

/// Field map sent as the `data` of a create request.
///
/// `grade_level` is serialized as `null` when the draft text did not coerce
/// to an integer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentFields {
    #[serde(rename = "StudentNumber")]
    pub student_number: String,
    #[serde(rename = "FirstName")]
    pub first_name: String,
    #[serde(rename = "LastName")]
    pub last_name: String,
    #[serde(rename = "Section")]
    pub section: String,
    #[serde(rename = "GradeLevel")]
    pub grade_level: Option<i64>,
}

/// Draft form field identifiers, in form order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftField {
    StudentNumber,
    FirstName,
    LastName,
    Section,
    GradeLevel,
}

impl DraftField {
    pub const ALL: [DraftField; 5] = [
        DraftField::StudentNumber,
        DraftField::FirstName,
        DraftField::LastName,
        DraftField::Section,
        DraftField::GradeLevel,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            DraftField::StudentNumber => "Student number",
            DraftField::FirstName => "First name",
            DraftField::LastName => "Last name",
            DraftField::Section => "Section",
            DraftField::GradeLevel => "Grade level",
        }
    }

    /// Next field in form order (wrapping around)
    pub fn next(&self) -> Self {
        match self {
            DraftField::StudentNumber => DraftField::FirstName,
            DraftField::FirstName => DraftField::LastName,
            DraftField::LastName => DraftField::Section,
            DraftField::Section => DraftField::GradeLevel,
            DraftField::GradeLevel => DraftField::StudentNumber,
        }
    }

    /// Previous field in form order (wrapping around)
    pub fn prev(&self) -> Self {
        match self {
            DraftField::StudentNumber => DraftField::GradeLevel,
            DraftField::FirstName => DraftField::StudentNumber,
            DraftField::LastName => DraftField::FirstName,
            DraftField::Section => DraftField::LastName,
            DraftField::GradeLevel => DraftField::Section,
        }
    }
}

/// Uncommitted form values for a new student. Everything is kept as typed
/// text; grade level is coerced only when the draft is submitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudentDraft {
    pub student_number: String,
    pub first_name: String,
    pub last_name: String,
    pub section: String,
    pub grade_level: String,
}

impl Default for StudentDraft {
    fn default() -> Self {
        Self {
            student_number: String::new(),
            first_name: String::new(),
            last_name: String::new(),
            section: String::new(),
            grade_level: DEFAULT_GRADE_TEXT.to_string(),
        }
    }
}

impl StudentDraft {
    pub fn field(&self, field: DraftField) -> &str {
        match field {
            DraftField::StudentNumber => &self.student_number,
            DraftField::FirstName => &self.first_name,
            DraftField::LastName => &self.last_name,
            DraftField::Section => &self.section,
            DraftField::GradeLevel => &self.grade_level,
        }
    }

    pub fn field_mut(&mut self, field: DraftField) -> &mut String {
        match field {
            DraftField::StudentNumber => &mut self.student_number,
            DraftField::FirstName => &mut self.first_name,
            DraftField::LastName => &mut self.last_name,
            DraftField::Section => &mut self.section,
            DraftField::GradeLevel => &mut self.grade_level,
        }
    }

    /// Coerced grade level; `None` when the text has no integer prefix.
    pub fn grade_level(&self) -> Option<i64> {
        coerce_grade_level(&self.grade_level)
    }

    pub fn to_fields(&self) -> StudentFields {
        StudentFields {
            student_number: self.student_number.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            section: self.section.clone(),
            grade_level: self.grade_level(),
        }
    }
}

/// Coerce grade level text to an integer by taking its leading integer
/// prefix: surrounding whitespace is ignored, one optional sign is accepted,
/// and parsing stops at the first non-digit. `"7"`, `" 12 "` and `"7b"` all
/// coerce; `""`, `"abc"` and `"-"` do not.
pub fn coerce_grade_level(text: &str) -> Option<i64> {
    let trimmed = text.trim();
    let (sign, rest) = match trimmed.as_bytes().first() {
        Some(b'-') => (-1, &trimmed[1..]),
        Some(b'+') => (1, &trimmed[1..]),
        _ => (1, trimmed),
    };

    let digits_len = rest.bytes().take_while(|b| b.is_ascii_digit()).count();
    if digits_len == 0 {
        return None;
    }

    rest[..digits_len].parse::<i64>().ok().map(|n| sign * n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coerce_grade_level_valid() {
        assert_eq!(coerce_grade_level("7"), Some(7));
        assert_eq!(coerce_grade_level(" 12 "), Some(12));
        assert_eq!(coerce_grade_level("+3"), Some(3));
        assert_eq!(coerce_grade_level("-2"), Some(-2));
        assert_eq!(coerce_grade_level("7b"), Some(7));
        assert_eq!(coerce_grade_level("10.5"), Some(10));
    }

    #[test]
    fn test_coerce_grade_level_invalid() {
        assert_eq!(coerce_grade_level(""), None);
        assert_eq!(coerce_grade_level("abc"), None);
        assert_eq!(coerce_grade_level("-"), None);
        assert_eq!(coerce_grade_level("b7"), None);
        assert_eq!(coerce_grade_level("99999999999999999999"), None);
    }

    #[test]
    fn test_default_draft_grade_is_one() {
        let draft = StudentDraft::default();
        assert_eq!(draft.grade_level, "1");
        assert_eq!(draft.grade_level(), Some(1));
    }

    #[test]
    fn test_fields_serialize_invalid_grade_as_null() {
        let draft = StudentDraft {
            student_number: "S1".to_string(),
            first_name: "A".to_string(),
            last_name: "B".to_string(),
            section: "1-A".to_string(),
            grade_level: "abc".to_string(),
        };
        let json = serde_json::to_value(draft.to_fields()).unwrap();
        assert_eq!(json["StudentNumber"], "S1");
        assert_eq!(json["Section"], "1-A");
        assert!(json["GradeLevel"].is_null());
    }

    #[test]
    fn test_record_deserializes_document() {
        let json = r#"{
            "$id": "65a1",
            "$createdAt": "2024-06-01T08:30:00.000+00:00",
            "$updatedAt": "2024-06-01T08:30:00.000+00:00",
            "$permissions": [],
            "$databaseId": "angelicum",
            "$collectionId": "student",
            "StudentNumber": "S1",
            "FirstName": "A",
            "LastName": "B",
            "Section": "1-A",
            "GradeLevel": 7
        }"#;
        let record: StudentRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.id, "65a1");
        assert_eq!(record.grade_level, Some(7));
        assert_eq!(record.display_name(), "B, A");
        assert!(record.created_at.is_some());
    }

    #[test]
    fn test_record_tolerates_null_grade() {
        let json = r#"{"$id":"x","StudentNumber":"S2","FirstName":"C","LastName":"D","Section":"2-B","GradeLevel":null}"#;
        let record: StudentRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.grade_level, None);
        assert_eq!(record.grade_str(), "");
    }

    #[test]
    fn test_draft_field_access() {
        let mut draft = StudentDraft::default();
        draft.field_mut(DraftField::LastName).push_str("Cruz");
        assert_eq!(draft.field(DraftField::LastName), "Cruz");
        assert_eq!(DraftField::ALL.len(), 5);
    }

    #[test]
    fn test_draft_field_cycle() {
        assert_eq!(DraftField::StudentNumber.next(), DraftField::FirstName);
        assert_eq!(DraftField::GradeLevel.next(), DraftField::StudentNumber);
        assert_eq!(DraftField::StudentNumber.prev(), DraftField::GradeLevel);
        for field in DraftField::ALL {
            assert_eq!(field.next().prev(), field);
        }
    }
}
