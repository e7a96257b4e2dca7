//! Types for harvested catalogue data

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Description used when a course block carries no descriptive paragraph.
pub const NO_DESCRIPTION: &str = "There is no available course description.";

/// Placeholder for any class-times sub-field that could not be recovered.
pub const NOT_AVAILABLE: &str = "NA";

/// Room and instructor data sits behind the university login.
pub const ROOM_PLACEHOLDER: &str = "Login to view Instructor(s) and Location";

/// Faculties keyed by faculty code, in catalogue order.
pub type FacultySet = IndexMap<String, Faculty>;
/// Subjects keyed by subject code.
pub type SubjectSet = BTreeMap<String, Subject>;
/// Courses keyed by space-stripped course code.
pub type CourseSet = BTreeMap<String, Course>;
/// Class schedules keyed by course code.
pub type ScheduleSet = BTreeMap<String, ClassSchedule>;

/// Sections of one class type, in page row order.
pub type ClassTypeSections = BTreeMap<String, Vec<SectionMeeting>>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Faculty {
    pub code: String,                // e.g., "SC"
    pub name: String,                // e.g., "Faculty of Science"
    pub catalog_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    pub code: String,                // e.g., "CMPUT"
    pub name: String,                // e.g., "Computing Science"
    pub catalog_url: String,
    /// One entry per faculty listing the subject, in faculty traversal order
    pub faculty_codes: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CourseLevel {
    Junior,
    Senior,
}

impl CourseLevel {
    /// Derives the level from a course code such as "CMPUT 174" or "CMPUT404".
    ///
    /// 100-level courses are junior, everything else is senior.
    pub fn from_code(code: &str) -> Self {
        let number = code.split_whitespace().last().unwrap_or(code);
        let number = number.trim_start_matches(|c: char| !c.is_ascii_digit());
        if number.starts_with('1') {
            CourseLevel::Junior
        } else {
            CourseLevel::Senior
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub code: String,                // e.g., "CMPUT404"
    pub name: String,
    pub detail_url: String,
    pub description: String,
    pub weight: String,
    pub fee_index: Option<String>,
    pub schedule_pattern: Option<String>, // e.g., "EITHER"
    pub lecture_hours: Option<String>,
    pub seminar_hours: Option<String>,
    pub lab_hours: Option<String>,
    pub prerequisites: Option<String>,
    pub level: CourseLevel,
}

/// All scheduled sections of one course, grouped by term then class type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassSchedule {
    pub course_code: String,
    /// e.g. "Winter2025" -> "Lecture" -> sections
    pub terms: BTreeMap<String, ClassTypeSections>,
}

impl ClassSchedule {
    pub fn new(course_code: impl Into<String>) -> Self {
        Self {
            course_code: course_code.into(),
            terms: BTreeMap::new(),
        }
    }

    /// Total number of section meetings across all terms.
    pub fn section_count(&self) -> usize {
        self.terms
            .values()
            .flat_map(|types| types.values())
            .map(Vec::len)
            .sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionMeeting {
    pub class_code: String,          // e.g., "51234"
    pub class_name: String,          // e.g., "LEC A1"
    pub capacity: String,
    pub days: String,                // e.g., "MWF", or "NA"
    pub start_date: String,
    pub end_date: String,
    pub start_time: String,
    pub end_time: String,
    pub room: String,
}
