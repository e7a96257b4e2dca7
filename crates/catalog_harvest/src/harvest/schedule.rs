//! Class schedule extraction from course detail pages.

use super::client::PageFetcher;
use super::config::HarvestConfig;
use super::error::HarvestError;
use super::report::{ItemOutcome, SkippedItem, Stage, StageReport};
use super::text::{normalize_term, split_section_cell, ClassTimes};
use super::types::{
    ClassSchedule, ClassTypeSections, CourseSet, ScheduleSet, SectionMeeting, NOT_AVAILABLE,
    ROOM_PLACEHOLDER,
};
use super::{element_text, fetch_or_skip};
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;
use tracing::{debug, info};

// Static selectors for parsing - compiled once
static TERM_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div#content-nav.nav.flex-nowrap").unwrap());
static ACTIVE_TERM_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a.nav-link.active").unwrap());
static CLASS_TYPE_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.mb-5").unwrap());
static CLASS_TYPE_HEADING_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("h3").unwrap());
static ROW_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("tr[data-card-title]").unwrap());
static SECTION_CELL_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"td[data-card-title="Section"]"#).unwrap());
static CAPACITY_CELL_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"td[data-card-title="Capacity"]"#).unwrap());
static CLASS_TIMES_CELL_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"td[data-card-title="Class times"]"#).unwrap());

/// Parses a course detail page into its class schedule.
///
/// Class-type blocks belong to the closest term marker before them in
/// document order; blocks that precede every marker belong to the first one.
/// Returns the schedule together with everything that had to be skipped.
pub fn parse_schedule_page(html: &str, course_code: &str) -> (ClassSchedule, Vec<SkippedItem>) {
    let document = Html::parse_document(html);
    let mut schedule = ClassSchedule::new(course_code);
    let mut skipped = Vec::new();

    // Term code per marker, in document order (None = no active link)
    let mut markers: Vec<Option<String>> = Vec::new();
    let mut blocks: Vec<(Option<usize>, ElementRef)> = Vec::new();

    for node in document.root_element().descendants() {
        let Some(element) = ElementRef::wrap(node) else {
            continue;
        };
        if TERM_SELECTOR.matches(&element) {
            markers.push(active_term(&element));
        } else if CLASS_TYPE_SELECTOR.matches(&element) {
            blocks.push((markers.len().checked_sub(1), element));
        }
    }

    if markers.is_empty() {
        debug!(course = %course_code, "No terms found");
        return (schedule, skipped);
    }

    for (idx, term) in markers.iter().enumerate() {
        match term {
            Some(term) => {
                schedule.terms.entry(term.clone()).or_default();
            }
            None => skipped.push(SkippedItem {
                item: format!("{course_code} term marker {}", idx + 1),
                reason: "term marker has no active term link".to_string(),
            }),
        }
    }

    for (owner, block) in blocks {
        let owner = owner.unwrap_or(0);
        let Some(term) = &markers[owner] else {
            skipped.push(SkippedItem {
                item: format!("{course_code} term marker {}", owner + 1),
                reason: "class type block under a term marker without an active term".to_string(),
            });
            continue;
        };
        let sections = schedule.terms.entry(term.clone()).or_default();
        parse_class_type_block(&block, course_code, term, sections, &mut skipped);
    }

    (schedule, skipped)
}

/// "Winter Term 2025" from the marker's active link, normalized.
fn active_term(marker: &ElementRef) -> Option<String> {
    let link = marker.select(&ACTIVE_TERM_SELECTOR).next()?;
    let term = normalize_term(&element_text(&link));
    (!term.is_empty()).then_some(term)
}

/// Appends one class-type block's section rows under its heading.
fn parse_class_type_block(
    block: &ElementRef,
    course_code: &str,
    term: &str,
    sections: &mut ClassTypeSections,
    skipped: &mut Vec<SkippedItem>,
) {
    let class_type = block
        .select(&CLASS_TYPE_HEADING_SELECTOR)
        .next()
        .map(|heading| element_text(&heading))
        .filter(|name| !name.is_empty());
    let Some(class_type) = class_type else {
        skipped.push(SkippedItem {
            item: format!("{course_code} {term}"),
            reason: "class type block has no heading".to_string(),
        });
        return;
    };

    let meetings = sections.entry(class_type.clone()).or_default();
    for (row_idx, row) in block.select(&ROW_SELECTOR).enumerate() {
        match parse_section_row(&row) {
            ItemOutcome::Parsed(meeting) => meetings.push(meeting),
            ItemOutcome::Skipped(skip) => skipped.push(SkippedItem {
                item: format!("{course_code} {term} {class_type} row {}: {}", row_idx + 1, skip.item),
                reason: skip.reason,
            }),
        }
    }
}

/// Parses one section row. Only the Section cell is mandatory.
fn parse_section_row(row: &ElementRef) -> ItemOutcome<SectionMeeting> {
    let section = row
        .select(&SECTION_CELL_SELECTOR)
        .next()
        .and_then(|cell| split_section_cell(&cell.text().collect::<String>()));
    let Some((class_code, class_name)) = section else {
        return ItemOutcome::skipped(element_text(row), "row has no Section cell");
    };

    let capacity = row
        .select(&CAPACITY_CELL_SELECTOR)
        .next()
        .map(|cell| element_text(&cell))
        .unwrap_or_else(|| NOT_AVAILABLE.to_string());

    let class_times = row
        .select(&CLASS_TIMES_CELL_SELECTOR)
        .next()
        .map(|cell| element_text(&cell))
        .unwrap_or_default();
    let times = ClassTimes::parse(&class_times);

    ItemOutcome::Parsed(SectionMeeting {
        class_code,
        class_name,
        capacity,
        days: times.days,
        start_date: times.start_date,
        end_date: times.end_date,
        start_time: times.start_time,
        end_time: times.end_time,
        room: ROOM_PLACEHOLDER.to_string(),
    })
}

/// Runs the schedule stage. Every course gets a schedule root, even when
/// its page lists no terms or could not be fetched.
pub async fn harvest_schedules<F: PageFetcher>(
    fetcher: &F,
    courses: &CourseSet,
    config: &HarvestConfig,
) -> Result<(ScheduleSet, StageReport), HarvestError> {
    let mut report = StageReport::new(Stage::Schedules);
    let mut schedules = ScheduleSet::new();

    for course in courses.values() {
        info!(course = %course.code, url = %course.detail_url, "Scraping class schedules");
        let schedule = match fetch_or_skip(fetcher, &course.detail_url, config, &mut report).await? {
            Some(html) => {
                let (schedule, skipped) = parse_schedule_page(&html, &course.code);
                for skip in skipped {
                    report.skip(skip);
                }
                debug!(
                    course = %course.code,
                    terms = schedule.terms.len(),
                    sections = schedule.section_count(),
                    "Parsed class schedule"
                );
                schedule
            }
            None => ClassSchedule::new(course.code.as_str()),
        };
        schedules.insert(course.code.clone(), schedule);
    }

    report.records = schedules.len();
    info!(count = schedules.len(), skipped = report.skipped.len(), "Collected class schedules");
    Ok((schedules, report))
}
