//! Course extraction from subject listing pages.

use super::client::PageFetcher;
use super::config::HarvestConfig;
use super::error::HarvestError;
use super::report::{ItemOutcome, Stage, StageReport};
use super::text::{normalize_course_code, split_description, split_label, AdminFields};
use super::types::{Course, CourseLevel, CourseSet, SubjectSet, NO_DESCRIPTION};
use super::{element_text, fetch_or_skip, resolve_link};
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;
use tracing::{debug, info};
use url::Url;

static COURSE_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.course.first").unwrap());
static HEADING_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("h2.flex-grow-1").unwrap());
static LINK_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").unwrap());
static ADMIN_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("b").unwrap());
static DESCRIPTION_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("p").unwrap());

/// Parses every course block on a subject listing page.
///
/// Blocks missing a heading, a `" - "` separator, or a detail link are
/// skipped. Everything else is best-effort: absent administrative
/// sub-fields become `None` individually.
pub fn parse_course_listing(html: &str, root: &Url) -> Vec<ItemOutcome<Course>> {
    let document = Html::parse_document(html);
    document
        .select(&COURSE_SELECTOR)
        .map(|block| parse_course_block(&block, root))
        .collect()
}

/// Parses a single course block.
fn parse_course_block(block: &ElementRef, root: &Url) -> ItemOutcome<Course> {
    let Some(heading) = block.select(&HEADING_SELECTOR).next() else {
        return ItemOutcome::skipped(first_line(&element_text(block)), "course block has no heading");
    };

    // The heading also carries badges on later lines; only the first is the title.
    let heading_text = element_text(&heading);
    let title = first_line(&heading_text);
    let Some((raw_code, name)) = split_label(&title) else {
        return ItemOutcome::skipped(title, "heading has no \" - \" separator");
    };

    let Some(href) = block
        .select(&LINK_SELECTOR)
        .next()
        .and_then(|link| link.value().attr("href"))
    else {
        return ItemOutcome::skipped(title, "course block has no detail link");
    };
    let detail_url = match resolve_link(root, href) {
        Ok(url) => url,
        Err(e) => return ItemOutcome::skipped(title, e.to_string()),
    };

    let admin_text = block
        .select(&ADMIN_SELECTOR)
        .next()
        .map(|el| el.text().collect::<String>())
        .unwrap_or_default();
    let admin = AdminFields::parse(&admin_text);

    let (description, prerequisites) = match block.select(&DESCRIPTION_SELECTOR).next() {
        Some(paragraph) => split_description(&paragraph.text().collect::<String>()),
        None => (NO_DESCRIPTION.to_string(), None),
    };

    ItemOutcome::Parsed(Course {
        code: normalize_course_code(&raw_code),
        name,
        detail_url,
        description,
        weight: admin.weight,
        fee_index: admin.fee_index,
        schedule_pattern: admin.schedule_pattern,
        lecture_hours: admin.lecture_hours,
        seminar_hours: admin.seminar_hours,
        lab_hours: admin.lab_hours,
        prerequisites,
        level: CourseLevel::from_code(&raw_code),
    })
}

fn first_line(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or_default()
        .to_string()
}

/// Runs the course stage over every subject, merging into one record set.
///
/// A course listed under several subjects keeps the last record seen.
pub async fn harvest_courses<F: PageFetcher>(
    fetcher: &F,
    subjects: &SubjectSet,
    config: &HarvestConfig,
) -> Result<(CourseSet, StageReport), HarvestError> {
    let root = config.root()?;
    let mut report = StageReport::new(Stage::Courses);
    let mut courses = CourseSet::new();

    for subject in subjects.values() {
        info!(subject = %subject.code, url = %subject.catalog_url, "Scraping courses");
        let Some(html) = fetch_or_skip(fetcher, &subject.catalog_url, config, &mut report).await?
        else {
            continue;
        };

        for outcome in parse_course_listing(&html, &root) {
            if let Some(course) = report.absorb(outcome) {
                debug!(course = %course.code, "Parsed course");
                courses.insert(course.code.clone(), course);
            }
        }
    }

    report.records = courses.len();
    info!(count = courses.len(), skipped = report.skipped.len(), "Collected courses");
    Ok((courses, report))
}
