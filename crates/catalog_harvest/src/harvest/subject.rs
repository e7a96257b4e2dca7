//! Subject extraction and cross-faculty merge.
//!
//! A subject such as WKEXP is listed by several faculties. Pass 1 visits
//! every faculty and builds the identity table (one record per subject code).
//! Pass 2 walks the same listings in faculty order and merge-appends each
//! faculty code onto the subjects it lists, so every record exists before
//! anything is appended to it.

use super::client::PageFetcher;
use super::config::HarvestConfig;
use super::error::HarvestError;
use super::report::{ItemOutcome, Stage, StageReport};
use super::text::split_label;
use super::types::{FacultySet, Subject, SubjectSet};
use super::{element_text, fetch_or_skip, resolve_link};
use scraper::{Html, Selector};
use std::sync::LazyLock;
use tracing::info;
use url::Url;

static CONTAINER_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.content div.container").unwrap());
static LIST_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("ul").unwrap());
static ITEM_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("li").unwrap());
static LINK_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").unwrap());

/// One subject as listed on a faculty page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectEntry {
    pub code: String,
    pub name: String,
    pub catalog_url: String,
}

/// The subjects one faculty lists, in page order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FacultyListing {
    pub faculty_code: String,
    pub subjects: Vec<SubjectEntry>,
}

/// Parses the subject list on a faculty page.
///
/// A page without the content container is an error; individual entries
/// without a link or a `" - "` separator come back as skips.
pub fn parse_subject_list(
    html: &str,
    page_url: &str,
    root: &Url,
) -> Result<Vec<ItemOutcome<SubjectEntry>>, HarvestError> {
    let document = Html::parse_document(html);

    let list = document
        .select(&CONTAINER_SELECTOR)
        .next()
        .and_then(|container| container.select(&LIST_SELECTOR).next())
        .ok_or_else(|| HarvestError::Structure {
            url: page_url.to_string(),
            message: "subject list container not found".to_string(),
        })?;

    let mut entries = Vec::new();
    for item in list.select(&ITEM_SELECTOR) {
        let link = item
            .select(&LINK_SELECTOR)
            .next()
            .and_then(|link| Some((link, link.value().attr("href")?)));
        let Some((link, href)) = link else {
            entries.push(ItemOutcome::skipped(element_text(&item), "entry has no link"));
            continue;
        };

        let label = element_text(&link);
        let Some((code, name)) = split_label(&label) else {
            entries.push(ItemOutcome::skipped(label, "label has no \" - \" separator"));
            continue;
        };

        match resolve_link(root, href) {
            Ok(catalog_url) => entries.push(ItemOutcome::Parsed(SubjectEntry {
                code,
                name,
                catalog_url,
            })),
            Err(e) => entries.push(ItemOutcome::skipped(label, e.to_string())),
        }
    }

    Ok(entries)
}

/// Pass 1: one record per subject code, with no faculty associations yet.
pub fn build_identity_table(listings: &[FacultyListing]) -> SubjectSet {
    let mut subjects = SubjectSet::new();
    for entry in listings.iter().flat_map(|listing| &listing.subjects) {
        subjects.insert(
            entry.code.clone(),
            Subject {
                code: entry.code.clone(),
                name: entry.name.clone(),
                catalog_url: entry.catalog_url.clone(),
                faculty_codes: Vec::new(),
            },
        );
    }
    subjects
}

/// Pass 2: appends each listing's faculty code to the subjects it lists.
///
/// Name and link are re-confirmed from the listing. Entries never shrink.
pub fn merge_faculty_listings(subjects: &mut SubjectSet, listings: &[FacultyListing]) {
    for listing in listings {
        for entry in &listing.subjects {
            let subject = subjects
                .entry(entry.code.clone())
                .or_insert_with(|| Subject {
                    code: entry.code.clone(),
                    name: entry.name.clone(),
                    catalog_url: entry.catalog_url.clone(),
                    faculty_codes: Vec::new(),
                });
            subject.name = entry.name.clone();
            subject.catalog_url = entry.catalog_url.clone();
            subject.faculty_codes.push(listing.faculty_code.clone());
        }
    }
}

/// Runs the subject stage over every faculty.
pub async fn harvest_subjects<F: PageFetcher>(
    fetcher: &F,
    faculties: &FacultySet,
    config: &HarvestConfig,
) -> Result<(SubjectSet, StageReport), HarvestError> {
    let root = config.root()?;
    let mut report = StageReport::new(Stage::Subjects);
    let mut listings = Vec::with_capacity(faculties.len());

    for faculty in faculties.values() {
        info!(faculty = %faculty.code, url = %faculty.catalog_url, "Scraping subjects");
        let Some(html) = fetch_or_skip(fetcher, &faculty.catalog_url, config, &mut report).await?
        else {
            continue;
        };

        let subjects = parse_subject_list(&html, &faculty.catalog_url, &root)?
            .into_iter()
            .filter_map(|outcome| report.absorb(outcome))
            .collect();

        listings.push(FacultyListing {
            faculty_code: faculty.code.clone(),
            subjects,
        });
    }

    let mut subjects = build_identity_table(&listings);
    merge_faculty_listings(&mut subjects, &listings);

    report.records = subjects.len();
    info!(count = subjects.len(), skipped = report.skipped.len(), "Collected subjects");
    Ok((subjects, report))
}
