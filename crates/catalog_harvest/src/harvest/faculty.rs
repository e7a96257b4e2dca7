//! Faculty index extraction from the catalogue landing page.

use super::client::PageFetcher;
use super::config::HarvestConfig;
use super::error::HarvestError;
use super::report::{Stage, StageReport};
use super::text::split_label;
use super::types::{Faculty, FacultySet};
use super::{element_text, resolve_link};
use scraper::{Html, Selector};
use std::sync::LazyLock;
use tracing::{info, warn};
use url::Url;

static FACULTY_REGION_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.col.col-md-6.col-lg-5.offset-lg-2").unwrap());
static ITEM_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("li").unwrap());
static LINK_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").unwrap());

/// Parses the faculty list on the catalogue landing page.
///
/// The faculty list is small and stable, so there is no per-entry fallback:
/// a missing region, link, or separator fails the whole page.
///
/// # Arguments
/// * `html` - Landing page markup
/// * `page_url` - Where the markup came from (for error messages)
/// * `root` - Site root that relative links resolve against
pub fn parse_faculty_index(
    html: &str,
    page_url: &str,
    root: &Url,
) -> Result<Vec<Faculty>, HarvestError> {
    let document = Html::parse_document(html);

    let region = document
        .select(&FACULTY_REGION_SELECTOR)
        .next()
        .ok_or_else(|| HarvestError::Structure {
            url: page_url.to_string(),
            message: "faculty index region not found".to_string(),
        })?;

    let mut faculties = Vec::new();
    for item in region.select(&ITEM_SELECTOR) {
        let (link, href) = item
            .select(&LINK_SELECTOR)
            .next()
            .and_then(|link| Some((link, link.value().attr("href")?)))
            .ok_or_else(|| HarvestError::Structure {
                url: page_url.to_string(),
                message: format!("faculty entry without a link: {:?}", element_text(&item)),
            })?;

        let label = element_text(&link);
        let (code, name) = split_label(&label).ok_or(HarvestError::MalformedLabel {
            label: label.clone(),
        })?;

        faculties.push(Faculty {
            code,
            name,
            catalog_url: resolve_link(root, href)?,
        });
    }

    Ok(faculties)
}

/// Runs the faculty stage: fetch the landing page, parse, apply the allow-list.
pub async fn harvest_faculties<F: PageFetcher>(
    fetcher: &F,
    config: &HarvestConfig,
) -> Result<(FacultySet, StageReport), HarvestError> {
    let root = config.root()?;
    let mut report = StageReport::new(Stage::Faculties);

    info!(url = %config.catalog_url, "Scraping faculties");
    let html = fetcher.fetch(&config.catalog_url).await?;
    let parsed = parse_faculty_index(&html, &config.catalog_url, &root)?;

    for wanted in &config.faculty_allow_list {
        if !parsed.iter().any(|f| f.code.eq_ignore_ascii_case(wanted)) {
            warn!(faculty = %wanted, "Allow-listed faculty not found in catalogue");
        }
    }

    // A repeated code replaces the earlier record but keeps its position
    let faculties: FacultySet = parsed
        .into_iter()
        .filter(|faculty| config.allows_faculty(&faculty.code))
        .map(|faculty| (faculty.code.clone(), faculty))
        .collect();

    report.records = faculties.len();
    info!(count = faculties.len(), "Collected faculties");
    Ok((faculties, report))
}
