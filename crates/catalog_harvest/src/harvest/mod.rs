//! Catalogue harvesting pipeline

mod client;
mod config;
mod course;
mod error;
mod faculty;
mod report;
mod schedule;
mod subject;
mod text;
mod types;

pub use client::{FetchConfig, PageFetcher, RateLimitedFetcher};
pub use config::HarvestConfig;
pub use course::{harvest_courses, parse_course_listing};
pub use error::HarvestError;
pub use faculty::{harvest_faculties, parse_faculty_index};
pub use report::{ItemOutcome, SkippedItem, Stage, StageReport};
pub use schedule::{harvest_schedules, parse_schedule_page};
pub use subject::{
    build_identity_table, harvest_subjects, merge_faculty_listings, parse_subject_list,
    FacultyListing, SubjectEntry,
};
pub use text::{split_description, split_label, AdminFields, ClassTimes};
pub use types::*;

use crate::snapshot::SnapshotStore;
use chrono::Utc;
use scraper::ElementRef;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use url::Url;

/// Record set name of the run manifest.
pub const MANIFEST_NAME: &str = "manifest";

/// Trimmed text content of an element.
pub(crate) fn element_text(element: &ElementRef) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Resolves a (usually root-relative) catalogue link to an absolute URL.
pub(crate) fn resolve_link(root: &Url, href: &str) -> Result<String, HarvestError> {
    Ok(root.join(href.trim())?.to_string())
}

/// Fetches a work item's page.
///
/// With `skip_failed_pages` set, a fetch failure becomes a skip in `report`
/// and `Ok(None)` is returned; otherwise the error propagates.
pub(crate) async fn fetch_or_skip<F: PageFetcher>(
    fetcher: &F,
    url: &str,
    config: &HarvestConfig,
    report: &mut StageReport,
) -> Result<Option<String>, HarvestError> {
    match fetcher.fetch(url).await {
        Ok(html) => Ok(Some(html)),
        Err(e) if config.skip_failed_pages => {
            report.skip(SkippedItem {
                item: url.to_string(),
                reason: e.to_string(),
            });
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// One completed stage in the run manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageSummary {
    #[serde(flatten)]
    pub report: StageReport,
    pub completed_at: String,
}

/// What a run did, rewritten after every completed stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HarvestManifest {
    pub started_at: String,
    pub resumed_from: Stage,
    pub stages: Vec<StageSummary>,
}

/// Everything a full run produced.
#[derive(Debug, Clone)]
pub struct HarvestOutput {
    pub faculties: FacultySet,
    pub subjects: SubjectSet,
    pub courses: CourseSet,
    pub schedules: ScheduleSet,
    pub manifest: HarvestManifest,
}

/// Drives the four stages in order, snapshotting each before the next starts.
pub struct Harvester<F, S> {
    fetcher: F,
    store: S,
    config: HarvestConfig,
}

impl<F: PageFetcher, S: SnapshotStore> Harvester<F, S> {
    pub fn new(fetcher: F, store: S, config: HarvestConfig) -> Self {
        Self {
            fetcher,
            store,
            config,
        }
    }

    /// Runs the pipeline from `resume_from` onward.
    ///
    /// Stages before `resume_from` are not re-run; their output is loaded
    /// from the snapshots of an earlier run.
    ///
    /// # Returns
    /// * `Ok(HarvestOutput)` - All four record sets and the manifest
    /// * `Err` - The first unrecovered error; earlier snapshots stay on disk
    pub async fn run(&self, resume_from: Stage) -> Result<HarvestOutput, HarvestError> {
        let mut manifest = HarvestManifest {
            started_at: Utc::now().to_rfc3339(),
            resumed_from: resume_from,
            stages: self.earlier_stages(resume_from),
        };

        let faculties: FacultySet = if resume_from <= Stage::Faculties {
            info!("Scraping Faculties...");
            let (faculties, report) = harvest_faculties(&self.fetcher, &self.config).await?;
            self.complete(&faculties, report, &mut manifest)?;
            faculties
        } else {
            self.resume(Stage::Faculties)?
        };

        let subjects: SubjectSet = if resume_from <= Stage::Subjects {
            info!("Scraping Subjects...");
            let (subjects, report) =
                harvest_subjects(&self.fetcher, &faculties, &self.config).await?;
            self.complete(&subjects, report, &mut manifest)?;
            subjects
        } else {
            self.resume(Stage::Subjects)?
        };

        let courses: CourseSet = if resume_from <= Stage::Courses {
            info!("Scraping Courses...");
            let (courses, report) = harvest_courses(&self.fetcher, &subjects, &self.config).await?;
            self.complete(&courses, report, &mut manifest)?;
            courses
        } else {
            self.resume(Stage::Courses)?
        };

        info!("Scraping Class Schedules...");
        let (schedules, report) = harvest_schedules(&self.fetcher, &courses, &self.config).await?;
        self.complete(&schedules, report, &mut manifest)?;

        info!(
            output_dir = %self.config.output_dir.display(),
            "Done. Check the output directory for scraped data."
        );

        Ok(HarvestOutput {
            faculties,
            subjects,
            courses,
            schedules,
            manifest,
        })
    }

    /// Enforces the skip ceiling, then writes the record set and the manifest.
    fn complete<T: Serialize>(
        &self,
        records: &T,
        report: StageReport,
        manifest: &mut HarvestManifest,
    ) -> Result<(), HarvestError> {
        report.enforce_limit(self.config.max_skips_per_stage)?;

        let stage = report.stage;
        self.store.save(stage.snapshot_name(), records)?;
        info!(
            stage = %stage,
            records = report.records,
            skipped = report.skipped.len(),
            "Stage complete"
        );

        manifest.stages.push(StageSummary {
            report,
            completed_at: Utc::now().to_rfc3339(),
        });
        self.store.save(MANIFEST_NAME, &*manifest)
    }

    /// Summaries of the stages a resumed run does not repeat, taken from the
    /// previous run's manifest.
    fn earlier_stages(&self, resume_from: Stage) -> Vec<StageSummary> {
        if resume_from == Stage::Faculties {
            return Vec::new();
        }

        match self.store.load::<HarvestManifest>(MANIFEST_NAME) {
            Ok(previous) => previous
                .stages
                .into_iter()
                .filter(|summary| summary.report.stage < resume_from)
                .collect(),
            Err(e) => {
                warn!(error = %e, "No earlier manifest, starting a new one");
                Vec::new()
            }
        }
    }

    fn resume<T: serde::de::DeserializeOwned>(&self, stage: Stage) -> Result<T, HarvestError> {
        warn!(stage = %stage, "Resuming from snapshot instead of scraping");
        self.store.load(stage.snapshot_name())
    }
}
