use std::fs;
use std::path::Path;

use catalog_harvest::harvest::{
    CourseLevel, CourseSet, FacultySet, FetchConfig, HarvestManifest, ScheduleSet, SubjectSet,
    NO_DESCRIPTION, ROOM_PLACEHOLDER,
};
use catalog_harvest::{
    HarvestConfig, HarvestError, Harvester, JsonSnapshotStore, RateLimitedFetcher, SnapshotStore,
    Stage,
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const LANDING: &str = r#"
<html><body>
  <div class="content">
    <div class="col col-md-6 col-lg-5 offset-lg-2">
      <h2>Faculties</h2>
      <ul>
        <li><a href="/catalogue/faculty/ss">SS - St Stephen's College</a></li>
      </ul>
    </div>
  </div>
</body></html>
"#;

const FACULTY_SS: &str = r#"
<html><body>
  <div class="content">
    <div class="container">
      <ul>
        <li><a href="/catalogue/course/chrtc">CHRTC - Christian Theology</a></li>
        <li><a href="/catalogue/course/pasto">PASTO - Pastoral Care - Practicum</a></li>
        <li><a href="/catalogue/course/misc">Miscellaneous Offerings</a></li>
      </ul>
    </div>
  </div>
</body></html>
"#;

const SUBJECT_CHRTC: &str = r#"
<html><body>
  <div class="course first">
    <div class="d-flex">
      <h2 class="flex-grow-1">
        <a href="/catalogue/course/chrtc/100">CHRTC 100 - Introduction to Christian Theology</a>
      </h2>
    </div>
    <b>★ 3 (fi 6) (EITHER, 3-0-0)</b>
    <p>Studies core doctrines. Prerequisite: consent of the College.</p>
  </div>
</body></html>
"#;

const SUBJECT_PASTO: &str = r#"
<html><body>
  <div class="course first">
    <h2 class="flex-grow-1">
      <a href="/catalogue/course/pasto/450">PASTO 450 - Spiritual Care Practicum</a>
    </h2>
    <b>★ 6 fi 12 EITHER 0-0-6</b>
  </div>
</body></html>
"#;

const COURSE_CHRTC_100: &str = r#"
<html><body>
  <div id="content-nav" class="nav flex-nowrap">
    <a class="nav-link active" href="?term=1890">Fall Term 2024</a>
  </div>
  <div class="mb-5">
    <h3>Lecture</h3>
    <table><tbody>
      <tr data-card-title="LEC A1">
        <td data-card-title="Section">LEC A1
          (40123)</td>
        <td data-card-title="Capacity">30</td>
        <td data-card-title="Class times">2024-09-03 - 2024-12-09 (TR) 09:30 - 10:50</td>
      </tr>
    </tbody></table>
  </div>
  <div id="content-nav" class="nav flex-nowrap">
    <a class="nav-link active" href="?term=1900">Winter Term 2025</a>
  </div>
  <div class="mb-5">
    <h3>Lecture</h3>
    <table><tbody>
      <tr data-card-title="LEC B1">
        <td data-card-title="Section">LEC B1
          (50456)</td>
        <td data-card-title="Capacity">25</td>
        <td data-card-title="Class times">(MWF) 13:00 - 13:50</td>
      </tr>
    </tbody></table>
  </div>
</body></html>
"#;

const COURSE_PASTO_450: &str = r#"
<html><body><p>This course is not offered in the upcoming terms.</p></body></html>
"#;

async fn mount_page(server: &MockServer, page_path: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(page_path))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

async fn catalogue_server() -> MockServer {
    let server = MockServer::start().await;
    mount_page(&server, "/catalogue", LANDING).await;
    mount_page(&server, "/catalogue/faculty/ss", FACULTY_SS).await;
    mount_page(&server, "/catalogue/course/chrtc", SUBJECT_CHRTC).await;
    mount_page(&server, "/catalogue/course/pasto", SUBJECT_PASTO).await;
    mount_page(&server, "/catalogue/course/chrtc/100", COURSE_CHRTC_100).await;
    mount_page(&server, "/catalogue/course/pasto/450", COURSE_PASTO_450).await;
    server
}

fn test_config(server: &MockServer, output_dir: &Path) -> HarvestConfig {
    HarvestConfig {
        root_url: server.uri(),
        catalog_url: format!("{}/catalogue", server.uri()),
        request_delay_secs: 0.0,
        max_retries: 0,
        output_dir: output_dir.to_path_buf(),
        ..HarvestConfig::default()
    }
}

fn harvester(config: HarvestConfig) -> Harvester<RateLimitedFetcher, JsonSnapshotStore> {
    let fetcher = RateLimitedFetcher::with_config(FetchConfig::from(&config)).unwrap();
    let store = JsonSnapshotStore::new(config.output_dir.clone());
    Harvester::new(fetcher, store, config)
}

#[tokio::test]
async fn test_end_to_end_harvest() {
    let server = catalogue_server().await;
    let dir = tempfile::tempdir().unwrap();
    let root = server.uri();

    let output = harvester(test_config(&server, dir.path()))
        .run(Stage::Faculties)
        .await
        .unwrap();

    // Faculties
    assert_eq!(output.faculties.len(), 1);
    assert_eq!(output.faculties["SS"].name, "St Stephen's College");
    assert_eq!(output.faculties["SS"].catalog_url, format!("{root}/catalogue/faculty/ss"));

    // Subjects: the label without a separator is skipped
    assert_eq!(output.subjects.len(), 2);
    assert_eq!(output.subjects["CHRTC"].faculty_codes, vec!["SS"]);
    assert_eq!(output.subjects["PASTO"].name, "Pastoral Care - Practicum");
    assert_eq!(output.subjects["PASTO"].faculty_codes, vec!["SS"]);

    // Course with a complete administrative string
    let intro = &output.courses["CHRTC100"];
    assert_eq!(intro.name, "Introduction to Christian Theology");
    assert_eq!(intro.detail_url, format!("{root}/catalogue/course/chrtc/100"));
    assert_eq!(intro.weight, "3");
    assert_eq!(intro.fee_index.as_deref(), Some("6"));
    assert_eq!(intro.schedule_pattern.as_deref(), Some("EITHER"));
    assert_eq!(intro.lecture_hours.as_deref(), Some("3"));
    assert_eq!(intro.seminar_hours.as_deref(), Some("0"));
    assert_eq!(intro.lab_hours.as_deref(), Some("0"));
    assert_eq!(intro.description, "Studies core doctrines. ");
    assert_eq!(intro.prerequisites.as_deref(), Some(": consent of the College."));
    assert_eq!(intro.level, CourseLevel::Junior);

    // Course with a malformed administrative string keeps what it can
    let practicum = &output.courses["PASTO450"];
    assert_eq!(practicum.weight, "6");
    assert_eq!(practicum.fee_index, None);
    assert_eq!(practicum.schedule_pattern, None);
    assert_eq!(practicum.lecture_hours, None);
    assert_eq!(practicum.seminar_hours, None);
    assert_eq!(practicum.lab_hours, None);
    assert_eq!(practicum.description, NO_DESCRIPTION);
    assert_eq!(practicum.prerequisites, None);
    assert_eq!(practicum.level, CourseLevel::Senior);

    // Two terms with one lecture section each
    let schedule = &output.schedules["CHRTC100"];
    assert_eq!(schedule.terms.len(), 2);

    let fall = &schedule.terms["Fall2024"]["Lecture"];
    assert_eq!(fall.len(), 1);
    assert_eq!(fall[0].class_code, "40123");
    assert_eq!(fall[0].class_name, "LEC A1");
    assert_eq!(fall[0].capacity, "30");
    assert_eq!(fall[0].days, "TR");
    assert_eq!(fall[0].start_date, "2024-09-03");
    assert_eq!(fall[0].end_date, "2024-12-09");
    assert_eq!(fall[0].start_time, "09:30");
    assert_eq!(fall[0].end_time, "10:50");
    assert_eq!(fall[0].room, ROOM_PLACEHOLDER);

    let winter = &schedule.terms["Winter2025"]["Lecture"];
    assert_eq!(winter.len(), 1);
    assert_eq!(winter[0].class_code, "50456");
    assert_eq!(winter[0].start_date, "NA");
    assert_eq!(winter[0].end_date, "NA");
    assert_eq!(winter[0].start_time, "13:00");
    assert_eq!(winter[0].end_time, "13:50");
    assert_eq!(winter[0].days, "MWF");

    // Every course has a schedule root, even without terms
    assert!(output.schedules["PASTO450"].terms.is_empty());

    // Manifest records every stage and the skipped subject label
    let manifest = &output.manifest;
    assert_eq!(manifest.stages.len(), 4);
    let subject_stage = &manifest.stages[1].report;
    assert_eq!(subject_stage.stage, Stage::Subjects);
    assert_eq!(subject_stage.skipped.len(), 1);
    assert_eq!(subject_stage.skipped[0].item, "Miscellaneous Offerings");
}

#[tokio::test]
async fn test_snapshots_written_and_loadable() {
    let server = catalogue_server().await;
    let dir = tempfile::tempdir().unwrap();

    let output = harvester(test_config(&server, dir.path()))
        .run(Stage::Faculties)
        .await
        .unwrap();

    let store = JsonSnapshotStore::new(dir.path());
    for name in ["faculties", "subjects", "courses", "class_schedules", "manifest"] {
        assert!(store.has_snapshot(name), "missing snapshot {name}");
    }

    let faculties: FacultySet = store.load("faculties").unwrap();
    let subjects: SubjectSet = store.load("subjects").unwrap();
    let courses: CourseSet = store.load("courses").unwrap();
    let schedules: ScheduleSet = store.load("class_schedules").unwrap();
    let manifest: HarvestManifest = store.load("manifest").unwrap();

    assert_eq!(faculties, output.faculties);
    assert_eq!(subjects, output.subjects);
    assert_eq!(courses, output.courses);
    assert_eq!(schedules, output.schedules);
    assert_eq!(manifest.stages.len(), 4);

    let raw = fs::read_to_string(store.path_for("class_schedules")).unwrap();
    assert!(raw.contains("\"courseCode\": \"CHRTC100\""));
    assert!(raw.contains("\"startTime\": \"09:30\""));
}

#[tokio::test]
async fn test_rerun_is_byte_identical() {
    let server = catalogue_server().await;
    let first = tempfile::tempdir().unwrap();
    let second = tempfile::tempdir().unwrap();

    harvester(test_config(&server, first.path()))
        .run(Stage::Faculties)
        .await
        .unwrap();
    harvester(test_config(&server, second.path()))
        .run(Stage::Faculties)
        .await
        .unwrap();

    for name in ["faculties", "subjects", "courses", "class_schedules"] {
        let file = format!("{name}.json");
        assert_eq!(
            fs::read(first.path().join(&file)).unwrap(),
            fs::read(second.path().join(&file)).unwrap(),
            "{name} differs between runs"
        );
    }
}

#[tokio::test]
async fn test_resume_from_courses_skips_earlier_pages() {
    let server = catalogue_server().await;
    let dir = tempfile::tempdir().unwrap();
    let full = harvester(test_config(&server, dir.path()))
        .run(Stage::Faculties)
        .await
        .unwrap();

    // A server that only knows the subject and course pages: any request for
    // the landing or faculty page would 404 and fail the run.
    let partial = MockServer::start().await;
    let patch = |body: &str| body.replace(&server.uri(), &partial.uri());
    mount_page(&partial, "/catalogue/course/chrtc", SUBJECT_CHRTC).await;
    mount_page(&partial, "/catalogue/course/pasto", SUBJECT_PASTO).await;
    mount_page(&partial, "/catalogue/course/chrtc/100", COURSE_CHRTC_100).await;
    mount_page(&partial, "/catalogue/course/pasto/450", COURSE_PASTO_450).await;

    // Point the saved subject links at the partial server
    let store = JsonSnapshotStore::new(dir.path());
    let subjects_raw = fs::read_to_string(store.path_for("subjects")).unwrap();
    let subjects: SubjectSet = serde_json::from_str(&patch(&subjects_raw)).unwrap();
    store.save("subjects", &subjects).unwrap();

    let resumed = harvester(test_config(&partial, dir.path()))
        .run(Stage::Courses)
        .await
        .unwrap();

    assert_eq!(resumed.faculties, full.faculties);
    assert_eq!(resumed.courses.len(), full.courses.len());
    assert_eq!(
        resumed.schedules["CHRTC100"].terms,
        full.schedules["CHRTC100"].terms
    );
    assert_eq!(resumed.manifest.resumed_from, Stage::Courses);

    // Earlier stage reports carry over from the first run's manifest
    let manifest: HarvestManifest = store.load("manifest").unwrap();
    let stages: Vec<Stage> = manifest.stages.iter().map(|s| s.report.stage).collect();
    assert_eq!(
        stages,
        vec![Stage::Faculties, Stage::Subjects, Stage::Courses, Stage::Schedules]
    );
    assert_eq!(manifest.stages[0], full.manifest.stages[0]);
    assert_eq!(manifest.stages[1], full.manifest.stages[1]);
    assert_eq!(manifest.resumed_from, Stage::Courses);
}

#[tokio::test]
async fn test_unreachable_page_aborts_by_default() {
    let server = MockServer::start().await;
    mount_page(&server, "/catalogue", LANDING).await;
    // Faculty page is not mounted: wiremock answers 404
    let dir = tempfile::tempdir().unwrap();

    let err = harvester(test_config(&server, dir.path()))
        .run(Stage::Faculties)
        .await
        .unwrap_err();

    assert!(matches!(err, HarvestError::HttpStatus { status: 404, .. }));
    let store = JsonSnapshotStore::new(dir.path());
    assert!(store.has_snapshot("faculties"));
    assert!(!store.has_snapshot("subjects"));
}

#[tokio::test]
async fn test_skip_failed_pages_continues() {
    let server = MockServer::start().await;
    mount_page(&server, "/catalogue", LANDING).await;
    mount_page(&server, "/catalogue/faculty/ss", FACULTY_SS).await;
    mount_page(&server, "/catalogue/course/chrtc", SUBJECT_CHRTC).await;
    mount_page(&server, "/catalogue/course/chrtc/100", COURSE_CHRTC_100).await;
    // PASTO listing is missing
    let dir = tempfile::tempdir().unwrap();

    let config = HarvestConfig {
        skip_failed_pages: true,
        ..test_config(&server, dir.path())
    };
    let output = harvester(config).run(Stage::Faculties).await.unwrap();

    assert_eq!(output.courses.keys().collect::<Vec<_>>(), vec!["CHRTC100"]);
    let course_stage = &output.manifest.stages[2].report;
    assert_eq!(course_stage.stage, Stage::Courses);
    assert_eq!(course_stage.skipped.len(), 1);
    assert!(course_stage.skipped[0].item.ends_with("/catalogue/course/pasto"));
}

#[tokio::test]
async fn test_skip_limit_escalates() {
    let server = catalogue_server().await;
    let dir = tempfile::tempdir().unwrap();

    let config = HarvestConfig {
        max_skips_per_stage: Some(0),
        ..test_config(&server, dir.path())
    };
    let err = harvester(config).run(Stage::Faculties).await.unwrap_err();

    assert!(matches!(
        err,
        HarvestError::SkipLimitExceeded { ref stage, skipped: 1, limit: 0 } if stage == "subjects"
    ));
    let store = JsonSnapshotStore::new(dir.path());
    assert!(store.has_snapshot("faculties"));
    assert!(!store.has_snapshot("subjects"));
}

#[tokio::test]
async fn test_faculty_allow_list_scopes_crawl() {
    let server = MockServer::start().await;
    let landing = LANDING.replace(
        "</ul>",
        r#"<li><a href="/catalogue/faculty/ar">AR - Faculty of Arts</a></li></ul>"#,
    );
    mount_page(&server, "/catalogue", &landing).await;
    let dir = tempfile::tempdir().unwrap();

    let config = HarvestConfig {
        faculty_allow_list: vec!["ar".to_string()],
        skip_failed_pages: true,
        ..test_config(&server, dir.path())
    };
    let output = harvester(config).run(Stage::Faculties).await.unwrap();

    let codes: Vec<&str> = output.faculties.keys().map(String::as_str).collect();
    assert_eq!(codes, vec!["AR"]);
    // The AR page is not served, so it is recorded as a skip
    assert_eq!(output.manifest.stages[1].report.skipped.len(), 1);
    assert!(output.subjects.is_empty());
}
