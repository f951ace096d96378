use rollbook_core::db::open_db_in_memory;
use rollbook_core::reconcile::{drift_report, reconcile_enrollments, EnrollmentRef};
use rollbook_core::repo::directory_repo::{DirectoryRepository, SqliteDirectoryRepository};
use rollbook_core::{
    init_logging, Actor, Course, EnrollmentService, NewCourse, NewStudent, RosterRepository,
    SqliteRosterRepository, Student,
};
use rusqlite::{params, Connection};
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};
use uuid::Uuid;

#[test]
fn reconcile_rebuilds_rosters_from_forward_truth() {
    let conn = open_db_in_memory().unwrap();
    let alice = seed_student(&conn, "S-1001");
    let bob = seed_student(&conn, "S-1002");
    let math = seed_course(&conn, "MATH101", "Mathematics 101");
    let art = seed_course(&conn, "ART200", "Studio Art");

    let service = EnrollmentService::new(SqliteRosterRepository::try_new(&conn).unwrap());
    let actor = Actor::admin(Uuid::new_v4());
    service.enroll(&actor, alice.id, math.id).unwrap();
    service.enroll(&actor, alice.id, art.id).unwrap();
    service.enroll(&actor, bob.id, math.id).unwrap();

    // Corrupt the derived side: drop one roster entry, plant a stale one.
    conn.execute(
        "DELETE FROM course_rosters WHERE course_uuid = ?1 AND student_uuid = ?2;",
        params![math.id.to_string(), alice.id.to_string()],
    )
    .unwrap();
    conn.execute(
        "INSERT INTO course_rosters (course_uuid, student_uuid) VALUES (?1, ?2);",
        params![art.id.to_string(), bob.id.to_string()],
    )
    .unwrap();

    let repo = SqliteRosterRepository::try_new(&conn).unwrap();
    assert!(!drift_report(&repo).unwrap().is_clean());

    let report = reconcile_enrollments(&repo).unwrap();
    assert_eq!(report.students_scanned, 2);
    assert_eq!(report.rosters_reset, 3);
    // The dropped roster entry is the only link the pass actually restores;
    // the two untouched links report as already present.
    assert_eq!(report.links_added, 1);
    assert_eq!(report.links_already_present, 2);
    assert_eq!(report.orphans_pruned, 0);

    assert!(drift_report(&repo).unwrap().is_clean());
    let math_after = repo.find_course(math.id).unwrap().unwrap();
    let art_after = repo.find_course(art.id).unwrap().unwrap();
    assert!(math_after.has_student(alice.id));
    assert!(math_after.has_student(bob.id));
    assert_eq!(art_after.students, vec![alice.id]);
}

#[test]
fn reconcile_prunes_orphaned_course_refs() {
    let conn = open_db_in_memory().unwrap();
    let student = seed_student(&conn, "S-1001");
    let course = seed_course(&conn, "MATH101", "Mathematics 101");

    let service = EnrollmentService::new(SqliteRosterRepository::try_new(&conn).unwrap());
    service
        .enroll(&Actor::admin(Uuid::new_v4()), student.id, course.id)
        .unwrap();

    let ghost_course = Uuid::new_v4();
    conn.execute(
        "INSERT INTO student_enrollments (student_uuid, course_uuid) VALUES (?1, ?2);",
        params![student.id.to_string(), ghost_course.to_string()],
    )
    .unwrap();

    let repo = SqliteRosterRepository::try_new(&conn).unwrap();
    let report = reconcile_enrollments(&repo).unwrap();
    assert_eq!(report.orphans_pruned, 1);
    assert_eq!(report.links_added, 0);
    assert_eq!(report.links_already_present, 1);

    let loaded = repo.find_student(student.id).unwrap().unwrap();
    assert_eq!(loaded.enrolled_courses, vec![course.id]);
    assert!(drift_report(&repo).unwrap().is_clean());
}

#[test]
fn reconcile_of_converged_data_converges_again() {
    let conn = open_db_in_memory().unwrap();
    let student = seed_student(&conn, "S-1001");
    let course = seed_course(&conn, "MATH101", "Mathematics 101");

    let service = EnrollmentService::new(SqliteRosterRepository::try_new(&conn).unwrap());
    service
        .enroll(&Actor::admin(Uuid::new_v4()), student.id, course.id)
        .unwrap();

    let repo = SqliteRosterRepository::try_new(&conn).unwrap();
    let first = reconcile_enrollments(&repo).unwrap();
    let second = reconcile_enrollments(&repo).unwrap();

    assert_eq!(first.links_added, 0);
    assert_eq!(first.links_already_present, 1);
    assert_eq!(second.links_added, 0);
    assert_eq!(second.links_already_present, 1);
    assert_eq!(second.rosters_reset, 1);
    assert_eq!(second.orphans_pruned, 0);
    assert!(drift_report(&repo).unwrap().is_clean());
}

#[test]
fn reconcile_classifies_each_link_against_pre_pass_rosters() {
    let conn = open_db_in_memory().unwrap();
    let student = seed_student(&conn, "S-1001");
    let healthy = seed_course(&conn, "MATH101", "Mathematics 101");
    let drifted = seed_course(&conn, "ART200", "Studio Art");
    let ghost_course = Uuid::new_v4();

    // One symmetric link, one forward-only link, one orphan reference.
    let service = EnrollmentService::new(SqliteRosterRepository::try_new(&conn).unwrap());
    service
        .enroll(&Actor::admin(Uuid::new_v4()), student.id, healthy.id)
        .unwrap();
    conn.execute(
        "INSERT INTO student_enrollments (student_uuid, course_uuid) VALUES (?1, ?2);",
        params![student.id.to_string(), drifted.id.to_string()],
    )
    .unwrap();
    conn.execute(
        "INSERT INTO student_enrollments (student_uuid, course_uuid) VALUES (?1, ?2);",
        params![student.id.to_string(), ghost_course.to_string()],
    )
    .unwrap();

    let repo = SqliteRosterRepository::try_new(&conn).unwrap();
    let report = reconcile_enrollments(&repo).unwrap();

    assert_eq!(report.students_scanned, 1);
    assert_eq!(report.rosters_reset, 1);
    assert_eq!(report.links_added, 1);
    assert_eq!(report.links_already_present, 1);
    assert_eq!(report.orphans_pruned, 1);
    assert!(drift_report(&repo).unwrap().is_clean());
}

#[test]
fn reconcile_logs_one_line_per_scanned_reference() {
    let conn = open_db_in_memory().unwrap();
    let student = seed_student(&conn, "S-2001");
    let kept = seed_course(&conn, "BIO110", "Biology 110");
    let restored = seed_course(&conn, "CHEM120", "Chemistry 120");
    let ghost_course = Uuid::new_v4();

    let service = EnrollmentService::new(SqliteRosterRepository::try_new(&conn).unwrap());
    service
        .enroll(&Actor::admin(Uuid::new_v4()), student.id, kept.id)
        .unwrap();
    conn.execute(
        "INSERT INTO student_enrollments (student_uuid, course_uuid) VALUES (?1, ?2);",
        params![student.id.to_string(), restored.id.to_string()],
    )
    .unwrap();
    conn.execute(
        "INSERT INTO student_enrollments (student_uuid, course_uuid) VALUES (?1, ?2);",
        params![student.id.to_string(), ghost_course.to_string()],
    )
    .unwrap();

    let log_dir = tempfile::tempdir().unwrap();
    init_logging("info", log_dir.path().to_str().unwrap()).unwrap();

    let repo = SqliteRosterRepository::try_new(&conn).unwrap();
    reconcile_enrollments(&repo).unwrap();

    let expected = [
        format!(
            "reason=already_present student={} course={}",
            student.id, kept.id
        ),
        format!("reason=added student={} course={}", student.id, restored.id),
        format!(
            "reason=orphan_pruned student={} course={ghost_course}",
            student.id
        ),
    ];
    let logged = wait_for_log_lines(log_dir.path(), &expected);
    for needle in &expected {
        assert!(
            logged.contains(needle),
            "missing log line `{needle}` in:\n{logged}"
        );
    }
}

#[test]
fn drift_report_classifies_all_three_categories_without_writing() {
    let conn = open_db_in_memory().unwrap();
    let alice = seed_student(&conn, "S-1001");
    let bob = seed_student(&conn, "S-1002");
    let math = seed_course(&conn, "MATH101", "Mathematics 101");
    let ghost_course = Uuid::new_v4();

    // Forward-only reference: roster entry missing.
    conn.execute(
        "INSERT INTO student_enrollments (student_uuid, course_uuid) VALUES (?1, ?2);",
        params![alice.id.to_string(), math.id.to_string()],
    )
    .unwrap();
    // Roster-only entry: forward reference missing.
    conn.execute(
        "INSERT INTO course_rosters (course_uuid, student_uuid) VALUES (?1, ?2);",
        params![math.id.to_string(), bob.id.to_string()],
    )
    .unwrap();
    // Forward reference to a course that does not exist.
    conn.execute(
        "INSERT INTO student_enrollments (student_uuid, course_uuid) VALUES (?1, ?2);",
        params![bob.id.to_string(), ghost_course.to_string()],
    )
    .unwrap();

    let repo = SqliteRosterRepository::try_new(&conn).unwrap();
    let forward_before = count_rows(&conn, "student_enrollments");
    let reverse_before = count_rows(&conn, "course_rosters");

    let report = drift_report(&repo).unwrap();
    assert_eq!(
        report.missing_roster_entries,
        vec![EnrollmentRef {
            student_id: alice.id,
            course_id: math.id,
        }]
    );
    assert_eq!(
        report.stale_roster_entries,
        vec![EnrollmentRef {
            student_id: bob.id,
            course_id: math.id,
        }]
    );
    assert_eq!(
        report.orphaned_course_refs,
        vec![EnrollmentRef {
            student_id: bob.id,
            course_id: ghost_course,
        }]
    );
    assert!(!report.is_clean());

    assert_eq!(count_rows(&conn, "student_enrollments"), forward_before);
    assert_eq!(count_rows(&conn, "course_rosters"), reverse_before);
}

#[test]
fn roster_entry_naming_missing_student_counts_as_stale() {
    let conn = open_db_in_memory().unwrap();
    let course = seed_course(&conn, "MATH101", "Mathematics 101");
    let ghost_student = Uuid::new_v4();

    conn.execute(
        "INSERT INTO course_rosters (course_uuid, student_uuid) VALUES (?1, ?2);",
        params![course.id.to_string(), ghost_student.to_string()],
    )
    .unwrap();

    let repo = SqliteRosterRepository::try_new(&conn).unwrap();
    let report = drift_report(&repo).unwrap();
    assert_eq!(
        report.stale_roster_entries,
        vec![EnrollmentRef {
            student_id: ghost_student,
            course_id: course.id,
        }]
    );

    // The rebuild drops it: rosters are derived from students that exist.
    reconcile_enrollments(&repo).unwrap();
    assert_eq!(count_rows(&conn, "course_rosters"), 0);
    assert!(drift_report(&repo).unwrap().is_clean());
}

fn seed_student(conn: &Connection, student_number: &str) -> Student {
    let directory = SqliteDirectoryRepository::try_new(conn).unwrap();
    directory
        .create_student(&NewStudent {
            student_number: student_number.to_string(),
            user_id: Uuid::new_v4(),
            parent_id: None,
        })
        .unwrap()
}

fn seed_course(conn: &Connection, code: &str, name: &str) -> Course {
    let directory = SqliteDirectoryRepository::try_new(conn).unwrap();
    directory
        .create_course(&NewCourse {
            code: code.to_string(),
            name: name.to_string(),
            teacher_id: None,
        })
        .unwrap()
}

fn count_rows(conn: &Connection, table_name: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table_name};"), [], |row| {
        row.get(0)
    })
    .unwrap()
}

// The logger writes through a buffered flusher, so the lines land on disk a
// moment after the call returns. Poll the log directory until every needle
// shows up or the deadline passes.
fn wait_for_log_lines(dir: &Path, needles: &[String]) -> String {
    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        let mut content = String::new();
        if let Ok(entries) = std::fs::read_dir(dir) {
            for entry in entries.flatten() {
                if entry.path().extension().is_some_and(|ext| ext == "log") {
                    content.push_str(&std::fs::read_to_string(entry.path()).unwrap_or_default());
                }
            }
        }
        if needles.iter().all(|needle| content.contains(needle)) || Instant::now() >= deadline {
            return content;
        }
        thread::sleep(Duration::from_millis(100));
    }
}
