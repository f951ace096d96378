//! Batch reconciliation between the two enrollment sides.
//!
//! # Responsibility
//! - Rebuild every course roster from the student-held forward references.
//! - Report drift without writing anything (`drift_report`).
//!
//! # Invariants
//! - Forward references (`Student.enrolled_courses`) are ground truth; the
//!   roster side is derived and may be reset wholesale.
//! - Forward references to a missing course are pruned, never copied.
//! - Every scanned reference logs one line classifying it as added, already
//!   present, or pruned as orphaned; the pass's log stream is its output.
//! - `drift_report` performs zero writes.

use crate::model::course::CourseId;
use crate::model::student::StudentId;
use crate::repo::roster_repo::{RosterRepoResult, RosterRepository};
use log::{info, warn};
use serde::Serialize;
use std::collections::BTreeSet;
use std::time::Instant;

/// Row counts from one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileReport {
    /// Students whose forward references were scanned.
    pub students_scanned: u64,
    /// Roster rows cleared by the initial reset.
    pub rosters_reset: u64,
    /// Kept links that were missing from their roster before the pass.
    pub links_added: u64,
    /// Kept links already on their roster before the pass.
    pub links_already_present: u64,
    /// Forward references removed because their course no longer exists.
    pub orphans_pruned: u64,
}

/// One student<->course reference named by a drift finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentRef {
    pub student_id: StudentId,
    pub course_id: CourseId,
}

/// Read-only drift findings, split by which side is wrong.
///
/// Categories are disjoint: a forward reference to a missing course counts
/// as orphaned only, not additionally as a missing roster entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriftReport {
    /// Forward references with no matching roster entry.
    pub missing_roster_entries: Vec<EnrollmentRef>,
    /// Roster entries with no matching forward reference.
    pub stale_roster_entries: Vec<EnrollmentRef>,
    /// Forward references naming a course that does not exist.
    pub orphaned_course_refs: Vec<EnrollmentRef>,
}

impl DriftReport {
    /// True when both sides agree exactly.
    pub fn is_clean(&self) -> bool {
        self.missing_roster_entries.is_empty()
            && self.stale_roster_entries.is_empty()
            && self.orphaned_course_refs.is_empty()
    }
}

/// Rebuilds every course roster from student forward references.
///
/// Single-writer batch operation: rosters are emptied first, then refilled
/// student by student in stable order. Each kept link logs one line and is
/// classified against the roster state captured before the reset. Safe to
/// re-run at any time; a second pass over converged data reports every link
/// as already present and prunes nothing.
pub fn reconcile_enrollments<R: RosterRepository>(repo: &R) -> RosterRepoResult<ReconcileReport> {
    let started_at = Instant::now();
    info!("event=reconcile module=reconcile status=start");

    // The reset empties every roster before the rebuild, so "already
    // present" can only mean present before the pass began.
    let mut roster_before = BTreeSet::new();
    for course in repo.list_all_courses()? {
        for student_id in &course.students {
            roster_before.insert((*student_id, course.id));
        }
    }

    let mut report = ReconcileReport {
        rosters_reset: repo.reset_all_rosters()?,
        ..ReconcileReport::default()
    };

    for student in repo.list_all_students()? {
        report.students_scanned += 1;
        for course_id in &student.enrolled_courses {
            if !repo.course_exists(*course_id)? {
                repo.remove_course_from_student(student.id, *course_id)?;
                report.orphans_pruned += 1;
                warn!(
                    "event=reconcile module=reconcile status=warn reason=orphan_pruned \
                     student={} course={course_id}",
                    student.id
                );
                continue;
            }
            repo.add_student_to_course(*course_id, student.id)?;
            if roster_before.contains(&(student.id, *course_id)) {
                report.links_already_present += 1;
                info!(
                    "event=reconcile module=reconcile status=ok reason=already_present \
                     student={} course={course_id}",
                    student.id
                );
            } else {
                report.links_added += 1;
                info!(
                    "event=reconcile module=reconcile status=ok reason=added \
                     student={} course={course_id}",
                    student.id
                );
            }
        }
    }

    info!(
        "event=reconcile module=reconcile status=ok students_scanned={} rosters_reset={} \
         links_added={} links_already_present={} orphans_pruned={} duration_ms={}",
        report.students_scanned,
        report.rosters_reset,
        report.links_added,
        report.links_already_present,
        report.orphans_pruned,
        started_at.elapsed().as_millis()
    );
    Ok(report)
}

/// Scans both sides and reports disagreements without writing.
pub fn drift_report<R: RosterRepository>(repo: &R) -> RosterRepoResult<DriftReport> {
    let students = repo.list_all_students()?;
    let courses = repo.list_all_courses()?;

    let course_ids: BTreeSet<CourseId> = courses.iter().map(|course| course.id).collect();

    let mut forward = BTreeSet::new();
    for student in &students {
        for course_id in &student.enrolled_courses {
            forward.insert((student.id, *course_id));
        }
    }
    let mut reverse = BTreeSet::new();
    for course in &courses {
        for student_id in &course.students {
            reverse.insert((*student_id, course.id));
        }
    }

    let mut report = DriftReport::default();
    for (student_id, course_id) in &forward {
        let reference = EnrollmentRef {
            student_id: *student_id,
            course_id: *course_id,
        };
        if !course_ids.contains(course_id) {
            report.orphaned_course_refs.push(reference);
        } else if !reverse.contains(&(*student_id, *course_id)) {
            report.missing_roster_entries.push(reference);
        }
    }
    // Roster entries naming a missing student fall out here as well: the
    // forward set is built from existing students only.
    for (student_id, course_id) in &reverse {
        if !forward.contains(&(*student_id, *course_id)) {
            report.stale_roster_entries.push(EnrollmentRef {
                student_id: *student_id,
                course_id: *course_id,
            });
        }
    }
    Ok(report)
}
