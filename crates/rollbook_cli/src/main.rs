//! Operator command line for the enrollment store.
//!
//! # Responsibility
//! - Expose init/check/reconcile/enroll/unenroll as maintenance commands.
//! - Resolve human-friendly identifiers (student number, course code) to ids.
//!
//! # Invariants
//! - `check` never writes; its exit code reports whether drift was found.
//! - All commands run with operator (admin) capability.

use clap::{Args, Parser, Subcommand};
use rollbook_core::db::open_db;
use rollbook_core::reconcile::{drift_report, reconcile_enrollments};
use rollbook_core::repo::directory_repo::{DirectoryRepository, SqliteDirectoryRepository};
use rollbook_core::{
    default_log_level, init_logging, Actor, EnrollmentOutcome, EnrollmentService, OutcomeStatus,
    SqliteRosterRepository,
};
use rusqlite::Connection;
use std::path::PathBuf;
use std::process::ExitCode;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(
    name = "rollbook",
    version,
    about = "Maintenance commands for the student/course enrollment store"
)]
struct Cli {
    #[command(flatten)]
    store: StoreArgs,
    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct StoreArgs {
    /// SQLite database path (created on first use)
    #[arg(long, default_value = "rollbook.db")]
    db: PathBuf,
    /// Absolute log directory; file logging is skipped when omitted
    #[arg(long)]
    log_dir: Option<PathBuf>,
    /// Log level (trace|debug|info|warn|error)
    #[arg(long)]
    log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the database and apply pending migrations
    Init,
    /// Report drift between the two enrollment sides without writing
    Check {
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Rebuild all course rosters from student enrollments
    Reconcile {
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Enroll a student in a course
    Enroll {
        /// Student number
        #[arg(long)]
        student: String,
        /// Course code
        #[arg(long)]
        course: String,
    },
    /// Remove a student from a course
    Unenroll {
        /// Student number
        #[arg(long)]
        student: String,
        /// Course code
        #[arg(long)]
        course: String,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Some(log_dir) = &cli.store.log_dir {
        let level = cli
            .store
            .log_level
            .as_deref()
            .unwrap_or(default_log_level());
        if let Err(message) = init_logging(level, &log_dir.to_string_lossy()) {
            eprintln!("logging setup failed: {message}");
            return ExitCode::FAILURE;
        }
    }

    match run(&cli) {
        Ok(code) => code,
        Err(message) => {
            eprintln!("error: {message}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<ExitCode, String> {
    let conn = open_db(&cli.store.db).map_err(|err| err.to_string())?;

    match &cli.command {
        Command::Init => {
            println!("database ready at {}", cli.store.db.display());
            Ok(ExitCode::SUCCESS)
        }
        Command::Check { json } => run_check(&conn, *json),
        Command::Reconcile { json } => run_reconcile(&conn, *json),
        Command::Enroll { student, course } => run_roster_op(&conn, student, course, true),
        Command::Unenroll { student, course } => run_roster_op(&conn, student, course, false),
    }
}

fn run_check(conn: &Connection, json: bool) -> Result<ExitCode, String> {
    let repo = SqliteRosterRepository::try_new(conn).map_err(|err| err.to_string())?;
    let report = drift_report(&repo).map_err(|err| err.to_string())?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).map_err(|err| err.to_string())?
        );
    } else {
        println!(
            "missing roster entries: {}",
            report.missing_roster_entries.len()
        );
        println!("stale roster entries:   {}", report.stale_roster_entries.len());
        println!("orphaned course refs:   {}", report.orphaned_course_refs.len());
        println!(
            "store is {}",
            if report.is_clean() { "clean" } else { "drifted" }
        );
    }

    if report.is_clean() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(1))
    }
}

fn run_reconcile(conn: &Connection, json: bool) -> Result<ExitCode, String> {
    let repo = SqliteRosterRepository::try_new(conn).map_err(|err| err.to_string())?;
    let report = reconcile_enrollments(&repo).map_err(|err| err.to_string())?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).map_err(|err| err.to_string())?
        );
    } else {
        println!("students scanned:     {}", report.students_scanned);
        println!("rosters reset:        {}", report.rosters_reset);
        println!("links added:          {}", report.links_added);
        println!("links already there:  {}", report.links_already_present);
        println!("orphans pruned:       {}", report.orphans_pruned);
    }
    Ok(ExitCode::SUCCESS)
}

fn run_roster_op(
    conn: &Connection,
    student_number: &str,
    course_code: &str,
    enroll: bool,
) -> Result<ExitCode, String> {
    let directory = SqliteDirectoryRepository::try_new(conn).map_err(|err| err.to_string())?;
    let student = directory
        .find_student_by_number(student_number)
        .map_err(|err| err.to_string())?
        .ok_or_else(|| format!("no student with number `{student_number}`"))?;
    let course = directory
        .find_course_by_code(course_code)
        .map_err(|err| err.to_string())?
        .ok_or_else(|| format!("no course with code `{course_code}`"))?;

    let service =
        EnrollmentService::new(SqliteRosterRepository::try_new(conn).map_err(|err| err.to_string())?);
    let operator = Actor::admin(Uuid::new_v4());
    let outcome = if enroll {
        service.enroll(&operator, student.id, course.id)
    } else {
        service.unenroll(&operator, student.id, course.id)
    }
    .map_err(|err| err.to_string())?;

    print_outcome(student_number, course_code, &outcome);
    Ok(ExitCode::SUCCESS)
}

fn print_outcome(student_number: &str, course_code: &str, outcome: &EnrollmentOutcome) {
    let summary = match outcome.status {
        OutcomeStatus::Applied => "applied",
        OutcomeStatus::AlreadyConsistent => "no change needed",
        OutcomeStatus::RepairedDrift => "applied, one-sided state repaired",
    };
    println!(
        "{student_number} / {course_code}: {summary} ({} link writes)",
        outcome.writes.total()
    );
    println!(
        "student {} now holds {} course reference(s)",
        outcome.student.student_number,
        outcome.student.enrolled_courses.len()
    );
    println!(
        "course {} roster now holds {} student(s)",
        outcome.course.code,
        outcome.course.students.len()
    );
}
