//! CLI smoke entry point.
//!
//! # Responsibility
//! - Act as the composition root: resolve config, start logging, open the
//!   store once and hand it to core components.
//! - Print a deterministic health summary of the note store.

use log::warn;
use snip_core::{
    core_version, init_logging_from_config, open_db, CoreConfig, NoteStore,
    SqliteNoteRepository, TagRepository,
};
use std::process::ExitCode;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = CoreConfig::from_env()?;
    if let Err(err) = init_logging_from_config(&config) {
        // The store works without file logs; report and continue.
        eprintln!("Warning: logging disabled: {err}");
    }

    let conn = open_db(config.db_path())?;
    let repo = SqliteNoteRepository::try_new(&conn)?;
    let report = repo.store().verify_index()?;
    if !report.is_consistent() {
        warn!("event=cli_health module=cli status=drift");
    }

    println!("snip_core version={}", core_version());
    println!("db_path={}", config.db_path().display());
    println!("notes={}", repo.store().count()?);
    println!("tags={}", repo.tags().list_tags()?.len());
    println!(
        "index_consistent={} missing={} orphaned={} stale={}",
        report.is_consistent(),
        report.missing.len(),
        report.orphaned.len(),
        report.stale.len()
    );
    Ok(())
}
