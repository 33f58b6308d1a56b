//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `brainnote_core` linkage and print the saved page tree.
//! - Keep output deterministic for quick local sanity checks.
//!
//! Usage: `brainnote_cli [data_dir] [user]`. Without `data_dir` an in-memory
//! database is used.

use brainnote_core::db::{open_db, open_db_in_memory};
use brainnote_core::{
    init_logging, page_storage_key, CoreConfig, Page, PageRepository, PageStore,
    SqlitePageRepository,
};
use std::error::Error;
use std::process::ExitCode;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("brainnote_cli error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    println!("brainnote_core ping={}", brainnote_core::ping());
    println!("brainnote_core version={}", brainnote_core::core_version());

    let mut args = std::env::args().skip(1);
    let data_dir = args.next();
    let user = args.next();

    let conn = match &data_dir {
        Some(dir) => {
            let mut config = CoreConfig::new(std::path::absolute(dir)?);
            if let Some(user) = &user {
                config = config.with_user(user.as_str());
            }
            std::fs::create_dir_all(config.data_dir())?;
            if let Err(err) = init_logging(config.log_level(), config.log_dir()) {
                eprintln!("logging disabled: {err}");
            }
            println!("storage_key={}", config.storage_key());
            open_db(config.db_path())?
        }
        None => open_db_in_memory()?,
    };

    let repo = SqlitePageRepository::try_new(&conn)?;
    let key = page_storage_key(user.as_deref());
    let store = PageStore::open(&repo, key);
    println!("pages={}", store.len());
    print_level(&store, None, 0);
    Ok(())
}

fn print_level<R: PageRepository>(store: &PageStore<R>, parent: Option<&Page>, depth: usize) {
    for page in store.children(parent.map(|page| &page.id)) {
        let marker = if store.active_page_id() == Some(&page.id) {
            "*"
        } else {
            " "
        };
        let kind = if page.is_folder { "/" } else { "" };
        println!("{marker} {}{}{kind}", "  ".repeat(depth), page.title);
        print_level(store, Some(page), depth + 1);
    }
}
