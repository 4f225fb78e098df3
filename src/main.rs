mod app;
mod download;
mod format_codes;
mod fs_utils;
mod log_store;
mod paths;
mod session;
mod settings;

use std::process;

fn main() {
    match app::run() {
        Ok(code) => process::exit(code),
        Err(err) => {
            eprintln!("{err}");
            process::exit(1);
        }
    }
}
