use crate::cli::run;

pub mod artifact;
pub mod catalog;
pub mod cli;
pub mod compute;
mod config;
pub mod domain;
pub mod pipeline;
pub mod quality;
pub mod report;
pub mod storage;
pub mod transform;
pub mod warehouse;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(err) = run() {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}
