use std::env;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use subtitle_media_downloader::core::tool_locator::{ToolLocation, ToolLocator};
use subtitle_media_downloader::AppConfig;

const USAGE: &str = "Usage: locate-tool [search-root] [config-file]";

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();

    let cwd = match env::current_dir() {
        Ok(dir) => dir,
        Err(error) => {
            eprintln!("Error: {error}");
            return ExitCode::FAILURE;
        }
    };

    ExitCode::from(run(&args, &cwd))
}

fn run(args: &[String], cwd: &Path) -> u8 {
    if args.iter().skip(1).any(|arg| arg == "-h" || arg == "--help") {
        println!("{USAGE}");
        return 0;
    }

    let config = AppConfig::load_or_default(args.get(2).map(PathBuf::from).as_deref());
    let root = args
        .get(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| config.search_root(cwd));

    let locator = ToolLocator::from_config(&config.tool);
    println!("Looking for: {}", locator.tool_name());
    println!("Candidates:");
    for candidate in locator.candidates(&root) {
        println!("  {}", candidate.display());
    }

    match ToolLocation::resolve(&locator, &root) {
        Ok(location) => {
            println!("Found: {}", location.path().display());
            0
        }
        Err(error) => {
            eprintln!("Error: {error}");
            1
        }
    }
}
