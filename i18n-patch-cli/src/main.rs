use std::path::PathBuf;

use clap::Parser;
use i18n_patch::{PatchOptions, Patcher, TranslationReport};
use i18n_patch_cli::{
    logging::init_log,
    validation::{validate_concurrency, validate_condition, validate_dir, validate_locale},
};
use serde_json::json;

/// Applies locale-aware substitution rules to a source tree.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Locale to apply, e.g. `ja`. Its texts are read from `<config>/<locale>.yml`
    locale: String,

    /// Base path for config files; `i18n.yml` and `<locale>.yml` are required
    #[arg(long, default_value = "config")]
    config: PathBuf,

    /// Base path for source files
    #[arg(long, default_value = ".")]
    src: PathBuf,

    /// Base path for output files. The directory is not cleaned before the run
    #[arg(long, default_value = "out")]
    out: PathBuf,

    /// Condition variables for `evaluateWhen`, e.g. `version=1.2.0,edition=ee`
    #[arg(long)]
    condition: Option<String>,

    /// Print one summary line per translation
    #[arg(long)]
    statistics: bool,

    /// Print statistics as JSON
    #[arg(long)]
    json: bool,

    /// Warn about every line no pattern changed, as `file:line:text`
    #[arg(long)]
    unmatched: bool,

    /// Maximum number of files processed concurrently per translation
    #[arg(long, default_value_t = 100)]
    concurrency: usize,

    /// Log progress at info level
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if let Err(e) = init_log(args.verbose) {
        eprintln!("Warning: logger already initialized: {}", e);
    }

    if let Err(e) = run(args).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), String> {
    validate_locale(&args.locale)?;
    validate_dir(&args.config, "Config")?;
    validate_dir(&args.src, "Source")?;
    validate_concurrency(args.concurrency)?;

    let mut options = PatchOptions::new()
        .with_locale(args.locale.as_str())
        .with_config_dir(&args.config)
        .with_dest(&args.out)
        .with_show_unmatched(args.unmatched)
        .with_concurrency(args.concurrency);
    if let Some(condition) = &args.condition {
        validate_condition(condition)?;
        options = options.with_condition(condition);
    }

    let reports = Patcher::new(&args.src)
        .with_options(options)
        .generate(None, None)
        .await
        .map_err(|e| e.to_string())?;

    if args.json {
        print_json(&reports)?;
    } else if args.statistics {
        for report in &reports {
            println!("{}", report.summary());
        }
    }
    Ok(())
}

fn print_json(reports: &[TranslationReport]) -> Result<(), String> {
    let value = json!({
        "summary": {
            "translations": reports.len(),
            "files": reports.iter().map(|r| r.files).sum::<usize>(),
            "unmatched_lines": reports.iter().map(|r| r.unmatched_lines).sum::<usize>(),
        },
        "translations": reports.iter().map(TranslationReport::to_json).collect::<Vec<_>>(),
    });
    let text = serde_json::to_string_pretty(&value).map_err(|e| e.to_string())?;
    println!("{}", text);
    Ok(())
}
