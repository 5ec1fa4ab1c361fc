use std::path::{Path, PathBuf};

use clap::Parser;
use setlist_charts::poppler::extract_text_pages;
use setlist_charts::{
    check_deps, emit_document, install_help_for, load_config, match_stats, poppler_extract, prepare_matches, publish_document,
    write_step_artifact, Config, PlanSink, RunError,
};

/// Pair a setlist PDF with a chart book PDF and build one formatted tab per song.
#[derive(Debug, Parser)]
#[command(name = "setlist2doc", version)]
struct Cli {
    /// Setlist PDF (ordered song titles)
    setlist: PathBuf,
    /// Chart book PDF (one chart per page)
    charts: PathBuf,
    /// YAML config file; defaults apply when it does not exist
    #[arg(long, default_value = "setlist.yaml")]
    config: PathBuf,
    /// Minimum similarity score (0-100) for a match
    #[arg(long)]
    threshold: Option<u8>,
    #[arg(long)]
    output_dir: Option<String>,
    /// Document title placed into the title template
    #[arg(long)]
    title: Option<String>,
    /// Write intermediate setlist and match JSON under the output artifacts dir
    #[arg(long)]
    dump_steps: bool,
}

fn slugify(base: &str) -> String {
    let lower = base.to_lowercase();
    let mut collapsed = String::with_capacity(lower.len());
    let mut prev_dash = true;
    for ch in lower.chars() {
        if ch.is_ascii_alphanumeric() {
            collapsed.push(ch);
            prev_dash = false;
        } else if !prev_dash {
            collapsed.push('-');
            prev_dash = true;
        }
    }
    let trimmed = collapsed.trim_end_matches('-');
    if trimmed.is_empty() { "setlist".to_string() } else { trimmed.to_string() }
}

fn exit_code(err: &RunError) -> i32 {
    match err {
        RunError::Pdf(_) => 1,
        RunError::Config(_) => 3,
        RunError::NoSongs | RunError::NoCharts => 4,
        RunError::Sink(_) => 5,
        RunError::Emit(_) => 6,
    }
}

fn dump_step(dir: &Path, name: &str, value: &serde_json::Value) {
    if let Err(e) = write_step_artifact(dir, name, value) {
        log::warn!("{}", serde_json::json!({"tool": "dump_steps", "file": dir.join(name), "error": e.to_string()}));
    }
}

fn run(cli: &Cli, cfg: &Config) -> Result<(), RunError> {
    let started_ms = chrono::Utc::now().timestamp_millis();

    let setlist_pages = extract_text_pages(&cli.setlist)?;
    log::info!("{}", serde_json::json!({"tool": "poppler_extract", "file": cli.setlist, "pages": setlist_pages.len()}));
    let chart_pages = poppler_extract(&cli.charts)?;
    let with_glyphs = chart_pages.iter().filter(|p| !p.glyphs.is_empty()).count();
    log::info!(
        "{}",
        serde_json::json!({"tool": "poppler_extract", "file": cli.charts, "pages": chart_pages.len(), "pages_with_glyphs": with_glyphs})
    );

    let report = prepare_matches(&setlist_pages, &chart_pages, cfg)?;
    let stats = match_stats(&report.results);

    let artifacts_dir = Path::new(&cfg.output_dir).join("artifacts");
    if cli.dump_steps {
        dump_step(&artifacts_dir, "step1_setlist.json", &serde_json::json!(setlist_pages));
        dump_step(&artifacts_dir, "step2_matches.json", &serde_json::json!(report));
    }

    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S").to_string();
    let mut sink = PlanSink::new();
    let summary = publish_document(&mut sink, &report.results, cfg, &timestamp)?;

    let finished_ms = chrono::Utc::now().timestamp_millis();
    let meta = serde_json::json!({
        "setlist": cli.setlist,
        "charts": cli.charts,
        "threshold": cfg.match_threshold,
        "font": {"family": cfg.font_family, "size_pt": cfg.font_size_pt},
        "stats": stats,
        "matches": report.results.iter().map(|r| serde_json::json!({
            "song": r.song, "matched": r.matched, "page": r.page, "score": r.score,
        })).collect::<Vec<_>>(),
        "timestamps": {"started_ms": started_ms, "finished_ms": finished_ms},
    });

    let doc_id = slugify(&summary.title);
    let paths = emit_document(&sink, &meta, &cfg.output_dir, &doc_id)?;
    log::info!("{}", serde_json::json!({"tool": "emit_document", "md_path": paths.md_path, "plan_path": paths.plan_path}));
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let mut cfg = match load_config(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            log::error!("{}", serde_json::json!({"tool": "load_config", "file": cli.config, "error": e.to_string()}));
            std::process::exit(3);
        }
    };
    if let Some(t) = cli.threshold {
        cfg.match_threshold = t;
    }
    if let Some(dir) = &cli.output_dir {
        cfg.output_dir = dir.clone();
    }
    if let Some(title) = &cli.title {
        cfg.doc_title = title.clone();
    }
    if let Err(e) = cfg.validate() {
        log::error!("{}", serde_json::json!({"tool": "load_config", "error": e.to_string()}));
        std::process::exit(3);
    }

    let deps = check_deps();
    if !deps.ok {
        log::error!("{}", serde_json::json!({"tool": "check_deps", "missing": deps.missing, "error_code": 2}));
        eprintln!("{}", install_help_for(&deps.missing));
        std::process::exit(2);
    }
    log::info!("{}", serde_json::json!({"tool": "check_deps", "status": "ok", "missing": deps.missing}));

    if let Err(e) = run(&cli, &cfg) {
        let code = exit_code(&e);
        log::error!("{}", serde_json::json!({"tool": "setlist2doc", "error": e.to_string(), "error_code": code}));
        std::process::exit(code);
    }
}
