mod commands;
mod logging;
mod progress;

use std::io::{self, Write};
use std::path::Path;
use std::process;
use std::sync::Arc;

use anyhow::Context;
use clap::{CommandFactory, Parser};
use colored::*;
use commands::{Cli, Commands};
use dotenv::dotenv;
use progress::CliReporter;
use refile_core::config::{load_categories, load_configuration};
use refile_core::reorganize::PlanPreview;
use refile_core::{AnalysisEngine, AppConfig, CategorySet, Reorganizer, RollbackOutcome};
use tracing::{error, info, warn};

fn main() {
    dotenv().ok();

    let _guard = logging::init_logger();

    let args = Cli::parse();

    let config = match load_configuration(args.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            error!("Error loading configuration: {}", err);
            process::exit(1);
        }
    };
    let categories = load_categories(args.categories.as_deref());

    let result = match args.command {
        Some(Commands::Analyze { dir, output }) => {
            require_dir(&dir);
            run_analyze(config, categories, &dir, output.as_deref())
        }
        Some(Commands::Similar { dir, threshold }) => {
            require_dir(&dir);
            run_similar(config, categories, &dir, threshold)
        }
        Some(Commands::Versions { dir, threshold }) => {
            require_dir(&dir);
            run_versions(config, categories, &dir, threshold)
        }
        Some(Commands::Plan { dir, output }) => {
            require_dir(&dir);
            let output = output.unwrap_or_else(|| dir.clone());
            run_plan(&config, &dir, &output)
        }
        Some(Commands::Apply { dir, out, yes }) => {
            require_dir(&dir);
            run_apply(&config, &dir, &out, yes)
        }
        Some(Commands::Rollback { out }) => run_rollback(&config, &out),
        Some(Commands::PrintConfig) => run_print_config(&config, &categories),
        None => {
            let _ = Cli::command().print_long_help();
            Ok(())
        }
    };

    if let Err(err) = result {
        error!("Error: {:#}", err);
    }
}

fn require_dir(dir: &Path) {
    if !dir.is_dir() {
        error!("Directory '{}' does not exist", dir.display());
        process::exit(1);
    }
}

fn analysis_engine(config: AppConfig, categories: CategorySet) -> AnalysisEngine {
    AnalysisEngine::new(config, categories).with_reporter(Arc::new(CliReporter::new()))
}

fn run_analyze(
    config: AppConfig,
    categories: CategorySet,
    dir: &Path,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let engine = analysis_engine(config, categories);
    let summary = engine
        .analyze_directory(dir, output)
        .with_context(|| format!("analyzing {}", dir.display()))?;

    println!();
    for analysis in &summary.analyses {
        let purposes: Vec<String> = analysis
            .purposes
            .iter()
            .map(|(name, score)| format!("{} ({:.2})", name, score))
            .collect();
        let purposes = if purposes.is_empty() {
            "-".dimmed().to_string()
        } else {
            purposes.join(", ").cyan().to_string()
        };
        println!("{}: {}", analysis.path.display(), purposes);
    }

    info!(
        "{} processed, {} skipped, {} failed",
        format!("{}", summary.processed).green(),
        format!("{}", summary.skipped).yellow(),
        format!("{}", summary.failed).red(),
    );
    if let Some(out) = output {
        info!(
            "{} analysis documents written to {}",
            summary.written.len(),
            out.display()
        );
    }
    Ok(())
}

fn run_similar(
    config: AppConfig,
    categories: CategorySet,
    dir: &Path,
    threshold: Option<f64>,
) -> anyhow::Result<()> {
    let threshold = threshold.unwrap_or(config.similarity_threshold);
    let engine = analysis_engine(config, categories);
    let pairs = engine
        .find_similar_files(dir, threshold)
        .with_context(|| format!("comparing files in {}", dir.display()))?;

    println!();
    if pairs.is_empty() {
        println!("No similar files at threshold {:.2}", threshold);
        return Ok(());
    }
    for pair in &pairs {
        println!(
            "{} {} <-> {}",
            format!("{:.3}", pair.result.overall_similarity).green(),
            pair.a.path.display(),
            pair.b.path.display()
        );
    }
    info!("{} similar pairs", format!("{}", pairs.len()).cyan());
    Ok(())
}

fn run_versions(
    config: AppConfig,
    categories: CategorySet,
    dir: &Path,
    threshold: Option<f64>,
) -> anyhow::Result<()> {
    let threshold = threshold.unwrap_or(config.similarity_threshold);
    let engine = analysis_engine(config, categories);
    let groups = engine
        .version_groups(dir, threshold)
        .with_context(|| format!("grouping versions in {}", dir.display()))?;

    println!();
    if groups.is_empty() {
        println!("No version groups at threshold {:.2}", threshold);
        return Ok(());
    }
    for (i, group) in groups.iter().enumerate() {
        println!("{}", format!("Group {}", i + 1).bold());
        for member in &group.members {
            println!(
                "  - {} -> {} ({:.3})",
                member.record.path.display(),
                member.version_name.cyan(),
                member.similarity
            );
        }
    }
    Ok(())
}

fn run_plan(config: &AppConfig, dir: &Path, output: &Path) -> anyhow::Result<()> {
    let mut reorganizer =
        Reorganizer::new(config)?.with_reporter(Arc::new(CliReporter::new()));
    let plan = reorganizer.generate_folder_hierarchy(dir)?;
    let preview = reorganizer.preview(&plan, output);

    println!();
    print!("{}", preview);
    print_plan_totals(&preview, plan.skipped());
    Ok(())
}

fn print_plan_totals(preview: &PlanPreview, skipped: usize) {
    println!();
    println!(
        "{} files to move, {} unchanged, {} skipped",
        format!("{}", preview.moves().count()).green(),
        preview.entries.len() - preview.moves().count(),
        format!("{}", skipped).yellow(),
    );
}

fn run_apply(config: &AppConfig, dir: &Path, out: &Path, yes: bool) -> anyhow::Result<()> {
    let mut reorganizer =
        Reorganizer::new(config)?.with_reporter(Arc::new(CliReporter::new()));
    let plan = reorganizer.generate_folder_hierarchy(dir)?;
    let preview = reorganizer.preview(&plan, out);

    println!();
    print!("{}", preview);
    print_plan_totals(&preview, plan.skipped());

    if preview.moves().next().is_none() {
        info!("Nothing to move.");
        return Ok(());
    }

    if !yes {
        match prompt_confirm("Apply this reorganization?", Some(false)) {
            Ok(true) => {}
            Ok(false) => {
                info!("Reorganization cancelled.");
                return Ok(());
            }
            Err(e) => return Err(e).context("reading confirmation"),
        }
    }

    let report = reorganizer
        .apply(&plan, out)
        .with_context(|| format!("applying reorganization into {}", out.display()))?;

    for failure in &report.failures {
        warn!("{}", failure);
    }
    info!(
        "{} moved, {} unchanged, {} failed",
        format!("{}", report.moved.len()).green(),
        report.unchanged,
        format!("{}", report.failures.len()).red(),
    );
    if report.cancelled {
        warn!("Apply was cancelled before every file was moved");
    }
    info!(
        "Undo with: refile rollback {} (ledger {})",
        out.display(),
        report.ledger_path.display()
    );
    Ok(())
}

fn run_rollback(config: &AppConfig, out: &Path) -> anyhow::Result<()> {
    let mut reorganizer =
        Reorganizer::new(config)?.with_reporter(Arc::new(CliReporter::new()));
    match reorganizer
        .rollback(out)
        .with_context(|| format!("rolling back {}", out.display()))?
    {
        RollbackOutcome::NothingToRollback => {
            println!("{}", "No previous state to rollback.".yellow());
        }
        RollbackOutcome::RolledBack(report) => {
            for failure in &report.failures {
                warn!("{}", failure);
            }
            info!(
                "{} restored, {} failed, {} directories removed",
                format!("{}", report.restored.len()).green(),
                format!("{}", report.failures.len()).red(),
                report.removed_dirs.len(),
            );
        }
    }
    Ok(())
}

fn run_print_config(config: &AppConfig, categories: &CategorySet) -> anyhow::Result<()> {
    println!("{}", toml::to_string_pretty(config)?);
    println!("{}", toml::to_string_pretty(categories)?);
    Ok(())
}

fn prompt_confirm(prompt: &str, default: Option<bool>) -> io::Result<bool> {
    let mut input = String::new();

    loop {
        input.clear();

        match default {
            Some(true) => print!("{} (Y/n): ", prompt),
            Some(false) | None => print!("{} (y/N): ", prompt),
        }
        io::stdout().flush()?;

        if io::stdin().read_line(&mut input)? == 0 {
            return Ok(default.unwrap_or(false));
        }

        match input.trim().to_uppercase().as_str() {
            "Y" => return Ok(true),
            "N" => return Ok(false),
            "" => match default {
                Some(default) => return Ok(default),
                None => continue,
            },
            _ => continue,
        }
    }
}
