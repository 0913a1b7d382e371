use clap::{Parser, Subcommand};
use mdxgen::engine::RunReport;
use mdxgen::{config, engine, generate, output, topics};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

fn version_string() -> &'static str {
    let on_tag = env!("ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            // Leaked once at startup — trivial, called exactly once
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "mdxgen")]
#[command(about = "Batch content pipeline: slug filenames, topic folders, MDX output")]
#[command(long_about = "\
Batch content pipeline: slug filenames, topic folders, MDX output

Point it at a directory of loosely-named markdown files. Filenames are
normalized into URL-safe slugs, a sidecar index keeps metadata attached
to each file across renames, files are grouped into topic directories,
and templated MDX documents are emitted per file.

Content structure:

  content/
  ├── mdxgen.toml                  # Pipeline config (optional)
  ├── .mdxgen-index.json           # Metadata index, maintained by mdxgen
  ├── My First Post.md             # → my-first-post.md
  ├── NOTES (draft).md             # → notes-draft.md
  ├── _meta.md                     # Underscore/hidden files are skipped
  └── rust/                        # After organize: topic directories
      └── my-first-post.md
  └── _generated/                  # After generate: MDX output + _meta.json
      └── rust/my-first-post.mdx

Metadata follows content, not paths: each file is tracked by the SHA-256
of its bytes, so files renamed by hand between runs keep their records.

Run 'mdxgen gen-config' to print a documented mdxgen.toml.")]
#[command(version = version_string())]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Normalize filenames into slugs and sync the metadata index
    Normalize {
        /// Content directory
        directory: PathBuf,
        /// Show the rename plan without touching anything
        #[arg(long)]
        dry_run: bool,
        /// Skip the confirmation prompt
        #[arg(long, short = 'y')]
        yes: bool,
    },
    /// Group tracked files into topic directories
    Organize {
        /// Content directory
        directory: PathBuf,
        /// Detect topics from document headings instead of a fixed list
        #[arg(long, conflicts_with = "topics")]
        auto_detect: bool,
        /// Comma-separated topic list (overrides config)
        #[arg(long, value_delimiter = ',')]
        topics: Vec<String>,
    },
    /// Emit templated MDX documents for every tracked file
    Generate {
        /// Content directory
        directory: PathBuf,
        /// Template name (overrides config)
        #[arg(long)]
        template: Option<String>,
    },
    /// Run the full pipeline: normalize → organize → generate
    Run {
        /// Content directory
        directory: PathBuf,
        /// Skip the confirmation prompt before renames
        #[arg(long, short = 'y')]
        yes: bool,
    },
    /// Print a stock mdxgen.toml with all options documented
    GenConfig,
}

fn main() {
    let cli = Cli::parse();
    let code = match run(cli.command) {
        Ok(code) => code,
        // Setup failures: bad arguments, held lock, corrupt index.
        Err(e) => {
            eprintln!("error: {e}");
            2
        }
    };
    std::process::exit(code);
}

fn run(command: Command) -> Result<i32, Box<dyn std::error::Error>> {
    match command {
        Command::Normalize {
            directory,
            dry_run,
            yes,
        } => cmd_normalize(&directory, dry_run, yes),
        Command::Organize {
            directory,
            auto_detect,
            topics,
        } => cmd_organize(&directory, auto_detect, topics),
        Command::Generate {
            directory,
            template,
        } => cmd_generate(&directory, template),
        Command::Run { directory, yes } => cmd_run(&directory, yes),
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
            Ok(0)
        }
    }
}

fn cmd_normalize(dir: &Path, dry_run: bool, yes: bool) -> Result<i32, Box<dyn std::error::Error>> {
    let cfg = config::load_config(dir)?;
    if !cfg.normalize_filenames {
        println!("normalize_filenames is disabled in {}", config::CONFIG_FILENAME);
        return Ok(0);
    }
    init_thread_pool(&cfg.processing);

    // Plan first. The engine never prompts; the interactive gate lives
    // here, between the dry pass and the real one.
    let plan = engine::scan_and_normalize(dir, &cfg, true, None, None)?;
    output::print_plan(&plan);
    if dry_run {
        return Ok(plan.exit_code());
    }
    // Zero planned renames still gets a real run: new files that already
    // carry canonical names need index records.
    if plan.renamed() > 0 && !yes && !confirm(&format!("Rename {} file(s)?", plan.renamed()))? {
        println!("Aborted.");
        return Ok(0);
    }

    let report = normalize_with_progress(dir, &cfg)?;
    output::print_run_summary(&report);
    Ok(report.exit_code())
}

/// Execute a real normalize run with a printer thread consuming progress
/// events off the engine's reporter channel.
fn normalize_with_progress(
    dir: &Path,
    cfg: &config::PipelineConfig,
) -> Result<RunReport, Box<dyn std::error::Error>> {
    let (tx, rx) = std::sync::mpsc::channel();
    let printer = std::thread::spawn(move || {
        for event in rx {
            for line in output::format_run_event(&event) {
                println!("{}", line);
            }
        }
    });
    let result = engine::scan_and_normalize(dir, cfg, false, None, Some(tx));
    // tx was moved into the engine and dropped there; the printer drains
    // the channel and exits.
    printer.join().expect("printer thread panicked");
    Ok(result?)
}

fn cmd_organize(
    dir: &Path,
    auto_detect: bool,
    cli_topics: Vec<String>,
) -> Result<i32, Box<dyn std::error::Error>> {
    let cfg = config::load_config(dir)?;
    let topic_list = if cli_topics.is_empty() {
        cfg.topics.clone()
    } else {
        cli_topics
    };
    let strategy_name = if auto_detect {
        "headings"
    } else {
        if topic_list.is_empty() {
            return Err("no topics given: pass --topics, set topics in config, or use --auto-detect".into());
        }
        "keywords"
    };

    let mut index = mdxgen::index::MetadataIndex::load(dir)?;
    if index.is_empty() {
        println!("No tracked files. Run 'mdxgen normalize {}' first.", dir.display());
        return Ok(0);
    }

    let registry = topics::StrategyRegistry::builtin(topic_list);
    let strategy = registry.get(strategy_name)?;
    let assignment = topics::organize(dir, &index, strategy)?;
    let mut report = topics::apply_organization(dir, &mut index, &assignment.buckets, &cfg)?;
    // Unreadable files never made it into a bucket; fold their read
    // failures into the same report the move failures land in.
    report.failed.extend(assignment.failed);
    output::print_organize_output(&assignment.buckets, &report);
    Ok(report.exit_code())
}

fn cmd_generate(
    dir: &Path,
    template: Option<String>,
) -> Result<i32, Box<dyn std::error::Error>> {
    let cfg = config::load_config(dir)?;
    let index = mdxgen::index::MetadataIndex::load(dir)?;
    if index.is_empty() {
        println!("No tracked files. Run 'mdxgen normalize {}' first.", dir.display());
        return Ok(0);
    }

    let registry = generate::TemplateRegistry::builtin();
    let name = template.unwrap_or_else(|| cfg.template.clone());
    let template = registry.get(&name)?;
    let report = generate::write_documents(dir, &index, template)?;
    output::print_generate_output(&report);
    Ok(report.exit_code())
}

fn cmd_run(dir: &Path, yes: bool) -> Result<i32, Box<dyn std::error::Error>> {
    let cfg = config::load_config(dir)?;

    println!("==> Stage 1: Normalizing {}", dir.display());
    let normalize_code = cmd_normalize(dir, false, yes)?;

    let organize_code = if cfg.topics.is_empty() {
        println!("==> Stage 2: Skipped (no topics in config)");
        0
    } else {
        println!("==> Stage 2: Organizing into topics");
        cmd_organize(dir, false, Vec::new())?
    };

    println!("==> Stage 3: Generating MDX");
    let generate_code = cmd_generate(dir, None)?;

    println!("==> Pipeline complete");
    Ok(normalize_code.max(organize_code).max(generate_code))
}

/// Ask a yes/no question on stdout, read the answer from stdin.
fn confirm(question: &str) -> std::io::Result<bool> {
    print!("{} [y/N] ", question);
    std::io::stdout().flush()?;
    let mut answer = String::new();
    std::io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores — user can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
