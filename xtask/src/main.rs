use std::collections::BTreeSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use macie_org_admin_core::asset::fingerprint;
use macie_org_admin_core::config::{synthesize, SynthConfig};
use macie_org_admin_core::{DeclarationRegistry, DedupScope};
use tracing::info;
use tracing_subscriber::EnvFilter;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

// ── CLI definition ─────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "xtask",
    about = "Task runner for the Macie organization admin workspace",
    long_about = "Synthesizes CloudFormation templates for delegated Macie administration,\n\
                  packages the custom resource handler, and runs CI checks."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Synthesize one template per config file
    Synth {
        /// Stack config file (repeatable)
        #[arg(long = "config", required = true)]
        configs: Vec<PathBuf>,
        /// Directory for `<stack>.template.json` files; stdout when omitted
        #[arg(long)]
        out_dir: Option<PathBuf>,
        /// Override the stack name (single config only)
        #[arg(long, env = "MACIE_STACK_NAME")]
        stack_name: Option<String>,
        /// Pin the deploying region instead of using AWS::Region
        #[arg(long, env = "MACIE_SYNTH_REGION")]
        region: Option<String>,
        /// Where the shared handler log group is de-duplicated
        #[arg(value_enum, long, default_value_t = Scope::DeploymentUnit)]
        dedup_scope: Scope,
    },
    /// Zip the custom resource handler and print its asset hash
    PackageHandler {
        /// Handler code directory
        #[arg(long)]
        code_dir: PathBuf,
        /// Output zip path
        #[arg(long, default_value = "dist/handler.zip")]
        out: PathBuf,
    },
    /// Run CI checks (fmt, clippy, tests)
    Ci {
        /// Job to run
        #[arg(value_enum, default_value_t = CiJob::All)]
        job: CiJob,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Scope {
    /// One log group per stack
    DeploymentUnit,
    /// One log group for the whole synthesis run
    Process,
}

impl From<Scope> for DedupScope {
    fn from(scope: Scope) -> Self {
        match scope {
            Scope::DeploymentUnit => DedupScope::DeploymentUnit,
            Scope::Process => DedupScope::Process,
        }
    }
}

#[derive(Clone, ValueEnum)]
enum CiJob {
    /// Formatting and clippy
    Check,
    /// Workspace tests
    Test,
    /// Run check + test
    All,
}

// ── helpers ────────────────────────────────────────────────────────

fn step(label: &str) {
    eprintln!("\n=== {label} ===");
}

fn cargo(args: &[&str]) -> Result<ExitStatus> {
    eprintln!("+ cargo {}", args.join(" "));
    Command::new("cargo")
        .args(args)
        .status()
        .context("failed to execute cargo")
}

fn run_cargo(args: &[&str]) -> Result<()> {
    let status = cargo(args)?;
    if !status.success() {
        bail!(
            "cargo {} exited with status {}",
            args.join(" "),
            status.code().unwrap_or(1)
        );
    }
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Files under `root` as (`/`-separated relative path, contents), sorted by path.
fn collect_handler_files(root: &Path) -> Result<Vec<(String, Vec<u8>)>> {
    let mut files = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let entries = fs::read_dir(&dir)
            .with_context(|| format!("failed to read handler directory '{}'", dir.display()))?;
        for entry in entries {
            let path = entry?.path();
            if path.is_dir() {
                pending.push(path);
                continue;
            }
            let relative = path
                .strip_prefix(root)
                .with_context(|| format!("'{}' escapes the handler root", path.display()))?
                .components()
                .map(|component| component.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/");
            let contents =
                fs::read(&path).with_context(|| format!("failed to read '{}'", path.display()))?;
            files.push((relative, contents));
        }
    }

    if files.is_empty() {
        bail!("handler directory '{}' contains no files", root.display());
    }
    files.sort_by(|left, right| left.0.cmp(&right.0));
    Ok(files)
}

fn package_handler_zip(code_dir: &Path, zip_path: &Path) -> Result<String> {
    let files = collect_handler_files(code_dir)?;

    if let Some(parent) = zip_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create '{}'", parent.display()))?;
    }
    let file = fs::File::create(zip_path)
        .with_context(|| format!("failed to create handler zip '{}'", zip_path.display()))?;
    let mut zip = ZipWriter::new(file);
    let options = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(0o644);
    for (name, contents) in &files {
        zip.start_file(name.as_str(), options)
            .with_context(|| format!("failed to start '{name}' entry in handler zip"))?;
        zip.write_all(contents)
            .with_context(|| format!("failed to write '{name}' entry"))?;
    }
    zip.finish().context("failed to finish handler zip")?;

    Ok(fingerprint(files))
}

fn load_config(path: &Path) -> Result<SynthConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read config '{}'", path.display()))?;
    let mut config = SynthConfig::from_json_str(&raw)
        .with_context(|| format!("failed to load config '{}'", path.display()))?;

    if config.handler_asset.source_hash.is_none() {
        let files = collect_handler_files(Path::new(&config.handler_asset.directory))?;
        config.handler_asset.source_hash = Some(fingerprint(files));
    }
    Ok(config)
}

fn synth(
    configs: &[PathBuf],
    out_dir: Option<&Path>,
    stack_name: Option<String>,
    region: Option<String>,
    scope: Scope,
) -> Result<()> {
    if configs.len() > 1 && stack_name.is_some() {
        bail!("--stack-name can only be used with a single --config");
    }
    if configs.len() > 1 && out_dir.is_none() {
        bail!("--out-dir is required when synthesizing more than one config");
    }

    let mut loaded = Vec::with_capacity(configs.len());
    let mut stack_names = BTreeSet::new();
    for path in configs {
        let mut config = load_config(path)?;
        if let Some(name) = &stack_name {
            config.stack_name = name.clone();
        }
        if let Some(region) = &region {
            config.region = Some(region.clone());
        }
        config
            .validate()
            .with_context(|| format!("invalid overrides for '{}'", path.display()))?;
        if !stack_names.insert(config.stack_name().to_string()) {
            bail!(
                "stack name '{}' is used by more than one config ('{}')",
                config.stack_name(),
                path.display()
            );
        }
        loaded.push((path, config));
    }

    let mut registry = DeclarationRegistry::new(scope.into());
    let mut rendered = Vec::with_capacity(loaded.len());
    for (path, config) in &loaded {
        let template = synthesize(config, &mut registry)
            .with_context(|| format!("failed to synthesize '{}'", path.display()))?;
        rendered.push((config.stack_name(), template.to_json_pretty()?));
    }

    match out_dir {
        Some(dir) => {
            fs::create_dir_all(dir)
                .with_context(|| format!("failed to create '{}'", dir.display()))?;
            for (name, template) in rendered {
                let target = dir.join(format!("{name}.template.json"));
                fs::write(&target, template)
                    .with_context(|| format!("failed to write '{}'", target.display()))?;
                info!(stack = %name, path = %target.display(), "wrote template");
            }
        }
        None => {
            for (_, template) in rendered {
                println!("{template}");
            }
        }
    }
    Ok(())
}

// ── CI jobs ────────────────────────────────────────────────────────

fn ci_check() -> Result<()> {
    step("Check formatting");
    run_cargo(&["fmt", "--all", "--", "--check"])?;

    step("Clippy");
    run_cargo(&[
        "clippy",
        "--all-targets",
        "--all-features",
        "--",
        "-D",
        "warnings",
    ])
}

fn ci_test() -> Result<()> {
    step("Test macie_org_admin_core");
    run_cargo(&["test", "-p", "macie_org_admin_core"])?;

    step("Test xtask");
    run_cargo(&["test", "-p", "xtask"])
}

// ── main ───────────────────────────────────────────────────────────

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Synth {
            configs,
            out_dir,
            stack_name,
            region,
            dedup_scope,
        } => synth(&configs, out_dir.as_deref(), stack_name, region, dedup_scope),
        Commands::PackageHandler { code_dir, out } => {
            step("Package custom resource handler");
            let hash = package_handler_zip(&code_dir, &out)?;
            eprintln!("\nPackaged artifact:\n- {}", out.display());
            println!("{hash}");
            Ok(())
        }
        Commands::Ci { job } => {
            match job {
                CiJob::Check => ci_check()?,
                CiJob::Test => ci_test()?,
                CiJob::All => {
                    ci_check()?;
                    ci_test()?;
                }
            }
            eprintln!("\nCI job passed.");
            Ok(())
        }
    }
}
