//! Thin CLI front-end over `polypm_core::Engine`: parses package refs plus a
//! target descriptor, runs resolution-and-acquisition, and prints a summary.
//! Bundle layout, manifests and interactive installs are external-collaborator
//! concerns (spec §1) and live outside this binary.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tokio_util::sync::CancellationToken;

use polypm_core::models::ecosystem::EcosystemKind;
use polypm_core::models::options::{CommonOptions, EngineOptions};
use polypm_core::models::package_ref::PackageRef;
use polypm_core::models::target::{Arch, Interpreter, Os, TargetDescriptor};
use polypm_core::Engine;

/// Cross-ecosystem offline-transfer dependency resolver and acquisition engine.
#[derive(Parser, Debug)]
#[command(name = "polypm", version, about)]
struct Args {
    /// Package references as `ecosystem:name@version-spec`, e.g.
    /// `pypi:requests@>=2.28,<3` or `npm:lodash@^4.17.0`.
    #[arg(required = true)]
    packages: Vec<String>,

    /// Target OS: linux, macos, windows, any.
    #[arg(long, default_value = "linux")]
    os: String,

    /// Target architecture: x86_64, aarch64, i686, armv7, noarch.
    #[arg(long, default_value = "x86_64")]
    arch: String,

    /// CPython interpreter version, e.g. 3.11, for PyPI wheel tag matching.
    #[arg(long)]
    python: Option<String>,

    /// Directory the resolved artifacts are downloaded into.
    #[arg(long, default_value = "./polypm-bundle")]
    output_dir: PathBuf,

    /// Maximum number of concurrent downloads.
    #[arg(long, default_value_t = 6)]
    concurrency: usize,

    /// Directory used for the on-disk metadata cache tier.
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Resolve only; skip downloading artifacts.
    #[arg(long)]
    resolve_only: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive("polypm_core=info".parse().unwrap()))
        .init();

    let args = Args::parse();

    let refs = match args.packages.iter().map(|s| parse_package_ref(s)).collect::<Result<Vec<_>, _>>() {
        Ok(refs) => refs,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    };

    let target = match build_target(&args) {
        Ok(target) => target,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    };

    let mut options = EngineOptions::default();
    options.common = CommonOptions {
        concurrency: args.concurrency,
        output_dir: args.output_dir.clone(),
        cache_dir: args.cache_dir.clone(),
        ..CommonOptions::default()
    };

    let engine = Engine::new(args.cache_dir);
    let cancellation = CancellationToken::new();

    if args.resolve_only {
        let result = engine.resolve(&refs, &target, &options).await;
        print_summary(&result.flat, &result.conflicts, &result.failures, 0);
        return if result.failures.iter().any(|f| !f.is_warning) { ExitCode::FAILURE } else { ExitCode::SUCCESS };
    }

    match engine.run(&refs, &target, &options, None, cancellation).await {
        Ok(result) => {
            print_summary(&result.downloaded, &result.conflicts, &result.failures, result.total_bytes);
            if result.failures.iter().any(|f| !f.is_warning) { ExitCode::FAILURE } else { ExitCode::SUCCESS }
        }
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn print_summary(
    packages: &[polypm_core::models::resolved_package::ResolvedPackage],
    conflicts: &[polypm_core::models::conflict::ConflictRecord],
    failures: &[polypm_core::models::failure::FailureRecord],
    total_bytes: u64,
) {
    println!("resolved {} package(s), {} conflict(s), {} failure(s), {total_bytes} byte(s) fetched", packages.len(), conflicts.len(), failures.len());
    for package in packages {
        println!("  {} {}", package.kind, package.identifier());
    }
    for failure in failures {
        let marker = if failure.is_warning { "warning" } else { "error" };
        println!("  [{marker}] {}: {} ({})", failure.package_key, failure.kind, failure.message);
    }
}

/// Parses `ecosystem:name@version-spec`. A missing `@version-spec` defaults
/// to `*` (any version) except for OS packages, where it stays literal.
fn parse_package_ref(raw: &str) -> Result<PackageRef, String> {
    let (kind_str, rest) = raw.split_once(':').ok_or_else(|| format!("missing ecosystem prefix in '{raw}' (expected ecosystem:name@spec)"))?;
    let kind: EcosystemKind = kind_str.parse()?;
    let (name, version_spec) = match rest.split_once('@') {
        Some((name, spec)) => (name.to_string(), spec.to_string()),
        None => (rest.to_string(), "*".to_string()),
    };
    if name.is_empty() {
        return Err(format!("missing package name in '{raw}'"));
    }
    Ok(PackageRef::new(kind, name, version_spec))
}

fn build_target(args: &Args) -> Result<TargetDescriptor, String> {
    let os = match args.os.to_lowercase().as_str() {
        "linux" => Os::Linux,
        "macos" | "darwin" => Os::Macos,
        "windows" | "win" => Os::Windows,
        "any" => Os::Any,
        other => return Err(format!("unknown os '{other}'")),
    };
    let arch = Arch::normalize(&args.arch).ok_or_else(|| format!("unknown arch '{}'", args.arch))?;
    let mut target = TargetDescriptor::new(os, arch);
    if let Some(python) = &args.python {
        target = target.with_interpreter(Interpreter::cpython(python.clone()));
    }
    Ok(target)
}
