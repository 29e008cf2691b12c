//! Compile WXML templates into JavaScript render modules.
//!
//! Usage: `wxmlc <path>... [--out-dir DIR] [--config FILE] [--runtime MODULE]`

use clap::{ArgAction, Parser};
use log::{error, info, warn};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use wxml_compiler::{
    collect_inputs, compile_batch, load_page_config, BatchJob, BatchSettings, CliError,
    CompileResult, CompilerConfig, FsReader, FsResolver, IncrementalCache, NavigationBarOptions,
};

const DEFAULT_CACHE_DIR: &str = ".wxmlc-cache";

#[derive(Parser, Debug)]
#[command(name = "wxmlc", version)]
#[command(about = "Compile WXML templates into JavaScript render modules")]
struct Args {
    /// Template files or directories to compile
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Write modules here instead of next to their sources
    #[arg(long = "out-dir")]
    out_dir: Option<PathBuf>,

    /// Config file (defaults to ./wxmlc.config.json when present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Module the generated code imports its runtime primitives from
    #[arg(long)]
    runtime: Option<String>,

    /// Project root for `/`-prefixed references
    #[arg(long)]
    root: Option<PathBuf>,

    /// Only compile the given documents, do not walk their dependencies
    #[arg(long = "no-expand")]
    no_expand: bool,

    /// Skip the incremental cache
    #[arg(long = "no-cache")]
    no_cache: bool,

    /// Print results as JSON instead of writing files
    #[arg(long)]
    json: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FileOutput<'a> {
    file: String,
    #[serde(flatten)]
    result: &'a CompileResult,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Fingerprint<'a> {
    runtime_module: &'a str,
    component_tags: &'a indexmap::IndexMap<String, String>,
    navigation_bar: Option<&'a NavigationBarOptions>,
    expand_dependencies: bool,
}

struct Document {
    path: PathBuf,
    id: String,
    source: String,
    navigation_bar: Option<NavigationBarOptions>,
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn to_id(path: &Path) -> String {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };
    wxml_compiler::normalize_path(&absolute)
        .to_string_lossy()
        .replace('\\', "/")
}

fn output_path(document: &Path, root: &Path, out_dir: Option<&Path>) -> PathBuf {
    let file_name = format!(
        "{}.js",
        document
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| "index.wxml".to_string())
    );
    match out_dir {
        None => document.with_file_name(file_name),
        Some(out_dir) => {
            let relative = document
                .strip_prefix(root)
                .ok()
                .and_then(Path::parent)
                .map(Path::to_path_buf)
                .unwrap_or_default();
            out_dir.join(relative).join(file_name)
        }
    }
}

fn load_config(args: &Args) -> Result<CompilerConfig, CliError> {
    let config = match &args.config {
        Some(path) => CompilerConfig::load(path)?,
        None => CompilerConfig::discover(Path::new("."))?.unwrap_or_default(),
    };
    Ok(config)
}

fn run(args: Args) -> Result<(), CliError> {
    let config = load_config(&args)?;
    let root = args
        .root
        .clone()
        .or_else(|| config.root.clone())
        .unwrap_or_else(|| PathBuf::from("."));
    let root = PathBuf::from(to_id(&root));
    let runtime_module = args
        .runtime
        .clone()
        .unwrap_or_else(|| config.runtime_module().to_string());
    let expand = !args.no_expand && config.expand_dependencies.unwrap_or(true);
    let out_dir = args.out_dir.clone().or_else(|| config.out_dir.clone());

    let files = collect_inputs(&args.inputs);
    if files.is_empty() {
        warn!("[wxml] no templates found");
        return Ok(());
    }

    let mut documents = Vec::with_capacity(files.len());
    for path in files {
        let source = fs::read_to_string(&path).map_err(|source| CliError::Read {
            path: path.clone(),
            source,
        })?;
        let navigation_bar = config.page_navigation(load_page_config(&path)?);
        documents.push(Document {
            id: to_id(&path),
            path,
            source,
            navigation_bar,
        });
    }

    let resolver = FsResolver::new(&root);
    let reader = FsReader;
    let cache = if args.no_cache {
        None
    } else {
        let dir = config
            .cache_dir
            .clone()
            .unwrap_or_else(|| root.join(DEFAULT_CACHE_DIR));
        Some(IncrementalCache::new(dir)?)
    };

    let fingerprints: Vec<String> = documents
        .iter()
        .map(|doc| {
            IncrementalCache::fingerprint(&Fingerprint {
                runtime_module: &runtime_module,
                component_tags: &config.component_tags,
                navigation_bar: doc.navigation_bar.as_ref(),
                expand_dependencies: expand,
            })
        })
        .collect();

    // Cache lookups first, then compile the misses in parallel
    let mut results: Vec<Option<CompileResult>> = documents
        .iter()
        .zip(&fingerprints)
        .map(|(doc, fingerprint)| {
            cache
                .as_ref()
                .and_then(|cache| cache.get(&doc.id, &doc.source, fingerprint, &reader))
        })
        .collect();
    for (doc, result) in documents.iter().zip(&results) {
        if let Some(result) = result {
            for warning in &result.warnings {
                warn!("{}", warning);
            }
            info!("[wxml] {} unchanged", doc.id);
        }
    }

    let misses: Vec<usize> = (0..documents.len())
        .filter(|&i| results[i].is_none())
        .collect();
    let jobs: Vec<BatchJob> = misses
        .iter()
        .map(|&i| {
            let doc = &documents[i];
            let mut job = BatchJob::new(doc.id.clone(), doc.source.clone());
            job.navigation_bar = doc.navigation_bar.clone();
            job
        })
        .collect();
    let compiled = compile_batch(
        &jobs,
        &BatchSettings {
            resolver: &resolver,
            reader: &reader,
            component_tags: &config.component_tags,
            runtime_module: &runtime_module,
            expand_dependencies: expand,
        },
    );
    for (&i, result) in misses.iter().zip(compiled) {
        if let Some(cache) = &cache {
            let doc = &documents[i];
            if let Err(e) = cache.set(&doc.id, &doc.source, &fingerprints[i], &result, &reader) {
                warn!("[wxml] failed to cache {}: {}", doc.id, e);
            }
        }
        results[i] = Some(result);
    }

    let mut outputs = Vec::with_capacity(documents.len());
    for (doc, result) in documents.iter().zip(&results) {
        let Some(result) = result else { continue };
        if args.json {
            outputs.push(FileOutput {
                file: doc.id.clone(),
                result,
            });
            continue;
        }

        let target = output_path(Path::new(&doc.id), &root, out_dir.as_deref());
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|source| CliError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(&target, &result.code).map_err(|source| CliError::Write {
            path: target.clone(),
            source,
        })?;
        info!("[wxml] {} -> {}", doc.path.display(), target.display());
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outputs)?);
    }
    Ok(())
}

fn main() {
    let args = Args::parse();
    init_logging(args.verbose);

    if let Err(e) = run(args) {
        error!("{}", e);
        process::exit(1);
    }
}
