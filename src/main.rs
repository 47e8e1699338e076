use clap::{Parser, Subcommand};
use flightdeck::config::{self, FlightConfig};
use flightdeck::render::ClientRegistry;
use flightdeck::revalidate::{Clock, RevalidationStore, SystemClock};
use flightdeck::scan::{DirectiveClassifier, RouteNode, Scanner};
use flightdeck::{document, flight, generate, output, scan};
use std::path::{Path, PathBuf};

fn version_string() -> &'static str {
    if env!("FLIGHTDECK_RELEASE") == "true" {
        return env!("CARGO_PKG_VERSION");
    }
    match env!("FLIGHTDECK_GIT_HASH") {
        "" => "dev@unknown",
        // Leaked once at startup
        hash => Box::leak(format!("dev@{hash}").into_boxed_str()),
    }
}

#[derive(Parser)]
#[command(name = "flightdeck")]
#[command(about = "File-routed component renderer with a line-oriented wire format")]
#[command(long_about = "\
File-routed component renderer with a line-oriented wire format

The app directory is the route table. Directories become URL segments and
special files attach behavior to them:

  app/
  ├── layout.tsx                 # Wraps every page below it
  ├── page.tsx                   # Renders /
  ├── not-found.tsx              # Rendered into _not-found.html
  ├── (marketing)/               # Route group: nests layouts, adds no URL segment
  │   └── about/page.tsx         # Renders /about
  ├── blog/[slug]/page.tsx       # One dynamic segment
  └── docs/[...path]/page.tsx    # Catch-all, needs at least one segment

Pages may declare `export const revalidate = 60` and
`export const dynamic = 'force-dynamic'`; both are read without executing
the file. Modules starting with \"use client\" are shipped to the browser
instead of rendered on the server.

Run 'flightdeck gen-config' to print a documented flightdeck.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Project root (contains flightdeck.toml and the app directory)
    #[arg(long, default_value = ".", global = true)]
    root: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the route tree
    Scan,
    /// Scan and report routes that resolve to the same URL
    Check,
    /// Print the tree encoded in a chunk stream or generated HTML document
    Decode {
        /// A `.txt` chunk stream or an `.html` document with an embedded payload
        file: PathBuf,
    },
    /// Report generated routes and their revalidation state
    Status,
    /// Print a stock flightdeck.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Command::Scan => {
            let (_, tree) = load_routes(&cli.root)?;
            output::print_scan_output(&tree);
        }
        Command::Check => {
            let config = config::load_config(&cli.root)?;
            println!("==> Checking {}", config.app_root(&cli.root).display());
            let tree = scan_routes(&cli.root, &config)?;
            output::print_scan_output(&tree);
            let conflicts = scan::check_conflicts(&tree);
            if !conflicts.is_empty() {
                output::print_conflicts(&conflicts);
                return Err(format!("{} conflicting routes", conflicts.len()).into());
            }
            println!("==> Routes are valid");
        }
        Command::Decode { file } => {
            let (config, tree) = load_routes(&cli.root)?;
            let mut clients = ClientRegistry::from_tree(&tree, &config.build.asset_prefix);
            clients.discover(
                &cli.root,
                &config.build.client_dirs,
                &config.build.page_extensions,
                &DirectiveClassifier,
            )?;
            let content = std::fs::read_to_string(&file)?;
            let stream = match file.extension().and_then(|e| e.to_str()) {
                Some("html") => document::embedded_flight(&content)
                    .ok_or_else(|| format!("{} has no embedded chunk stream", file.display()))?,
                _ => content.as_str(),
            };
            let decoded = flight::decode(stream, &clients)?;
            output::print_tree(&decoded.root);
            for missing in decoded.root.missing_modules() {
                eprintln!("warning: client module {missing} is not registered");
            }
        }
        Command::Status => {
            let config = config::load_config(&cli.root)?;
            let out = config.out_root(&cli.root);
            let manifest = generate::read_manifest(&out)?;
            let store = RevalidationStore::load(&out);
            output::print_status(&manifest, &store, SystemClock.now());
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

fn load_routes(root: &Path) -> Result<(FlightConfig, RouteNode), Box<dyn std::error::Error>> {
    let config = config::load_config(root)?;
    let tree = scan_routes(root, &config)?;
    Ok((config, tree))
}

fn scan_routes(root: &Path, config: &FlightConfig) -> Result<RouteNode, scan::ScanError> {
    Scanner::new(config.build.page_extensions.clone())
        .with_project_root(root)
        .scan(&config.app_root(root))
}
