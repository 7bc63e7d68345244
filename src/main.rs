use appscan::{AppScanner, ApplicationRecord, Extractor, ScanConfig, logs};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "appscan", about = "List installed applications and their icons")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List every installed application
    List(ScanArgs),
    /// Find an application by bundle identifier
    FindId {
        bundle_id: String,
        #[command(flatten)]
        scan: ScanArgs,
    },
    /// Find applications whose name matches a regular expression
    FindName {
        pattern: String,
        #[command(flatten)]
        scan: ScanArgs,
    },
    /// Read a single .app bundle
    Inspect {
        bundle: PathBuf,
        #[command(flatten)]
        scan: ScanArgs,
    },
    Logs {
        #[command(subcommand)]
        action: Option<logs::LogsAction>,
    },
}

#[derive(Args)]
struct ScanArgs {
    /// Render icons as PNG data URIs
    #[arg(long)]
    icons: bool,

    /// Bounding box for rendered icons, in pixels
    #[arg(long, default_value = "256")]
    icon_size: u32,

    /// Search root, repeatable. Replaces the default roots
    #[arg(long = "root")]
    roots: Vec<PathBuf>,

    /// Bundles under this directory win name collisions
    #[arg(long)]
    primary_root: Option<PathBuf>,

    /// Discovery timeout in seconds
    #[arg(long, default_value = "30")]
    timeout: u64,

    /// How .icns containers are unpacked
    #[arg(long, value_enum)]
    extractor: Option<Extractor>,
}

impl ScanArgs {
    fn into_config(self) -> ScanConfig {
        let mut config = ScanConfig::default()
            .with_icon_image(self.icons)
            .with_icon_size(self.icon_size)
            .with_timeout(Duration::from_secs(self.timeout));

        if !self.roots.is_empty() {
            config = config.with_search_roots(self.roots);
        }
        if let Some(root) = self.primary_root {
            config = config.with_primary_root(root);
        }
        if let Some(extractor) = self.extractor {
            config = config.with_extractor(extractor);
        }
        config
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_apps(apps: &[ApplicationRecord]) -> Result<(), Box<dyn std::error::Error>> {
    print_json(apps)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger first
    logs::init_logger()?;

    match Cli::parse().command {
        Commands::List(scan) => {
            logs::log_info("Listing applications");
            let apps = AppScanner::new(scan.into_config()).scan().await?;
            print_apps(&apps)?;
        }
        Commands::FindId { bundle_id, scan } => {
            match AppScanner::new(scan.into_config())
                .find_by_bundle_id(&bundle_id)
                .await?
            {
                Some(app) => print_json(&app)?,
                None => {
                    logs::log_info(&format!("No application with bundle id {}", bundle_id));
                    println!("No application found with bundle id {}", bundle_id);
                }
            }
        }
        Commands::FindName { pattern, scan } => {
            let apps = AppScanner::new(scan.into_config())
                .find_by_name(&pattern)
                .await?;
            print_apps(&apps)?;
        }
        Commands::Inspect { bundle, scan } => {
            let app = AppScanner::new(scan.into_config())
                .inspect_bundle(&bundle)
                .await
                .inspect_err(|e| logs::log_error(&format!("Inspect failed: {}", e)))?;
            print_json(&app)?;
        }
        Commands::Logs { action } => {
            logs::handle_logs_command(action)?;
        }
    }
    Ok(())
}
