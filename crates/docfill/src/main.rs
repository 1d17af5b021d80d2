//! The `docfill` binary.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use docfill::fields::{FieldMap, parse_field_arg};
use docfill::{AppState, ServeArgs, ServerConfig, make_http_server};
use docfill_docx::logo::cm_to_emu;
use docfill_docx::{Document, LogoImage, LogoOptions};

#[derive(Debug, Clone, clap::Parser)]
#[clap(name = "docfill", author, version, about)]
struct Args {
    /// Mode of the binary
    #[clap(subcommand)]
    pub cmd: Option<Commands>,
}

#[derive(Debug, Clone, clap::Subcommand)]
#[clap(rename_all = "kebab-case")]
enum Commands {
    /// Runs the web form server
    Serve(ServeArgs),
    /// Prints the placeholders of a template as JSON
    Scan(ScanArgs),
    /// Fills a template without the server
    Fill(FillArgs),
}

#[derive(Debug, Clone, clap::Parser)]
struct ScanArgs {
    /// The template to scan.
    #[clap(value_name = "TEMPLATE")]
    template: PathBuf,
}

#[derive(Debug, Clone, clap::Parser)]
struct FillArgs {
    /// The template to fill.
    #[clap(value_name = "TEMPLATE")]
    template: PathBuf,

    /// Where to write the filled document.
    #[clap(short, long, value_name = "OUTPUT")]
    output: PathBuf,

    /// A placeholder value, repeatable.
    #[clap(long = "field", value_name = "NAME=VALUE", value_parser = parse_field_arg)]
    fields: Vec<(String, String)>,

    /// An image inserted at the `[LOGO]` marker.
    #[clap(long, value_name = "PATH")]
    logo: Option<PathBuf>,

    /// The logo width in centimetres.
    #[clap(long, value_name = "CM", default_value_t = 5.0)]
    logo_width_cm: f64,
}

/// The main entry point.
fn main() -> anyhow::Result<()> {
    let cmd = Args::parse().cmd;
    let cmd = cmd.unwrap_or_else(|| Commands::Serve(ServeArgs::default()));

    // Starts logging
    let _ = {
        use log::LevelFilter::*;

        let base_level = if matches!(cmd, Commands::Serve(..)) {
            Info
        } else {
            Warn
        };

        env_logger::builder()
            .filter_module("docfill", base_level)
            .filter_module("docfill_docx", base_level)
            .filter_module("docfill_std", base_level)
            .parse_default_env()
            .try_init()
    };

    match cmd {
        Commands::Serve(args) => serve_main(args),
        Commands::Scan(args) => scan_main(args),
        Commands::Fill(args) => fill_main(args),
    }
}

fn serve_main(args: ServeArgs) -> anyhow::Result<()> {
    let state = Arc::new(AppState::new(ServerConfig::from(args))?);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(async move {
        let server = make_http_server(state).await?;

        tokio::signal::ctrl_c().await?;
        log::info!("ctrl-c received, shutting down");
        let _ = server.shutdown_tx.send(());
        server.join.await?;
        Ok::<_, anyhow::Error>(())
    })
}

fn scan_main(args: ScanArgs) -> anyhow::Result<()> {
    let names = Document::open(&args.template)?.placeholders();
    println!("{}", serde_json::to_string_pretty(&names)?);
    Ok(())
}

fn fill_main(args: FillArgs) -> anyhow::Result<()> {
    let values: FieldMap = args.fields.into_iter().collect();
    let options = LogoOptions {
        width: Some(cm_to_emu(args.logo_width_cm)),
        ..LogoOptions::default()
    };

    let mut doc = Document::open(&args.template)?;
    let changed = doc.fill(&values);
    if let Some(logo) = &args.logo {
        if !doc.insert_logo_with(&options, || LogoImage::open(logo))? {
            log::warn!("no [LOGO] marker found in {}", args.template.display());
        }
    }
    doc.save(&args.output)?;

    eprintln!(
        "filled {changed} paragraphs, wrote {}",
        args.output.display()
    );
    Ok(())
}
