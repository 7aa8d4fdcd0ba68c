//! Kpiload CLI - artwork and stock KPIs from spreadsheet exports
//!
//! # Main Commands
//!
//! ```bash
//! kpiload artwork general_report.xlsx            # Artwork KPIs (JSON on stdout)
//! kpiload artwork report.xlsx --workbook out.xlsx
//! kpiload stock orders.csv --top 5               # Stock order analysis
//! kpiload serve                                  # Start HTTP server (port 3000)
//! ```
//!
//! # Helper Commands
//!
//! ```bash
//! kpiload sheets report.xlsx         # List sheet names
//! kpiload parse report.xlsx          # Just load a sheet to JSON
//! kpiload rules                      # Show the category rules in effect
//! kpiload example-config             # Print a config file with every default
//! ```

use clap::{Args, Parser, Subcommand};
use kpiload::config::{AppConfig, ArtworkConfig, StockConfig};
use kpiload::error::error_chain;
use kpiload::export::{artwork_sheets, stock_sheets, write_workbook};
use kpiload::parser::{list_sheets, load_file, LoadOptions};
use kpiload::transform::artwork::rules_description;
use kpiload::transform::pipeline::{run_artwork_file, run_stock_file};
use kpiload::transform::stats::RoundingPrecision;
use std::fs;
use std::path::{Path, PathBuf};

type CliResult = Result<(), Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(name = "kpiload")]
#[command(about = "Artwork and stock KPIs from spreadsheet exports", long_about = None)]
struct Cli {
    /// JSON config file (default: $KPILOAD_CONFIG, then built-in defaults)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Options shared by the commands that read a sheet.
#[derive(Args)]
struct SheetArgs {
    /// Sheet to read (default from config)
    #[arg(short, long)]
    sheet: Option<String>,

    /// Zero-based row holding the headers
    #[arg(long)]
    header_row: Option<usize>,
}

#[derive(Subcommand)]
enum Commands {
    /// Clean an artwork report and compute its KPIs
    Artwork {
        /// Input .xlsx or .csv file
        input: PathBuf,

        #[command(flatten)]
        sheet: SheetArgs,

        /// Version count above which an artwork is beyond threshold
        #[arg(short, long)]
        threshold: Option<i64>,

        /// Decimal places for percentages (1 or 2)
        #[arg(short, long)]
        precision: Option<RoundingPrecision>,

        /// Output file for the JSON report (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Also write an .xlsx export
        #[arg(short, long)]
        workbook: Option<PathBuf>,
    },

    /// Classify stock orders and rank locations
    Stock {
        /// Input .xlsx or .csv file
        input: PathBuf,

        #[command(flatten)]
        sheet: SheetArgs,

        /// Number of locations to report
        #[arg(long)]
        top: Option<usize>,

        /// Output file for the JSON report (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Also write an .xlsx export
        #[arg(short, long)]
        workbook: Option<PathBuf>,
    },

    /// List the sheets of a workbook
    Sheets {
        /// Input .xlsx file
        input: PathBuf,
    },

    /// Load a sheet and output it as JSON
    Parse {
        /// Input .xlsx or .csv file
        input: PathBuf,

        #[command(flatten)]
        sheet: SheetArgs,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show the category rules in effect
    Rules,

    /// Print a config file holding every default
    ExampleConfig,

    /// Start HTTP server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,
    },
}

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let result = match AppConfig::resolve(cli.config.as_deref()) {
        Ok(config) => run(cli.command, config).await,
        Err(e) => Err(e.into()),
    };

    if let Err(e) = result {
        let mut chain = error_chain(e.as_ref()).into_iter();
        eprintln!("❌ Error: {}", chain.next().unwrap_or_default());
        for cause in chain {
            eprintln!("   caused by: {}", cause);
        }
        std::process::exit(1);
    }
}

async fn run(command: Commands, config: AppConfig) -> CliResult {
    match command {
        Commands::Artwork {
            input,
            sheet,
            threshold,
            precision,
            output,
            workbook,
        } => {
            let mut artwork = config.artwork;
            apply_sheet_args(&sheet, &mut artwork.sheet_name, &mut artwork.header_row);
            if let Some(t) = threshold {
                artwork.beyond_threshold = t;
            }
            if let Some(p) = precision {
                artwork.rounding_precision = p;
            }
            cmd_artwork(&input, &artwork, output.as_deref(), workbook.as_deref())
        }

        Commands::Stock {
            input,
            sheet,
            top,
            output,
            workbook,
        } => {
            let mut stock = config.stock;
            apply_sheet_args(&sheet, &mut stock.sheet_name, &mut stock.header_row);
            if let Some(n) = top {
                stock.top_locations = n;
            }
            cmd_stock(&input, &stock, output.as_deref(), workbook.as_deref())
        }

        Commands::Sheets { input } => cmd_sheets(&input),

        Commands::Parse { input, sheet, output } => {
            let mut options = LoadOptions::default();
            apply_sheet_args(&sheet, &mut options.sheet_name, &mut options.header_row);
            cmd_parse(&input, &options, output.as_deref())
        }

        Commands::Rules => {
            print!("{}", rules_description(&config.artwork.category_rules));
            Ok(())
        }

        Commands::ExampleConfig => {
            println!("{}", AppConfig::default().to_json()?);
            Ok(())
        }

        Commands::Serve { port } => Ok(kpiload::server::start_server(port, config).await?),
    }
}

fn apply_sheet_args(args: &SheetArgs, sheet_name: &mut Option<String>, header_row: &mut usize) {
    if let Some(s) = &args.sheet {
        *sheet_name = Some(s.clone());
    }
    if let Some(r) = args.header_row {
        *header_row = r;
    }
}

fn cmd_artwork(input: &Path, config: &ArtworkConfig, output: Option<&Path>, workbook: Option<&Path>) -> CliResult {
    eprintln!("📄 Processing: {}", input.display());

    let report = run_artwork_file(input, config)?;
    let s = &report.summary;

    eprintln!();
    eprintln!("New artworks created: {}", s.total_records);
    eprintln!("Total rounds of amends: {}", s.total_amends);
    eprintln!("Right first time: {}", s.right_first_time_count);
    eprintln!(
        "Right first time %: {:.*}%",
        config.rounding_precision.places() as usize,
        s.right_first_time_percent
    );
    eprintln!("Average amend rate: {}", s.average_amend_rate);
    eprintln!(
        "Beyond {} versions: {} ({}%)",
        s.beyond_threshold, s.beyond_threshold_count, s.beyond_threshold_percent
    );
    eprintln!();

    if let Some(path) = workbook {
        let bytes = write_workbook(&artwork_sheets(&report))?;
        fs::write(path, bytes)?;
        eprintln!("💾 Workbook written to: {}", path.display());
    }

    let json = serde_json::to_string_pretty(&serde_json::json!({
        "source": report.source,
        "summary": report.summary,
        "cleaned": report.cleaned.to_dataset(),
    }))?;
    write_output(&json, output)
}

fn cmd_stock(input: &Path, config: &StockConfig, output: Option<&Path>, workbook: Option<&Path>) -> CliResult {
    eprintln!("📄 Processing: {}", input.display());

    let run = run_stock_file(input, config)?;

    eprintln!();
    for t in &run.report.order_types {
        eprintln!("{}: {} unique orders", t.order_type, t.unique_orders);
    }
    eprintln!("\nTop {} locations:", run.report.top_locations.len());
    for (rank, l) in run.report.top_locations.iter().enumerate() {
        eprintln!("  {:2}. {} {} ({} lines)", rank + 1, l.location_code, l.location_name, l.order_lines);
    }
    eprintln!();

    if let Some(path) = workbook {
        let bytes = write_workbook(&stock_sheets(&run.report))?;
        fs::write(path, bytes)?;
        eprintln!("💾 Workbook written to: {}", path.display());
    }

    let json = serde_json::to_string_pretty(&run)?;
    write_output(&json, output)
}

fn cmd_sheets(input: &Path) -> CliResult {
    let bytes = fs::read(input)?;
    for name in list_sheets(&bytes)? {
        println!("{}", name);
    }
    Ok(())
}

fn cmd_parse(input: &Path, options: &LoadOptions, output: Option<&Path>) -> CliResult {
    eprintln!("📄 Loading: {}", input.display());

    let table = load_file(input, options)?;
    eprintln!("   Sheet: {}", table.source.sheet);
    if let (Some(encoding), Some(delimiter)) = (&table.source.encoding, table.source.delimiter) {
        eprintln!("   Encoding: {}", encoding);
        eprintln!("   Delimiter: '{}'", format_delimiter(delimiter));
    }
    eprintln!("   Columns: {}", table.source.columns.join(", "));
    eprintln!("✅ Loaded {} rows", table.source.row_count);

    let json = serde_json::to_string_pretty(&table.dataset)?;
    write_output(&json, output)
}

fn format_delimiter(d: char) -> String {
    match d {
        '\t' => "\\t".to_string(),
        c => c.to_string(),
    }
}

fn write_output(content: &str, path: Option<&Path>) -> CliResult {
    match path {
        Some(p) => {
            fs::write(p, content)?;
            eprintln!("💾 Output written to: {}", p.display());
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}
