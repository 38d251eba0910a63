//! # Thermkalk CLI
//!
//! Recomputes every line item of a bid and prints the material specification
//! and the price summary.
//!
//! Usage:
//!   calc_cli [bid-file] [options]
//!
//! The bid file is either a `.tkb` bid or a stored `<id>.json` bid record.
//! Without a bid file a small demo bid is used.
//!
//! Options:
//!   --catalog <path>   Material catalog TOML (default: embedded catalog)
//!   --json             Print the specification and breakdown as JSON
//!   --detail           Also print the per-item breakdown
//!
//! Log output goes to stderr and is filtered with `RUST_LOG` (default: info).

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing_subscriber::{fmt, EnvFilter};

use calc_core::bid::{Bid, BidInfo, BidRecord};
use calc_core::calculations::line_item::{AccessoryCounts, ExtraLayer, LineItemInput, PipeType};
use calc_core::calculations::material_spec::total_cost;
use calc_core::calculations::{PriceBreakdown, SummaryRow};
use calc_core::errors::{CalcError, CalcResult};
use calc_core::file_io::{load_bid_with_lock_check, BID_EXTENSION};
use calc_core::format::thousands;
use calc_core::materials::{default_catalog, MaterialCatalog};

struct Options {
    bid_path: Option<PathBuf>,
    catalog_path: Option<PathBuf>,
    json: bool,
    detail: bool,
}

#[derive(Serialize)]
struct Report<'a> {
    bid: &'a BidInfo,
    specification: &'a [SummaryRow],
    breakdown: &'a PriceBreakdown,
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    init_logging();

    let args: Vec<String> = env::args().skip(1).collect();
    let options = match parse_args(&args) {
        Some(options) => options,
        None => {
            print_usage();
            return;
        }
    };

    if let Err(e) = run(&options) {
        tracing::error!(code = e.error_code(), "{}", e);
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// `None` when help was requested.
fn parse_args(args: &[String]) -> Option<Options> {
    let mut options = Options {
        bid_path: None,
        catalog_path: None,
        json: false,
        detail: false,
    };

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => return None,
            "--json" => options.json = true,
            "--detail" => options.detail = true,
            "--catalog" => {
                if i + 1 < args.len() {
                    options.catalog_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                } else {
                    eprintln!("--catalog needs a path");
                }
            }
            arg if !arg.starts_with("--") && options.bid_path.is_none() => {
                options.bid_path = Some(PathBuf::from(arg));
            }
            other => eprintln!("Unknown option: {}", other),
        }
        i += 1;
    }

    Some(options)
}

fn print_usage() {
    println!("Thermkalk - insulation takeoff and bid calculator");
    println!();
    println!("Usage: calc_cli [bid-file] [--catalog <path>] [--json] [--detail]");
    println!();
    println!("  bid-file          .{} bid or stored <id>.json bid record (default: demo bid)", BID_EXTENSION);
    println!("  --catalog <path>  material catalog TOML (default: embedded catalog)");
    println!("  --json            print the result as JSON");
    println!("  --detail          also print the per-item breakdown");
}

fn run(options: &Options) -> CalcResult<()> {
    let loaded;
    let catalog: &MaterialCatalog = match &options.catalog_path {
        Some(path) => {
            loaded = MaterialCatalog::load(path)?;
            &loaded
        }
        None => default_catalog()?,
    };
    tracing::info!(materials = catalog.len(), "catalog ready");

    let bid = match &options.bid_path {
        Some(path) => load_bid_file(path)?,
        None => demo_bid(catalog)?,
    };

    let specification = bid.material_specification(catalog)?;
    let breakdown = bid.price_breakdown(catalog)?;

    if options.json {
        let report = Report {
            bid: &bid.info,
            specification: &specification,
            breakdown: &breakdown,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    print_header(&bid);
    print_specification(&specification);
    if options.detail {
        print_detail(&breakdown);
    }
    print_summary(&bid, &breakdown);
    Ok(())
}

fn load_bid_file(path: &Path) -> CalcResult<Bid> {
    let is_record = path.extension().is_some_and(|ext| ext == "json");
    if !is_record {
        let (bid, _lock) = load_bid_with_lock_check(path)?;
        return Ok(bid);
    }

    let contents = fs::read_to_string(path).map_err(|e| {
        CalcError::file_error("read record", path.display().to_string(), e.to_string())
    })?;
    let record: BidRecord = serde_json::from_str(&contents)?;
    record.to_bid()
}

fn demo_bid(catalog: &MaterialCatalog) -> CalcResult<Bid> {
    tracing::info!("no bid file given, using the demo bid");

    let mut bid = Bid::new(BidInfo::new("Demo - Kv. Linden", "24-117", "Byggbolaget AB"));
    bid.parameters.coverage_percent = 20.0;
    bid.parameters.vehicle_days = 2.0;

    bid.add_line_item(
        LineItemInput {
            material_key: Some("4010150".to_string()),
            cladding_key: Some("7100070".to_string()),
            length_m: 42.0,
            dimension_mm: 89.0,
            accessories: AccessoryCounts { bends: 6.0, supports: 14.0, ..Default::default() },
            object: Some("Undercentral".to_string()),
            ..Default::default()
        },
        catalog,
    )?;

    bid.add_line_item(
        LineItemInput {
            material_key: Some("4023850".to_string()),
            layers: vec![ExtraLayer::new("4010130")],
            cladding_key: Some("7100070".to_string()),
            length_m: 18.0,
            dimension_mm: 219.0,
            height_surcharge_percent: 15.0,
            banding: true,
            foil: true,
            object: Some("Undercentral".to_string()),
            ..Default::default()
        },
        catalog,
    )?;

    bid.add_line_item(
        LineItemInput {
            pipe_type: PipeType::Duct,
            material_key: Some("4030050".to_string()),
            length_m: 24.0,
            height_mm: 400.0,
            width_mm: 600.0,
            object: Some("Fläktrum".to_string()),
            ..Default::default()
        },
        catalog,
    )?;

    Ok(bid)
}

fn print_header(bid: &Bid) {
    let title = format!("{} ({})", bid.info.name, bid.info.number);
    println!("{}", title);
    println!("{}", "=".repeat(title.chars().count()));
    if !bid.info.customer.is_empty() {
        println!("Customer: {}", bid.info.customer);
    }
    println!("Line items: {}", bid.item_count());
    println!();
}

fn print_specification(rows: &[SummaryRow]) {
    println!("MATERIAL SPECIFICATION");
    println!("{:<12} {:<28} {:>10} {:<5} {:>9} {:>10}", "Article", "Name", "Quantity", "Unit", "Price", "Cost");
    println!("{}", "-".repeat(79));
    for row in rows {
        println!(
            "{:<12} {:<28} {:>10.2} {:<5} {:>9.2} {:>10}",
            row.article_number,
            row.name,
            row.quantity,
            row.unit,
            row.unit_price,
            thousands(row.total_cost),
        );
    }
    println!("{}", "-".repeat(79));
    println!("{:<68} {:>10}", "Total", thousands(total_cost(rows)));
    println!();
}

fn print_detail(breakdown: &PriceBreakdown) {
    println!("PER ITEM");
    for (i, line) in breakdown.lines.iter().enumerate() {
        let label = line.object.as_deref().unwrap_or("-");
        println!(
            "{:>2}. {:<36} {:<14} {:>7.1} m {:>8.2} m² {:>9} kr {:>7.2} h",
            i + 1,
            line.display_name,
            label,
            line.length_m,
            line.quantity_m2,
            thousands(line.subtotal),
            line.work_time_h,
        );
    }
    println!();
}

fn print_summary(bid: &Bid, b: &PriceBreakdown) {
    let money = |label: &str, value: f64| println!("  {:<28} {:>12} kr", label, thousands(value));

    println!("PRICE SUMMARY");
    money("Insulation", b.material.insulation);
    money("Cladding", b.material.cladding);
    money("Accessories", b.material.accessories);
    money("Material total", b.total_material_cost);
    println!();
    println!("  {:<28} {:>12.1} h", "Work time (raw)", b.work_time_raw_h);
    println!("  {:<28} {:>12.1} h", "Work time", b.total_work_time_h);
    money("Labor cost per hour", b.labor_cost_per_hour);
    money("Labor", b.total_labor_cost);
    money("Subcontractors", b.total_subcontractor_cost);
    money("Miscellaneous", b.diverse_cost);
    money("Vehicle", b.vehicle_cost);
    money("Work total", b.total_work_cost);
    println!();
    money("Cost", b.total_cost);
    println!("  {:<28} {:>12.1} %", "Coverage", bid.parameters.coverage_percent);
    money("Final price", b.final_price);
    money("Labor per meter", b.labor_cost_per_meter);
    money("Price per meter", b.price_per_meter);

    for (label, note) in [
        ("Insulation", &bid.notes.insulation),
        ("Cladding", &bid.notes.cladding),
        ("Accessories", &bid.notes.accessories),
        ("Total", &bid.notes.total),
    ] {
        if !note.trim().is_empty() {
            println!("  Note ({}): {}", label, note);
        }
    }
}
