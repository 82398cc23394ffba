//! # Tripfare CLI
//!
//! Command-line interface for the tripfare library.
//! Quotes trips, searches places and drives a persisted trip session.

use anyhow::{anyhow, bail, Context, Result};
use chrono::NaiveDateTime;
use clap::{Parser, Subcommand};
use log::{error, info};
use std::path::PathBuf;
use std::sync::Arc;
use tripfare::{
    format_amount, CongestionLevel, Coordinates, CustomerInfo, Endpoint, FileStore, FixedClock,
    FixedSurcharge, Location, Outcome, PersistenceConfig, ProviderConfig, RouteFareEngine,
    RouteResult, SearchService, StatePersistence, TripCommand, TripController,
};

mod cli;

/// Command-line interface for tripfare
#[derive(Parser)]
#[command(name = "tripfare")]
#[command(about = "Trip routing and fare estimation")]
#[command(long_about = "Routes a trip and prices it with time-of-day and condition surcharges:
  tripfare quote 106.7009,10.7769 106.6602,10.7626
  tripfare quote 106.7009,10.7769 106.6602,10.7626 --at 2026-10-20T08:15 --json
  tripfare search \"ben thanh\"
  tripfare weather 106.7009,10.7769

Sessions keep pickup, dropoff and customer details across runs:
  tripfare session --state-dir ./trip pickup 106.7009,10.7769 --name \"Ben Thanh\"
  tripfare session --state-dir ./trip dropoff 106.6602,10.7626
  tripfare session --state-dir ./trip show

Points are written as LONGITUDE,LATITUDE.")]
#[command(version = env!("TRIPFARE_VERSION"))]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Route and price a trip between two points
    Quote {
        /// Pickup point as LONGITUDE,LATITUDE
        #[arg(allow_hyphen_values = true)]
        pickup: String,

        /// Dropoff point as LONGITUDE,LATITUDE
        #[arg(allow_hyphen_values = true)]
        dropoff: String,

        /// Price as if departing at this local time (YYYY-MM-DDTHH:MM)
        #[arg(long)]
        at: Option<String>,

        /// Weather surcharge factor between 0 and 1
        #[arg(long, default_value_t = 0.0)]
        weather_factor: f64,

        /// Traffic surcharge factor between 0 and 1
        #[arg(long, default_value_t = 0.0)]
        traffic_factor: f64,

        /// Print the route and fare as JSON
        #[arg(long)]
        json: bool,
    },

    /// Look up places by name
    Search {
        query: String,
    },

    /// Show current weather at a point
    Weather {
        /// Point as LONGITUDE,LATITUDE
        #[arg(allow_hyphen_values = true)]
        point: String,
    },

    /// Apply one change to a persisted trip session
    Session {
        /// Directory holding the session snapshot
        #[arg(long, default_value = ".tripfare")]
        state_dir: PathBuf,

        #[command(subcommand)]
        action: SessionAction,
    },
}

#[derive(Subcommand)]
enum SessionAction {
    /// Set the pickup point
    Pickup {
        #[arg(allow_hyphen_values = true)]
        point: String,
        #[arg(long)]
        name: Option<String>,
    },
    /// Set the dropoff point
    Dropoff {
        #[arg(allow_hyphen_values = true)]
        point: String,
        #[arg(long)]
        name: Option<String>,
    },
    /// Remove the pickup or dropoff point
    Clear {
        /// "pickup" or "dropoff"
        endpoint: String,
    },
    /// Remove both points
    ClearAll,
    /// Set customer contact details
    Customer {
        #[arg(long)]
        name: String,
        #[arg(long)]
        phone: String,
        #[arg(long)]
        email: Option<String>,
        #[arg(long, default_value = "")]
        notes: String,
    },
    /// Print the current session
    Show,
    /// Validate the session and print the confirmed trip as JSON
    Confirm,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("❌ Error: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging to stderr
    let mut logger = env_logger::Builder::from_default_env();
    logger.target(env_logger::Target::Stderr);
    if cli.verbose {
        logger.filter_level(log::LevelFilter::Debug);
    }
    logger.init();

    if cli.verbose {
        eprintln!("🚕 Tripfare v{} starting...", env!("TRIPFARE_VERSION"));
    }

    let config = ProviderConfig::from_env();

    match cli.command {
        Command::Quote {
            pickup,
            dropoff,
            at,
            weather_factor,
            traffic_factor,
            json,
        } => {
            let pickup = parse_point(&pickup)?;
            let dropoff = parse_point(&dropoff)?;
            let mut engine = RouteFareEngine::from_config(&config).with_surcharges(FixedSurcharge {
                weather: weather_factor,
                traffic: traffic_factor,
            });
            if let Some(at) = at {
                engine = engine.with_clock(FixedClock(parse_departure(&at)?));
            }
            quote(&engine, pickup, dropoff, json).await
        }
        Command::Search { query } => search(&config, &query).await,
        Command::Weather { point } => weather(&config, &point).await,
        Command::Session { state_dir, action } => session(&config, state_dir, action).await,
    }
}

/// Route and print one trip
async fn quote(engine: &RouteFareEngine, pickup: Coordinates, dropoff: Coordinates, json: bool) -> Result<()> {
    let progress = cli::ProgressManager::new("🗺️  Computing route");
    let result = engine
        .compute(&Location::new(pickup, None), &Location::new(dropoff, None))
        .await;
    progress.finish();
    let route = result?;

    if json {
        println!("{}", serde_json::to_string_pretty(&route)?);
    } else {
        print_route(&route);
    }
    Ok(())
}

async fn search(config: &ProviderConfig, query: &str) -> Result<()> {
    if config.tomtom_api_key.is_none() {
        eprintln!("⚠️  TRIPFARE_TOMTOM_KEY is not set, search results will be empty");
    }
    let service = SearchService::from_config(config);

    let progress = cli::ProgressManager::new(&format!("🔍 Searching for '{query}'"));
    let places = service.search_now(query.trim()).await;
    progress.finish();

    let places = places?;
    if places.is_empty() {
        eprintln!("No places found for '{query}'");
        return Ok(());
    }
    for place in places {
        println!(
            "{}  ({:.6},{:.6})  {}",
            place.name,
            place.position.longitude(),
            place.position.latitude(),
            place.address
        );
    }
    Ok(())
}

async fn weather(config: &ProviderConfig, point: &str) -> Result<()> {
    let at = parse_point(point)?;
    let engine = RouteFareEngine::from_config(config);
    let report = engine.weather_at(&Location::new(at, None)).await;

    match (report.temperature_c, report.humidity_percent) {
        (Some(temp), Some(humidity)) => {
            println!("{}, {temp:.1}°C, {humidity:.0}% humidity", report.condition_text)
        }
        (Some(temp), None) => println!("{}, {temp:.1}°C", report.condition_text),
        _ => println!("{}", report.condition_text),
    }
    Ok(())
}

/// Restore the session, apply one action, write the snapshot back
async fn session(config: &ProviderConfig, state_dir: PathBuf, action: SessionAction) -> Result<()> {
    let store = Arc::new(FileStore::new(state_dir.clone()));
    let persistence = StatePersistence::with_config(store, PersistenceConfig::default());
    let controller = TripController::new(RouteFareEngine::from_config(config)).with_persistence(persistence);

    if controller.restore().await {
        info!("📂 Restored session from {}", state_dir.display());
    }

    let command = match action {
        SessionAction::Pickup { point, name } => Some(commit_command(Endpoint::Pickup, &point, name)?),
        SessionAction::Dropoff { point, name } => Some(commit_command(Endpoint::Dropoff, &point, name)?),
        SessionAction::Clear { endpoint } => Some(TripCommand::Clear(parse_endpoint(&endpoint)?)),
        SessionAction::ClearAll => Some(TripCommand::ClearAll),
        SessionAction::Customer {
            name,
            phone,
            email,
            notes,
        } => {
            let mut customer = CustomerInfo::new(name, phone).with_notes(notes);
            if let Some(email) = email {
                customer = customer.with_email(email);
            }
            Some(TripCommand::SetCustomer(customer))
        }
        SessionAction::Show => None,
        SessionAction::Confirm => {
            let confirmation = controller.confirm()?;
            println!("{}", serde_json::to_string_pretty(&confirmation)?);
            return Ok(());
        }
    };

    if let Some(command) = command {
        let progress = cli::ProgressManager::new("🗺️  Updating trip");
        let outcome = controller.dispatch(command).await;
        progress.finish();
        if let Outcome::RouteFailed(e) = outcome? {
            eprintln!("⚠️  {e}");
        }
    }

    if let Some(persistence) = controller.persistence() {
        if persistence.flush() {
            info!("💾 Saved session to {}", state_dir.display());
        }
    }

    print_session(&controller);
    Ok(())
}

fn commit_command(target: Endpoint, point: &str, name: Option<String>) -> Result<TripCommand> {
    let at = parse_point(point)?;
    Ok(TripCommand::Commit {
        target,
        longitude: at.longitude(),
        latitude: at.latitude(),
        name,
    })
}

fn print_session(controller: &TripController) {
    let state = controller.state();
    let describe = |location: Option<&Location>| match location {
        Some(location) => location.label(),
        None => "(not set)".to_string(),
    };
    println!("Pickup:   {}", describe(state.pickup()));
    println!("Dropoff:  {}", describe(state.dropoff()));

    let customer = controller.customer();
    if !customer.name.is_empty() {
        println!("Customer: {} ({})", customer.name, customer.phone);
    }

    if let Some(route) = state.route() {
        println!();
        print_route(route);
    }
}

fn print_route(route: &RouteResult) {
    println!(
        "Route: {:.1} km, {:.0} min, {} steps",
        route.distance_km(),
        route.duration_min(),
        route.steps.len()
    );
    for (i, step) in route.steps.iter().enumerate() {
        let congestion = match step.congestion.level {
            CongestionLevel::Unknown => String::new(),
            level => format!("  [{level}]"),
        };
        println!(
            "  {:>2}. {} ({:.0} m){congestion}",
            i + 1,
            step.instruction,
            step.distance_meters
        );
    }

    let fare = &route.fare;
    println!();
    println!("  Base fare        {:>14}", format_amount(fare.base_fare));
    println!("  Distance         {:>14}", format_amount(fare.distance_fare));
    println!("  Time             {:>14}", format_amount(fare.time_fare));
    println!("  Subtotal         {:>14}", format_amount(fare.subtotal));
    if fare.rush_hour_surcharge > 0.0 {
        println!("  Time of day      {:>14}", format_amount(fare.rush_hour_surcharge));
    }
    if fare.weather_surcharge > 0.0 {
        println!("  Weather          {:>14}", format_amount(fare.weather_surcharge));
    }
    if fare.traffic_surcharge > 0.0 {
        println!("  Traffic          {:>14}", format_amount(fare.traffic_surcharge));
    }
    println!("  VAT              {:>14}", format_amount(fare.vat));
    println!("  Total            {:>14}", format_amount(fare.total));
}

/// Parse "LONGITUDE,LATITUDE"
fn parse_point(raw: &str) -> Result<Coordinates> {
    let (lng, lat) = raw
        .split_once(',')
        .ok_or_else(|| anyhow!("expected LONGITUDE,LATITUDE, got '{raw}'"))?;
    let longitude: f64 = lng
        .trim()
        .parse()
        .with_context(|| format!("invalid longitude '{}'", lng.trim()))?;
    let latitude: f64 = lat
        .trim()
        .parse()
        .with_context(|| format!("invalid latitude '{}'", lat.trim()))?;
    Ok(Coordinates::new(longitude, latitude)?)
}

fn parse_departure(raw: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M")
        .with_context(|| format!("invalid departure time '{raw}', expected YYYY-MM-DDTHH:MM"))
}

fn parse_endpoint(raw: &str) -> Result<Endpoint> {
    match raw.to_ascii_lowercase().as_str() {
        "pickup" => Ok(Endpoint::Pickup),
        "dropoff" => Ok(Endpoint::Dropoff),
        other => bail!("unknown endpoint '{other}', expected pickup or dropoff"),
    }
}
