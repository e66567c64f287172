//! Atmos: a terminal weather dashboard.
//!
//! Wires config, the OpenWeatherMap client and the saved city list into a
//! `CityListController`, restores the previous session, then reads commands
//! from stdin. Cards are printed by a renderer thread fed from the
//! controller's event channel.

mod command;
mod render;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use atmos_core::{Config, TemperatureUnit};
use atmos_weather::format::time_since_update;
use atmos_weather::store::STORAGE_NAMESPACE;
use atmos_weather::{
    CityListController, CityQuery, ConfiguredLocation, FileBackend, PersistedCityStore,
    WeatherClient,
};
use chrono::Utc;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};

use command::{Command, HELP};
use render::TerminalRenderer;

/// Terminal weather dashboard
#[derive(Parser, Debug)]
#[command(name = "atmos", version, about = "Track the weather in the cities you care about")]
struct Cli {
    /// Config file to use instead of the platform default
    #[arg(long)]
    config: Option<PathBuf>,

    /// Start with an empty board; saved cities are kept but not fetched
    #[arg(long)]
    no_restore: bool,

    /// Temperature unit, c or f (remembered for later sessions)
    #[arg(long)]
    unit: Option<TemperatureUnit>,
}

#[tokio::main]
async fn main() -> Result<()> {
    atmos_core::init()?;
    let cli = Cli::parse();

    let (config, _) = Config::load_validated(cli.config.as_deref())
        .context("Failed to load configuration")?;
    tracing::info!("Using config directory {}", config.config_dir.display());

    let client = WeatherClient::new(&config.weather).context("Failed to build HTTP client")?;
    let backend = FileBackend::new(&config.config_dir);
    let first_launch = !backend.path_for(STORAGE_NAMESPACE).exists();

    let mut controller =
        CityListController::new(Arc::new(client), PersistedCityStore::new(backend))
            .with_pacing(Duration::from_millis(config.dashboard.pacing_ms));

    let events = controller.subscribe();
    let renderer = std::thread::spawn(move || TerminalRenderer::new(std::io::stdout()).run(events));

    match cli.unit {
        Some(unit) => controller.set_unit(unit),
        None if first_launch && config.dashboard.default_unit != controller.unit() => {
            controller.set_unit(config.dashboard.default_unit)
        }
        None => {}
    }

    if first_launch && !config.dashboard.demo_cities.is_empty() {
        for city in &config.dashboard.demo_cities {
            if let Err(e) = controller.add_city(CityQuery::parse(city), true).await {
                tracing::debug!("Demo city {} skipped: {}", city, e);
            }
        }
    } else if !cli.no_restore {
        controller.restore().await;
    }

    let location = ConfiguredLocation::new(config.location.coordinates());
    run_session(&mut controller, &location).await?;

    // Dropping the controller closes the event channel and ends the renderer
    drop(controller);
    renderer
        .join()
        .map_err(|_| anyhow::anyhow!("Renderer thread panicked"))?;

    tracing::info!("Atmos session ended");
    Ok(())
}

async fn run_session(
    controller: &mut CityListController,
    location: &ConfiguredLocation,
) -> Result<()> {
    println!("Type 'help' for commands.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("Failed to read input")? {
        let command = match Command::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                println!("{e}");
                continue;
            }
        };

        if command == Command::Quit {
            break;
        }
        execute(controller, location, command).await;
    }

    Ok(())
}

/// Run one command. Failures are already reported through render events.
async fn execute(
    controller: &mut CityListController,
    location: &ConfiguredLocation,
    command: Command,
) {
    match command {
        Command::Add(query) => {
            if let Err(e) = controller.add_city(query, true).await {
                tracing::debug!("Add failed: {}", e);
            }
        }
        Command::Here => {
            println!("Detecting your location...");
            if let Err(e) = controller.add_current_location(location).await {
                tracing::debug!("Location add failed: {}", e);
            }
        }
        Command::Remove(key) => {
            if !controller.remove_city(&key) {
                println!("{key} is not on the board");
            }
        }
        Command::Clear => controller.clear_all(),
        Command::Refresh => {
            if controller.saved_cities().is_empty() {
                println!("No cities to refresh. Add a city first!");
                return;
            }
            println!("Refreshing weather data...");
            let outcomes = controller.refresh_all().await;
            let refreshed = outcomes.iter().filter(|(_, r)| r.is_ok()).count();
            println!("Weather data refreshed ({refreshed}/{})", outcomes.len());
        }
        Command::Unit(unit) => controller.set_unit(unit),
        Command::List => print_list(controller),
        Command::Search(query) => match controller.suggest(&query).await {
            Ok(suggestions) if suggestions.is_empty() => println!("No matches for '{query}'"),
            Ok(suggestions) => {
                for s in suggestions {
                    println!("  {:<36} add @{:.3},{:.3}", s.full_name(), s.lat, s.lon);
                }
            }
            Err(e) => {
                tracing::warn!("City search failed: {}", e);
                println!("{}", e.user_message());
            }
        },
        Command::Help => println!("{HELP}"),
        Command::Quit => {}
    }
}

fn print_list(controller: &CityListController) {
    if controller.saved_cities().is_empty() && controller.is_empty() {
        println!("No cities tracked");
        return;
    }

    let now = Utc::now().timestamp_millis();
    let unit = controller.unit();
    println!("Tracking (temperatures in {}):", unit.symbol());
    for key in controller.saved_cities() {
        println!(
            "  {:<24} {}",
            key,
            time_since_update(controller.last_updated(key), now)
        );
    }
    for key in controller
        .displayed()
        .iter()
        .filter(|k| !controller.saved_cities().contains(*k))
    {
        println!("  {:<24} (this session only)", key);
    }
}
