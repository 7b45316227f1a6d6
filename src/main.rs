use adserve::Settings;
use clap::{Arg, Command};
use log::LevelFilter;
use std::process;

fn main() {
    let matches = Command::new("adserve")
        .version("0.1.0")
        .about("On-device advertising decision engine for a browser-like host")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Settings file path")
                .default_value("/etc/adserve.yaml"),
        )
        .arg(
            Arg::new("generate-config")
                .long("generate-config")
                .value_name("FILE")
                .help("Generate a default settings file")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("test-config")
                .long("test-config")
                .help("Test the settings file and exit")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("demo")
                .long("demo")
                .help("Run a scripted browsing session against an in-process host")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging")
                .action(clap::ArgAction::SetTrue),
        )
        .get_matches();

    let log_level = if matches.get_flag("verbose") {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    if let Some(generate_path) = matches.get_one::<String>("generate-config") {
        generate_default_config(generate_path);
        return;
    }

    let config_path = matches.get_one::<String>("config").unwrap();
    let settings = load_settings(config_path);

    if matches.get_flag("test-config") {
        println!("Settings file is valid!");
        println!("Ads enabled: {}", settings.ads_enabled);
        println!("Ads locale: {}", settings.ads_locale);
        println!("Model locales: {}", settings.locales.join(", "));
        println!(
            "Limits: {} per hour, {} per day",
            settings.ads_per_hour, settings.ads_per_day
        );
        return;
    }

    if matches.get_flag("demo") {
        if let Err(e) = adserve::demo::run(settings) {
            eprintln!("Demo failed: {e}");
            process::exit(1);
        }
        return;
    }

    eprintln!("Nothing to do: the engine is embedded by a host. Try --demo.");
    process::exit(2);
}

fn load_settings(path: &str) -> Settings {
    if !std::path::Path::new(path).exists() {
        log::warn!("settings file {path} not found, using defaults");
        return Settings::default();
    }

    match Settings::from_file(path) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error loading settings: {e}");
            process::exit(1);
        }
    }
}

fn generate_default_config(path: &str) {
    match Settings::default().to_file(path) {
        Ok(()) => println!("Generated default settings file: {path}"),
        Err(e) => {
            eprintln!("Error generating settings file: {e}");
            process::exit(1);
        }
    }
}
