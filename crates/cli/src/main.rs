//! open-beastx CLI: command-line Beast X configuration shell.
//!
//! A thin presentation layer over the core session: it issues commands,
//! prints notifications, and never touches the device directly.

use anyhow::Result;
use clap::{Parser, Subcommand};
use open_beastx_core::config::Store;
use open_beastx_core::safety;
use open_beastx_core::session::{ConnectionState, HidApiOpener, Notification, Session};

#[derive(Parser)]
#[command(
    name = "open-beastx",
    version,
    about = "Open-source WL Mouse Beast X configuration"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List connected Beast X HID interfaces.
    ListDevices,
    /// Show connection state and the current configuration.
    Status {
        /// Print the configuration as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Set polling rate (125, 250, 500, 1000, 2000, or 4000 Hz).
    SetRate {
        /// Polling rate in Hz.
        value: u16,
    },
    /// Set lift-off distance (1 or 2 mm).
    SetLod {
        /// Distance in millimeters.
        value: u8,
    },
    /// Set a DPI profile slot (50-26000, rounded to nearest 50).
    SetDpi {
        /// Slot index (0-4).
        slot: usize,
        /// DPI value.
        value: u16,
    },
    /// Select the active DPI profile slot.
    SetActive {
        /// Slot index (0-4).
        slot: usize,
    },
    /// Stay connected, printing state changes and reconnecting as needed.
    Watch,
}

fn open_session() -> Result<Session> {
    let store = Store::at_default_path()?;
    Ok(Session::new(Box::new(HidApiOpener), store))
}

fn print_snapshot(session: &Session, json: bool) -> Result<()> {
    let snapshot = session.snapshot();
    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }
    println!("Polling rate: {}", snapshot.polling_rate);
    println!("Lift-off:     {}", snapshot.lift_off);
    for (slot, profile) in snapshot.dpi_profiles.iter().enumerate() {
        let marker = if slot == snapshot.active_profile as usize {
            "*"
        } else {
            " "
        };
        println!("DPI slot {slot} {marker}  {} DPI", profile.dpi);
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::ListDevices => {
            let devices = open_beastx_core::device::discover_devices()?;
            if devices.is_empty() {
                println!("No Beast X found.");
                println!("Ensure the mouse is plugged in via USB and udev rules are set up.");
            } else {
                for dev in &devices {
                    println!(
                        "VID: 0x{:04X}, PID: 0x{:04X}, interface: {}, path: {}{}",
                        dev.vid,
                        dev.pid,
                        dev.interface_number,
                        dev.path,
                        if dev.is_config_interface() {
                            "  (config)"
                        } else {
                            ""
                        }
                    );
                }
            }
        }
        Commands::Status { json } => {
            let session = open_session()?;
            match session.connect() {
                Ok(()) => println!("State: {}", session.state()),
                Err(e) => println!("State: {} ({e})", session.state()),
            }
            print_snapshot(&session, json)?;
        }
        Commands::SetRate { value } => {
            let rate = safety::validate_polling_rate(value)?;
            let session = open_session()?;
            session.connect()?;
            session.set_polling_rate(rate)?;
            println!("Polling rate set to {rate}");
        }
        Commands::SetLod { value } => {
            let distance = safety::validate_lift_off(value)?;
            let session = open_session()?;
            session.connect()?;
            session.set_lift_off(distance)?;
            println!("Lift-off distance set to {distance}");
        }
        Commands::SetDpi { slot, value } => {
            let session = open_session()?;
            session.connect()?;
            session.set_dpi_profile(slot, value)?;
            let applied = session.snapshot().dpi_profiles[slot].dpi;
            println!("DPI slot {slot} set to {applied}");
        }
        Commands::SetActive { slot } => {
            let session = open_session()?;
            session.set_active_profile(slot)?;
            println!(
                "Active profile: slot {slot} ({} DPI)",
                session.snapshot().active_dpi()
            );
        }
        Commands::Watch => {
            let session = open_session()?;
            let rx = session.subscribe();
            if let Err(e) = session.connect() {
                println!("Waiting for device: {e}");
            }

            // Ctrl+C ends the loop together with the process; reconnect
            // polling needs no separate teardown.
            loop {
                for notification in rx.try_iter() {
                    match notification {
                        Notification::State(ConnectionState::Connected) => {
                            println!("Connected");
                        }
                        Notification::State(state) => println!("State: {state}"),
                        Notification::Snapshot(config) => {
                            println!(
                                "Config: {} / {} / active slot {} ({} DPI)",
                                config.polling_rate,
                                config.lift_off,
                                config.active_profile,
                                config.active_dpi()
                            );
                        }
                        Notification::Warning(message) => println!("Warning: {message}"),
                    }
                }
                session.maybe_reconnect();
                std::thread::sleep(std::time::Duration::from_millis(250));
            }
        }
    }

    Ok(())
}
