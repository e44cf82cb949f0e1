use std::{
    env,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use fugit::Duration;
use inquire::Select;
use manson_hcs::{psu::HcsPsu, types::Milli};

// How often to print a sample line.
const WATCH_INTERVAL_S: u32 = 1;

fn main() {
    env_logger::init();

    // Get serial port from command line arg or interactive selection
    let port_name = env::args().nth(1).unwrap_or_else(|| {
        let ports = serialport::available_ports().expect("Failed to enumerate serial ports");

        if ports.is_empty() {
            eprintln!("No serial ports found!");
            std::process::exit(1);
        }

        let port_names: Vec<String> = ports.iter().map(|p| p.port_name.clone()).collect();

        Select::new("Select a serial port:", port_names)
            .prompt()
            .expect("Failed to select port")
    });

    println!("Using port: {}", port_name);

    let mut psu = HcsPsu::open(&port_name).expect("Failed to connect to PSU");

    println!("Model: {}", psu.model().unwrap());
    println!("Version: {}", psu.version().unwrap());

    let target = psu.get_target_voltage_and_current().unwrap();
    println!(
        "Target: {}V / {}A",
        Milli(target.voltage_mv),
        Milli(target.current_ma)
    );

    let display = psu.get_display_voltage_current_and_mode().unwrap();
    println!(
        "Display: {}V / {}A ({})",
        Milli(display.voltage_mv),
        Milli(display.current_ma),
        display.mode
    );

    let output = psu.get_output_power_enabled().unwrap();
    println!("Output: {:?}", output);

    println!("Error state: {}", psu.get_error_state().unwrap());

    println!("\n--- Watching, press Ctrl-C to stop ---");
    let stop = Arc::new(AtomicBool::new(false));
    let handler_stop = Arc::clone(&stop);
    ctrlc::set_handler(move || handler_stop.store(true, Ordering::Relaxed))
        .expect("Failed to install Ctrl-C handler");

    psu.watch(Duration::<u32, 1, 1>::secs(WATCH_INTERVAL_S), &stop)
        .unwrap();
    println!();

    drop(psu.disconnect());
}
