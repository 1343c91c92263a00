mod config;

use crate::config::Config;
use dotenv::dotenv;
use embedded_hal::delay::DelayNs;
use log::{debug, info};
use m328_hal::RegisterFile;
use m328_hal::adc::Adc;
use m328_hal::delay::SleepDelay;
use m328_hal::lcd::{Lcd, LcdPins};
use m328_hal::raw::MappedRegisters;
use m328_hal::regs::{ADCH, ADCL, ADCSRA, ADSC, UCSR0A, UDR0, UDRE0};
use m328_hal::sim::SimRegisters;
use m328_hal::usart::Usart;
use std::env::var_os;
use std::fmt::Write;

const BANNER: &str = concat!("m328 v", env!("CARGO_PKG_VERSION"));

fn show_banner<R: RegisterFile, D: DelayNs>(lcd: &mut Lcd<'_, R, D>) {
    lcd.print_str_at(BANNER.as_bytes(), 1, 1);
}

/// Register file whose ADC and USART answer immediately, with a mid-scale ADC reading.
fn simulated_board() -> SimRegisters {
    let registers = SimRegisters::new();
    registers.on_read(ADCSRA, |value| value & !(1 << ADSC));
    registers.on_read(UCSR0A, |value| value | (1 << UDRE0));
    registers.poke(ADCL, 0x00);
    registers.poke(ADCH, 0x02);
    registers
}

fn run_simulated(registers: &SimRegisters, config: &Config, pins: LcdPins) -> eyre::Result<()> {
    debug!("Initializing ADC...");
    let adc = Adc::new(registers);
    adc.init();
    let reading = adc.read(config.adc_channel)?;
    info!("ADC{} = {}", config.adc_channel, reading);

    debug!("Initializing USART...");
    let mut usart = Usart::new(registers);
    usart.init(config.baud, config.frame_format()?)?;

    debug!("Initializing LCD...");
    registers.clear_events();
    let mut lcd = Lcd::init(registers, pins, registers.delay());
    info!(
        "{:?} initialized after {} ms.",
        lcd,
        registers.elapsed_ns() / 1_000_000
    );
    registers.clear_events();

    show_banner(&mut lcd);
    let line = format!("ADC{}: {:4}", config.adc_channel, reading);
    lcd.print_str_at(line.as_bytes(), 2, 1);

    for byte in registers.lcd_trace(lcd.pins()).bytes() {
        let kind = if byte.rs { "DATA" } else { "CMD " };
        debug!("LCD {} {:#04x}", kind, byte.value);
    }

    writeln!(usart, "{}", BANNER)?;
    writeln!(usart, "ADC{}: {}", config.adc_channel, reading)?;
    info!(
        "USART TX: {:?}",
        String::from_utf8_lossy(&registers.writes_to(UDR0))
    );

    Ok(())
}

fn main() -> eyre::Result<()> {
    dotenv().ok();
    pretty_env_logger::init();

    info!("m328 demo starting...");

    debug!("Trying to load config...");
    let config = if let Some(config) = Config::try_load() {
        info!("Config loaded.");
        config
    } else {
        info!("Config not found. Using default");
        let config = Config::default();
        config.save()?;
        info!("Default config saved.");
        config
    };

    let pins = config.lcd_pins()?;
    info!(
        "LCD @ RS: {}, E: {}, Data: P{:?}{:?}",
        pins.rs(),
        pins.enable(),
        pins.data_port(),
        pins.data_bits()
    );

    match var_os("M328_REGISTER_FILE") {
        Some(path) => {
            let registers = MappedRegisters::open(&path)?;
            debug!("{:?} mapped.", registers);
            let mut lcd = Lcd::init(&registers, pins, SleepDelay);
            show_banner(&mut lcd);
            registers.flush()?;
            info!("Register image written to {:?}.", path);
        }
        None => {
            debug!("No register file given, using the simulated board.");
            let registers = simulated_board();
            run_simulated(&registers, &config, pins)?;
        }
    }

    info!("Done.");
    Ok(())
}
