use eyre::eyre;
use m328_hal::lcd::LcdPins;
use m328_hal::port::{PinId, Port};
use m328_hal::usart::FrameFormat;
use serde::{Deserialize, Serialize};
use std::env::var_os;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

const DEFAULT_CONFIG_FILE: &str = "m328.json";

/// A pin as written in the config file, e.g. `"PB0"`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct LcdWiring {
    pub rs: String,
    pub enable: String,
    /// Port letter of the data bus.
    pub data_port: char,
    /// Bits of D4, D5, D6 and D7.
    pub data_bits: [u8; 4],
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Config {
    pub lcd: LcdWiring,
    pub baud: u32,
    pub frame_format: String,
    pub adc_channel: u8,
}

fn config_path() -> PathBuf {
    let path = var_os("M328_CONFIG_FILE");
    let path: &OsStr = path.as_deref().unwrap_or(OsStr::new(DEFAULT_CONFIG_FILE));
    Path::new(path).to_path_buf()
}

fn parse_port(letter: char) -> eyre::Result<Port> {
    match letter.to_ascii_uppercase() {
        'B' => Ok(Port::B),
        'C' => Ok(Port::C),
        'D' => Ok(Port::D),
        _ => Err(eyre!("Unknown port {}", letter)),
    }
}

fn parse_pin(name: &str) -> eyre::Result<PinId> {
    let mut chars = name.trim().chars();
    if !matches!(chars.next(), Some('P' | 'p')) {
        return Err(eyre!("Pin {:?} should look like PB0", name));
    }
    let port = parse_port(chars.next().ok_or_else(|| eyre!("Pin {:?} has no port", name))?)?;
    let bit: u8 = chars.as_str().parse()?;
    Ok(PinId::new(port, bit)?)
}

impl Config {
    pub fn try_load() -> Option<Self> {
        let config_path = config_path();
        if config_path.exists() {
            let file = std::fs::File::open(config_path).ok()?;
            let reader = std::io::BufReader::new(file);
            serde_json::from_reader(reader).ok()
        } else {
            None
        }
    }

    pub fn save(&self) -> std::io::Result<()> {
        let file = std::fs::File::create(config_path())?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    pub fn lcd_pins(&self) -> eyre::Result<LcdPins> {
        Ok(LcdPins::new(
            parse_pin(&self.lcd.rs)?,
            parse_pin(&self.lcd.enable)?,
            parse_port(self.lcd.data_port)?,
            self.lcd.data_bits,
        )?)
    }

    pub fn frame_format(&self) -> eyre::Result<FrameFormat> {
        FrameFormat::from_name(&self.frame_format)
            .ok_or_else(|| eyre!("Unknown frame format {:?}", self.frame_format))
    }
}

impl Default for Config {
    /// The usual Uno shield wiring: RS on D8, E on D9, data on D4..D7.
    fn default() -> Self {
        Config {
            lcd: LcdWiring {
                rs: "PB0".to_string(),
                enable: "PB1".to_string(),
                data_port: 'D',
                data_bits: [4, 5, 6, 7],
            },
            baud: 9600,
            frame_format: "8N1".to_string(),
            adc_channel: 0,
        }
    }
}
