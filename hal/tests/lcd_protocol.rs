use m328_hal::lcd::*;
use m328_hal::port::{PinId, Port};
use m328_hal::regs::{PORTB, PORTD};
use m328_hal::sim::{Latch, LcdByte, LcdTransfer, SimDelay, SimEvent, SimRegisters};
use std::fmt::Write;

fn uno_pins() -> LcdPins {
    LcdPins::new(
        PinId::new(Port::B, 0).unwrap(),
        PinId::new(Port::B, 1).unwrap(),
        Port::D,
        [4, 5, 6, 7],
    )
    .unwrap()
}

/// An initialized display with the init traffic dropped from the log.
fn ready_lcd(sim: &SimRegisters) -> Lcd<'_, SimRegisters, SimDelay<'_>> {
    let lcd = Lcd::init(sim, uno_pins(), sim.delay());
    sim.clear_events();
    lcd
}

#[test]
fn init_sequence() {
    let sim = SimRegisters::new();
    let lcd = Lcd::init(&sim, uno_pins(), sim.delay());
    let trace = sim.lcd_trace(lcd.pins());
    let latches = trace.latches();

    let reset = Latch { rs: false, nibble: 0x3 };
    assert_eq!(&latches[..4], &[reset, reset, reset, Latch { rs: false, nibble: 0x2 }]);

    let after_reset = &latches[4..];
    let bytes: Vec<u8> = after_reset
        .chunks_exact(2)
        .map(|pair| pair[0].nibble << 4 | pair[1].nibble)
        .collect();
    assert_eq!(after_reset.len(), 8);
    assert!(after_reset.iter().all(|latch| !latch.rs));
    assert_eq!(bytes, vec![0x28, DISPLAY_CLEAR, CURSOR_BLINK_ALTERNATE, CURSOR_RIGHT_ON_INPUT]);
}

#[test]
fn init_pulses_enable_four_times_before_first_command() {
    let sim = SimRegisters::new();
    let lcd = Lcd::init(&sim, uno_pins(), sim.delay());
    let trace = sim.lcd_trace(lcd.pins());

    let fifth_latch = trace
        .transfers()
        .iter()
        .enumerate()
        .filter(|(_, transfer)| matches!(transfer, LcdTransfer::Latch(_)))
        .nth(4)
        .map(|(index, _)| index)
        .unwrap();
    let pulses_before = trace.transfers()[..fifth_latch]
        .iter()
        .filter(|transfer| matches!(transfer, LcdTransfer::EnableRise))
        .count();
    // the fifth rise belongs to the high nibble of the function set
    assert_eq!(pulses_before, 5);
    assert_eq!(trace.enable_pulses(), 4 + 2 * 4);
}

#[test]
fn init_waits_for_power_on_and_between_resets() {
    let sim = SimRegisters::new();
    let lcd = Lcd::init(&sim, uno_pins(), sim.delay());
    let transfers = sim.lcd_trace(lcd.pins()).transfers().to_vec();

    let first_rise = transfers
        .iter()
        .position(|transfer| *transfer == LcdTransfer::EnableRise)
        .unwrap();
    assert!(transfers[..first_rise].contains(&LcdTransfer::Delay { ns: 100_000_000 }));

    // delays between the first and second latch, and the second and third
    let latch_positions: Vec<usize> = transfers
        .iter()
        .enumerate()
        .filter(|(_, transfer)| matches!(transfer, LcdTransfer::Latch(_)))
        .map(|(index, _)| index)
        .collect();
    let first_gap = &transfers[latch_positions[0]..latch_positions[1]];
    let second_gap = &transfers[latch_positions[1]..latch_positions[2]];
    assert!(first_gap.contains(&LcdTransfer::Delay { ns: 5_000_000 }));
    assert!(second_gap.contains(&LcdTransfer::Delay { ns: 100_000 }));

    assert_eq!(transfers.last(), Some(&LcdTransfer::Delay { ns: 50_000_000 }));
    // power-on, resets, five commands with the long clear, final settle
    assert!(sim.elapsed_ns() > 155_000_000);
}

#[test]
fn command_and_char_are_two_nibbles_high_first() {
    for byte in [0x00u8, 0x0E, 0x5A, 0xA5, 0xFF] {
        let sim = SimRegisters::new();
        let mut lcd = ready_lcd(&sim);
        lcd.send_command(byte);
        let trace = sim.lcd_trace(lcd.pins());
        assert_eq!(
            trace.latches(),
            vec![Latch { rs: false, nibble: byte >> 4 }, Latch { rs: false, nibble: byte & 0xF }]
        );
        assert_eq!(trace.enable_pulses(), 2);

        sim.clear_events();
        lcd.send_char(byte);
        let trace = sim.lcd_trace(lcd.pins());
        assert_eq!(
            trace.latches(),
            vec![Latch { rs: true, nibble: byte >> 4 }, Latch { rs: true, nibble: byte & 0xF }]
        );
        assert_eq!(trace.enable_pulses(), 2);
    }
}

#[test]
fn register_select_settles_before_the_first_nibble() {
    let sim = SimRegisters::new();
    let mut lcd = ready_lcd(&sim);

    // RS on PB0, E on PB1, data on PD4..PD7
    lcd.send_command(0x0E);
    assert_eq!(
        &sim.events()[..5],
        &[
            SimEvent::Write { address: PORTB, value: 0b00 },
            SimEvent::Delay { ns: 1_000 },
            SimEvent::Write { address: PORTD, value: 0x00 },
            SimEvent::Delay { ns: 40_000 },
            SimEvent::Write { address: PORTB, value: 0b10 },
        ]
    );
    assert_eq!(
        &sim.lcd_trace(lcd.pins()).transfers()[..3],
        &[
            LcdTransfer::Delay { ns: 1_000 },
            LcdTransfer::Delay { ns: 40_000 },
            LcdTransfer::EnableRise,
        ]
    );

    sim.clear_events();
    lcd.send_char(b'A');
    assert_eq!(
        &sim.events()[..5],
        &[
            SimEvent::Write { address: PORTB, value: 0b01 },
            SimEvent::Delay { ns: 1_000 },
            SimEvent::Write { address: PORTD, value: 0x40 },
            SimEvent::Delay { ns: 40_000 },
            SimEvent::Write { address: PORTB, value: 0b11 },
        ]
    );
    assert_eq!(
        &sim.lcd_trace(lcd.pins()).transfers()[..3],
        &[
            LcdTransfer::Delay { ns: 1_000 },
            LcdTransfer::Delay { ns: 40_000 },
            LcdTransfer::EnableRise,
        ]
    );
}

#[test]
fn clear_waits_long_and_cursor_on_waits_short() {
    let sim = SimRegisters::new();
    let mut lcd = ready_lcd(&sim);

    lcd.command(DISPLAY_CLEAR);
    assert!(sim.lcd_trace(lcd.pins()).trailing_delay_ns() >= 1_600_000);

    sim.clear_events();
    lcd.command(CURSOR_HOME);
    assert!(sim.lcd_trace(lcd.pins()).trailing_delay_ns() >= 1_600_000);

    sim.clear_events();
    lcd.command(CURSOR_ON);
    assert_eq!(sim.lcd_trace(lcd.pins()).trailing_delay_ns(), 40_000);

    sim.clear_events();
    lcd.print_char(b'A');
    assert_eq!(sim.lcd_trace(lcd.pins()).trailing_delay_ns(), 40_000);
}

#[test]
fn clear_is_idempotent_on_the_bus() {
    let sim = SimRegisters::new();
    let mut lcd = ready_lcd(&sim);

    lcd.command(DISPLAY_CLEAR);
    let once = sim.lcd_trace(lcd.pins());
    sim.clear_events();
    lcd.command(DISPLAY_CLEAR);
    let twice = sim.lcd_trace(lcd.pins());

    assert_eq!(once, twice);
    assert_eq!(once.bytes(), vec![LcdByte::command(DISPLAY_CLEAR)]);
}

#[test]
fn positioned_char_sets_address_then_writes() {
    for (row, index, base) in [(Row::One, 1u8, 0x80u8), (Row::Two, 2, 0xC0)] {
        for column in 1..=COLUMNS {
            let sim = SimRegisters::new();
            let mut lcd = ready_lcd(&sim);
            lcd.write_char_at(b'#', row, column);
            let expected = vec![LcdByte::command(base + column - 1), LcdByte::data(b'#')];
            assert_eq!(sim.lcd_trace(lcd.pins()).bytes(), expected);

            sim.clear_events();
            lcd.print_char_at(b'#', index, column);
            assert_eq!(sim.lcd_trace(lcd.pins()).bytes(), expected);
        }
    }
}

#[test]
fn string_at_row_two() {
    let sim = SimRegisters::new();
    let mut lcd = ready_lcd(&sim);
    lcd.print_str_at(b"HI", 2, 1);

    let trace = sim.lcd_trace(lcd.pins());
    assert_eq!(
        trace.bytes(),
        vec![LcdByte::command(0xC0), LcdByte::data(0x48), LcdByte::data(0x49)]
    );
    let nibbles: Vec<u8> = trace.latches().iter().map(|latch| latch.nibble).collect();
    assert_eq!(nibbles, vec![0xC, 0x0, 0x4, 0x8, 0x4, 0x9]);
}

#[test]
fn string_sends_one_char_per_byte() {
    let sim = SimRegisters::new();
    let mut lcd = ready_lcd(&sim);
    let text = b"Hello, world";
    lcd.print_str(text);

    let bytes = sim.lcd_trace(lcd.pins()).bytes();
    assert_eq!(bytes.len(), text.len());
    assert!(bytes.iter().all(|byte| byte.rs));
    let sent: Vec<u8> = bytes.iter().map(|byte| byte.value).collect();
    assert_eq!(sent, text.to_vec());
}

#[test]
fn string_stops_at_nul() {
    let sim = SimRegisters::new();
    let mut lcd = ready_lcd(&sim);
    lcd.send_string(b"ab\0cd");
    assert_eq!(
        sim.lcd_trace(lcd.pins()).bytes(),
        vec![LcdByte::data(b'a'), LcdByte::data(b'b')]
    );
}

#[test]
fn column_past_line_end_is_not_validated() {
    let sim = SimRegisters::new();
    let mut lcd = ready_lcd(&sim);
    lcd.print_char_at(b'x', 1, 17);
    assert_eq!(
        sim.lcd_trace(lcd.pins()).bytes(),
        vec![LcdByte::command(0x90), LcdByte::data(b'x')]
    );
}

#[test]
fn unknown_row_writes_nothing() {
    let sim = SimRegisters::new();
    let mut lcd = ready_lcd(&sim);
    lcd.print_char_at(b'x', 3, 1);
    lcd.print_str_at(b"nope", 0, 1);
    assert!(sim.events().is_empty());
}

#[test]
fn fmt_write_replaces_non_ascii() {
    let sim = SimRegisters::new();
    let mut lcd = ready_lcd(&sim);
    write!(lcd, "{}°", 21).unwrap();
    let sent: Vec<u8> = sim
        .lcd_trace(lcd.pins())
        .bytes()
        .iter()
        .map(|byte| byte.value)
        .collect();
    assert_eq!(sent, b"21?".to_vec());
}

#[test]
fn trait_helpers_go_through_command_path() {
    let sim = SimRegisters::new();
    let mut lcd = ready_lcd(&sim);
    lcd.set_display_control(true, false, false);
    lcd.set_ddram_address(0x45).unwrap();
    lcd.send_data(b'z');
    assert_eq!(
        sim.lcd_trace(lcd.pins()).bytes(),
        vec![LcdByte::command(DISPLAY_ON), LcdByte::command(0xC5), LcdByte::data(b'z')]
    );
}

#[test]
fn data_bus_on_low_bits_of_another_port() {
    let sim = SimRegisters::new();
    let pins = LcdPins::new(
        PinId::new(Port::D, 2).unwrap(),
        PinId::new(Port::D, 3).unwrap(),
        Port::C,
        [0, 1, 2, 3],
    )
    .unwrap();
    sim.poke(m328_hal::regs::PORTC, 0b0011_0000);
    let mut lcd = Lcd::init(&sim, pins, sim.delay());
    sim.clear_events();

    lcd.print_str_at(b"OK", 1, 3);
    assert_eq!(
        sim.lcd_trace(lcd.pins()).bytes(),
        vec![LcdByte::command(0x82), LcdByte::data(b'O'), LcdByte::data(b'K')]
    );
    assert_eq!(sim.peek(m328_hal::regs::PORTC) & 0xF0, 0b0011_0000);
    assert_eq!(sim.peek(m328_hal::regs::DDRC), 0x0F);
}
