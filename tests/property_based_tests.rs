//! Property-based tests for the bus protocol and golden model
//!
//! These tests use property-based testing to check framing, lane mapping
//! and memory-map invariants over arbitrary addresses and payloads.


use mocks::proptest_helpers::*;
use proptest::prelude::*;
use rusty_qspi::components::common::codec::{lines_to_nibble, nibble_to_lines};
use rusty_qspi::components::common::command::{BusTransaction, Command, Lanes};
use rusty_qspi::components::common::seven_seg::{segments_for, DebugFrame};
use rusty_qspi::pin::DirectionMask;
use rusty_qspi::revision_config::RevisionConfig;
use rusty_qspi::{BusTransactor, CommandCodec, DirectionTracker, ExpectedByte, GoldenMemoryModel, SpiFlashModel, U24};

fn powered() -> (BusTransactor, SpiFlashModel) {
    let revision = RevisionConfig::tt05();
    let mut bus = BusTransactor::new(&revision);
    let mut device = SpiFlashModel::new(&revision).unwrap();
    bus.power_on(&mut device).unwrap();
    (bus, device)
}

#[cfg(test)]
mod framing_properties {
    use super::*;

    proptest! {
        #[test]
        fn test_frame_length(
            command in prop_oneof![
                Just(Command::Write),
                Just(Command::Read),
                Just(Command::QuadWrite),
                Just(Command::QuadRead),
            ],
            address in 0u32..=0xFF_FFFF,
            length in 0usize..32,
        ) {
            let codec = CommandCodec::new(2);
            let data = vec![0xA5; length];
            let transaction = BusTransaction::new(command, address, &data, length);
            let cycles = codec.frame(&transaction).unwrap();

            let dummy = if command == Command::QuadRead { 2 } else { 0 };
            let payload = length * command.lanes().cycles_per_byte();
            prop_assert_eq!(cycles.len(), 8 + 24 + dummy + payload);
        }

        #[test]
        fn test_nibble_lane_mapping(nibble in arb_nibble()) {
            let (mosi, lanes) = nibble_to_lines(nibble);
            prop_assert!(lanes <= 0b111);
            prop_assert_eq!(lines_to_nibble(mosi.is_high(), lanes), nibble);
            prop_assert_eq!(mosi.is_high(), nibble & 1 == 1);
        }

        #[test]
        fn test_mask_never_touches_fixed_outputs(
            turnaround in 0u8..=2,
            address_cycle in 0u8..24,
            dummy_cycle in 0u8..2,
            payload_cycle in 0u32..64,
        ) {
            use rusty_qspi::Phase;
            let tracker = DirectionTracker::new(turnaround);
            for command in Command::ALL {
                for phase in [
                    Phase::Opcode(address_cycle % 8),
                    Phase::Address(address_cycle),
                    Phase::Dummy(dummy_cycle),
                    Phase::Payload(payload_cycle),
                ] {
                    let mask = tracker.expected(command, phase);
                    prop_assert_eq!(mask.bits() & DirectionMask::FIXED_OUTPUTS, DirectionMask::FIXED_OUTPUTS);
                    if command.is_write() {
                        prop_assert_eq!(mask, DirectionMask::IDLE);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod round_trip_properties {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn test_write_read_any_protocol(
            (offset, data) in arb_window_write(),
            write_lanes in arb_lanes(),
            read_lanes in arb_lanes(),
        ) {
            let (mut bus, mut device) = powered();
            let address = 0x100 + offset;
            let write = BusTransaction::new(Command::write_for(write_lanes), address, &data, data.len());
            bus.run(&mut device, write).unwrap();

            let read = BusTransaction::new(Command::read_for(read_lanes), address, &[], data.len());
            let record = bus.run(&mut device, read).unwrap();
            prop_assert_eq!(record.data, data);
            prop_assert!(device.is_idle());
        }

        #[test]
        fn test_write_visible_through_every_alias(
            alias in arb_ram_alias(),
            byte in any::<u8>(),
            read_lanes in arb_lanes(),
        ) {
            let (mut bus, mut device) = powered();
            bus.run(&mut device, BusTransaction::write(alias, &[byte])).unwrap();

            let offset = (alias - 0x100) % 8;
            for mirror in [0x100 + offset, 0x108 + offset, 0x3F8 + offset] {
                let read = BusTransaction::new(Command::read_for(read_lanes), mirror, &[], 1);
                let record = bus.run(&mut device, read).unwrap();
                prop_assert_eq!(record.data, vec![byte]);
            }
        }

        #[test]
        fn test_device_matches_golden_after_random_writes(
            writes in prop::collection::vec((any::<u32>(), prop::collection::vec(any::<u8>(), 1..20)), 1..6),
        ) {
            let revision = RevisionConfig::tt05();
            let (mut bus, mut device) = powered();
            let mut golden = GoldenMemoryModel::new(&revision).unwrap();

            // Writes ignore the decode, so any 24-bit address lands in the window
            for (address, data) in &writes {
                let address = address & 0xFF_FFFF;
                bus.run(&mut device, BusTransaction::quad_write(address, data)).unwrap();
                golden.apply_write(U24::new(address), data);
            }
            prop_assert_eq!(device.ram_window(), golden.ram_window());

            let record = bus.run(&mut device, BusTransaction::read(0x100, 8)).unwrap();
            prop_assert!(golden.verify_read(U24::new(0x100), &record.data).is_ok());
        }
    }
}

#[cfg(test)]
mod golden_model_properties {
    use super::*;

    proptest! {
        #[test]
        fn test_ram_offset_wraps(address in 0u32..=0xFF_FFFF, byte in any::<u8>()) {
            let mut golden = GoldenMemoryModel::new(&RevisionConfig::tt05()).unwrap();
            golden.apply_write(U24::new(address), &[byte]);
            let offset = (address.wrapping_sub(0x100) % 8) as usize;
            prop_assert_eq!(golden.ram_window()[offset], byte);
            prop_assert_eq!(golden.ram_window().iter().filter(|&&b| b != 0).count(), (byte != 0) as usize);
        }

        #[test]
        fn test_entropy_decode_has_priority(address in 0u32..=0xFF_FFFF) {
            let golden = GoldenMemoryModel::new(&RevisionConfig::tt05()).unwrap();
            let expected = golden.expected_byte(U24::new(address));
            if address & 0x400 != 0 {
                prop_assert_eq!(expected, ExpectedByte::Entropy);
                prop_assert!(expected.matches(address as u8));
            } else {
                prop_assert!(expected.fixed().is_some());
            }
        }

        #[test]
        fn test_debug_frames_cover_the_window(window in prop::collection::vec(any::<u8>(), 8)) {
            for index in 0..16u8 {
                let frame = DebugFrame::from_window(index, &window);
                let byte = window[(index / 2) as usize];
                let expected = if index % 2 == 0 { byte & 0x0F } else { byte >> 4 };
                prop_assert_eq!(frame.value, expected);
                prop_assert_eq!(frame.segment_pattern, segments_for(expected));
            }
        }
    }
}

#[cfg(test)]
mod lane_width_properties {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn test_quad_read_is_four_times_faster(length in 1usize..64) {
            let (mut bus, mut device) = powered();
            let single = bus.run(&mut device, BusTransaction::read(0x000, length)).unwrap();
            let quad = bus.run(&mut device, BusTransaction::quad_read(0x000, length)).unwrap();
            prop_assert_eq!(single.data, quad.data);
            prop_assert_eq!(single.cycles, 32 + 8 * length as u64);
            prop_assert_eq!(quad.cycles, 32 + 2 + 2 * length as u64);
            prop_assert_eq!(Lanes::Quad.cycles_per_byte() * 4, Lanes::Single.cycles_per_byte());
        }
    }
}
