//! Property tests for the status layout table and mode-range decoding.

use msp_core::{decode_status, ModeRangeTable, StatusFlags, BOX_ARM};
use msp_proto::command::{MSP2_INAV_STATUS, MSP_STATUS, MSP_STATUS_EX};
use msp_proto::Frame;
use proptest::prelude::*;

fn put(payload: &mut [u8], offset: usize, bytes: &[u8]) {
    payload[offset..offset + bytes.len()].copy_from_slice(bytes);
}

proptest! {
    #[test]
    fn inav_status_offsets(box_flags: u64, arm_flags: u32, tail in proptest::collection::vec(any::<u8>(), 0..16)) {
        let mut payload = vec![0u8; 21];
        put(&mut payload, 9, &arm_flags.to_le_bytes());
        put(&mut payload, 13, &box_flags.to_le_bytes());
        payload.extend(tail);
        let flags = decode_status(&Frame::new(MSP2_INAV_STATUS, true, payload));
        prop_assert_eq!(flags, Some(StatusFlags { box_flags, arm_flags }));
    }

    #[test]
    fn extended_status_offsets(box_flags: u32, arm_flags: u16, head in any::<[u8; 6]>()) {
        let mut payload = vec![0u8; 15];
        put(&mut payload, 0, &head);
        put(&mut payload, 6, &box_flags.to_le_bytes());
        put(&mut payload, 13, &arm_flags.to_le_bytes());
        let flags = decode_status(&Frame::new(MSP_STATUS_EX, true, payload));
        prop_assert_eq!(
            flags,
            Some(StatusFlags { box_flags: box_flags as u64, arm_flags: arm_flags as u32 })
        );
    }

    #[test]
    fn legacy_status_offsets(payload in proptest::collection::vec(any::<u8>(), 13..32)) {
        let flags = decode_status(&Frame::new(MSP_STATUS, true, payload.clone())).unwrap();
        let box_flags = u32::from_le_bytes([payload[6], payload[7], payload[8], payload[9]]);
        let arm_flags = u32::from_le_bytes([payload[9], payload[10], payload[11], payload[12]]);
        prop_assert_eq!(flags.box_flags, box_flags as u64);
        prop_assert_eq!(flags.arm_flags, arm_flags);
    }

    #[test]
    fn short_status_never_decodes(len in 0usize..21) {
        let payload = vec![0xAA; len];
        prop_assert_eq!(decode_status(&Frame::new(MSP2_INAV_STATUS, true, payload.clone())), None);
        if len < 15 {
            prop_assert_eq!(decode_status(&Frame::new(MSP_STATUS_EX, true, payload.clone())), None);
        }
        if len < 13 {
            prop_assert_eq!(decode_status(&Frame::new(MSP_STATUS, true, payload)), None);
        }
    }

    #[test]
    fn mode_ranges_filtered_and_sorted(records in proptest::collection::vec(any::<[u8; 4]>(), 0..48)) {
        let payload: Vec<u8> = records.iter().flatten().copied().collect();
        let table = ModeRangeTable::decode(&payload);
        prop_assert!(table.len() <= 40);
        for range in table.ranges() {
            prop_assert!(range.end_step != 0);
            if range.box_id == BOX_ARM {
                prop_assert!(range.end_step.wrapping_sub(range.start_step) <= 40);
            }
        }
        for pair in table.ranges().windows(2) {
            prop_assert!(
                (pair[0].channel_index, pair[0].start_step) <= (pair[1].channel_index, pair[1].start_step)
            );
        }
    }
}
