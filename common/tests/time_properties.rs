//! Property tests for the `HH:MM:SS` comparator.

use std::cmp::Ordering;

use proptest::prelude::*;
use roomnode_common::{compare, TimeOfDay};

fn clock() -> impl Strategy<Value = String> {
    (0u32..24, 0u32..60, 0u32..60).prop_map(|(h, m, s)| format!("{h:02}:{m:02}:{s:02}"))
}

proptest! {
    #[test]
    fn compare_is_reflexive(a in clock()) {
        prop_assert_eq!(compare(&a, &a).unwrap(), Ordering::Equal);
    }

    #[test]
    fn compare_is_antisymmetric(a in clock(), b in clock()) {
        let forward = compare(&a, &b).unwrap();
        let backward = compare(&b, &a).unwrap();
        prop_assert_eq!(forward, backward.reverse());
    }

    #[test]
    fn compare_matches_seconds_since_midnight(a in clock(), b in clock()) {
        let seconds = |value: &str| {
            let t: TimeOfDay = value.parse().unwrap();
            t.hour * 3600 + t.minute * 60 + t.second
        };
        prop_assert_eq!(compare(&a, &b).unwrap(), seconds(&a).cmp(&seconds(&b)));
    }

    #[test]
    fn display_round_trips_valid_clocks(a in clock()) {
        let parsed: TimeOfDay = a.parse().unwrap();
        prop_assert_eq!(parsed.to_string(), a);
    }

    #[test]
    fn strings_of_wrong_length_are_rejected(s in "[0-9:]{0,7}|[0-9:]{9,12}") {
        prop_assert!(compare(&s, "12:00:00").is_err());
    }
}
