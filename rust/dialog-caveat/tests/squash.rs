use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use dialog_caveat::{CaveatSquasher, Condition, format_time};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

fn squash<S: AsRef<str>>(conditions: &[S]) -> Vec<String> {
    let mut squasher = CaveatSquasher::new();
    squasher.extend(conditions);
    squasher.finish()
}

fn instant(offset: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap() + TimeDelta::seconds(offset)
}

fn condition() -> impl Strategy<Value = String> {
    prop_oneof![
        (0i64..100_000).prop_map(|offset| format!("time-before {}", format_time(&instant(offset)))),
        "[a-z]{1,6}".prop_map(|action| format!("allow {action}")),
        "[a-z]{1,6}".prop_map(|action| format!("deny {action}")),
        "[a-z]{1,6}".prop_map(|value| format!("declared username {value}")),
        "[a-z]{1,6}( [a-z0-9]{1,4})?",
    ]
}

proptest! {
    #[test]
    fn adding_a_condition_twice_changes_nothing(
        conditions in prop::collection::vec(condition(), 0..12),
        pick in any::<prop::sample::Index>(),
    ) {
        let once = squash(&conditions);

        let mut twice = conditions.clone();
        if !conditions.is_empty() {
            twice.push(conditions[pick.index(conditions.len())].clone());
        }
        prop_assert_eq!(squash(&twice), once);
    }

    #[test]
    fn input_order_does_not_matter(conditions in prop::collection::vec(condition(), 0..12)) {
        let mut reversed = conditions.clone();
        reversed.reverse();
        prop_assert_eq!(squash(&reversed), squash(&conditions));
    }

    #[test]
    fn only_the_earliest_expiry_survives(offsets in prop::collection::vec(0i64..100_000, 1..8)) {
        let conditions: Vec<String> = offsets
            .iter()
            .map(|offset| format!("time-before {}", format_time(&instant(*offset))))
            .collect();

        let earliest = offsets.iter().copied().min().unwrap_or_default();
        prop_assert_eq!(
            squash(&conditions),
            vec![format!("time-before {}", format_time(&instant(earliest)))]
        );
    }

    #[test]
    fn output_is_sorted_and_free_of_scope_conditions(
        conditions in prop::collection::vec(condition(), 0..12),
    ) {
        let squashed = squash(&conditions);

        let mut sorted = squashed.clone();
        sorted.sort();
        prop_assert_eq!(&squashed, &sorted);

        for condition in &squashed {
            let parsed = Condition::parse(condition);
            let is_known = matches!(
                parsed,
                Ok(Condition::Allow(_) | Condition::Deny(_) | Condition::Declared { .. })
            );
            prop_assert!(!is_known);
        }
        let expiries = squashed
            .iter()
            .filter(|condition| matches!(Condition::parse(condition), Ok(Condition::TimeBefore(_))))
            .count();
        prop_assert!(expiries <= 1);
    }
}

#[test]
fn it_keeps_earlier_of_two_expiries() {
    let earlier = instant(10);
    let later = instant(20);
    let conditions = [
        format!("time-before {}", format_time(&later)),
        "client-ip 10.0.0.1".to_string(),
        format!("time-before {}", format_time(&earlier)),
        "allow read".to_string(),
    ];
    assert_eq!(
        squash(&conditions),
        vec![
            "client-ip 10.0.0.1".to_string(),
            format!("time-before {}", format_time(&earlier)),
        ]
    );
}
