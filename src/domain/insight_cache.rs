use crate::domain::models::{CalendarTimeEntry, CheckIn};
use chrono::{DateTime, Duration, Utc};

pub const DEFAULT_MAX_AGE_HOURS: i64 = 24;

/// Current layout version of the canonical serialization. Bump when the
/// record format below changes so stale cached rows stop matching.
pub const DATA_VERSION: u32 = 1;

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Minimum data required before insight generation is attempted at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataThresholds {
    pub min_check_ins: usize,
    pub min_activities: usize,
}

impl Default for DataThresholds {
    fn default() -> Self {
        Self {
            min_check_ins: 3,
            min_activities: 5,
        }
    }
}

/// Change-detection digest over the data an insight set was computed from.
///
/// FNV-1a over a canonical serialization: one record per check-in
/// (`date-energy-positivity-focus-sleep-emotions-main_goal`, absent
/// focus/sleep as 0), one per activity (`date-activity-category-duration`),
/// and the goals sorted lexicographically, all joined with `|`. The 64-bit
/// accumulator uses explicit wrapping arithmetic and renders as fixed-width
/// lowercase hex. Not cryptographic; collision resistance is not required.
pub fn data_hash(check_ins: &[CheckIn], activities: &[CalendarTimeEntry], goals: &[String]) -> String {
    let mut records = Vec::with_capacity(check_ins.len() + activities.len() + goals.len());

    for check_in in check_ins {
        records.push(format!(
            "{}-{}-{}-{}-{}-{}-{}",
            check_in.date,
            check_in.energy_level,
            check_in.positivity_level,
            check_in.focus_level.unwrap_or(0),
            check_in.sleep_quality.unwrap_or(0),
            check_in.emotions.join(","),
            check_in.main_goal,
        ));
    }

    for activity in activities {
        records.push(format!(
            "{}-{}-{}-{}",
            activity.date, activity.activity, activity.category, activity.duration_minutes,
        ));
    }

    let mut sorted_goals = goals.to_vec();
    sorted_goals.sort_unstable();
    records.extend(sorted_goals);

    format!("{:016x}", fnv1a_64(records.join("|").as_bytes()))
}

/// A cached insight set is valid only while its hash still matches the
/// current data AND it is younger than `max_age_hours`. Either failing
/// forces regeneration.
pub fn is_cache_valid(
    cached_hash: &str,
    current_hash: &str,
    generated_at: DateTime<Utc>,
    max_age_hours: i64,
    now: DateTime<Utc>,
) -> bool {
    cached_hash == current_hash && now - generated_at <= Duration::hours(max_age_hours)
}

pub fn has_enough_data(
    check_in_count: usize,
    activity_count: usize,
    thresholds: DataThresholds,
) -> bool {
    check_in_count >= thresholds.min_check_ins && activity_count >= thresholds.min_activities
}

fn fnv1a_64(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET_BASIS, |hash, byte| {
        (hash ^ u64::from(*byte)).wrapping_mul(FNV_PRIME)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn fixed_time(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .expect("valid datetime")
            .with_timezone(&Utc)
    }

    fn sample_check_in(date: &str, energy: u8) -> CheckIn {
        CheckIn {
            id: format!("chk-{date}"),
            date: date.to_string(),
            energy_level: energy,
            positivity_level: 7,
            focus_level: None,
            sleep_quality: Some(6),
            emotions: vec!["calm".to_string(), "rested".to_string()],
            main_goal: "write".to_string(),
            created_at: fixed_time("2026-03-02T07:00:00Z"),
            updated_at: fixed_time("2026-03-02T07:00:00Z"),
        }
    }

    fn sample_activity(date: &str, activity: &str, duration: i64) -> CalendarTimeEntry {
        let start_time = fixed_time("2026-03-02T09:00:00Z");
        CalendarTimeEntry {
            id: format!("ent-{activity}"),
            date: date.to_string(),
            activity: activity.to_string(),
            category: "Learning".to_string(),
            start_time,
            end_time: start_time + Duration::minutes(duration),
            duration_minutes: duration,
            mood_rating: None,
            emotional_tags: Vec::new(),
            reflection: None,
            created_at: start_time,
            updated_at: start_time,
        }
    }

    #[test]
    fn hash_is_fixed_width_lowercase_hex() {
        let hash = data_hash(&[], &[], &[]);
        assert_eq!(hash.len(), 16);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn hash_ignores_goal_order() {
        let check_ins = vec![sample_check_in("2026-03-02", 7)];
        let activities = vec![sample_activity("2026-03-02", "reading", 45)];
        let forward = vec!["sleep more".to_string(), "exercise".to_string()];
        let backward = vec!["exercise".to_string(), "sleep more".to_string()];

        assert_eq!(
            data_hash(&check_ins, &activities, &forward),
            data_hash(&check_ins, &activities, &backward),
        );
    }

    #[test]
    fn hash_is_sensitive_to_check_in_order() {
        let a = sample_check_in("2026-03-02", 7);
        let b = sample_check_in("2026-03-03", 4);
        assert_ne!(
            data_hash(&[a.clone(), b.clone()], &[], &[]),
            data_hash(&[b, a], &[], &[]),
        );
    }

    #[test]
    fn hash_changes_when_any_field_changes() {
        let base_check_ins = vec![sample_check_in("2026-03-02", 7)];
        let base_activities = vec![sample_activity("2026-03-02", "reading", 45)];
        let base = data_hash(&base_check_ins, &base_activities, &[]);

        let mut bumped_energy = base_check_ins.clone();
        bumped_energy[0].energy_level = 8;
        assert_ne!(data_hash(&bumped_energy, &base_activities, &[]), base);

        let mut bumped_focus = base_check_ins.clone();
        bumped_focus[0].focus_level = Some(5);
        assert_ne!(data_hash(&bumped_focus, &base_activities, &[]), base);

        let mut renamed = base_activities.clone();
        renamed[0].activity = "writing".to_string();
        assert_ne!(data_hash(&base_check_ins, &renamed, &[]), base);

        let mut longer = base_activities.clone();
        longer[0].duration_minutes = 60;
        assert_ne!(data_hash(&base_check_ins, &longer, &[]), base);
    }

    #[test]
    fn absent_optional_levels_hash_as_zero_sentinel() {
        let mut with_none = vec![sample_check_in("2026-03-02", 7)];
        with_none[0].focus_level = None;
        with_none[0].sleep_quality = None;

        let mut with_explicit_zero = with_none.clone();
        with_explicit_zero[0].focus_level = Some(0);
        with_explicit_zero[0].sleep_quality = Some(0);

        assert_eq!(
            data_hash(&with_none, &[], &[]),
            data_hash(&with_explicit_zero, &[], &[]),
        );
    }

    #[test]
    fn cache_is_invalid_on_hash_mismatch_regardless_of_age() {
        let generated_at = fixed_time("2026-03-02T08:00:00Z");
        let now = generated_at + Duration::minutes(1);
        assert!(!is_cache_valid("aaaa", "bbbb", generated_at, 24, now));
    }

    #[test]
    fn cache_expires_after_max_age_even_when_hashes_match() {
        let generated_at = fixed_time("2026-03-02T08:00:00Z");
        let within = generated_at + Duration::hours(23);
        let beyond = generated_at + Duration::hours(25);
        assert!(is_cache_valid("aaaa", "aaaa", generated_at, 24, within));
        assert!(!is_cache_valid("aaaa", "aaaa", generated_at, 24, beyond));
    }

    #[test]
    fn has_enough_data_gates_on_both_thresholds() {
        let thresholds = DataThresholds::default();
        assert!(!has_enough_data(2, 10, thresholds));
        assert!(!has_enough_data(3, 4, thresholds));
        assert!(has_enough_data(3, 5, thresholds));
    }

    // Property: the digest is deterministic and goal permutations never
    // change it.
    proptest! {
        #[test]
        fn property_goal_permutations_share_a_digest(
            goals in prop::collection::vec("[a-z ]{1,12}", 0..6),
            rotation in 0usize..6,
        ) {
            let check_ins = vec![sample_check_in("2026-03-02", 7)];
            let mut rotated = goals.clone();
            if !rotated.is_empty() {
                let shift = rotation % rotated.len();
                rotated.rotate_left(shift);
            }
            prop_assert_eq!(
                data_hash(&check_ins, &[], &goals),
                data_hash(&check_ins, &[], &rotated),
            );
        }
    }
}
