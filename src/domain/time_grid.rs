use crate::domain::models::CalendarTimeEntry;
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Timelike, Utc};

/// Fixed layout of a day's time grid. Configured once per view; the grid
/// spans `[grid_start_hour:00, grid_end_hour:00)` in wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridConfig {
    pub slot_duration_minutes: i64,
    pub grid_start_hour: u32,
    pub grid_end_hour: u32,
    pub slot_height_px: f32,
    pub drag_threshold_px: f32,
    /// Minimum span a drag must cover before release commits it. Equal to the
    /// default slot duration, but configured independently.
    pub min_commit_duration_minutes: i64,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            slot_duration_minutes: 15,
            grid_start_hour: 6,
            grid_end_hour: 23,
            slot_height_px: 30.0,
            drag_threshold_px: 10.0,
            min_commit_duration_minutes: 15,
        }
    }
}

/// One fixed-duration cell of the grid. Constructed on demand, never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeSlot {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub duration_minutes: i64,
}

impl TimeSlot {
    fn spanning(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self {
            start,
            end,
            duration_minutes: (end - start).num_minutes(),
        }
    }
}

impl GridConfig {
    fn slot_count(&self) -> i64 {
        let grid_minutes = (self.grid_end_hour as i64 - self.grid_start_hour as i64) * 60;
        grid_minutes / self.slot_duration_minutes
    }

    fn grid_start(&self, reference_day: NaiveDate) -> NaiveDateTime {
        reference_day
            .and_hms_opt(self.grid_start_hour, 0, 0)
            .expect("grid start hour is a valid time of day")
    }

    fn grid_end(&self, reference_day: NaiveDate) -> NaiveDateTime {
        reference_day
            .and_hms_opt(self.grid_end_hour, 0, 0)
            .expect("grid end hour is a valid time of day")
    }

    /// Rounds `time` to the nearest slot boundary, pinning the result to
    /// `reference_day` and clamping it into the grid.
    ///
    /// Rounding is half-up over the minute-of-hour: with 15-minute slots,
    /// minute 7 snaps down to :00, minute 8 up to :15, and the exact
    /// 7:30 midpoint snaps up. Seconds participate in the rounding and are
    /// zeroed in the result.
    pub fn snap_to_slot(&self, time: NaiveDateTime, reference_day: NaiveDate) -> NaiveDateTime {
        let slot_seconds = self.slot_duration_minutes * 60;
        let seconds_into_hour = (time.minute() * 60 + time.second()) as i64;
        let rounded_slots = (seconds_into_hour + slot_seconds / 2) / slot_seconds;

        let hour_start = reference_day
            .and_hms_opt(time.hour(), 0, 0)
            .expect("hour of an existing time is valid");
        let snapped =
            hour_start + Duration::minutes(rounded_slots * self.slot_duration_minutes);

        snapped.clamp(self.grid_start(reference_day), self.grid_end(reference_day))
    }

    /// Maps a vertical pixel offset from the top of the grid to the start of
    /// the slot it falls in. Out-of-range offsets clamp to the first or last
    /// slot; this never fails and never yields a time outside the grid.
    pub fn position_to_time(&self, offset_px: f32, reference_day: NaiveDate) -> NaiveDateTime {
        let raw_index = (offset_px / self.slot_height_px).floor() as i64;
        let index = raw_index.clamp(0, self.slot_count() - 1);
        self.grid_start(reference_day) + Duration::minutes(index * self.slot_duration_minutes)
    }

    /// Inverse of [`position_to_time`](Self::position_to_time) at slot
    /// boundaries: pixels from the top of the grid to `time`.
    pub fn time_to_position(&self, time: NaiveDateTime) -> f32 {
        let elapsed = time - self.grid_start(time.date());
        let pixels_per_minute = self.slot_height_px / self.slot_duration_minutes as f32;
        elapsed.num_minutes() as f32 * pixels_per_minute
    }

    /// Decomposes `[start, end)` into slot-duration sub-slots. A trailing
    /// remainder shorter than one slot becomes a final short slot.
    pub fn slots_in_range(&self, start: NaiveDateTime, end: NaiveDateTime) -> Vec<TimeSlot> {
        let mut slots = Vec::new();
        let step = Duration::minutes(self.slot_duration_minutes);
        let mut cursor = start;
        while cursor < end {
            let slot_end = (cursor + step).min(end);
            slots.push(TimeSlot::spanning(cursor, slot_end));
            cursor = slot_end;
        }
        slots
    }

    /// Single-tap path: one slot starting at the snapped tap position. Taps
    /// bypass the drag-selection machine entirely.
    pub fn slot_at(&self, offset_px: f32, reference_day: NaiveDate) -> TimeSlot {
        let start = self.position_to_time(offset_px, reference_day);
        TimeSlot::spanning(start, start + Duration::minutes(self.slot_duration_minutes))
    }
}

/// Half-open overlap test between a candidate interval and the existing
/// entries. Adjacent intervals touching at a boundary do not conflict.
/// `exclude_id` skips the entry being edited.
pub fn has_conflict(
    candidate_start: DateTime<Utc>,
    candidate_end: DateTime<Utc>,
    existing: &[CalendarTimeEntry],
    exclude_id: Option<&str>,
) -> bool {
    find_conflict(candidate_start, candidate_end, existing, exclude_id).is_some()
}

/// The first existing entry whose interval overlaps the candidate, if any.
pub fn find_conflict<'a>(
    candidate_start: DateTime<Utc>,
    candidate_end: DateTime<Utc>,
    existing: &'a [CalendarTimeEntry],
    exclude_id: Option<&str>,
) -> Option<&'a CalendarTimeEntry> {
    existing
        .iter()
        .filter(|entry| exclude_id != Some(entry.id.as_str()))
        .find(|entry| candidate_start < entry.end_time && candidate_end > entry.start_time)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionPhase {
    Idle,
    Selecting,
    Committed,
    Cancelled,
}

/// Live drag-selection range over the grid.
#[derive(Debug, Clone, PartialEq)]
pub struct CalendarSelection {
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub is_selecting: bool,
    pub selected_slots: Vec<TimeSlot>,
}

/// Drag-based range selection: `Idle -> Selecting -> (Committed | Cancelled)`.
///
/// A press alone does nothing; the machine enters `Selecting` only once the
/// pointer has moved past the drag threshold, which keeps plain taps from
/// turning into selections. Every update uses the latest pointer position
/// only. Release commits when at least `min_commit_duration_minutes` was
/// spanned; anything shorter is a no-op tap-through.
#[derive(Debug, Clone)]
pub struct DragSelection {
    config: GridConfig,
    reference_day: NaiveDate,
    phase: SelectionPhase,
    press_offset: Option<f32>,
    anchor: Option<NaiveDateTime>,
    current: Option<NaiveDateTime>,
}

impl DragSelection {
    pub fn new(config: GridConfig, reference_day: NaiveDate) -> Self {
        Self {
            config,
            reference_day,
            phase: SelectionPhase::Idle,
            press_offset: None,
            anchor: None,
            current: None,
        }
    }

    pub fn phase(&self) -> SelectionPhase {
        self.phase
    }

    /// Records the press origin. A press after a finished gesture starts a
    /// fresh one.
    pub fn press(&mut self, offset_px: f32) {
        self.clear();
        self.press_offset = Some(offset_px);
    }

    /// Updates the gesture with the latest pointer offset.
    pub fn drag(&mut self, offset_px: f32) {
        match self.phase {
            SelectionPhase::Idle => {
                let Some(press_offset) = self.press_offset else {
                    return;
                };
                if (offset_px - press_offset).abs() < self.config.drag_threshold_px {
                    return;
                }
                let anchor = self
                    .config
                    .snap_to_slot(
                        self.config.position_to_time(press_offset, self.reference_day),
                        self.reference_day,
                    );
                self.anchor = Some(anchor);
                self.current = Some(self.snap_offset(offset_px));
                self.phase = SelectionPhase::Selecting;
            }
            SelectionPhase::Selecting => {
                self.current = Some(self.snap_offset(offset_px));
            }
            SelectionPhase::Committed | SelectionPhase::Cancelled => {}
        }
    }

    /// The live selection while the gesture is active.
    pub fn selection(&self) -> Option<CalendarSelection> {
        if self.phase != SelectionPhase::Selecting {
            return None;
        }
        Some(self.build_selection(true))
    }

    /// Ends the gesture. Returns the committed selection, or `None` when the
    /// drag never reached the commit threshold (the gesture is cancelled and
    /// leaves no residual state).
    pub fn release(&mut self) -> Option<CalendarSelection> {
        if self.phase != SelectionPhase::Selecting {
            self.clear();
            return None;
        }

        let selection = self.build_selection(false);
        let spanned = (selection.end_time - selection.start_time).num_minutes();
        if spanned >= self.config.min_commit_duration_minutes {
            self.phase = SelectionPhase::Committed;
            Some(selection)
        } else {
            self.cancel();
            None
        }
    }

    /// Aborts the gesture and clears all selection state.
    pub fn cancel(&mut self) {
        self.clear();
        self.phase = SelectionPhase::Cancelled;
    }

    fn snap_offset(&self, offset_px: f32) -> NaiveDateTime {
        self.config.snap_to_slot(
            self.config.position_to_time(offset_px, self.reference_day),
            self.reference_day,
        )
    }

    fn build_selection(&self, is_selecting: bool) -> CalendarSelection {
        let anchor = self.anchor.expect("selecting phase always has an anchor");
        let current = self.current.expect("selecting phase always has a position");
        let start_time = anchor.min(current);
        let end_time = anchor.max(current);
        CalendarSelection {
            start_time,
            end_time,
            is_selecting,
            selected_slots: self.config.slots_in_range(start_time, end_time),
        }
    }

    fn clear(&mut self) {
        self.phase = SelectionPhase::Idle;
        self.press_offset = None;
        self.anchor = None;
        self.current = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 2).expect("valid date")
    }

    fn at(hour: u32, minute: u32) -> NaiveDateTime {
        day().and_hms_opt(hour, minute, 0).expect("valid time")
    }

    fn utc(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .expect("valid datetime")
            .with_timezone(&Utc)
    }

    fn entry(id: &str, start: &str, end: &str) -> CalendarTimeEntry {
        let start_time = utc(start);
        let end_time = utc(end);
        CalendarTimeEntry {
            id: id.to_string(),
            date: start_time.date_naive().to_string(),
            activity: "test".to_string(),
            category: "General".to_string(),
            start_time,
            end_time,
            duration_minutes: (end_time - start_time).num_minutes(),
            mood_rating: None,
            emotional_tags: Vec::new(),
            reflection: None,
            created_at: end_time,
            updated_at: end_time,
        }
    }

    #[test]
    fn snap_follows_round_half_up_minute_table() {
        let config = GridConfig::default();
        let cases = [
            (0u32, at(10, 0)),
            (7, at(10, 0)),
            (8, at(10, 15)),
            (22, at(10, 15)),
            (23, at(10, 30)),
            (37, at(10, 30)),
            (38, at(10, 45)),
            (52, at(10, 45)),
            (53, at(11, 0)),
        ];
        for (minute, expected) in cases {
            let snapped = config.snap_to_slot(at(10, minute), day());
            assert_eq!(snapped, expected, "minute {minute} snapped wrong");
        }
    }

    #[test]
    fn snap_rounds_exact_half_slot_up() {
        let config = GridConfig::default();
        let half = day().and_hms_opt(10, 7, 30).expect("valid time");
        assert_eq!(config.snap_to_slot(half, day()), at(10, 15));
        let just_below = day().and_hms_opt(10, 7, 29).expect("valid time");
        assert_eq!(config.snap_to_slot(just_below, day()), at(10, 0));
    }

    #[test]
    fn snap_clamps_into_the_grid() {
        let config = GridConfig::default();
        assert_eq!(config.snap_to_slot(at(4, 10), day()), at(6, 0));
        assert_eq!(config.snap_to_slot(at(23, 55), day()), at(23, 0));
    }

    #[test]
    fn snap_pins_the_reference_day() {
        let config = GridConfig::default();
        let other_day = NaiveDate::from_ymd_opt(2026, 3, 9).expect("valid date");
        let snapped = config.snap_to_slot(at(9, 8), other_day);
        assert_eq!(snapped.date(), other_day);
        assert_eq!(snapped.time(), at(9, 15).time());
    }

    #[test]
    fn position_to_time_clamps_out_of_range_offsets() {
        let config = GridConfig::default();
        assert_eq!(config.position_to_time(-250.0, day()), at(6, 0));
        assert_eq!(config.position_to_time(1_000_000.0, day()), at(22, 45));
    }

    #[test]
    fn position_round_trips_every_slot_boundary() {
        let config = GridConfig::default();
        for index in 0..config.slot_count() {
            let boundary = config.grid_start(day())
                + Duration::minutes(index * config.slot_duration_minutes);
            let offset = config.time_to_position(boundary);
            assert_eq!(config.position_to_time(offset, day()), boundary);
        }
    }

    #[test]
    fn slot_at_returns_one_slot_starting_at_the_tap() {
        let config = GridConfig::default();
        // Offset 95 px falls inside the fourth slot (06:45 with 30 px slots).
        let slot = config.slot_at(95.0, day());
        assert_eq!(slot.start, at(6, 45));
        assert_eq!(slot.end, at(7, 0));
        assert_eq!(slot.duration_minutes, 15);
    }

    #[test]
    fn slots_in_range_decomposes_exactly() {
        let config = GridConfig::default();
        let slots = config.slots_in_range(at(9, 0), at(10, 0));
        assert_eq!(slots.len(), 4);
        assert_eq!(slots[0].start, at(9, 0));
        assert_eq!(slots[3].end, at(10, 0));
        assert!(slots.iter().all(|slot| slot.duration_minutes == 15));
    }

    #[test]
    fn half_open_intervals_do_not_conflict_at_the_boundary() {
        let existing = vec![entry("a", "2026-03-02T09:00:00Z", "2026-03-02T09:15:00Z")];
        assert!(!has_conflict(
            utc("2026-03-02T09:15:00Z"),
            utc("2026-03-02T09:30:00Z"),
            &existing,
            None,
        ));
        assert!(has_conflict(
            utc("2026-03-02T09:14:00Z"),
            utc("2026-03-02T09:16:00Z"),
            &existing,
            None,
        ));
    }

    #[test]
    fn conflict_skips_the_excluded_entry() {
        let existing = vec![entry("a", "2026-03-02T09:00:00Z", "2026-03-02T10:00:00Z")];
        assert!(has_conflict(
            utc("2026-03-02T09:30:00Z"),
            utc("2026-03-02T09:45:00Z"),
            &existing,
            None,
        ));
        assert!(!has_conflict(
            utc("2026-03-02T09:30:00Z"),
            utc("2026-03-02T09:45:00Z"),
            &existing,
            Some("a"),
        ));
    }

    // Property: overlap is symmetric between any two intervals.
    proptest! {
        #[test]
        fn property_conflict_is_symmetric(
            a_start in 0i64..480,
            a_len in 1i64..120,
            b_start in 0i64..480,
            b_len in 1i64..120,
        ) {
            let base = utc("2026-03-02T06:00:00Z");
            let a = (base + Duration::minutes(a_start), base + Duration::minutes(a_start + a_len));
            let b = (base + Duration::minutes(b_start), base + Duration::minutes(b_start + b_len));

            let a_entry = entry("a", &a.0.to_rfc3339(), &a.1.to_rfc3339());
            let b_entry = entry("b", &b.0.to_rfc3339(), &b.1.to_rfc3339());

            prop_assert_eq!(
                has_conflict(a.0, a.1, &[b_entry], None),
                has_conflict(b.0, b.1, &[a_entry], None),
            );
        }
    }

    // Property: snapping is idempotent for any in-day time.
    proptest! {
        #[test]
        fn property_snap_is_idempotent(hour in 0u32..24, minute in 0u32..60, second in 0u32..60) {
            let config = GridConfig::default();
            let time = day().and_hms_opt(hour, minute, second).expect("valid time");
            let once = config.snap_to_slot(time, day());
            prop_assert_eq!(config.snap_to_slot(once, day()), once);
        }
    }

    #[test]
    fn drag_below_threshold_stays_idle_and_release_is_a_noop() {
        let mut selection = DragSelection::new(GridConfig::default(), day());
        selection.press(100.0);
        selection.drag(104.0);
        assert_eq!(selection.phase(), SelectionPhase::Idle);
        assert!(selection.selection().is_none());
        assert!(selection.release().is_none());
    }

    #[test]
    fn drag_past_threshold_enters_selecting_with_snapped_anchor() {
        let config = GridConfig::default();
        let mut selection = DragSelection::new(config, day());
        // 120 px from the grid top is the start of the fifth slot: 07:00.
        selection.press(120.0);
        selection.drag(190.0);
        assert_eq!(selection.phase(), SelectionPhase::Selecting);

        let live = selection.selection().expect("live selection");
        assert!(live.is_selecting);
        assert_eq!(live.start_time, at(7, 0));
        assert_eq!(live.end_time, at(7, 30));
        assert_eq!(live.selected_slots.len(), 2);
    }

    #[test]
    fn selection_uses_latest_position_and_supports_upward_drags() {
        let config = GridConfig::default();
        let mut selection = DragSelection::new(config, day());
        selection.press(300.0);
        selection.drag(420.0);
        selection.drag(150.0);

        let live = selection.selection().expect("live selection");
        // Anchor 08:30 (300 px), current 07:15 (150 px): range is reordered.
        assert_eq!(live.start_time, at(7, 15));
        assert_eq!(live.end_time, at(8, 30));
    }

    #[test]
    fn release_commits_only_when_a_full_slot_was_spanned() {
        let config = GridConfig::default();

        let mut short = DragSelection::new(config, day());
        short.press(120.0);
        short.drag(131.0);
        assert_eq!(short.phase(), SelectionPhase::Selecting);
        assert!(short.release().is_none());
        assert_eq!(short.phase(), SelectionPhase::Cancelled);

        let mut long = DragSelection::new(config, day());
        long.press(120.0);
        long.drag(200.0);
        let committed = long.release().expect("committed selection");
        assert_eq!(long.phase(), SelectionPhase::Committed);
        assert!(!committed.is_selecting);
        assert_eq!(committed.start_time, at(7, 0));
        assert_eq!(committed.end_time, at(7, 30));
    }

    #[test]
    fn cancel_leaves_no_residual_state() {
        let config = GridConfig::default();
        let mut selection = DragSelection::new(config, day());
        selection.press(120.0);
        selection.drag(300.0);
        selection.cancel();

        assert_eq!(selection.phase(), SelectionPhase::Cancelled);
        assert!(selection.selection().is_none());
        assert!(selection.release().is_none());

        // A fresh press starts a clean gesture.
        selection.press(60.0);
        selection.drag(150.0);
        let live = selection.selection().expect("new gesture selects");
        assert_eq!(live.start_time, at(6, 30));
    }
}
