//! Time-of-day clocks used to modulate both the behavioural state machine's
//! transition weights and the human-response simulator's delay multipliers.
//!
//! The two subsystems use different discretizations of the day (the
//! specification names them separately): the state machine uses a
//! four-period clock (`Morning/Afternoon/Evening/Night`), while the
//! human-response simulator uses an activity-level clock
//! (`Peak/Normal/Low/Dormant`). Both derive from the same local hour.

/// The four-period clock driving the behavioural state machine's
/// time-of-day weight multipliers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TimeOfDay {
    /// 06:00–11:59.
    Morning,
    /// 12:00–17:59.
    Afternoon,
    /// 18:00–22:59.
    Evening,
    /// 23:00–05:59.
    Night,
}

impl TimeOfDay {
    /// Classify an hour-of-day (`0..=23`) into its period.
    #[must_use]
    pub fn from_hour(hour: u32) -> Self {
        match hour % 24 {
            6..=11 => TimeOfDay::Morning,
            12..=17 => TimeOfDay::Afternoon,
            18..=22 => TimeOfDay::Evening,
            _ => TimeOfDay::Night,
        }
    }
}

/// The activity-level clock driving the human-response simulator's delay
/// multipliers. `Peak` covers the hours a user is most responsive
/// (mid-morning and early evening); `Dormant` covers the small hours when a
/// response, if it comes at all, is slow.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ActivityPeriod {
    /// Most responsive hours: 09:00–11:59 and 19:00–21:59.
    Peak,
    /// Ordinary waking hours outside the peak windows.
    Normal,
    /// Late evening / early morning, responsive but slow.
    Low,
    /// Small hours, essentially unattended.
    Dormant,
}

impl ActivityPeriod {
    /// Classify an hour-of-day (`0..=23`) into its activity period.
    #[must_use]
    pub fn from_hour(hour: u32) -> Self {
        match hour % 24 {
            9..=11 | 19..=21 => ActivityPeriod::Peak,
            7..=8 | 12..=18 => ActivityPeriod::Normal,
            22..=23 => ActivityPeriod::Low,
            _ => ActivityPeriod::Dormant,
        }
    }

    /// The delay multiplier named in the specification
    /// (`PEAK→0.8, NORMAL→1.0, LOW→1.5, DORMANT→3.0`).
    #[must_use]
    pub fn delay_multiplier(self) -> f64 {
        match self {
            ActivityPeriod::Peak => 0.8,
            ActivityPeriod::Normal => 1.0,
            ActivityPeriod::Low => 1.5,
            ActivityPeriod::Dormant => 3.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn four_period_clock_covers_all_hours() {
        for hour in 0..24 {
            let _ = TimeOfDay::from_hour(hour);
        }
        assert_eq!(TimeOfDay::from_hour(6), TimeOfDay::Morning);
        assert_eq!(TimeOfDay::from_hour(11), TimeOfDay::Morning);
        assert_eq!(TimeOfDay::from_hour(12), TimeOfDay::Afternoon);
        assert_eq!(TimeOfDay::from_hour(17), TimeOfDay::Afternoon);
        assert_eq!(TimeOfDay::from_hour(18), TimeOfDay::Evening);
        assert_eq!(TimeOfDay::from_hour(22), TimeOfDay::Evening);
        assert_eq!(TimeOfDay::from_hour(23), TimeOfDay::Night);
        assert_eq!(TimeOfDay::from_hour(5), TimeOfDay::Night);
    }

    #[test]
    fn activity_period_multipliers_match_spec_values() {
        assert!((ActivityPeriod::Peak.delay_multiplier() - 0.8).abs() < f64::EPSILON);
        assert!((ActivityPeriod::Normal.delay_multiplier() - 1.0).abs() < f64::EPSILON);
        assert!((ActivityPeriod::Low.delay_multiplier() - 1.5).abs() < f64::EPSILON);
        assert!((ActivityPeriod::Dormant.delay_multiplier() - 3.0).abs() < f64::EPSILON);
    }
}
