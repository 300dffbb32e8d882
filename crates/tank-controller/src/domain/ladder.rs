//! Automatic sub-state ladder
//!
//! Hysteresis ladder active only while the system is `AUTOMATIC`:
//!
//! ```text
//! NORMAL ──(L1 < l < L2)──→ TRACKING_PRE_ALARM ──(dwell >= T1)──→ PRE_ALARM
//!   ↑                              │                                  │
//!   └───────────(l <= L1)──────────┴────────────(l <= L1)─────────────┘
//!
//! any rung ──(l >= L2)──→ ALARM ──(l <= L2)──→ PRE_ALARM
//! ```
//!
//! One evaluation per reading, at most one rung per evaluation. A level of
//! exactly L2 flips between `ALARM` and `PRE_ALARM` on successive readings.

use shared_types::{AutomaticSubState, Thresholds};
use std::time::Duration;

/// Next sub-state for a reading, or `None` to stay put.
///
/// `dwell` is the monotonic time spent in `current` so far.
///
/// Any level at or above L2 lands in `ALARM` from the lower rungs. `ALARM`
/// only steps down to `PRE_ALARM`, once the level is at or below L2.
pub fn next_sub_state(
    current: AutomaticSubState,
    level: f64,
    dwell: Duration,
    thresholds: &Thresholds,
) -> Option<AutomaticSubState> {
    use AutomaticSubState::*;

    let (l1, l2) = (thresholds.l1(), thresholds.l2());

    let next = match current {
        Normal if level >= l2 => Alarm,
        Normal if level > l1 => TrackingPreAlarm,

        TrackingPreAlarm if level >= l2 => Alarm,
        TrackingPreAlarm if level <= l1 => Normal,
        TrackingPreAlarm if dwell >= thresholds.t1() => PreAlarm,

        PreAlarm if level >= l2 => Alarm,
        PreAlarm if level <= l1 => Normal,

        Alarm if level <= l2 => PreAlarm,

        _ => return None,
    };

    Some(next)
}
