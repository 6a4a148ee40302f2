//! Coarse scheduler - wall-clock timing for elapsed time and timer beats
//!
//! The scheduler is polled on a short fixed interval (10 ms by default) and
//! keeps two independent deadlines:
//!
//! - a 1 Hz second deadline that drives elapsed time
//! - a beat deadline used whenever beats cannot come from the audio clock
//!
//! ## Catch-up scheduling
//!
//! When a poll finds the beat deadline has passed, one beat is reported and
//! the deadline is advanced by whole beat intervals *from the previous
//! deadline* until it lies in the future. Advancing from "now" instead would
//! turn every scheduling delay into a permanent tempo loss.
//!
//! Deadlines are computed as `anchor + n * 60s / bpm` in integer nanoseconds,
//! so repeated addition never accumulates rounding error between resyncs.
//! Once per minute of running time the grid is re-anchored at
//! `now + interval`, bounding any residual phase error.

use std::time::{Duration, Instant};

const NANOS_PER_MINUTE: u128 = 60_000_000_000;
const ONE_SECOND: Duration = Duration::from_secs(1);

/// Timing parameters for the coarse scheduler
#[derive(Clone, Debug)]
pub struct SchedulerConfig {
    /// How often the scheduler is polled
    pub poll_interval: Duration,
    /// Running time between hard beat-grid resyncs
    pub resync_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(10),
            resync_interval: Duration::from_secs(60),
        }
    }
}

/// Beat deadline state
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScheduledTick {
    pub next_beat_deadline: Instant,
    /// Total phase shift applied by periodic resyncs
    pub accumulated_drift_correction: Duration,
}

/// A timer beat that came due during a poll
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BeatDue {
    pub tone_parity: bool,
    /// The deadline that was reached
    pub deadline: Instant,
    /// Further deadlines that also passed and were folded into this beat
    pub coalesced: u32,
}

/// Everything that happened in one poll
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PollOutcome {
    /// Whole seconds elapsed since the previous poll
    pub seconds: u32,
    pub beat: Option<BeatDue>,
    pub resynced: bool,
}

struct Armed {
    beat_anchor: Instant,
    /// Index of `tick.next_beat_deadline` on the grid starting at `beat_anchor`
    beat_number: u64,
    tick: ScheduledTick,
    next_second: Instant,
    last_resync: Instant,
    tone_parity: bool,
}

/// Offset of the `n`-th beat from its anchor
fn beat_offset(tempo_bpm: u32, n: u64) -> Duration {
    let nanos = n as u128 * NANOS_PER_MINUTE / tempo_bpm.max(1) as u128;
    Duration::from_nanos(nanos.min(u64::MAX as u128) as u64)
}

pub struct CoarseScheduler {
    config: SchedulerConfig,
    tempo_bpm: u32,
    armed: Option<Armed>,
}

impl CoarseScheduler {
    pub fn new(tempo_bpm: u32, config: SchedulerConfig) -> Self {
        Self {
            config,
            tempo_bpm: tempo_bpm.max(1),
            armed: None,
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Nominal time between beats
    pub fn beat_interval(&self) -> Duration {
        beat_offset(self.tempo_bpm, 1)
    }

    pub fn is_armed(&self) -> bool {
        self.armed.is_some()
    }

    pub fn scheduled(&self) -> Option<ScheduledTick> {
        self.armed.as_ref().map(|a| a.tick)
    }

    /// Start timing a run. The first beat is due immediately and the first
    /// second completes one second from now.
    pub fn arm(&mut self, now: Instant) {
        self.armed = Some(Armed {
            beat_anchor: now,
            beat_number: 0,
            tick: ScheduledTick {
                next_beat_deadline: now,
                accumulated_drift_correction: Duration::ZERO,
            },
            next_second: now + ONE_SECOND,
            last_resync: now,
            tone_parity: true,
        });
        log::debug!("Scheduler armed ({:?} per beat)", self.beat_interval());
    }

    pub fn disarm(&mut self) {
        if self.armed.take().is_some() {
            log::debug!("Scheduler disarmed");
        }
    }

    pub fn poll(&mut self, now: Instant) -> PollOutcome {
        let tempo_bpm = self.tempo_bpm;
        let resync_interval = self.config.resync_interval;
        let Some(armed) = self.armed.as_mut() else {
            return PollOutcome::default();
        };
        let mut outcome = PollOutcome::default();

        while now >= armed.next_second {
            outcome.seconds += 1;
            armed.next_second += ONE_SECOND;
        }

        if now >= armed.tick.next_beat_deadline {
            let deadline = armed.tick.next_beat_deadline;
            let mut coalesced = 0;
            let next = loop {
                armed.beat_number += 1;
                let candidate = armed.beat_anchor + beat_offset(tempo_bpm, armed.beat_number);
                if candidate > now {
                    break candidate;
                }
                coalesced += 1;
            };
            if coalesced > 0 {
                log::trace!("Coalesced {} late beat(s)", coalesced);
            }
            armed.tick.next_beat_deadline = next;
            outcome.beat = Some(BeatDue {
                tone_parity: armed.tone_parity,
                deadline,
                coalesced,
            });
            armed.tone_parity = !armed.tone_parity;
        }

        if now.duration_since(armed.last_resync) >= resync_interval {
            let target = now + beat_offset(tempo_bpm, 1);
            let shift = if target >= armed.tick.next_beat_deadline {
                target - armed.tick.next_beat_deadline
            } else {
                armed.tick.next_beat_deadline - target
            };
            armed.tick.accumulated_drift_correction += shift;
            armed.tick.next_beat_deadline = target;
            armed.beat_anchor = now;
            armed.beat_number = 1;
            armed.last_resync = now;
            outcome.resynced = true;
            log::debug!("Beat grid resynced (shift {:?})", shift);
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn scheduler() -> CoarseScheduler {
        CoarseScheduler::new(180, SchedulerConfig::default())
    }

    /// Small deterministic generator for poll jitter
    struct XorShift(u64);

    impl XorShift {
        fn next(&mut self) -> u64 {
            self.0 ^= self.0 << 13;
            self.0 ^= self.0 >> 7;
            self.0 ^= self.0 << 17;
            self.0
        }
    }

    #[test]
    fn test_disarmed_poll_is_empty() {
        let mut s = scheduler();
        assert_eq!(s.poll(Instant::now()), PollOutcome::default());
    }

    #[test]
    fn test_first_beat_is_immediate() {
        let mut s = scheduler();
        let t0 = Instant::now();
        s.arm(t0);
        let beat = s.poll(t0).beat.unwrap();
        assert!(beat.tone_parity);
        assert_eq!(beat.coalesced, 0);
        assert_eq!(s.scheduled().unwrap().next_beat_deadline, t0 + s.beat_interval());

        assert!(s.poll(t0 + ms(330)).beat.is_none());
        let beat = s.poll(t0 + ms(340)).beat.unwrap();
        assert!(!beat.tone_parity);
    }

    #[test]
    fn test_late_poll_keeps_phase() {
        let mut s = scheduler();
        let t0 = Instant::now();
        s.arm(t0);
        s.poll(t0);

        // Beat 1 is due at 333.3 ms but the poll only runs at 500 ms
        let beat = s.poll(t0 + ms(500)).beat.unwrap();
        assert_eq!(beat.coalesced, 0);
        assert_eq!(beat.deadline, t0 + beat_offset(180, 1));
        // The following deadline is back on the original grid, not 500 + 333
        assert_eq!(
            s.scheduled().unwrap().next_beat_deadline,
            t0 + beat_offset(180, 2)
        );
    }

    #[test]
    fn test_long_stall_coalesces_into_one_beat() {
        let mut s = scheduler();
        let t0 = Instant::now();
        s.arm(t0);
        s.poll(t0);

        let beat = s.poll(t0 + ms(1_100)).beat.unwrap();
        // Deadlines at 333, 667 and 1000 ms all passed
        assert_eq!(beat.coalesced, 2);
        assert_eq!(
            s.scheduled().unwrap().next_beat_deadline,
            t0 + beat_offset(180, 4)
        );
        assert!(s.poll(t0 + ms(1_200)).beat.is_none());
    }

    #[test]
    fn test_seconds_are_independent_of_beats() {
        let mut s = scheduler();
        let t0 = Instant::now();
        s.arm(t0);
        assert_eq!(s.poll(t0 + ms(999)).seconds, 0);
        assert_eq!(s.poll(t0 + ms(1_000)).seconds, 1);
        assert_eq!(s.poll(t0 + ms(1_500)).seconds, 0);
        // A stalled poll catches up on every missed second
        assert_eq!(s.poll(t0 + ms(4_200)).seconds, 3);
    }

    #[test]
    fn test_jittered_polls_keep_average_tempo() {
        let mut s = scheduler();
        let mut rng = XorShift(0x9e37_79b9_7f4a_7c15);
        let t0 = Instant::now();
        s.arm(t0);

        let mut now = t0;
        let mut fired = Vec::new();
        // 50 s of polling with 10 ms nominal spacing plus up to 250 ms of delay
        while now < t0 + Duration::from_secs(50) {
            if let Some(beat) = s.poll(now).beat {
                fired.push((now, beat.coalesced));
            }
            now += ms(10) + ms(rng.next() % 250);
        }

        let total: u64 = fired.iter().map(|&(_, c)| 1 + c as u64).sum();
        // 50 s at 180 BPM is 150 beats; catch-up loses none of them
        assert!((149..=151).contains(&total), "total = {}", total);

        let first = fired.first().unwrap().0;
        let last = fired.last().unwrap().0;
        let average = last.duration_since(first).as_secs_f64() / (total - 1) as f64;
        assert!((average - 60.0 / 180.0).abs() < 0.01, "average = {}", average);
    }

    #[test]
    fn test_additive_from_now_would_drift() {
        // Sanity check of the failure mode catch-up scheduling avoids
        let interval = beat_offset(180, 1);
        let mut rng = XorShift(42);
        let t0 = Instant::now();
        let mut deadline = t0;
        let mut now = t0;
        let mut beats = 0;
        while now < t0 + Duration::from_secs(50) {
            if now >= deadline {
                beats += 1;
                deadline = now + interval;
            }
            now += ms(10) + ms(rng.next() % 250);
        }
        assert!(beats < 140, "beats = {}", beats);
    }

    #[test]
    fn test_resync_once_per_minute() {
        let mut s = scheduler();
        let t0 = Instant::now();
        s.arm(t0);

        let mut now = t0;
        let mut resyncs = 0;
        while now < t0 + Duration::from_secs(61) {
            if s.poll(now).resynced {
                resyncs += 1;
                assert_eq!(
                    s.scheduled().unwrap().next_beat_deadline,
                    now + s.beat_interval()
                );
            }
            now += ms(10);
        }
        assert_eq!(resyncs, 1);
    }

    #[test]
    fn test_resync_records_drift_correction() {
        let mut s = scheduler();
        let t0 = Instant::now();
        s.arm(t0);
        s.poll(t0);

        // Next deadline is t0+333ms; resyncing at 60.1 s moves it
        let now = t0 + ms(60_100);
        s.poll(now);
        let tick = s.scheduled().unwrap();
        assert_eq!(tick.next_beat_deadline, now + s.beat_interval());
        assert!(tick.accumulated_drift_correction > Duration::ZERO);
    }

    #[test]
    fn test_rearm_restarts_grid() {
        let mut s = scheduler();
        let t0 = Instant::now();
        s.arm(t0);
        s.poll(t0);
        s.poll(t0 + ms(400));
        s.disarm();
        assert!(s.poll(t0 + ms(2_000)).beat.is_none());

        let t1 = t0 + ms(5_000);
        s.arm(t1);
        let beat = s.poll(t1).beat.unwrap();
        assert!(beat.tone_parity);
        assert_eq!(beat.deadline, t1);
    }
}
