//! Windowed health classifier

use super::{
    HealthState, HealthTransition, LinkDiagnostic, LinkState, LinkTransition, Transition,
    WindowBaseline,
};
use crate::config::HealthConfig;
use crate::telemetry::{LinkCounters, Telemetry};
use crate::time::{age, elapsed, Millis};

/// Transitions produced by one [`HealthClassifier::tick`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TickReport {
    pub link: Option<LinkTransition>,
    pub health: Option<HealthTransition>,
}

impl TickReport {
    pub fn is_empty(&self) -> bool {
        self.link.is_none() && self.health.is_none()
    }
}

/// Activity over the last completed link window
#[derive(Debug, Clone, Copy)]
struct WindowActivity {
    edges: u32,
    matched: u32,
}

/// Reduces link counters into [`LinkState`] and [`HealthState`]
///
/// Owns the [`LinkDiagnostic`] and publishes it into [`Telemetry`] after
/// every tick. Lives for the whole process so hysteresis survives
/// reconnects.
pub struct HealthClassifier {
    config: HealthConfig,
    diag: LinkDiagnostic,
    started_ms: Option<Millis>,
    last_window: Option<WindowActivity>,
    /// Entry into NoFrames, for the dwell guard
    no_frames_since: Millis,
    no_frames_total: u32,
}

impl HealthClassifier {
    pub fn new(config: HealthConfig) -> Self {
        Self {
            config,
            diag: LinkDiagnostic::new(),
            started_ms: None,
            last_window: None,
            no_frames_since: 0,
            no_frames_total: 0,
        }
    }

    /// Current record
    pub fn diagnostic(&self) -> &LinkDiagnostic {
        &self.diag
    }

    pub fn health(&self) -> HealthState {
        self.diag.health
    }

    pub fn link(&self) -> LinkState {
        self.diag.link
    }

    /// Evaluate both machines and publish the result
    pub fn tick(&mut self, now: Millis, telemetry: &Telemetry) -> TickReport {
        let counters = telemetry.counters();
        let edges = telemetry.edges();

        let started = match self.started_ms {
            Some(started) => started,
            None => {
                self.start(now, &counters, edges);
                now
            }
        };

        let report = TickReport {
            link: self.update_link(now, &counters, edges),
            health: self.update_health(now, started, &counters, edges),
        };

        telemetry.publish_diagnostic(self.diag);
        report
    }

    fn start(&mut self, now: Millis, counters: &LinkCounters, edges: u32) {
        self.started_ms = Some(now);
        self.diag.link_window = baseline(now, counters, edges);
        self.diag.oor_window = baseline(now, counters, edges);
        self.diag.link_changed_ms = now;
        self.diag.health_changed_ms = now;
        self.no_frames_since = now;
        self.no_frames_total = counters.total_rx;
    }

    fn update_link(&mut self, now: Millis, counters: &LinkCounters, edges: u32) -> Option<LinkTransition> {
        let base = self.diag.link_window;
        if elapsed(now, base.started_ms) < self.config.link_window_ms {
            return None;
        }

        let total = counters.total_rx.wrapping_sub(base.total_rx);
        let recognized = counters.recognized.wrapping_sub(base.recognized);
        self.last_window = Some(WindowActivity {
            edges: edges.wrapping_sub(base.edges),
            matched: counters.matched.wrapping_sub(base.matched),
        });
        self.diag.link_window = baseline(now, counters, edges);

        // Below the floor a silent profile is not yet evidence of a mismatch
        let next = if total == 0 {
            LinkState::NoFrames
        } else if recognized == 0 && total >= self.config.no_match_floor {
            LinkState::NoProfileMatch
        } else {
            LinkState::Ok
        };

        if next == self.diag.link {
            return None;
        }
        let transition = Transition {
            from: self.diag.link,
            to: next,
            at: now,
        };
        info!("link {} -> {}", transition.from, transition.to);
        self.diag.link = next;
        self.diag.link_changed_ms = now;
        self.diag.revision = self.diag.revision.wrapping_add(1);
        Some(transition)
    }

    fn update_health(
        &mut self,
        now: Millis,
        started: Millis,
        counters: &LinkCounters,
        edges: u32,
    ) -> Option<HealthTransition> {
        if elapsed(now, self.diag.oor_window.started_ms) >= self.config.oor_window_ms {
            self.diag.oor_window = baseline(now, counters, edges);
        }

        let mut next = self.classify(now, started, counters);

        if self.diag.health == HealthState::NoFrames && next != HealthState::NoFrames {
            let dwelling = elapsed(now, self.no_frames_since) < self.config.no_frames_dwell_ms;
            let recent = counters.seen_any && age(now, counters.last_rx_ms) <= self.config.recent_frame_ms;
            let arrivals = counters.total_rx.wrapping_sub(self.no_frames_total) >= 2;
            if dwelling && !recent && !arrivals {
                next = HealthState::NoFrames;
            }
        }

        if next == self.diag.health {
            return None;
        }
        let transition = Transition {
            from: self.diag.health,
            to: next,
            at: now,
        };
        info!("health {} -> {}", transition.from, transition.to);
        if next == HealthState::NoFrames {
            self.no_frames_since = now;
            self.no_frames_total = counters.total_rx;
        }
        self.diag.health = next;
        self.diag.health_changed_ms = now;
        self.diag.revision = self.diag.revision.wrapping_add(1);
        Some(transition)
    }

    fn classify(&self, now: Millis, started: Millis, counters: &LinkCounters) -> HealthState {
        let c = &self.config;

        // Electrical activity with nothing decodable: wrong speed or profile
        if let Some(window) = self.last_window {
            if c.edge_activity_min > 0 && window.edges >= c.edge_activity_min && window.matched == 0 {
                return HealthState::DecodeBad;
            }
        }

        if !counters.seen_any {
            return HealthState::NoFrames;
        }
        let since_rx = age(now, counters.last_rx_ms);
        if since_rx > c.no_frames_ms {
            return HealthState::NoFrames;
        }
        if since_rx > c.lag_ms {
            return HealthState::Stale;
        }

        let since_match = if counters.seen_match {
            age(now, counters.last_match_ms)
        } else {
            elapsed(now, started)
        };
        if since_match > c.no_match_ms {
            return HealthState::DecodeBad;
        }

        let base = &self.diag.oor_window;
        let out_of_range = counters.out_of_range.wrapping_sub(base.out_of_range);
        let matched = counters.matched.wrapping_sub(base.matched);
        if out_of_range >= c.implausible_count {
            return HealthState::Implausible;
        }
        if matched >= c.ratio_min_samples
            && u64::from(out_of_range) * 100 >= u64::from(matched) * u64::from(c.ratio_percent)
        {
            return HealthState::DecodeBad;
        }

        HealthState::Ok
    }
}

fn baseline(now: Millis, counters: &LinkCounters, edges: u32) -> WindowBaseline {
    WindowBaseline {
        started_ms: now,
        total_rx: counters.total_rx,
        matched: counters.matched,
        recognized: counters.recognized,
        out_of_range: counters.out_of_range,
        edges,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TICK_MS: u32 = 50;

    /// Simulated healthy traffic: `frames` matched, recognized frames at `now`
    fn receive(telemetry: &Telemetry, now: Millis, frames: u32) {
        telemetry.update_counters(|c| {
            c.total_rx += frames;
            c.matched += frames;
            c.recognized += frames;
            c.last_rx_ms = now;
            c.last_match_ms = now;
            c.seen_any = true;
            c.seen_match = true;
        });
    }

    /// Drive a healthy link from `from` to `to`, ticking every `TICK_MS`
    fn run_healthy(classifier: &mut HealthClassifier, telemetry: &Telemetry, from: Millis, to: Millis) -> Millis {
        let mut now = from;
        while now < to {
            receive(telemetry, now, 5);
            classifier.tick(now, telemetry);
            now += TICK_MS;
        }
        now
    }

    #[test]
    fn test_starts_in_no_frames() {
        let telemetry = Telemetry::new();
        let mut classifier = HealthClassifier::new(HealthConfig::DEFAULT);
        assert!(classifier.tick(0, &telemetry).is_empty());
        assert_eq!(classifier.health(), HealthState::NoFrames);
        assert_eq!(telemetry.diagnostic().health, HealthState::NoFrames);
    }

    #[test]
    fn test_frames_bring_health_ok() {
        let telemetry = Telemetry::new();
        let mut classifier = HealthClassifier::new(HealthConfig::DEFAULT);
        classifier.tick(0, &telemetry);

        receive(&telemetry, 100, 5);
        let report = classifier.tick(100, &telemetry);
        assert_eq!(
            report.health,
            Some(Transition {
                from: HealthState::NoFrames,
                to: HealthState::Ok,
                at: 100
            })
        );
        assert_eq!(telemetry.diagnostic().revision, 1);
    }

    #[test]
    fn test_link_state_windows() {
        let config = HealthConfig::DEFAULT;
        let telemetry = Telemetry::new();
        let mut classifier = HealthClassifier::new(config);
        classifier.tick(0, &telemetry);

        // Frames that never decode, above the floor
        telemetry.update_counters(|c| {
            c.total_rx += config.no_match_floor;
            c.seen_any = true;
            c.last_rx_ms = 900;
        });
        let report = classifier.tick(config.link_window_ms, &telemetry);
        assert_eq!(report.link.map(|t| t.to), Some(LinkState::NoProfileMatch));

        // Below the floor the window counts as Ok
        telemetry.update_counters(|c| c.total_rx += config.no_match_floor - 1);
        let report = classifier.tick(2 * config.link_window_ms, &telemetry);
        assert_eq!(report.link.map(|t| t.to), Some(LinkState::Ok));

        // Silent window
        let report = classifier.tick(3 * config.link_window_ms, &telemetry);
        assert_eq!(report.link.map(|t| t.to), Some(LinkState::NoFrames));
        assert_eq!(classifier.link(), LinkState::NoFrames);
    }

    #[test]
    fn test_lag_then_no_frames() {
        let config = HealthConfig::DEFAULT;
        let telemetry = Telemetry::new();
        let mut classifier = HealthClassifier::new(config);
        let now = run_healthy(&mut classifier, &telemetry, 0, 500);
        assert_eq!(classifier.health(), HealthState::Ok);

        let last = now - TICK_MS;
        classifier.tick(last + config.lag_ms + 1, &telemetry);
        assert_eq!(classifier.health(), HealthState::Stale);

        classifier.tick(last + config.no_frames_ms + 1, &telemetry);
        assert_eq!(classifier.health(), HealthState::NoFrames);
    }

    #[test]
    fn test_unmatched_frames_decode_bad() {
        let config = HealthConfig::DEFAULT;
        let telemetry = Telemetry::new();
        let mut classifier = HealthClassifier::new(config);
        classifier.tick(0, &telemetry);

        // Frames keep arriving but none match the profile
        let mut now = 0;
        while now <= config.no_match_ms + TICK_MS {
            telemetry.update_counters(|c| {
                c.total_rx += 2;
                c.seen_any = true;
                c.last_rx_ms = now;
            });
            classifier.tick(now, &telemetry);
            now += TICK_MS;
        }
        assert_eq!(classifier.health(), HealthState::DecodeBad);
    }

    #[test]
    fn test_edge_activity_without_matches_is_decode_bad() {
        let config = HealthConfig::DEFAULT;
        let telemetry = Telemetry::new();
        let mut classifier = HealthClassifier::new(config);
        classifier.tick(0, &telemetry);

        // Wrong speed: the line toggles but the controller receives nothing.
        // The NoFrames dwell holds until it expires.
        let windows = config.no_frames_dwell_ms / config.link_window_ms;
        let mut last = TickReport::default();
        for window in 1..=windows {
            telemetry.note_edges(config.edge_activity_min);
            last = classifier.tick(window * config.link_window_ms, &telemetry);
            if window < windows {
                assert_eq!(classifier.health(), HealthState::NoFrames);
            }
        }
        assert_eq!(last.health.map(|t| t.to), Some(HealthState::DecodeBad));
        assert_eq!(classifier.link(), LinkState::NoFrames);
    }

    #[test]
    fn test_implausible_exactly_once_until_window_reset() {
        let config = HealthConfig::DEFAULT;
        let telemetry = Telemetry::new();
        let mut classifier = HealthClassifier::new(config);
        let mut now = run_healthy(&mut classifier, &telemetry, 0, 200);
        assert_eq!(classifier.health(), HealthState::Ok);

        // A burst of corrupt values pushes the window past the threshold
        telemetry.update_counters(|c| c.out_of_range += config.implausible_count);

        let window_end = config.oor_window_ms;
        let mut entered = 0;
        while now < window_end {
            receive(&telemetry, now, 5);
            let report = classifier.tick(now, &telemetry);
            if report.health.map(|t| t.to) == Some(HealthState::Implausible) {
                entered += 1;
            }
            if entered > 0 {
                // Clean samples do not clear it inside the window
                assert_eq!(classifier.health(), HealthState::Implausible);
            }
            now += TICK_MS;
        }
        assert_eq!(entered, 1);

        receive(&telemetry, window_end, 5);
        let report = classifier.tick(window_end, &telemetry);
        assert_eq!(
            report.health.map(|t| (t.from, t.to)),
            Some((HealthState::Implausible, HealthState::Ok))
        );
    }

    #[test]
    fn test_out_of_range_ratio_is_decode_bad() {
        let config = HealthConfig::DEFAULT;
        let telemetry = Telemetry::new();
        let mut classifier = HealthClassifier::new(config);
        classifier.tick(0, &telemetry);

        // Enough samples, 10 % bad but below the absolute threshold
        receive(&telemetry, 100, 100);
        telemetry.update_counters(|c| c.out_of_range += 10);
        assert!(10 < config.implausible_count);
        classifier.tick(100, &telemetry);
        assert_eq!(classifier.health(), HealthState::DecodeBad);
    }

    #[test]
    fn test_no_frames_dwell_holds_single_late_frame() {
        let config = HealthConfig::DEFAULT;
        let telemetry = Telemetry::new();
        let mut classifier = HealthClassifier::new(config);
        classifier.tick(0, &telemetry);

        // One frame, seen by a tick that is already past the recent window
        receive(&telemetry, 1000, 1);
        let late = 1000 + config.recent_frame_ms + 1;
        assert!(late - 1000 < config.lag_ms);
        assert!(classifier.tick(late, &telemetry).health.is_none());
        assert_eq!(classifier.health(), HealthState::NoFrames);

        // A second frame since entry makes recovery unambiguous
        receive(&telemetry, 1000, 1);
        let report = classifier.tick(late + TICK_MS, &telemetry);
        assert_eq!(report.health.map(|t| t.to), Some(HealthState::Ok));
    }

    #[test]
    fn test_no_frames_dwell_expires() {
        let config = HealthConfig::DEFAULT;
        let telemetry = Telemetry::new();
        let mut classifier = HealthClassifier::new(config);
        classifier.tick(0, &telemetry);

        let at = config.no_frames_dwell_ms;
        receive(&telemetry, at - config.recent_frame_ms - 1, 1);
        classifier.tick(at, &telemetry);
        assert_eq!(classifier.health(), HealthState::Ok);
    }

    #[test]
    fn test_revision_counts_every_transition() {
        let config = HealthConfig::DEFAULT;
        let telemetry = Telemetry::new();
        let mut classifier = HealthClassifier::new(config);
        run_healthy(&mut classifier, &telemetry, 0, config.link_window_ms + TICK_MS);

        // NoFrames -> Ok (health) and NoFrames -> Ok (link)
        let diag = telemetry.diagnostic();
        assert_eq!(diag.health, HealthState::Ok);
        assert_eq!(diag.link, LinkState::Ok);
        assert_eq!(diag.revision, 2);
    }
}
