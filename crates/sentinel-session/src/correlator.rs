use sentinel_types::{CompanyPin, Descriptor, Session};

/// Largest accepted match distance. The boundary itself is a match.
pub const DEFAULT_MATCH_THRESHOLD: f64 = 0.55;

/// Outcome of correlating one exit descriptor against open sessions.
#[derive(Clone, Debug, PartialEq)]
pub enum MatchResult {
    Matched { session: Session, distance: f64 },
    /// `best_distance` is `+inf` when there were no candidates.
    NoMatch { best_distance: f64 },
}

impl MatchResult {
    pub fn distance(&self) -> f64 {
        match self {
            Self::Matched { distance, .. } => *distance,
            Self::NoMatch { best_distance } => *best_distance,
        }
    }
}

/// Nearest-neighbour matcher over a snapshot of open sessions.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Correlator {
    threshold: f64,
}

impl Correlator {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Find the closest open session belonging to `pin`.
    ///
    /// `open_sessions` should be ordered newest entry first: the first
    /// session seen wins a tie. Sessions for other facilities, or no longer
    /// open, are skipped.
    pub fn find_best_match(
        &self,
        pin: &CompanyPin,
        candidate: &Descriptor,
        open_sessions: &[Session],
    ) -> MatchResult {
        let mut best: Option<(&Session, f64)> = None;
        for session in open_sessions
            .iter()
            .filter(|s| s.is_open() && s.company_pin() == pin)
        {
            let distance = candidate.distance(&session.entry().descriptor);
            if best.map_or(true, |(_, d)| distance < d) {
                best = Some((session, distance));
            }
        }

        match best {
            Some((session, distance)) if distance <= self.threshold => MatchResult::Matched {
                session: session.clone(),
                distance,
            },
            Some((_, distance)) => MatchResult::NoMatch {
                best_distance: distance,
            },
            None => MatchResult::NoMatch {
                best_distance: f64::INFINITY,
            },
        }
    }
}

impl Default for Correlator {
    fn default() -> Self {
        Self::new(DEFAULT_MATCH_THRESHOLD)
    }
}
