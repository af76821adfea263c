use super::state::EndedHyp;

/// Decides whether the search can stop before reaching the length limit.
///
/// Called once per step with every hypothesis ended so far. Returning `false`
/// never harms the result; it only costs more steps.
pub trait EndDetector: Send + Sync {
    fn should_stop(&self, ended: &[EndedHyp], step: usize) -> bool;
}

/// Stops once each of the last `window` output lengths produced only ended
/// hypotheses that trail the overall best by more than `threshold` nats.
#[derive(Debug, Clone, Copy)]
pub struct ScoreDecayEndDetector {
    pub window: usize,
    pub threshold: f64,
}

impl Default for ScoreDecayEndDetector {
    fn default() -> Self {
        Self {
            window: 3,
            threshold: -10.0,
        }
    }
}

impl EndDetector for ScoreDecayEndDetector {
    fn should_stop(&self, ended: &[EndedHyp], step: usize) -> bool {
        if self.window == 0 {
            return false;
        }
        let Some(best) = ended.iter().map(|h| h.score).max_by(f64::total_cmp) else {
            return false;
        };

        let decayed = (0..self.window)
            .filter(|&m| {
                let Some(len) = step.checked_sub(m) else {
                    return false;
                };
                ended
                    .iter()
                    .filter(|h| h.len == len)
                    .map(|h| h.score)
                    .max_by(f64::total_cmp)
                    .is_some_and(|score| score - best < self.threshold)
            })
            .count();

        decayed == self.window
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hyp(score: f64, len: usize) -> EndedHyp {
        EndedHyp { score, len }
    }

    #[test]
    fn never_stops_without_ended_hypotheses() {
        assert!(!ScoreDecayEndDetector::default().should_stop(&[], 10));
    }

    #[test]
    fn stops_when_recent_lengths_decay() {
        let ended = vec![
            hyp(-1.0, 3),
            hyp(-20.0, 8),
            hyp(-25.0, 9),
            hyp(-30.0, 10),
        ];
        assert!(ScoreDecayEndDetector::default().should_stop(&ended, 10));
    }

    #[test]
    fn keeps_going_when_a_recent_length_is_competitive() {
        let ended = vec![hyp(-1.0, 3), hyp(-20.0, 8), hyp(-2.0, 9), hyp(-30.0, 10)];
        assert!(!ScoreDecayEndDetector::default().should_stop(&ended, 10));
    }

    #[test]
    fn keeps_going_when_a_recent_length_is_missing() {
        let ended = vec![hyp(-1.0, 3), hyp(-20.0, 8), hyp(-30.0, 10)];
        assert!(!ScoreDecayEndDetector::default().should_stop(&ended, 10));
    }

    #[test]
    fn early_steps_cannot_fill_the_window() {
        let ended = vec![hyp(-1.0, 1), hyp(-30.0, 2)];
        assert!(!ScoreDecayEndDetector::default().should_stop(&ended, 1));
    }
}
