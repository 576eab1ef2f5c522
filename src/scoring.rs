use crate::error::PeriodError;
use crate::model::{Outcome, Period, PeriodOutcome, Score, ScoringVariant};

pub const CSI_POINTS_WIN: u32 = 3;
pub const CSI_POINTS_DRAW: u32 = 1;
pub const CSI_POINTS_LOSS: u32 = 0;

pub const UISP_POINTS_PERIOD_WIN: u32 = 2;
// Drawn periods score nothing, so a match with a drawn period totals less
// than two points per period.
pub const UISP_POINTS_PERIOD_DRAW: u32 = 0;
pub const UISP_POINTS_BONUS: u32 = 1;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Points {
    pub home: u32,
    pub away: u32,
}

impl Points {
    pub fn outcome(self) -> Outcome {
        Outcome::classify(self.home, self.away)
    }

    pub fn total(self) -> u32 {
        self.home + self.away
    }
}

/// What a rule table needs to see of a finished match.
#[derive(Debug, Clone, Copy)]
pub struct MatchResult<'a> {
    pub score: Score,
    pub periods: &'a [Period],
}

pub trait PointsRule: Send + Sync {
    fn variant(&self) -> ScoringVariant;

    /// Rejects results this rule table cannot score.
    fn check(&self, _result: &MatchResult<'_>) -> Result<(), PeriodError> {
        Ok(())
    }

    /// Scores a result that already passed `check`.
    fn award(&self, result: &MatchResult<'_>) -> Points;

    fn points_for(&self, result: &MatchResult<'_>) -> Result<Points, PeriodError> {
        self.check(result)?;
        Ok(self.award(result))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CsiRules {
    pub win: u32,
    pub draw: u32,
    pub loss: u32,
}

impl Default for CsiRules {
    fn default() -> Self {
        Self {
            win: CSI_POINTS_WIN,
            draw: CSI_POINTS_DRAW,
            loss: CSI_POINTS_LOSS,
        }
    }
}

impl PointsRule for CsiRules {
    fn variant(&self) -> ScoringVariant {
        ScoringVariant::Csi
    }

    fn award(&self, result: &MatchResult<'_>) -> Points {
        match Outcome::classify(result.score.home, result.score.away) {
            Outcome::Home => Points {
                home: self.win,
                away: self.loss,
            },
            Outcome::Draw => Points {
                home: self.draw,
                away: self.draw,
            },
            Outcome::Away => Points {
                home: self.loss,
                away: self.win,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UispRules {
    pub period_win: u32,
    pub period_draw: u32,
    pub bonus: u32,
}

impl Default for UispRules {
    fn default() -> Self {
        Self {
            period_win: UISP_POINTS_PERIOD_WIN,
            period_draw: UISP_POINTS_PERIOD_DRAW,
            bonus: UISP_POINTS_BONUS,
        }
    }
}

impl PointsRule for UispRules {
    fn variant(&self) -> ScoringVariant {
        ScoringVariant::Uisp
    }

    fn check(&self, result: &MatchResult<'_>) -> Result<(), PeriodError> {
        validate_periods(result.periods)
    }

    fn award(&self, result: &MatchResult<'_>) -> Points {
        let mut points = Points::default();
        for period in result.periods {
            match period.home {
                PeriodOutcome::Win => points.home += self.period_win,
                PeriodOutcome::Loss => points.away += self.period_win,
                PeriodOutcome::Draw => {
                    points.home += self.period_draw;
                    points.away += self.period_draw;
                }
            }
        }

        // Level on periods: the side with more goals overall takes the bonus.
        if points.home == points.away {
            match Outcome::classify(result.score.home, result.score.away) {
                Outcome::Home => points.home += self.bonus,
                Outcome::Away => points.away += self.bonus,
                Outcome::Draw => {}
            }
        }
        points
    }
}

/// Checks a UISP period list before it is scored or stored.
pub fn validate_periods(periods: &[Period]) -> Result<(), PeriodError> {
    if periods.is_empty() {
        return Err(PeriodError::Empty);
    }

    let mut previous: Option<u8> = None;
    for period in periods {
        if let Some(prev) = previous {
            if period.index <= prev {
                return Err(PeriodError::OutOfOrder {
                    index: period.index,
                    previous: prev,
                });
            }
        }
        previous = Some(period.index);

        if period.away != period.home.opposite() {
            return Err(PeriodError::NotComplementary {
                index: period.index,
                home: period.home,
                away: period.away,
            });
        }

        if let Some(score) = period.score {
            let by_goals = match Outcome::classify(score.home, score.away) {
                Outcome::Home => PeriodOutcome::Win,
                Outcome::Draw => PeriodOutcome::Draw,
                Outcome::Away => PeriodOutcome::Loss,
            };
            if by_goals != period.home {
                return Err(PeriodError::ScoreMismatch {
                    index: period.index,
                    outcome: period.home,
                    home_goals: score.home,
                    away_goals: score.away,
                });
            }
        }
    }
    Ok(())
}

/// Resolves the rule table once per championship load.
pub fn rules_for(variant: ScoringVariant) -> Box<dyn PointsRule> {
    match variant {
        ScoringVariant::Csi => Box::new(CsiRules::default()),
        ScoringVariant::Uisp => Box::new(UispRules::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OUTCOMES: [PeriodOutcome; 3] = [PeriodOutcome::Win, PeriodOutcome::Draw, PeriodOutcome::Loss];

    fn csi(home: u32, away: u32) -> Points {
        CsiRules::default()
            .points_for(&MatchResult {
                score: Score::new(home, away),
                periods: &[],
            })
            .unwrap()
    }

    fn periods_from(outcomes: &[PeriodOutcome]) -> Vec<Period> {
        outcomes
            .iter()
            .enumerate()
            .map(|(i, o)| Period::new(i as u8 + 1, *o, o.opposite()))
            .collect()
    }

    // Every k-length sequence of home-side period outcomes.
    fn all_sequences(k: usize) -> Vec<Vec<PeriodOutcome>> {
        let mut out = vec![Vec::new()];
        for _ in 0..k {
            out = out
                .into_iter()
                .flat_map(|seq| {
                    OUTCOMES.iter().map(move |o| {
                        let mut next = seq.clone();
                        next.push(*o);
                        next
                    })
                })
                .collect();
        }
        out
    }

    #[test]
    fn csi_rule_table() {
        assert_eq!(csi(2, 1), Points { home: 3, away: 0 });
        assert_eq!(csi(0, 0), Points { home: 1, away: 1 });
        assert_eq!(csi(3, 3), Points { home: 1, away: 1 });
        assert_eq!(csi(0, 4), Points { home: 0, away: 3 });
    }

    #[test]
    fn csi_points_per_match_are_two_or_three() {
        for home in 0..6 {
            for away in 0..6 {
                let points = csi(home, away);
                let expected = if home == away { 2 } else { 3 };
                assert_eq!(points.total(), expected, "{home}-{away}");
            }
        }
    }

    #[test]
    fn uisp_period_points_and_bonus() {
        let rules = UispRules::default();
        let periods = periods_from(&[PeriodOutcome::Win, PeriodOutcome::Loss, PeriodOutcome::Draw]);

        let more_home_goals = MatchResult {
            score: Score::new(4, 2),
            periods: &periods,
        };
        assert_eq!(
            rules.points_for(&more_home_goals).unwrap(),
            Points { home: 3, away: 2 }
        );

        let level_goals = MatchResult {
            score: Score::new(2, 2),
            periods: &periods,
        };
        assert_eq!(
            rules.points_for(&level_goals).unwrap(),
            Points { home: 2, away: 2 }
        );

        let decisive = periods_from(&[PeriodOutcome::Win, PeriodOutcome::Win, PeriodOutcome::Loss]);
        let away_more_goals = MatchResult {
            score: Score::new(2, 5),
            periods: &decisive,
        };
        // Not level on periods, so goals do not matter.
        assert_eq!(
            rules.points_for(&away_more_goals).unwrap(),
            Points { home: 4, away: 2 }
        );
    }

    #[test]
    fn drawn_periods_score_nothing() {
        let rules = UispRules::default();
        let periods = periods_from(&[PeriodOutcome::Draw, PeriodOutcome::Draw, PeriodOutcome::Draw]);
        let level = MatchResult {
            score: Score::new(1, 1),
            periods: &periods,
        };
        assert_eq!(rules.points_for(&level).unwrap(), Points::default());

        // Three periods, but only the goals bonus is awarded.
        let ahead = MatchResult {
            score: Score::new(2, 1),
            periods: &periods,
        };
        assert_eq!(rules.points_for(&ahead).unwrap(), Points { home: 1, away: 0 });
    }

    #[test]
    fn uisp_every_combination_up_to_three_periods() {
        let rules = UispRules::default();
        let scores = [Score::new(3, 1), Score::new(2, 2), Score::new(0, 1)];
        for k in 1..=3 {
            for seq in all_sequences(k) {
                let periods = periods_from(&seq);
                let decisive = seq.iter().filter(|o| **o != PeriodOutcome::Draw).count() as u32;
                for score in scores {
                    let points = rules
                        .points_for(&MatchResult {
                            score,
                            periods: &periods,
                        })
                        .unwrap();
                    let base = UISP_POINTS_PERIOD_WIN * decisive;
                    assert!(
                        points.total() == base || points.total() == base + UISP_POINTS_BONUS,
                        "{seq:?} {score:?} -> {points:?}"
                    );

                    let home_periods = seq.iter().filter(|o| **o == PeriodOutcome::Win).count();
                    let away_periods = seq.iter().filter(|o| **o == PeriodOutcome::Loss).count();
                    let bonus_due = home_periods == away_periods && score.home != score.away;
                    assert_eq!(points.total() == base + UISP_POINTS_BONUS, bonus_due);
                }
            }
        }
    }

    #[test]
    fn uisp_requires_periods() {
        let result = MatchResult {
            score: Score::new(1, 0),
            periods: &[],
        };
        assert_eq!(
            UispRules::default().points_for(&result),
            Err(PeriodError::Empty)
        );
    }

    #[test]
    fn validator_rejects_non_complementary_periods() {
        let periods = vec![
            Period::new(1, PeriodOutcome::Win, PeriodOutcome::Loss),
            Period::new(2, PeriodOutcome::Win, PeriodOutcome::Win),
        ];
        assert_eq!(
            validate_periods(&periods),
            Err(PeriodError::NotComplementary {
                index: 2,
                home: PeriodOutcome::Win,
                away: PeriodOutcome::Win,
            })
        );

        let draw_vs_loss = vec![Period::new(1, PeriodOutcome::Draw, PeriodOutcome::Loss)];
        assert!(validate_periods(&draw_vs_loss).is_err());
    }

    #[test]
    fn validator_checks_order_and_period_scores() {
        let unordered = vec![
            Period::new(2, PeriodOutcome::Draw, PeriodOutcome::Draw),
            Period::new(1, PeriodOutcome::Draw, PeriodOutcome::Draw),
        ];
        assert_eq!(
            validate_periods(&unordered),
            Err(PeriodError::OutOfOrder {
                index: 1,
                previous: 2
            })
        );

        let mut wrong_score = Period::new(1, PeriodOutcome::Win, PeriodOutcome::Loss);
        wrong_score.score = Some(Score::new(0, 1));
        assert!(matches!(
            validate_periods(&[wrong_score]),
            Err(PeriodError::ScoreMismatch { index: 1, .. })
        ));

        let mut right_score = wrong_score;
        right_score.score = Some(Score::new(2, 1));
        assert!(validate_periods(&[right_score]).is_ok());
    }

    #[test]
    fn rules_for_dispatches_on_variant() {
        assert_eq!(rules_for(ScoringVariant::Csi).variant(), ScoringVariant::Csi);
        assert_eq!(rules_for(ScoringVariant::Uisp).variant(), ScoringVariant::Uisp);
    }
}
