//! Event classification and suspend/resume pairing.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{PumpEvent, PumpEventKind};

/// A bolus pulled out of the pump history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bolus {
    pub timestamp: DateTime<Utc>,
    pub amount: Decimal,
}

/// A temp basal pulled out of the pump history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TempBasal {
    pub timestamp: DateTime<Utc>,
    /// Rate in U/hr.
    pub rate: Decimal,
    pub duration_minutes: u32,
}

/// Pump history split by event kind, each bucket in input order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassifiedEvents {
    pub boluses: Vec<Bolus>,
    pub temp_basals: Vec<TempBasal>,
    pub suspends: Vec<DateTime<Utc>>,
    pub resumes: Vec<DateTime<Utc>>,
}

/// A suspension bounded by a matching resume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuspendPair {
    pub suspended_at: DateTime<Utc>,
    pub resumed_at: DateTime<Utc>,
}

/// How suspend events are matched with resume events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PairingStrategy {
    /// The i-th suspend goes with the i-th resume, in input order.
    #[default]
    Positional,
    /// Each suspend goes with the earliest unused resume strictly after it.
    Nearest,
}

/// Splits pump history into per-kind buckets in a single pass.
///
/// Boluses and temp basals with a negative amount or rate are dropped.
pub fn classify(events: &[PumpEvent]) -> ClassifiedEvents {
    let mut classified = ClassifiedEvents::default();
    for event in events {
        match event.kind {
            PumpEventKind::Bolus { amount } if amount < Decimal::ZERO => {
                tracing::warn!(
                    timestamp = %event.timestamp,
                    %amount,
                    "negative bolus amount; ignoring"
                );
            }
            PumpEventKind::TempBasal { rate, .. } if rate < Decimal::ZERO => {
                tracing::warn!(
                    timestamp = %event.timestamp,
                    %rate,
                    "negative temp basal rate; ignoring"
                );
            }
            PumpEventKind::Bolus { amount } => classified.boluses.push(Bolus {
                timestamp: event.timestamp,
                amount,
            }),
            PumpEventKind::TempBasal {
                rate,
                duration_minutes,
            } => classified.temp_basals.push(TempBasal {
                timestamp: event.timestamp,
                rate,
                duration_minutes,
            }),
            PumpEventKind::Suspend => classified.suspends.push(event.timestamp),
            PumpEventKind::Resume => classified.resumes.push(event.timestamp),
        }
    }
    classified
}

/// Pairs suspends with resumes.
///
/// Pairs whose resume does not strictly follow the suspend are discarded
/// under either strategy. No timestamp is used in more than one pair.
pub fn pair_suspend_resume(
    suspends: &[DateTime<Utc>],
    resumes: &[DateTime<Utc>],
    strategy: PairingStrategy,
) -> Vec<SuspendPair> {
    let pairs = match strategy {
        PairingStrategy::Positional => suspends
            .iter()
            .zip(resumes)
            .filter(|(suspended_at, resumed_at)| resumed_at > suspended_at)
            .map(|(&suspended_at, &resumed_at)| SuspendPair {
                suspended_at,
                resumed_at,
            })
            .collect(),
        PairingStrategy::Nearest => pair_nearest(suspends, resumes),
    };

    if pairs.len() < suspends.len().max(resumes.len()) {
        tracing::debug!(
            ?strategy,
            suspends = suspends.len(),
            resumes = resumes.len(),
            paired = pairs.len(),
            "some suspend/resume events were left unpaired"
        );
    }
    pairs
}

fn pair_nearest(suspends: &[DateTime<Utc>], resumes: &[DateTime<Utc>]) -> Vec<SuspendPair> {
    let mut suspends = suspends.to_vec();
    let mut resumes = resumes.to_vec();
    suspends.sort_unstable();
    resumes.sort_unstable();

    let mut pairs = Vec::new();
    let mut next_resume = 0;
    for suspended_at in suspends {
        // Resumes at or before this suspend cannot close it or any later one.
        while next_resume < resumes.len() && resumes[next_resume] <= suspended_at {
            next_resume += 1;
        }
        let Some(&resumed_at) = resumes.get(next_resume) else {
            break;
        };
        pairs.push(SuspendPair {
            suspended_at,
            resumed_at,
        });
        next_resume += 1;
    }
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn ts(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 15, 0, 0, 0)
            .single()
            .expect("valid test timestamp")
            + Duration::minutes(minutes)
    }

    fn dec(s: &str) -> Decimal {
        s.parse().expect("valid decimal")
    }

    #[test]
    fn classify_buckets_by_kind_preserving_order() {
        let events = vec![
            PumpEvent::resume(ts(600)),
            PumpEvent::bolus(ts(500), dec("2.5")),
            PumpEvent::temp_basal(ts(480), dec("0.4"), 30),
            PumpEvent::suspend(ts(420)),
            PumpEvent::bolus(ts(60), dec("1")),
        ];

        let classified = classify(&events);
        assert_eq!(
            classified.boluses,
            vec![
                Bolus {
                    timestamp: ts(500),
                    amount: dec("2.5")
                },
                Bolus {
                    timestamp: ts(60),
                    amount: dec("1")
                },
            ]
        );
        assert_eq!(
            classified.temp_basals,
            vec![TempBasal {
                timestamp: ts(480),
                rate: dec("0.4"),
                duration_minutes: 30
            }]
        );
        assert_eq!(classified.suspends, vec![ts(420)]);
        assert_eq!(classified.resumes, vec![ts(600)]);
    }

    #[test]
    fn negative_payloads_are_dropped() {
        let events = vec![
            PumpEvent::bolus(ts(60), dec("-1.5")),
            PumpEvent::bolus(ts(90), dec("2")),
            PumpEvent::temp_basal(ts(120), dec("-0.4"), 30),
            PumpEvent::temp_basal(ts(180), dec("0"), 30),
        ];

        let classified = classify(&events);
        assert_eq!(
            classified.boluses,
            vec![Bolus {
                timestamp: ts(90),
                amount: dec("2")
            }]
        );
        assert_eq!(
            classified.temp_basals,
            vec![TempBasal {
                timestamp: ts(180),
                rate: dec("0"),
                duration_minutes: 30
            }]
        );
    }

    #[test]
    fn positional_pairs_well_formed_history() {
        // Newest first, as the history arrives.
        let suspends = [ts(840), ts(480)];
        let resumes = [ts(900), ts(540)];

        let pairs = pair_suspend_resume(&suspends, &resumes, PairingStrategy::Positional);
        assert_eq!(
            pairs,
            vec![
                SuspendPair {
                    suspended_at: ts(840),
                    resumed_at: ts(900)
                },
                SuspendPair {
                    suspended_at: ts(480),
                    resumed_at: ts(540)
                },
            ]
        );
        assert_eq!(
            pair_suspend_resume(&suspends, &resumes, PairingStrategy::Nearest).len(),
            2
        );
    }

    #[test]
    fn resume_at_or_before_suspend_is_rejected() {
        let pairs = pair_suspend_resume(&[ts(480)], &[ts(480)], PairingStrategy::Positional);
        assert!(pairs.is_empty());

        let pairs = pair_suspend_resume(&[ts(480)], &[ts(420)], PairingStrategy::Positional);
        assert!(pairs.is_empty());

        let pairs = pair_suspend_resume(&[ts(480)], &[ts(420)], PairingStrategy::Nearest);
        assert!(pairs.is_empty());
    }

    #[test]
    fn positional_pairing_loses_interleaved_pairs() {
        // Chronologically: stray resume 07:00, suspend 08:00, resume 08:30, suspend 14:00.
        let suspends = [ts(840), ts(480)];
        let resumes = [ts(510), ts(420)];

        let positional = pair_suspend_resume(&suspends, &resumes, PairingStrategy::Positional);
        assert!(positional.is_empty());

        let nearest = pair_suspend_resume(&suspends, &resumes, PairingStrategy::Nearest);
        assert_eq!(
            nearest,
            vec![SuspendPair {
                suspended_at: ts(480),
                resumed_at: ts(510)
            }]
        );
    }

    #[test]
    fn nearest_never_reuses_a_resume() {
        let suspends = [ts(60), ts(90)];
        let resumes = [ts(120)];

        let pairs = pair_suspend_resume(&suspends, &resumes, PairingStrategy::Nearest);
        assert_eq!(
            pairs,
            vec![SuspendPair {
                suspended_at: ts(60),
                resumed_at: ts(120)
            }]
        );
    }
}
