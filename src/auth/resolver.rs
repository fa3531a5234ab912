//! Winner selection: the fast path producing the right→value map that gets
//! cached, and the explain path producing an annotated decision trace.

use std::cmp::Ordering;
use std::collections::HashMap;

use serde::Serialize;
use tokio_postgres::GenericClient;

use crate::{
    logger::Logger,
    model::{Key, RightType, RightValue},
    prelude::*,
};

use super::{
    candidates::{self, AssignmentRow, Candidate},
    closure::{self, GroupClosure, MAX_GROUP_DEPTH},
    rank::{self, Specificity},
};


/// The resolved rights of one `(user, context)` pair. A right that is absent
/// is denied; there is no explicit deny.
pub(crate) type RightsMap = HashMap<String, RightValue>;

const NO_RULE_REASON: &str = "No rule found granting this right.";

/// Computes the full rights map for `(user, context)`. This is the cache
/// payload; caching happens in the caller.
pub(crate) async fn resolve(
    db: &impl GenericClient,
    logger: &Logger,
    user: Key,
    context: Option<Key>,
) -> Result<RightsMap> {
    let candidates = enumerate(db, logger, user, context, None).await?;
    Ok(winners(candidates))
}

/// Resolves a single right with a full decision trace.
pub(crate) async fn explain(
    db: &impl GenericClient,
    logger: &Logger,
    user: Key,
    right: &str,
    context: Option<Key>,
) -> Result<Explanation> {
    let candidates = enumerate(db, logger, user, context, Some(right)).await?;
    Ok(build_explanation(candidates))
}

/// Runs the candidate enumeration: group closure, assignment rows from both
/// sources, then assembly into tagged candidates.
async fn enumerate(
    db: &impl GenericClient,
    logger: &Logger,
    user: Key,
    context: Option<Key>,
    right: Option<&str>,
) -> Result<Vec<Candidate>> {
    let (closure, truncated) = closure::load(db, user).await?;
    if truncated {
        logger.warning(db, &format!(
            "group closure of user {user} exceeds the depth bound of {MAX_GROUP_DEPTH}; \
                deeper memberships are ignored",
        )).await;
    }

    let masked = match context {
        Some(context) => {
            candidates::has_direct_context_assignment(db, user, context).await?
        }
        None => false,
    };

    let user_rows = candidates::user_rows(db, user, context, right).await?;
    let group_rows = if closure.is_empty() {
        Vec::new()
    } else {
        let groups = closure.groups().collect::<Vec<_>>();
        candidates::group_rows(db, &groups, context, right).await?
    };

    Ok(assemble(user_rows, group_rows, &closure, masked))
}

/// Pure tail of the enumeration. `masked` is set when the user holds a
/// direct assignment for exactly the queried context; such an assignment is
/// a per-context override, so all Global rules are suppressed.
pub(crate) fn assemble(
    user_rows: Vec<AssignmentRow>,
    group_rows: Vec<AssignmentRow>,
    closure: &GroupClosure,
    masked: bool,
) -> Vec<Candidate> {
    let mut candidates = candidates::from_rows(user_rows, group_rows, closure);
    if masked {
        candidates.retain(Candidate::is_specific);
    }
    candidates
}

/// Picks the winner per right and maps it to its value.
pub(crate) fn winners(candidates: Vec<Candidate>) -> RightsMap {
    use std::collections::hash_map::Entry;

    let mut best: HashMap<String, Candidate> = HashMap::new();
    for candidate in candidates.into_iter().filter(well_formed) {
        match best.entry(candidate.right.clone()) {
            Entry::Occupied(mut current) => {
                if rank::compare(&candidate, current.get()) == Ordering::Less {
                    current.insert(candidate);
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(candidate);
            }
        }
    }

    best.into_iter()
        .map(|(right, candidate)| {
            let value = value_of(&candidate);
            (right, value)
        })
        .collect()
}

/// A range candidate without a stored value cannot occur through the write
/// path; if one shows up anyway, it is dropped rather than invented.
fn well_formed(candidate: &Candidate) -> bool {
    match (candidate.right_type, candidate.range_value) {
        (RightType::Range, None) => {
            warn!(
                "range right '{}' granted by role '{}' carries no value; rule ignored",
                candidate.right, candidate.role,
            );
            false
        }
        _ => true,
    }
}

fn value_of(candidate: &Candidate) -> RightValue {
    match (candidate.right_type, candidate.range_value) {
        (RightType::Boolean, _) => RightValue::Bool(true),
        (RightType::Range, Some(value)) => RightValue::Range(value),
        // Excluded by `well_formed`; still deny-safe if reached.
        (RightType::Range, None) => RightValue::Bool(true),
    }
}


/// How a trace entry related to the decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TraceStatus {
    Applied,
    Overridden,
}

/// One ranked candidate in an explain trace.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceEntry {
    pub source: String,
    pub role: String,
    pub context: String,
    pub value: RightValue,
    /// Packed specificity; see [`Specificity::encode`].
    pub specificity: u16,
    pub status: TraceStatus,
}

/// The outcome of `explain_right`: the decision plus every candidate that
/// took part in it, winner first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Explanation {
    pub decision: bool,
    pub value: Option<RightValue>,
    pub reason: String,
    pub trace: Vec<TraceEntry>,
}

/// Ranks the candidates of a single right and annotates them. The winner is
/// the first trace entry with status `Applied`; the remaining entries follow
/// in ascending specificity order, all `Overridden`.
pub(crate) fn build_explanation(candidates: Vec<Candidate>) -> Explanation {
    let mut candidates = candidates.into_iter()
        .filter(well_formed)
        .collect::<Vec<_>>();
    if candidates.is_empty() {
        return Explanation {
            decision: false,
            value: None,
            reason: NO_RULE_REASON.into(),
            trace: Vec::new(),
        };
    }

    candidates.sort_by(rank::compare);

    let winner = &candidates[0];
    let reason = format!(
        "Right granted by role '{}' from source '{}' in context '{}'.",
        winner.role, winner.source_name, winner.context_name(),
    );
    let value = value_of(winner);

    let trace = candidates.iter()
        .enumerate()
        .map(|(i, candidate)| TraceEntry {
            source: candidate.source_name.clone(),
            role: candidate.role.clone(),
            context: candidate.context_name().to_owned(),
            value: value_of(candidate),
            specificity: Specificity::of(candidate).encode(),
            status: if i == 0 { TraceStatus::Applied } else { TraceStatus::Overridden },
        })
        .collect();

    Explanation { decision: true, value: Some(value), reason, trace }
}


#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use crate::auth::candidates::SourceKind;
    use super::*;

    fn boolean(source_id: i64, role: &str, context: Option<&str>, right: &str) -> Candidate {
        Candidate {
            source_kind: SourceKind::Group,
            source_id: Key(source_id),
            source_name: format!("group{source_id}"),
            role: role.into(),
            context: context.map(Into::into),
            right: right.into(),
            right_type: RightType::Boolean,
            range_value: None,
            distance: 0,
        }
    }

    fn range(
        source_id: i64,
        role: &str,
        context: Option<&str>,
        right: &str,
        value: rust_decimal::Decimal,
    ) -> Candidate {
        Candidate {
            right_type: RightType::Range,
            range_value: Some(value),
            ..boolean(source_id, role, context, right)
        }
    }

    #[test]
    fn empty_candidate_set_denies_everything() {
        assert!(winners(Vec::new()).is_empty());
    }

    #[test]
    fn one_winner_per_right() {
        let map = winners(vec![
            boolean(1, "reader", None, "view"),
            boolean(2, "editor", Some("ctx"), "view"),
            range(1, "manager", Some("ctx"), "budget", dec!(2000)),
            range(2, "marketing", Some("ctx"), "budget", dec!(2500)),
        ]);

        assert_eq!(map.len(), 2);
        assert_eq!(map["view"], RightValue::Bool(true));
        assert_eq!(map["budget"], RightValue::Range(dec!(2500)));
    }

    #[test]
    fn duplicate_candidates_do_not_change_the_winner() {
        let candidate = range(1, "manager", None, "budget", dec!(100));
        let map = winners(vec![candidate.clone(), candidate]);
        assert_eq!(map["budget"], RightValue::Range(dec!(100)));
    }

    #[test]
    fn malformed_range_candidates_are_ignored() {
        let mut broken = range(1, "manager", None, "budget", dec!(1));
        broken.range_value = None;
        assert!(winners(vec![broken]).is_empty());
    }

    #[test]
    fn explanation_of_nothing() {
        let explanation = build_explanation(Vec::new());
        assert!(!explanation.decision);
        assert_eq!(explanation.value, None);
        assert_eq!(explanation.reason, "No rule found granting this right.");
        assert!(explanation.trace.is_empty());
    }

    #[test]
    fn explanation_ranks_and_annotates() {
        let explanation = build_explanation(vec![
            range(1, "editor", Some("Alpha"), "budget", dec!(2000)),
            range(2, "marketing", Some("Alpha"), "budget", dec!(2500)),
        ]);

        assert!(explanation.decision);
        assert_eq!(explanation.value, Some(RightValue::Range(dec!(2500))));
        assert_eq!(
            explanation.reason,
            "Right granted by role 'marketing' from source 'group2' in context 'Alpha'.",
        );
        assert_eq!(explanation.trace.len(), 2);
        assert_eq!(explanation.trace[0].status, TraceStatus::Applied);
        assert_eq!(explanation.trace[0].role, "marketing");
        assert_eq!(explanation.trace[0].specificity, 20);
        assert_eq!(explanation.trace[1].status, TraceStatus::Overridden);
        assert_eq!(explanation.trace[1].role, "editor");
    }

    #[test]
    fn global_candidate_reason_cites_the_global_context() {
        let explanation = build_explanation(vec![boolean(1, "reader", None, "view")]);
        assert_eq!(
            explanation.reason,
            "Right granted by role 'reader' from source 'group1' in context 'Global'.",
        );
    }
}
