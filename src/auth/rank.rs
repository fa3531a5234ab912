//! The specificity order deciding which candidate wins a right.

use std::cmp::Ordering;

use crate::model::RightType;

use super::candidates::{Candidate, SourceKind};


/// Total-order specificity key for a candidate; **smaller is stronger**.
///
/// The derived ordering is lexicographic over the fields, in declaration
/// order: a rule for the queried context beats any Global rule, a direct
/// user assignment beats any group assignment, and a nearer group beats a
/// farther one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Specificity {
    context_bucket: u8,
    source_bucket: u8,
    distance: u8,
}

impl Specificity {
    pub(crate) fn of(candidate: &Candidate) -> Self {
        Self {
            context_bucket: if candidate.is_specific() { 0 } else { 1 },
            source_bucket: match candidate.source_kind {
                SourceKind::User => 1,
                SourceKind::Group => 2,
            },
            // The closure bound keeps distances at most 10.
            distance: candidate.distance.min(u8::MAX.into()) as u8,
        }
    }

    /// Packed integer form, as shown in explain traces. The multipliers
    /// exceed the maximum of the lower dimensions, so the packed order is
    /// the lexicographic order.
    pub fn encode(self) -> u16 {
        u16::from(self.context_bucket) * 100
            + u16::from(self.source_bucket) * 10
            + u16::from(self.distance)
    }
}

/// Compares two candidates for the same right; `Less` means `a` wins.
pub(crate) fn compare(a: &Candidate, b: &Candidate) -> Ordering {
    Specificity::of(a).cmp(&Specificity::of(b)).then_with(|| tie_break(a, b))
}

/// Tie policy for candidates of equal specificity. Range rights are won by
/// the greater raw value; boolean ties are immaterial (every candidate
/// implies `true`) but still ordered deterministically. Equal range values
/// fall back to the same deterministic order.
fn tie_break(a: &Candidate, b: &Candidate) -> Ordering {
    let stable = || (a.source_id, &a.role).cmp(&(b.source_id, &b.role));
    match a.right_type {
        RightType::Range => b.range_value.cmp(&a.range_value).then_with(stable),
        RightType::Boolean => stable(),
    }
}


#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use crate::model::Key;
    use super::*;

    fn candidate(
        source_kind: SourceKind,
        source_id: i64,
        role: &str,
        context: Option<&str>,
        distance: u32,
    ) -> Candidate {
        Candidate {
            source_kind,
            source_id: Key(source_id),
            source_name: "src".into(),
            role: role.into(),
            context: context.map(Into::into),
            right: "some_right".into(),
            right_type: RightType::Boolean,
            range_value: None,
            distance,
        }
    }

    fn range_candidate(source_id: i64, value: rust_decimal::Decimal) -> Candidate {
        Candidate {
            right_type: RightType::Range,
            range_value: Some(value),
            ..candidate(SourceKind::Group, source_id, "role", Some("ctx"), 1)
        }
    }

    #[test]
    fn encoding_packs_the_triple() {
        let user_specific = candidate(SourceKind::User, 1, "r", Some("ctx"), 0);
        let group_specific = candidate(SourceKind::Group, 1, "r", Some("ctx"), 3);
        let user_global = candidate(SourceKind::User, 1, "r", None, 0);
        let group_global = candidate(SourceKind::Group, 1, "r", None, 10);

        assert_eq!(Specificity::of(&user_specific).encode(), 10);
        assert_eq!(Specificity::of(&group_specific).encode(), 23);
        assert_eq!(Specificity::of(&user_global).encode(), 110);
        assert_eq!(Specificity::of(&group_global).encode(), 130);
    }

    #[test]
    fn context_dominates_source_and_distance() {
        // A far-away group in the right context still beats a direct user
        // assignment that only applies globally.
        let far_group_specific = candidate(SourceKind::Group, 1, "r", Some("ctx"), 10);
        let user_global = candidate(SourceKind::User, 2, "r", None, 0);
        assert_eq!(compare(&far_group_specific, &user_global), Ordering::Less);
    }

    #[test]
    fn user_beats_group_within_a_context_bucket() {
        let user = candidate(SourceKind::User, 1, "r", None, 0);
        let group = candidate(SourceKind::Group, 2, "r", None, 0);
        assert_eq!(compare(&user, &group), Ordering::Less);
    }

    #[test]
    fn nearer_group_beats_farther_group() {
        let near = candidate(SourceKind::Group, 1, "r", None, 1);
        let far = candidate(SourceKind::Group, 2, "r", None, 2);
        assert_eq!(compare(&near, &far), Ordering::Less);
    }

    #[test]
    fn range_ties_go_to_the_greater_value() {
        let low = range_candidate(1, dec!(2000));
        let high = range_candidate(2, dec!(2500));
        assert_eq!(compare(&high, &low), Ordering::Less);
        assert_eq!(compare(&low, &high), Ordering::Greater);
    }

    #[test]
    fn equal_range_values_order_by_source_and_role() {
        let a = range_candidate(1, dec!(2000));
        let b = range_candidate(2, dec!(2000));
        assert_eq!(compare(&a, &b), Ordering::Less);
    }

    #[test]
    fn boolean_ties_are_deterministic() {
        let a = candidate(SourceKind::Group, 1, "alpha", None, 1);
        let b = candidate(SourceKind::Group, 1, "beta", None, 1);
        assert_eq!(compare(&a, &b), Ordering::Less);
        assert_eq!(compare(&b, &a), Ordering::Greater);
    }
}
