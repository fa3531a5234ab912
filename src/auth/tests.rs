//! Scenario tests of the whole resolution pipeline over a small editorial
//! fixture. The store queries are simulated by building exactly the
//! assignment rows they would return, so these run without a database while
//! still exercising closure walk, candidate assembly, ranking and winner
//! selection together.

use std::collections::HashMap;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::model::{Key, RightType, RightValue};

use super::{
    candidates::{AssignmentRow, Candidate},
    closure,
    resolver::{self, RightsMap, TraceStatus},
};


const ALICE: Key = Key(1);
const BOB: Key = Key(2);

const STAFF: Key = Key(10);
const EDITORS: Key = Key(11);
const PROOFREADERS: Key = Key(12);
const MARKETING: Key = Key(13);

type Assignment = (Key, &'static str, &'static str, Option<&'static str>);

struct Fixture {
    /// user → direct group memberships
    memberships: HashMap<Key, Vec<Key>>,
    /// child group → parent groups
    edges: HashMap<Key, Vec<Key>>,
    /// role name → rights granted by it
    roles: HashMap<&'static str, Vec<(&'static str, RightType, Option<Decimal>)>>,
    /// (user id, login, role, context)
    user_assignments: Vec<Assignment>,
    /// (group id, name, role, context)
    group_assignments: Vec<Assignment>,
}

fn fixture() -> Fixture {
    let boolean = |right| (right, RightType::Boolean, None);
    let range = |right, value| (right, RightType::Range, Some(value));

    Fixture {
        memberships: HashMap::from([
            (ALICE, vec![EDITORS, MARKETING]),
            (BOB, vec![PROOFREADERS]),
        ]),
        // Staff ⊃ Editors ⊃ Proofreaders; Marketing stands alone.
        edges: HashMap::from([
            (EDITORS, vec![STAFF]),
            (PROOFREADERS, vec![EDITORS]),
        ]),
        roles: HashMap::from([
            ("Reader", vec![boolean("view_article")]),
            ("Proofreader", vec![boolean("edit_article")]),
            ("Editor", vec![boolean("publish_article"), range("approve_budget", dec!(2000))]),
            ("Marketing", vec![range("approve_budget", dec!(2500))]),
            ("JuniorManager", vec![range("approve_budget", dec!(1000))]),
            ("Intern", vec![boolean("view_article")]),
        ]),
        user_assignments: vec![
            (ALICE, "alice", "JuniorManager", Some("Beta")),
            (BOB, "bob", "Intern", Some("Omega")),
        ],
        group_assignments: vec![
            (STAFF, "Staff", "Reader", None),
            (PROOFREADERS, "Proofreaders", "Proofreader", None),
            (PROOFREADERS, "Proofreaders", "Proofreader", Some("Alpha")),
            (EDITORS, "Editors", "Editor", Some("Alpha")),
            (MARKETING, "Marketing", "Marketing", Some("Alpha")),
        ],
    }
}

impl Fixture {
    /// What the assignment enumeration query would return: rows matching the
    /// queried context or the Global Context, one per right of the role.
    fn rows(&self, assignments: &[Assignment], context: Option<&str>) -> Vec<AssignmentRow> {
        assignments.iter()
            .filter(|(_, _, _, assigned)| match (assigned, context) {
                (None, _) => true,
                (Some(a), Some(q)) => *a == q,
                (Some(_), None) => false,
            })
            .flat_map(|(id, name, role, assigned)| {
                self.roles[role].iter().map(move |(right, right_type, value)| AssignmentRow {
                    source_id: *id,
                    source_name: (*name).to_owned(),
                    role: (*role).to_owned(),
                    context: assigned.map(str::to_owned),
                    right: (*right).to_owned(),
                    right_type: *right_type,
                    range_value: *value,
                })
            })
            .collect()
    }

    fn candidates(&self, user: Key, context: Option<&str>) -> Vec<Candidate> {
        let direct = self.memberships.get(&user).cloned().unwrap_or_default();
        let (closure, truncated) = closure::walk(&direct, &self.edges);
        assert!(!truncated);

        let own = self.user_assignments.iter()
            .filter(|(id, ..)| *id == user)
            .cloned()
            .collect::<Vec<_>>();
        let user_rows = self.rows(&own, context);
        let group_rows = self.rows(&self.group_assignments, context);

        let masked = context.is_some() && own.iter()
            .any(|(_, _, _, assigned)| *assigned == context);

        resolver::assemble(user_rows, group_rows, &closure, masked)
    }

    fn resolve(&self, user: Key, context: Option<&str>) -> RightsMap {
        resolver::winners(self.candidates(user, context))
    }

    fn explain(&self, user: Key, right: &str, context: Option<&str>) -> resolver::Explanation {
        let mut candidates = self.candidates(user, context);
        candidates.retain(|c| c.right == right);
        resolver::build_explanation(candidates)
    }
}


#[test]
fn view_is_inherited_from_global_reader_via_staff() {
    let rights = fixture().resolve(BOB, Some("Alpha"));
    assert_eq!(rights.get("view_article"), Some(&RightValue::Bool(true)));
}

#[test]
fn editors_can_publish_in_alpha() {
    let rights = fixture().resolve(ALICE, Some("Alpha"));
    assert_eq!(rights.get("publish_article"), Some(&RightValue::Bool(true)));
}

#[test]
fn proofreaders_inherit_publishing_through_editors() {
    let rights = fixture().resolve(BOB, Some("Alpha"));
    assert_eq!(rights.get("publish_article"), Some(&RightValue::Bool(true)));
}

#[test]
fn publishing_does_not_leak_into_beta() {
    let rights = fixture().resolve(ALICE, Some("Beta"));
    assert_eq!(rights.get("publish_article"), None);
}

#[test]
fn direct_user_assignment_wins_in_beta() {
    let rights = fixture().resolve(ALICE, Some("Beta"));
    assert_eq!(rights.get("approve_budget"), Some(&RightValue::Range(dec!(1000))));
    // The direct assignment for Beta is an override: alice's global
    // inheritance (Reader via Staff) does not apply there.
    assert_eq!(rights.get("view_article"), None);
}

#[test]
fn global_proofreader_grants_editing_in_the_global_context() {
    let rights = fixture().resolve(BOB, None);
    assert_eq!(rights.get("edit_article"), Some(&RightValue::Bool(true)));
}

#[test]
fn specific_intern_assignment_overrides_global_editing_in_omega() {
    let rights = fixture().resolve(BOB, Some("Omega"));
    assert_eq!(rights.get("edit_article"), None);
    assert_eq!(rights.get("view_article"), Some(&RightValue::Bool(true)));
}

#[test]
fn budget_tie_in_alpha_goes_to_the_greater_value() {
    let rights = fixture().resolve(ALICE, Some("Alpha"));
    assert_eq!(rights.get("approve_budget"), Some(&RightValue::Range(dec!(2500))));
}

#[test]
fn global_context_query_ignores_specific_assignments() {
    let rights = fixture().resolve(ALICE, None);
    assert_eq!(rights.get("view_article"), Some(&RightValue::Bool(true)));
    assert_eq!(rights.get("publish_article"), None);
    assert_eq!(rights.get("approve_budget"), None);
}

#[test]
fn budget_tie_is_explained() {
    let explanation = fixture().explain(ALICE, "approve_budget", Some("Alpha"));

    assert!(explanation.decision);
    assert_eq!(explanation.value, Some(RightValue::Range(dec!(2500))));
    assert_eq!(
        explanation.reason,
        "Right granted by role 'Marketing' from source 'Marketing' in context 'Alpha'.",
    );

    assert_eq!(explanation.trace.len(), 2);
    assert_eq!(explanation.trace[0].status, TraceStatus::Applied);
    assert_eq!(explanation.trace[0].role, "Marketing");
    assert_eq!(explanation.trace[0].value, RightValue::Range(dec!(2500)));
    assert_eq!(explanation.trace[1].status, TraceStatus::Overridden);
    assert_eq!(explanation.trace[1].role, "Editor");
    assert_eq!(explanation.trace[1].value, RightValue::Range(dec!(2000)));
}

#[test]
fn denied_right_is_explained_as_no_rule() {
    // The global Proofreader rule would grant editing, but bob's direct
    // Intern assignment for Omega overrides the Global Context there.
    let explanation = fixture().explain(BOB, "edit_article", Some("Omega"));
    assert!(!explanation.decision);
    assert_eq!(explanation.value, None);
    assert_eq!(explanation.reason, "No rule found granting this right.");
    assert!(explanation.trace.is_empty());
}
