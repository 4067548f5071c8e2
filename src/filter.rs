//! Task list filtering.
//!
//! Query-string parameters are parsed into a [`TaskFilter`], whose present
//! criteria are folded into one [`Predicate`] with logical AND. The predicate
//! can be evaluated against a task directly or rendered to SQL by the
//! database layer.

use crate::error::{ApiError, ApiResult};
use crate::patch::Patch;
use crate::types::Task;
use std::collections::HashMap;

pub const PARAM_TITLE_CONT: &str = "titleCont";
pub const PARAM_ASSIGNEE_ID: &str = "assigneeId";
pub const PARAM_STATUS: &str = "status";
pub const PARAM_LABEL_ID: &str = "labelId";

/// Optional criteria accepted by the task list endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskFilter {
    /// Case-insensitive substring of the title. An empty string matches all.
    pub title_cont: Patch<String>,
    pub assignee_id: Patch<i64>,
    /// Status slug.
    pub status: Patch<String>,
    pub label_id: Patch<i64>,
}

impl TaskFilter {
    /// Parse raw query parameters. Unknown parameters are ignored.
    pub fn from_params(params: &HashMap<String, String>) -> ApiResult<Self> {
        let text = |name: &str| match params.get(name) {
            Some(value) => Patch::Present(value.clone()),
            None => Patch::Absent,
        };
        let id = |name: &str| match params.get(name) {
            Some(value) => parse_id(name, value).map(Patch::Present),
            None => Ok(Patch::Absent),
        };

        Ok(Self {
            title_cont: text(PARAM_TITLE_CONT),
            assignee_id: id(PARAM_ASSIGNEE_ID)?,
            status: text(PARAM_STATUS),
            label_id: id(PARAM_LABEL_ID)?,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.title_cont.is_absent()
            && self.assignee_id.is_absent()
            && self.status.is_absent()
            && self.label_id.is_absent()
    }
}

fn parse_id(param: &str, raw: &str) -> ApiResult<i64> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| ApiError::invalid_filter(param, raw))
}

/// A boolean test over a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// Matches every task.
    True,
    /// Title contains the needle, ignoring case (Unicode lowercase).
    TitleContains(String),
    AssigneeIs(i64),
    StatusIs(String),
    /// The task's label set contains this label id.
    HasLabel(i64),
    /// All of the inner predicates hold. Never empty and never nested.
    And(Vec<Predicate>),
}

impl Predicate {
    /// Conjunction. `True` is the identity and nested `And`s are flattened.
    pub fn and(self, other: Predicate) -> Predicate {
        match (self, other) {
            (Predicate::True, p) | (p, Predicate::True) => p,
            (Predicate::And(mut left), Predicate::And(right)) => {
                left.extend(right);
                Predicate::And(left)
            }
            (Predicate::And(mut left), p) => {
                left.push(p);
                Predicate::And(left)
            }
            (p, Predicate::And(right)) => {
                let mut all = Vec::with_capacity(right.len() + 1);
                all.push(p);
                all.extend(right);
                Predicate::And(all)
            }
            (left, right) => Predicate::And(vec![left, right]),
        }
    }

    pub fn matches(&self, task: &Task) -> bool {
        match self {
            Predicate::True => true,
            Predicate::TitleContains(needle) => {
                fold_case(&task.title).contains(&fold_case(needle))
            }
            Predicate::AssigneeIs(id) => task.assignee_id == Some(*id),
            Predicate::StatusIs(slug) => task.status == *slug,
            Predicate::HasLabel(id) => task.label_ids.contains(id),
            Predicate::And(all) => all.iter().all(|p| p.matches(task)),
        }
    }
}

/// Case folding shared by in-memory matching and the SQL `lower_unicode`
/// function.
pub fn fold_case(text: &str) -> String {
    text.to_lowercase()
}

/// Compose the filter into one predicate.
///
/// Criteria are folded left to right in the order title, assignee, status,
/// label. With nothing present the result is [`Predicate::True`].
pub fn build_filter_predicate(filter: &TaskFilter) -> Predicate {
    let criteria = [
        filter.title_cont.as_ref().map(|t| Predicate::TitleContains(t.clone())),
        filter.assignee_id.as_ref().map(|id| Predicate::AssigneeIs(*id)),
        filter.status.as_ref().map(|s| Predicate::StatusIs(s.clone())),
        filter.label_id.as_ref().map(|id| Predicate::HasLabel(*id)),
    ];

    criteria
        .into_iter()
        .filter_map(Patch::into_option)
        .fold(Predicate::True, Predicate::and)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use std::collections::BTreeSet;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn task(id: i64, title: &str, assignee: Option<i64>, status: &str, labels: &[i64]) -> Task {
        Task {
            id,
            index: None,
            title: title.to_string(),
            content: None,
            status: status.to_string(),
            assignee_id: assignee,
            label_ids: labels.iter().copied().collect::<BTreeSet<_>>(),
            created_at: 0,
        }
    }

    fn sample() -> Vec<Task> {
        vec![
            task(1, "Fix ABacus", Some(3), "draft", &[1]),
            task(2, "cabin notes", Some(3), "published", &[2]),
            task(3, "Plan roadmap", Some(4), "draft", &[1, 2]),
            task(4, "Review", None, "to_review", &[]),
        ]
    }

    fn matching_ids(filter: &TaskFilter) -> Vec<i64> {
        let predicate = build_filter_predicate(filter);
        sample()
            .iter()
            .filter(|t| predicate.matches(t))
            .map(|t| t.id)
            .collect()
    }

    #[test]
    fn parse_absent_params() {
        let filter = TaskFilter::from_params(&params(&[("page", "2")])).unwrap();
        assert!(filter.is_empty());
    }

    #[test]
    fn parse_present_params() {
        let filter = TaskFilter::from_params(&params(&[
            ("titleCont", "ab"),
            ("assigneeId", "7"),
            ("status", "draft"),
            ("labelId", " 2 "),
        ]))
        .unwrap();
        assert_eq!(filter.title_cont, Patch::Present("ab".to_string()));
        assert_eq!(filter.assignee_id, Patch::Present(7));
        assert_eq!(filter.status, Patch::Present("draft".to_string()));
        assert_eq!(filter.label_id, Patch::Present(2));
    }

    #[test]
    fn empty_title_is_present_not_absent() {
        let filter = TaskFilter::from_params(&params(&[("titleCont", "")])).unwrap();
        assert_eq!(filter.title_cont, Patch::Present(String::new()));
        assert_eq!(
            build_filter_predicate(&filter),
            Predicate::TitleContains(String::new())
        );
        assert_eq!(matching_ids(&filter), vec![1, 2, 3, 4]);
    }

    #[test]
    fn non_numeric_ids_are_invalid_filter_values() {
        let err = TaskFilter::from_params(&params(&[("assigneeId", "seven")])).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidFilterValue);
        assert_eq!(err.field.as_deref(), Some("assigneeId"));

        let err = TaskFilter::from_params(&params(&[("labelId", "")])).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidFilterValue);
        assert_eq!(err.field.as_deref(), Some("labelId"));
    }

    #[test]
    fn all_absent_matches_everything() {
        let filter = TaskFilter::default();
        assert_eq!(build_filter_predicate(&filter), Predicate::True);
        assert_eq!(matching_ids(&filter), vec![1, 2, 3, 4]);
    }

    #[test]
    fn title_contains_is_case_insensitive() {
        let filter = TaskFilter {
            title_cont: Patch::Present("ab".into()),
            ..Default::default()
        };
        assert_eq!(matching_ids(&filter), vec![1, 2]);
    }

    #[test]
    fn title_contains_folds_non_ascii_case() {
        let privet = task(5, "Привет Мир", None, "draft", &[]);
        let ecole = task(6, "ÉCOLE notes", None, "draft", &[]);

        assert!(Predicate::TitleContains("привет".into()).matches(&privet));
        assert!(Predicate::TitleContains("мир".into()).matches(&privet));
        assert!(Predicate::TitleContains("école".into()).matches(&ecole));
        assert!(!Predicate::TitleContains("école".into()).matches(&privet));
    }

    #[test]
    fn two_criteria_match_the_intersection() {
        let filter = TaskFilter {
            assignee_id: Patch::Present(3),
            status: Patch::Present("draft".into()),
            ..Default::default()
        };
        // Task 2 has only the assignee, task 3 only the status.
        assert_eq!(matching_ids(&filter), vec![1]);
    }

    #[test]
    fn label_membership_uses_the_whole_set() {
        let filter = TaskFilter {
            label_id: Patch::Present(2),
            ..Default::default()
        };
        assert_eq!(matching_ids(&filter), vec![2, 3]);
    }

    #[test]
    fn assignee_scenario() {
        let tasks = [task(1, "a", Some(7), "draft", &[]), task(2, "b", Some(9), "draft", &[])];
        let filter = TaskFilter::from_params(&params(&[("assigneeId", "7")])).unwrap();
        let predicate = build_filter_predicate(&filter);
        let ids: Vec<i64> = tasks.iter().filter(|t| predicate.matches(t)).map(|t| t.id).collect();
        assert_eq!(ids, vec![1]);
    }

    #[test]
    fn fold_order_is_fixed() {
        let filter = TaskFilter {
            title_cont: Patch::Present("x".into()),
            assignee_id: Patch::Present(1),
            status: Patch::Present("draft".into()),
            label_id: Patch::Present(5),
        };
        assert_eq!(
            build_filter_predicate(&filter),
            Predicate::And(vec![
                Predicate::TitleContains("x".into()),
                Predicate::AssigneeIs(1),
                Predicate::StatusIs("draft".into()),
                Predicate::HasLabel(5),
            ])
        );
    }

    #[test]
    fn and_identity_and_flattening() {
        let a = Predicate::AssigneeIs(1);
        assert_eq!(Predicate::True.and(a.clone()), a);
        assert_eq!(a.clone().and(Predicate::True), a);
        let nested = Predicate::HasLabel(1).and(Predicate::And(vec![
            Predicate::AssigneeIs(2),
            Predicate::StatusIs("draft".into()),
        ]));
        assert_eq!(
            nested,
            Predicate::And(vec![
                Predicate::HasLabel(1),
                Predicate::AssigneeIs(2),
                Predicate::StatusIs("draft".into()),
            ])
        );
    }
}
