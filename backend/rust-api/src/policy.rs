//! Row-visibility policy, expressed as one shared predicate instead of
//! per-collection filters so the rules cannot drift between call sites.
//! Every read path over pools, questions and reports goes through here.

/// Who is asking. Roles come from the JWT `role` claim; requests without a
/// valid token on optional-auth routes are `Anonymous`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Subject {
    Anonymous,
    User(String),
    Admin(String),
}

impl Subject {
    pub fn is_admin(&self) -> bool {
        matches!(self, Subject::Admin(_))
    }

    /// The acting user's id, if authenticated.
    pub fn user_id(&self) -> Option<&str> {
        match self {
            Subject::Anonymous => None,
            Subject::User(id) | Subject::Admin(id) => Some(id),
        }
    }
}

/// Two-tier visibility: admins see everything, everyone else sees only
/// active resources. For a question, pass `question.is_active && pool.is_active`
/// so the parent pool's flag participates.
///
/// Anonymous visibility is by construction a subset of authenticated
/// visibility: both tiers evaluate the same `is_active` test.
pub fn can_view(subject: &Subject, resource_active: bool) -> bool {
    if subject.is_admin() {
        return true;
    }
    resource_active
}

/// A report is visible to admins and to the user who filed it. A report
/// whose reporter account was removed is admin-only.
pub fn can_view_report(subject: &Subject, reporter_id: Option<&str>) -> bool {
    if subject.is_admin() {
        return true;
    }
    match (subject.user_id(), reporter_id) {
        (Some(me), Some(reporter)) => me == reporter,
        _ => false,
    }
}

/// Only admins move reports through the review workflow.
pub fn can_review_reports(subject: &Subject) -> bool {
    subject.is_admin()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn admin() -> Subject {
        Subject::Admin("admin-1".into())
    }

    fn user() -> Subject {
        Subject::User("user-1".into())
    }

    #[test]
    fn admin_sees_inactive_resources() {
        assert!(can_view(&admin(), false));
        assert!(can_view(&admin(), true));
    }

    #[test]
    fn non_admins_see_only_active_resources() {
        assert!(can_view(&user(), true));
        assert!(!can_view(&user(), false));
        assert!(can_view(&Subject::Anonymous, true));
        assert!(!can_view(&Subject::Anonymous, false));
    }

    #[test]
    fn anonymous_visibility_is_a_subset_of_authenticated() {
        for active in [true, false] {
            if can_view(&Subject::Anonymous, active) {
                assert!(can_view(&user(), active));
            }
        }
    }

    #[test]
    fn report_visible_to_reporter_and_admin_only() {
        assert!(can_view_report(&admin(), Some("user-1")));
        assert!(can_view_report(&admin(), None));
        assert!(can_view_report(&user(), Some("user-1")));
        assert!(!can_view_report(&user(), Some("user-2")));
        assert!(!can_view_report(&user(), None));
        assert!(!can_view_report(&Subject::Anonymous, Some("user-1")));
    }

    #[test]
    fn only_admin_reviews() {
        assert!(can_review_reports(&admin()));
        assert!(!can_review_reports(&user()));
        assert!(!can_review_reports(&Subject::Anonymous));
    }
}
