//! Reviewer selection rules.
//!
//! Both selections scan team members in ascending `user_id` order (the order
//! the store returns them in), which keeps assignments deterministic.

use crate::models::{TeamMember, MAX_REVIEWERS};

/// Pick up to two active members other than the author, in scan order.
///
/// Fewer than two eligible members yields a shorter (possibly empty) list.
pub fn select_initial_reviewers(members: &[TeamMember], author_id: &str) -> Vec<String> {
    members
        .iter()
        .filter(|m| m.is_active && m.user_id != author_id)
        .take(MAX_REVIEWERS)
        .map(|m| m.user_id.clone())
        .collect()
}

/// Pick the first active member who is neither the author, a current
/// reviewer, nor the reviewer being replaced.
pub fn select_replacement<'a>(
    members: &'a [TeamMember],
    author_id: &str,
    current_reviewers: &[String],
    old_reviewer_id: &str,
) -> Option<&'a str> {
    members
        .iter()
        .find(|m| {
            m.is_active
                && m.user_id != author_id
                && m.user_id != old_reviewer_id
                && !current_reviewers.iter().any(|r| *r == m.user_id)
        })
        .map(|m| m.user_id.as_str())
}

/// Swap `old` for `new` in place, keeping the order of the other entries.
pub fn replace_reviewer(reviewers: &[String], old: &str, new: &str) -> Vec<String> {
    reviewers
        .iter()
        .map(|r| if r == old { new.to_string() } else { r.clone() })
        .collect()
}
