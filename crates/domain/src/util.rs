use crate::DomainResult;
use crate::error::DomainError;

pub fn require_content_id(content_id: i64) -> DomainResult<i64> {
    if content_id <= 0 {
        return Err(DomainError::InvalidArgument(
            "content_id is required".to_string(),
        ));
    }
    Ok(content_id)
}

pub fn require_user_id(user_id: Option<i64>) -> DomainResult<i64> {
    match user_id {
        Some(user_id) if user_id > 0 => Ok(user_id),
        _ => Err(DomainError::InvalidArgument("user_id is required".to_string())),
    }
}

/// Drops non-positive ids and duplicates while keeping first-seen order.
pub fn normalize_content_ids(content_ids: &[i64]) -> Vec<i64> {
    let mut seen = std::collections::HashSet::with_capacity(content_ids.len());
    content_ids
        .iter()
        .copied()
        .filter(|id| *id > 0 && seen.insert(*id))
        .collect()
}
