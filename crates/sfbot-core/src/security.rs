use crate::domain::UserId;

// ============== Authorization ==============

/// Allow-list check for restricted commands.
///
/// An empty allow-list disables the restriction.
pub fn is_authorized(user_id: Option<UserId>, allowed_users: &[i64]) -> bool {
    if allowed_users.is_empty() {
        return true;
    }
    let Some(user_id) = user_id else {
        return false;
    };
    allowed_users.contains(&user_id.0)
}

/// Guard placed in front of every restricted command handler.
#[derive(Clone, Debug)]
pub struct AccessGuard {
    allowed_users: Vec<i64>,
}

impl AccessGuard {
    pub fn new(allowed_users: Vec<i64>) -> Self {
        Self { allowed_users }
    }

    pub fn is_unrestricted(&self) -> bool {
        self.allowed_users.is_empty()
    }

    /// Returns `true` when `user_id` may run `command`. Denials are logged at
    /// debug level only; nothing is sent back to the caller.
    pub fn permit(&self, user_id: Option<UserId>, command: &str) -> bool {
        let ok = is_authorized(user_id, &self.allowed_users);
        if !ok {
            tracing::debug!(
                user_id = user_id.map(|u| u.0),
                command,
                "unauthorized access denied"
            );
        }
        ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_allow_list_permits_everyone() {
        assert!(is_authorized(Some(UserId(1)), &[]));
        assert!(is_authorized(Some(UserId(-5)), &[]));
        assert!(is_authorized(None, &[]));
    }

    #[test]
    fn non_empty_allow_list_is_exact_membership() {
        let allowed = [42, 7];
        assert!(is_authorized(Some(UserId(42)), &allowed));
        assert!(is_authorized(Some(UserId(7)), &allowed));
        assert!(!is_authorized(Some(UserId(43)), &allowed));
        assert!(!is_authorized(None, &allowed));
    }

    #[test]
    fn guard_denies_deterministically() {
        let guard = AccessGuard::new(vec![42]);
        for id in [0, 1, 41, 43, i64::MAX, i64::MIN] {
            assert!(!guard.permit(Some(UserId(id)), "upload"));
            assert!(!guard.permit(Some(UserId(id)), "upload"));
        }
        assert!(guard.permit(Some(UserId(42)), "link"));
        assert!(!guard.is_unrestricted());
        assert!(AccessGuard::new(vec![]).is_unrestricted());
    }
}
