//! Route guard
//!
//! Gate for navigation: unauthenticated traffic is redirected to the
//! configured login path with the originally-requested path preserved for
//! the post-login redirect.

use stayport_domain::AuthState;

/// Decision for a navigation attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    /// Let the navigation through
    Allow,
    /// Auth state is still resolving; hold the navigation
    Pending,
    /// Send the visitor to the login page, remembering where they wanted
    /// to go
    RedirectToLogin { login_path: String, return_to: String },
}

/// Navigation gate bound to one login path
#[derive(Debug, Clone)]
pub struct RouteGuard {
    login_path: String,
}

impl RouteGuard {
    #[must_use]
    pub fn new(login_path: String) -> Self {
        Self { login_path }
    }

    /// Decide whether the requested path may be entered under the given
    /// auth state
    #[must_use]
    pub fn check(&self, requested_path: &str, state: &AuthState) -> RouteDecision {
        if state.is_authenticated {
            return RouteDecision::Allow;
        }
        if state.is_loading {
            return RouteDecision::Pending;
        }
        RouteDecision::RedirectToLogin {
            login_path: self.login_path.clone(),
            return_to: requested_path.to_string(),
        }
    }

    /// The configured login path
    #[must_use]
    pub fn login_path(&self) -> &str {
        &self.login_path
    }
}
