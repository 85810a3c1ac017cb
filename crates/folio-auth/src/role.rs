//! Roles and the state published to the presentation layer

use serde::Serialize;

/// Two-valued authorization role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// The single allow-listed identity
    Owner,
    /// Everyone else, signed in or not
    #[default]
    NonOwner,
}

impl Role {
    /// Check if this is the owner role
    #[inline]
    #[must_use]
    pub fn is_owner(self) -> bool {
        matches!(self, Role::Owner)
    }
}

/// Proof that the holder resolved to [`Role::Owner`]
///
/// Only obtainable from an owner [`AuthState`] or [`RoleState`]; mutating
/// entry points take or check this instead of comparing roles themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteCapability {
    _private: (),
}

/// Output of the authorization resolver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct AuthState {
    /// Resolved role
    pub role: Role,
    /// Whether a currently-valid assertion exists (or the viewer UX flag applies)
    pub authenticated: bool,
}

impl AuthState {
    /// No identity at all
    #[inline]
    #[must_use]
    pub fn signed_out() -> Self {
        Self {
            role: Role::NonOwner,
            authenticated: false,
        }
    }

    /// Write capability, if this state is an owner
    #[inline]
    #[must_use]
    pub fn write_capability(&self) -> Option<WriteCapability> {
        (self.role.is_owner() && self.authenticated).then_some(WriteCapability { _private: () })
    }
}

/// Role as observed by the presentation layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RoleState {
    /// Resolved role
    pub role: Role,
    /// Authenticated flag (see [`AuthState::authenticated`])
    pub authenticated: bool,
    /// True until the first session event has been handled
    pub loading: bool,
}

impl RoleState {
    /// Initial state before the provider has reported
    #[inline]
    #[must_use]
    pub fn loading() -> Self {
        Self {
            role: Role::NonOwner,
            authenticated: false,
            loading: true,
        }
    }

    /// Settled state from a resolver decision
    #[inline]
    #[must_use]
    pub fn settled(auth: AuthState) -> Self {
        Self {
            role: auth.role,
            authenticated: auth.authenticated,
            loading: false,
        }
    }

    /// Resolver view of this state
    #[inline]
    #[must_use]
    pub fn auth(&self) -> AuthState {
        AuthState {
            role: self.role,
            authenticated: self.authenticated,
        }
    }

    /// Write capability, if this state is an owner
    #[inline]
    #[must_use]
    pub fn capability(&self) -> Option<WriteCapability> {
        self.auth().write_capability()
    }
}

impl Default for RoleState {
    fn default() -> Self {
        Self::loading()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_authenticated_owner_gets_capability() {
        let owner = AuthState {
            role: Role::Owner,
            authenticated: true,
        };
        assert!(owner.write_capability().is_some());

        assert!(AuthState::signed_out().write_capability().is_none());

        let viewer = AuthState {
            role: Role::NonOwner,
            authenticated: true,
        };
        assert!(viewer.write_capability().is_none());

        // Inconsistent state never grants
        let odd = AuthState {
            role: Role::Owner,
            authenticated: false,
        };
        assert!(odd.write_capability().is_none());
    }

    #[test]
    fn loading_state_is_non_owner() {
        let state = RoleState::default();
        assert!(state.loading);
        assert_eq!(state.role, Role::NonOwner);
        assert!(state.capability().is_none());
    }

    #[test]
    fn role_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&Role::NonOwner).unwrap(), "\"non_owner\"");
    }
}
