//! Authorization gate: the consumer-facing check used by policy middleware.
//!
//! The gate turns declared policies into allow/deny answers for a request's
//! principal. It knows nothing about HTTP; callers map [`AuthzError`] onto
//! their transport (typically a 403).

use std::sync::Arc;

use tracing::debug;

use warden_core::Specifier;

use crate::{AuthzError, Principal, Role, RuleLibrary};

/// A declared access requirement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Policy {
    /// Any one of the specifiers must authorize the principal.
    HasAuthorization(Vec<Specifier>),
    /// The principal must hold any one of the roles.
    HasRole(Vec<Role>),
}

impl Policy {
    pub fn has_authorization<I>(specifiers: I) -> Result<Self, AuthzError>
    where
        I: IntoIterator<Item = Specifier>,
    {
        let specifiers: Vec<Specifier> = specifiers.into_iter().collect();
        if specifiers.is_empty() {
            return Err(AuthzError::EmptyPolicy("specifier"));
        }
        Ok(Policy::HasAuthorization(specifiers))
    }

    pub fn has_role<I, R>(roles: I) -> Result<Self, AuthzError>
    where
        I: IntoIterator<Item = R>,
        R: Into<Role>,
    {
        let roles: Vec<Role> = roles.into_iter().map(Into::into).collect();
        if roles.is_empty() {
            return Err(AuthzError::EmptyPolicy("role"));
        }
        Ok(Policy::HasRole(roles))
    }
}

/// Checks principals against policies using a shared [`RuleLibrary`].
///
/// Holders of the administrator role pass every policy.
#[derive(Debug, Clone)]
pub struct AuthorizationGate {
    library: Arc<RuleLibrary>,
    admin_role: Role,
}

impl AuthorizationGate {
    pub fn new(library: Arc<RuleLibrary>) -> Self {
        Self {
            library,
            admin_role: Role::new(Role::ADMIN),
        }
    }

    pub fn with_admin_role(mut self, role: impl Into<Role>) -> Self {
        self.admin_role = role.into();
        self
    }

    pub fn library(&self) -> &Arc<RuleLibrary> {
        &self.library
    }

    /// Plain rule decision, no administrator bypass.
    pub fn authorize(&self, principal: &Principal, specifier: &Specifier) -> bool {
        self.library.authorize(principal, specifier)
    }

    /// Enforce a single specifier (`?`-friendly).
    pub fn require(&self, principal: &Principal, specifier: &Specifier) -> Result<(), AuthzError> {
        if self.is_admin(principal) || self.authorize(principal, specifier) {
            Ok(())
        } else {
            Err(AuthzError::Forbidden(specifier.to_string()))
        }
    }

    /// Enforce a policy for a possibly unauthenticated request.
    pub fn check(&self, principal: Option<&Principal>, policy: &Policy) -> Result<(), AuthzError> {
        let principal = principal.ok_or(AuthzError::Unauthenticated)?;
        if self.is_admin(principal) {
            debug!(admin_role = %self.admin_role, "policy passed by administrator role");
            return Ok(());
        }

        match policy {
            Policy::HasAuthorization(specifiers) => {
                if specifiers.iter().any(|s| self.authorize(principal, s)) {
                    Ok(())
                } else {
                    Err(AuthzError::Forbidden(
                        specifiers
                            .iter()
                            .map(ToString::to_string)
                            .collect::<Vec<_>>()
                            .join(", "),
                    ))
                }
            }
            Policy::HasRole(roles) => {
                if roles.iter().any(|r| principal.has_role(r.as_str())) {
                    Ok(())
                } else {
                    Err(AuthzError::MissingRole(
                        roles.iter().map(|r| r.as_str().to_string()).collect(),
                    ))
                }
            }
        }
    }

    fn is_admin(&self, principal: &Principal) -> bool {
        principal.has_role(self.admin_role.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Rule;

    fn spec(raw: &str) -> Specifier {
        Specifier::parse(raw).unwrap()
    }

    fn gate() -> AuthorizationGate {
        let library = Arc::new(RuleLibrary::default());
        library.add_rule(&Rule::deny(spec("user.write")).for_role("user"));
        library.add_rule(&Rule::deny(spec("user.read")).for_role("user"));
        AuthorizationGate::new(library)
    }

    #[test]
    fn empty_policies_are_rejected() {
        assert_eq!(
            Policy::has_authorization(Vec::new()).unwrap_err(),
            AuthzError::EmptyPolicy("specifier")
        );
        assert!(Policy::has_role(Vec::<Role>::new()).is_err());
    }

    #[test]
    fn unauthenticated_requests_fail_every_policy() {
        let policy = Policy::has_role(["developer"]).unwrap();
        assert_eq!(gate().check(None, &policy), Err(AuthzError::Unauthenticated));
    }

    #[test]
    fn any_listed_specifier_is_enough() {
        let gate = gate();
        let user = Principal::with_roles(["user"]);

        let denied = Policy::has_authorization([spec("user.write"), spec("user.read")]).unwrap();
        assert!(matches!(gate.check(Some(&user), &denied), Err(AuthzError::Forbidden(_))));

        let mixed = Policy::has_authorization([spec("user.write"), spec("user.list")]).unwrap();
        assert_eq!(gate.check(Some(&user), &mixed), Ok(()));
    }

    #[test]
    fn admin_role_bypasses_rules() {
        let gate = gate();
        let admin = Principal::with_roles(["user", "admin"]);
        assert_eq!(gate.require(&admin, &spec("user.write")), Ok(()));
        assert!(!gate.authorize(&admin, &spec("user.write")));

        let custom = gate.clone().with_admin_role("root");
        assert!(custom.require(&admin, &spec("user.write")).is_err());
    }

    #[test]
    fn role_policy_checks_membership() {
        let gate = gate();
        let policy = Policy::has_role(["developer"]).unwrap();
        assert_eq!(gate.check(Some(&Principal::with_roles(["developer"])), &policy), Ok(()));
        assert_eq!(
            gate.check(Some(&Principal::with_roles(["user"])), &policy),
            Err(AuthzError::MissingRole(vec!["developer".to_string()]))
        );
    }
}
