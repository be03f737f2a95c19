//! Static role-scoped route table.
//!
//! Which roles may enter which path prefixes, and where each role lands by
//! default. Nothing here changes at runtime.

use suscridash_types::Role;

pub const ROOT_PATH: &str = "/";
pub const LOGIN_PATH: &str = "/login";
pub const REGISTER_PATH: &str = "/register";
pub const ADMIN_LANDING: &str = "/admin/dashboard";
pub const BUSINESS_LANDING: &str = "/business/dashboard";
pub const CUSTOMER_LANDING: &str = "/suscripciones";

const ANY_AUTHENTICATED: &[Role] = &Role::KNOWN;

/// Who may enter a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteAccess {
    /// Open to everyone, signed in or not
    Public,
    /// The application root; sends every visitor where they belong
    Entry,
    /// Restricted to the listed roles
    Roles(&'static [Role]),
}

#[derive(Debug, Clone, Copy)]
pub struct RouteRule {
    pub prefix: &'static str,
    pub access: RouteAccess,
}

const ROUTES: &[RouteRule] = &[
    RouteRule {
        prefix: LOGIN_PATH,
        access: RouteAccess::Public,
    },
    RouteRule {
        prefix: REGISTER_PATH,
        access: RouteAccess::Public,
    },
    RouteRule {
        prefix: "/admin",
        access: RouteAccess::Roles(&[Role::Admin]),
    },
    RouteRule {
        prefix: "/business",
        access: RouteAccess::Roles(&[Role::Business]),
    },
    RouteRule {
        prefix: "/suscripciones",
        access: RouteAccess::Roles(&[Role::Customer]),
    },
    RouteRule {
        prefix: "/mi-suscripcion",
        access: RouteAccess::Roles(&[Role::Customer]),
    },
    RouteRule {
        prefix: "/home",
        access: RouteAccess::Roles(ANY_AUTHENTICATED),
    },
];

/// Default landing of a role. Unknown roles land on the login screen.
pub fn landing(role: Role) -> &'static str {
    match role {
        Role::Admin => ADMIN_LANDING,
        Role::Business => BUSINESS_LANDING,
        Role::Customer => CUSTOMER_LANDING,
        Role::Unknown => LOGIN_PATH,
    }
}

/// Strip query and fragment, collapse repeated and trailing slashes.
pub fn normalize(destination: &str) -> String {
    let path = destination
        .split(['?', '#'])
        .next()
        .unwrap_or_default()
        .trim();
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    format!("/{}", segments.join("/"))
}

fn covers(prefix: &str, path: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// Access rule for a normalized path.
///
/// The longest covering prefix wins; paths no rule covers are open to any
/// authenticated role, never public.
pub fn access_for(path: &str) -> RouteAccess {
    if path == ROOT_PATH {
        return RouteAccess::Entry;
    }
    ROUTES
        .iter()
        .filter(|rule| covers(rule.prefix, path))
        .max_by_key(|rule| rule.prefix.len())
        .map(|rule| rule.access)
        .unwrap_or(RouteAccess::Roles(ANY_AUTHENTICATED))
}

/// Whether `role` may enter `path`. Pure; unknown roles are never permitted
/// anywhere but public routes.
pub fn permits(role: Role, path: &str) -> bool {
    match access_for(path) {
        RouteAccess::Public => true,
        RouteAccess::Entry => false,
        RouteAccess::Roles(roles) => role.is_known() && roles.contains(&role),
    }
}
