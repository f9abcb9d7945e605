//! Dashboard route table and navigation guard.
//!
//! Each page answers to its canonical path and a legacy `.html` alias.
//! Anything unknown resolves to the not-found page. Required roles mirror
//! the API's authorization levels so the guard never offers a page whose
//! data calls would be refused.

#[cfg(test)]
#[path = "routes_test.rs"]
mod routes_test;

use crate::navigation::LOGIN_PATH;
use crate::state::session::{Role, Session};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Home,
    Product,
    Coverage,
    Tests,
    Login,
    NotFound,
}

struct RouteDef {
    route: Route,
    name: &'static str,
    path: &'static str,
    aliases: &'static [&'static str],
    required_role: Option<Role>,
}

const ROUTES: &[RouteDef] = &[
    RouteDef { route: Route::Home, name: "home", path: "/", aliases: &["/index.html"], required_role: None },
    RouteDef {
        route: Route::Product,
        name: "product",
        path: "/product",
        aliases: &["/product.html"],
        required_role: Some(Role::Maintainer),
    },
    RouteDef {
        route: Route::Coverage,
        name: "coverage",
        path: "/coverage",
        aliases: &["/coverage.html"],
        required_role: Some(Role::Tester),
    },
    RouteDef {
        route: Route::Tests,
        name: "tests",
        path: "/tests",
        aliases: &["/tests.html"],
        required_role: Some(Role::Maintainer),
    },
    RouteDef { route: Route::Login, name: "login", path: LOGIN_PATH, aliases: &[], required_role: None },
    RouteDef { route: Route::NotFound, name: "404", path: "/404", aliases: &["/404.html"], required_role: None },
];

impl Route {
    pub const ALL: [Route; 6] =
        [Route::Home, Route::Product, Route::Coverage, Route::Tests, Route::Login, Route::NotFound];

    fn def(self) -> &'static RouteDef {
        // ROUTES holds one entry per variant, in declaration order.
        &ROUTES[self as usize]
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        self.def().name
    }

    /// Canonical path.
    #[must_use]
    pub fn path(self) -> &'static str {
        self.def().path
    }

    #[must_use]
    pub fn aliases(self) -> &'static [&'static str] {
        self.def().aliases
    }

    #[must_use]
    pub fn required_role(self) -> Option<Role> {
        self.def().required_role
    }
}

/// Map a browser path to its route, ignoring query, fragment and a trailing slash.
#[must_use]
pub fn resolve(path: &str) -> Route {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    let path = match path.trim_end_matches('/') {
        "" => "/",
        trimmed => trimmed,
    };
    ROUTES
        .iter()
        .find(|def| def.path == path || def.aliases.iter().any(|a| *a == path))
        .map_or(Route::NotFound, |def| def.route)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardOutcome {
    Allow,
    /// Not signed in; send to the login page.
    Login,
    /// Signed in but lacking the required role.
    Forbidden(Role),
}

/// Whether `session` may open `route`.
#[must_use]
pub fn guard(route: Route, session: &Session) -> GuardOutcome {
    let Some(role) = route.required_role() else {
        return GuardOutcome::Allow;
    };
    if !session.is_logged_in() {
        return GuardOutcome::Login;
    }
    if session.has_role(role) { GuardOutcome::Allow } else { GuardOutcome::Forbidden(role) }
}
