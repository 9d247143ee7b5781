use serde::Serialize;

/// Pages reachable without a session. Entries ending in `/*` match a prefix.
pub const DEFAULT_PUBLIC_PATHS: &[&str] = &[
    "/",
    "/confirm",
    "/contact",
    "/reset-password",
    "/update-password",
    "/projects/*",
];

pub const LOGIN_PATH: &str = "/login";
pub const SETUP_PATH: &str = "/setup";
pub const HOME_PATH: &str = "/";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteCategory {
    Public,
    Login,
    Setup,
    Gated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewerState {
    Anonymous,
    /// Signed in but no display name chosen yet.
    IncompleteProfile,
    CompleteProfile,
}

impl ViewerState {
    pub fn from_session(authenticated: bool, display_name: Option<&str>) -> Self {
        if !authenticated {
            return ViewerState::Anonymous;
        }
        match display_name.map(str::trim) {
            Some(name) if !name.is_empty() => ViewerState::CompleteProfile,
            _ => ViewerState::IncompleteProfile,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum PathRule {
    Exact(String),
    Prefix(String),
}

impl PathRule {
    fn parse(raw: &str) -> Self {
        match raw.strip_suffix("/*") {
            Some(prefix) => PathRule::Prefix(format!("{}/", prefix)),
            None => PathRule::Exact(raw.to_string()),
        }
    }

    fn matches(&self, path: &str) -> bool {
        match self {
            PathRule::Exact(exact) => path == exact,
            PathRule::Prefix(prefix) => path.starts_with(prefix.as_str()),
        }
    }
}

/// Decides where a page navigation should go for a given viewer.
#[derive(Debug, Clone)]
pub struct RouteGuard {
    public: Vec<PathRule>,
}

impl Default for RouteGuard {
    fn default() -> Self {
        Self::new(DEFAULT_PUBLIC_PATHS.iter().copied())
    }
}

impl RouteGuard {
    pub fn new<I, S>(public_paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            public: public_paths
                .into_iter()
                .map(|p| PathRule::parse(p.as_ref()))
                .collect(),
        }
    }

    pub fn classify(&self, path: &str) -> RouteCategory {
        let path = normalize(path);
        if path == LOGIN_PATH {
            RouteCategory::Login
        } else if path == SETUP_PATH {
            RouteCategory::Setup
        } else if self.public.iter().any(|rule| rule.matches(&path)) {
            RouteCategory::Public
        } else {
            RouteCategory::Gated
        }
    }

    /// Returns the redirect target, or `None` when the navigation may proceed.
    pub fn resolve(&self, path: &str, viewer: ViewerState) -> Option<&'static str> {
        use RouteCategory::*;
        use ViewerState::*;

        match (viewer, self.classify(path)) {
            (_, Public) => None,
            (Anonymous, Login) => None,
            (Anonymous, Setup | Gated) => Some(LOGIN_PATH),
            (IncompleteProfile, Setup) => None,
            (IncompleteProfile, Login | Gated) => Some(SETUP_PATH),
            (CompleteProfile, Gated) => None,
            (CompleteProfile, Login | Setup) => Some(HOME_PATH),
        }
    }
}

/// Drops query/fragment and a trailing slash so `/login/?next=x` is `/login`.
fn normalize(path: &str) -> String {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}
