//! Per-profile user preferences consulted by eligibility and serving.
//!
//! These model the preference/content-setting collaborators at the
//! engine's boundary: whether preloading is enabled at all, whether
//! scripting is enabled globally, and per-origin script blocks. Checked
//! both at prefetch time and again at serve time, since any of them can
//! change in between.

use std::collections::HashSet;

use url::Url;

/// Mutable per-profile settings.
#[derive(Debug, Clone)]
pub struct ProfileSettings {
    /// Master preloading preference. Off means no prefetch is ever issued.
    pub preloading_enabled: bool,
    /// Global scripting preference. Search result pages require scripting,
    /// so prefetching them is pointless without it.
    pub javascript_enabled: bool,
    blocked_script_origins: HashSet<String>,
}

impl Default for ProfileSettings {
    fn default() -> Self {
        Self { preloading_enabled: true, javascript_enabled: true, blocked_script_origins: HashSet::new() }
    }
}

impl ProfileSettings {
    /// Block scripting for the origin of `url`.
    pub fn block_script_origin(&mut self, url: &Url) {
        self.blocked_script_origins.insert(url.origin().ascii_serialization());
    }

    /// Remove a per-origin script block.
    pub fn allow_script_origin(&mut self, url: &Url) {
        self.blocked_script_origins.remove(&url.origin().ascii_serialization());
    }

    /// Whether a content-setting blocks scripting for this URL's origin.
    pub fn script_blocked_for(&self, url: &Url) -> bool {
        self.blocked_script_origins.contains(&url.origin().ascii_serialization())
    }

    /// Combined check: scripting enabled globally and not blocked for `url`.
    pub fn scripting_allowed_for(&self, url: &Url) -> bool {
        self.javascript_enabled && !self.script_blocked_for(url)
    }
}
