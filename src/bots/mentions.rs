use rustc_hash::FxHashSet;

/// Outcome of scanning one message for bot triggers.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MentionScan {
    /// Names mentioned as `@<name>`, lowercased, without the `@`.
    pub mentioned: FxHashSet<String>,
    /// The message contained `@all`.
    pub mentions_all: bool,
    /// The message contained the literal word "join"; combined with a
    /// direct mention this invites a non-member bot into the channel.
    pub offers_join: bool,
}

impl MentionScan {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mentioned.is_empty() && !self.mentions_all
    }
}

/// Scan message content for `@name` mentions, `@all`, and join offers.
///
/// Matching is case-insensitive and tolerant of adjacent punctuation
/// ("@curator, please" mentions curator). The scan is roster-agnostic:
/// callers filter `mentioned` against the bots they actually know.
#[must_use]
pub fn scan_mentions(content: &str) -> MentionScan {
    let lowered = content.to_lowercase();
    let mut scan = MentionScan::default();

    for raw in lowered.split_whitespace() {
        let token = raw.trim_matches(|c: char| !c.is_alphanumeric() && c != '@' && c != '_');
        if token == "join" {
            scan.offers_join = true;
        }
        if let Some(name) = token.strip_prefix('@') {
            if name == "all" {
                scan.mentions_all = true;
            } else if !name.is_empty() {
                scan.mentioned.insert(name.to_string());
            }
        }
    }

    scan
}
