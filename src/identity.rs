use std::hash::{Hash, Hasher};

use crate::protocol::{ClientRequest, WatchTarget};

/// A file at an optional revision pair.
///
/// Two identities are equal when all three fields are equal; `key()` is the
/// canonical string form used by the connection manager's tables.
#[derive(Debug, Clone)]
pub struct FileIdentity {
    filepath: String,
    prev_revision: Option<String>,
    curr_revision: Option<String>,
    key: String,
}

impl FileIdentity {
    pub fn new(
        filepath: impl Into<String>,
        prev_revision: Option<String>,
        curr_revision: Option<String>,
    ) -> Self {
        let filepath = filepath.into();
        let key = encode_key(&filepath, prev_revision.as_deref(), curr_revision.as_deref());
        Self {
            filepath,
            prev_revision,
            curr_revision,
            key,
        }
    }

    /// Identity for the working copy of a file (no revisions)
    pub fn working(filepath: impl Into<String>) -> Self {
        Self::new(filepath, None, None)
    }

    pub fn filepath(&self) -> &str {
        &self.filepath
    }

    pub fn prev_revision(&self) -> Option<&str> {
        self.prev_revision.as_deref()
    }

    pub fn curr_revision(&self) -> Option<&str> {
        self.curr_revision.as_deref()
    }

    pub fn has_revisions(&self) -> bool {
        self.prev_revision.is_some() || self.curr_revision.is_some()
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Short label for tab strips: file name, plus `prev..curr` when revisions are set
    pub fn label(&self) -> String {
        let name = self
            .filepath
            .rsplit('/')
            .find(|s| !s.is_empty())
            .unwrap_or(&self.filepath);
        if self.has_revisions() {
            format!(
                "{} ({}..{})",
                name,
                self.prev_revision().unwrap_or(""),
                self.curr_revision().unwrap_or("")
            )
        } else {
            name.to_string()
        }
    }

    pub fn to_watch_request(&self) -> ClientRequest {
        ClientRequest::Watch(self.target())
    }

    pub fn to_unwatch_request(&self) -> ClientRequest {
        ClientRequest::Unwatch(self.target())
    }

    fn target(&self) -> WatchTarget {
        WatchTarget {
            filepath: self.filepath.clone(),
            prev_revision: self.prev_revision.clone(),
            curr_revision: self.curr_revision.clone(),
        }
    }
}

impl PartialEq for FileIdentity {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for FileIdentity {}

impl Hash for FileIdentity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

/// Length-prefixed encoding: `<len>:<path>|<rev>|<rev>` where an absent
/// revision is `-` and a present one is `<len>:<label>`. The length prefixes
/// make the encoding injective whatever bytes the fields contain.
fn encode_key(filepath: &str, prev: Option<&str>, curr: Option<&str>) -> String {
    fn field(out: &mut String, value: &str) {
        out.push_str(&value.len().to_string());
        out.push(':');
        out.push_str(value);
    }

    let mut key = String::with_capacity(filepath.len() + 16);
    field(&mut key, filepath);
    for rev in [prev, curr] {
        key.push('|');
        match rev {
            Some(label) => field(&mut key, label),
            None => key.push('-'),
        }
    }
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(path: &str, prev: Option<&str>, curr: Option<&str>) -> FileIdentity {
        FileIdentity::new(path, prev.map(String::from), curr.map(String::from))
    }

    #[test]
    fn same_fields_produce_same_key() {
        let a = id("/repo/src/main.rs", Some("main"), Some("HEAD"));
        let b = id("/repo/src/main.rs", Some("main"), Some("HEAD"));
        assert_eq!(a.key(), b.key());
        assert_eq!(a, b);
    }

    #[test]
    fn keys_distinguish_every_field() {
        let tuples = [
            id("/a.txt", None, None),
            id("/a.txt", Some(""), None),
            id("/a.txt", None, Some("")),
            id("/a.txt", Some(""), Some("")),
            id("/a.txt", Some("main"), None),
            id("/a.txt", None, Some("main")),
            id("/a.txt", Some("main"), Some("HEAD")),
            id("/a.txt", Some("HEAD"), Some("main")),
            id("/b.txt", None, None),
            id("/a.txt|-", None, None),
            id("/a.txt", Some("-|1:x"), None),
            id("/a.txt", Some("-"), Some("1:x")),
        ];
        for (i, a) in tuples.iter().enumerate() {
            for (j, b) in tuples.iter().enumerate() {
                assert_eq!(a.key() == b.key(), i == j, "{:?} vs {:?}", a, b);
            }
        }
    }

    #[test]
    fn delimiter_characters_in_fields_do_not_collide() {
        // Without length prefixes these two would both read "/x|1|2"
        let a = id("/x|1", Some("2"), None);
        let b = id("/x", Some("1|2"), None);
        assert_ne!(a.key(), b.key());
    }

    #[test]
    fn watch_and_unwatch_share_addressing_fields() {
        let ident = id("/repo/lib.rs", Some("abc123"), None);
        let watch = serde_json::to_value(ident.to_watch_request()).unwrap();
        let unwatch = serde_json::to_value(ident.to_unwatch_request()).unwrap();
        assert_eq!(watch["action"], "watch");
        assert_eq!(unwatch["action"], "unwatch");
        for field in ["filepath", "prevRevision", "currRevision"] {
            assert_eq!(watch.get(field), unwatch.get(field));
        }
        assert_eq!(watch["filepath"], "/repo/lib.rs");
        assert_eq!(watch["prevRevision"], "abc123");
        assert!(watch.get("currRevision").is_none());
    }

    #[test]
    fn label_uses_file_name_and_revisions() {
        assert_eq!(id("/repo/src/app.rs", None, None).label(), "app.rs");
        assert_eq!(
            id("/repo/src/app.rs", Some("main"), Some("HEAD")).label(),
            "app.rs (main..HEAD)"
        );
        assert_eq!(id("/repo/dir/", None, None).label(), "dir");
    }

    #[test]
    fn label_with_one_revision_leaves_other_side_blank() {
        let only_prev = id("/repo/a.rs", Some("main"), None);
        assert_eq!(only_prev.prev_revision(), Some("main"));
        assert_eq!(only_prev.curr_revision(), None);
        assert_eq!(only_prev.label(), "a.rs (main..)");
        assert_eq!(id("/repo/a.rs", None, Some("v2")).label(), "a.rs (..v2)");
    }
}
