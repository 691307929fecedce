//! Core reference types.

use chron_types::{Identity, ObjectId, Signature};

/// The state of HEAD: either symbolic (pointing to a branch) or detached.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Head {
    /// HEAD points to a branch by name.
    Symbolic(String),
    /// HEAD is detached, pointing directly at a commit.
    Detached(ObjectId),
}

impl Head {
    /// The branch HEAD names, if it is symbolic.
    pub fn branch(&self) -> Option<&str> {
        match self {
            Head::Symbolic(name) => Some(name),
            Head::Detached(_) => None,
        }
    }

    /// Serialized form of the HEAD file.
    pub fn to_file_contents(&self) -> String {
        match self {
            Head::Symbolic(branch) => format!("ref: refs/heads/{branch}\n"),
            Head::Detached(id) => format!("{id}\n"),
        }
    }

    pub fn parse(contents: &str) -> Option<Self> {
        let contents = contents.trim();
        match contents.strip_prefix("ref: refs/heads/") {
            Some(branch) if !branch.is_empty() => Some(Head::Symbolic(branch.to_string())),
            Some(_) => None,
            None => ObjectId::from_hex(contents).ok().map(Head::Detached),
        }
    }
}

/// One ref creation or move, as recorded in the ref log.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RefLogEntry {
    /// `None` when the ref was created.
    pub old: Option<ObjectId>,
    pub new: ObjectId,
    pub committer: Signature,
    pub message: String,
}

impl RefLogEntry {
    /// `<old> <new> <Name> <<email>> <secs> <+hhmm>\t<message>`
    ///
    /// A created ref logs the null id as `old`. Line breaks in the message are
    /// folded to spaces so each entry stays on one line.
    pub fn to_line(&self) -> String {
        let old = self.old.unwrap_or_else(ObjectId::null);
        let message = self.message.replace(['\r', '\n'], " ");
        format!("{old} {} {}\t{message}\n", self.new, self.committer)
    }

    pub fn parse_line(line: &str) -> Option<Self> {
        let (head, message) = line.trim_end_matches('\n').split_once('\t')?;
        let (old, rest) = head.split_once(' ')?;
        let (new, signature) = rest.split_once(' ')?;
        let old = ObjectId::from_hex(old).ok()?;
        Some(Self {
            old: (!old.is_null()).then_some(old),
            new: ObjectId::from_hex(new).ok()?,
            committer: parse_signature(signature)?,
            message: message.to_string(),
        })
    }
}

/// Parse the `Display` form of a [`Signature`]: `Name <email> secs +hhmm`.
fn parse_signature(s: &str) -> Option<Signature> {
    let open = s.find('<')?;
    let close = open + s[open..].find('>')?;
    let name = s[..open].trim_end().to_string();
    let email = s[open + 1..close].to_string();
    let mut tail = s[close + 1..].split_whitespace();
    let seconds: i64 = tail.next()?.parse().ok()?;
    let tz = tail.next()?;
    let sign = match tz.as_bytes().first()? {
        b'+' => 1,
        b'-' => -1,
        _ => return None,
    };
    let digits = tz.get(1..5)?;
    let hours: i32 = digits[..2].parse().ok()?;
    let minutes: i32 = digits[2..].parse().ok()?;
    let when = Signature::timestamp_from_parts(seconds, sign * (hours * 60 + minutes)).ok()?;
    Some(Signature::at(Identity::new(name, email), when))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn committer() -> Signature {
        let when = Signature::timestamp_from_parts(1_700_000_000, -90).unwrap();
        Signature::at(Identity::new("Sync Bot", "bot@example.com"), when)
    }

    #[test]
    fn head_file_contents() {
        let head = Head::Symbolic("main".into());
        assert_eq!(head.to_file_contents(), "ref: refs/heads/main\n");
        assert_eq!(Head::parse("ref: refs/heads/main\n"), Some(head));

        let id = ObjectId::from_bytes(b"commit");
        assert_eq!(Head::parse(&id.to_hex()), Some(Head::Detached(id)));
        assert_eq!(Head::parse("ref: refs/heads/"), None);
        assert_eq!(Head::parse("garbage"), None);
    }

    #[test]
    fn reflog_line_for_created_ref() {
        let entry = RefLogEntry {
            old: None,
            new: ObjectId::from_bytes(b"c1"),
            committer: committer(),
            message: "initial import".into(),
        };
        let line = entry.to_line();
        assert!(line.starts_with(&"0".repeat(64)));
        assert!(line.contains("Sync Bot <bot@example.com> 1700000000 -0130\tinitial import"));
        assert_eq!(RefLogEntry::parse_line(&line), Some(entry));
    }

    #[test]
    fn reflog_message_is_single_line() {
        let entry = RefLogEntry {
            old: Some(ObjectId::from_bytes(b"c1")),
            new: ObjectId::from_bytes(b"c2"),
            committer: committer(),
            message: "alter table\nadd column".into(),
        };
        let line = entry.to_line();
        assert_eq!(line.matches('\n').count(), 1);
        let parsed = RefLogEntry::parse_line(&line).unwrap();
        assert_eq!(parsed.message, "alter table add column");
        assert_eq!(parsed.old, entry.old);
    }

    #[test]
    fn malformed_reflog_line() {
        assert!(RefLogEntry::parse_line("not a reflog line").is_none());
    }
}
