use super::{DiffHunk, DiffLine, DiffModel, LineKind};

/// Running line numbers inside the hunk being filled
struct Cursor {
    hunk: DiffHunk,
    old: usize,
    new: usize,
}

impl Cursor {
    fn push(&mut self, kind: LineKind, text: &str) {
        let old_line = (kind != LineKind::Add).then_some(self.old);
        let new_line = (kind != LineKind::Remove).then_some(self.new);
        if old_line.is_some() {
            self.old += 1;
        }
        if new_line.is_some() {
            self.new += 1;
        }
        self.hunk.lines.push(DiffLine {
            kind,
            text: text.to_string(),
            old_line,
            new_line,
        });
    }
}

/// Parse the unified diff of one file.
///
/// Everything before the first `@@` header (`diff --git`, `index`, `---`,
/// `+++`, mode lines) is file header and ignored. A later `diff --git`
/// starts a new header block.
pub fn parse_unified(path: &str, raw: &str) -> DiffModel {
    let mut model = DiffModel {
        path: path.to_string(),
        ..DiffModel::default()
    };
    let mut cursor: Option<Cursor> = None;

    for line in raw.lines() {
        if line.starts_with("diff --git") {
            finish(&mut model, cursor.take());
            continue;
        }
        if line.starts_with("@@") {
            finish(&mut model, cursor.take());
            cursor = parse_hunk_header(line).map(|hunk| Cursor {
                old: hunk.old_start,
                new: hunk.new_start,
                hunk,
            });
            continue;
        }
        let Some(cursor) = cursor.as_mut() else {
            continue;
        };

        match line.as_bytes().first() {
            Some(b'+') => {
                cursor.push(LineKind::Add, &line[1..]);
                model.adds += 1;
            }
            Some(b'-') => {
                cursor.push(LineKind::Remove, &line[1..]);
                model.dels += 1;
            }
            Some(b' ') => cursor.push(LineKind::Context, &line[1..]),
            None => cursor.push(LineKind::Context, ""),
            // "\ No newline at end of file" and anything unknown
            Some(_) => {}
        }
    }

    finish(&mut model, cursor);
    model
}

fn finish(model: &mut DiffModel, cursor: Option<Cursor>) {
    if let Some(cursor) = cursor {
        model.hunks.push(cursor.hunk);
    }
}

/// `@@ -10,4 +10,15 @@ fn foo()`
fn parse_hunk_header(line: &str) -> Option<DiffHunk> {
    let rest = line.strip_prefix("@@ ")?;
    let (ranges, context) = rest.split_once(" @@")?;
    let mut ranges = ranges.split_whitespace();
    let (old_start, old_count) = parse_range(ranges.next()?.strip_prefix('-')?)?;
    let (new_start, new_count) = parse_range(ranges.next()?.strip_prefix('+')?)?;

    let mut header = format!("@@ -{},{} +{},{} @@", old_start, old_count, new_start, new_count);
    let context = context.trim();
    if !context.is_empty() {
        header.push(' ');
        header.push_str(context);
    }

    Some(DiffHunk {
        header,
        old_start,
        old_count,
        new_start,
        new_count,
        lines: Vec::new(),
    })
}

/// "start,count", or "start" alone meaning a count of 1
fn parse_range(s: &str) -> Option<(usize, usize)> {
    match s.split_once(',') {
        Some((start, count)) => Some((start.parse().ok()?, count.parse().ok()?)),
        None => Some((s.parse().ok()?, 1)),
    }
}
