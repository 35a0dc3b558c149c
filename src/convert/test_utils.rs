use crate::cvs::{RawFile, RawRevision};

pub(crate) struct FileBuilder {
    raw: RawFile,
}

pub(crate) fn file(path: &str) -> FileBuilder {
    FileBuilder {
        raw: RawFile {
            path: path.into(),
            executable: false,
            symbols: Vec::new(),
            revs: Vec::new(),
        },
    }
}

impl FileBuilder {
    pub(crate) fn rev(self, number: &str, time: i64, log: &str) -> Self {
        self.push(number, time, "joe", log, false)
    }

    pub(crate) fn dead(self, number: &str, time: i64, log: &str) -> Self {
        self.push(number, time, "joe", log, true)
    }

    pub(crate) fn rev_by(self, number: &str, time: i64, author: &str, log: &str) -> Self {
        self.push(number, time, author, log, false)
    }

    pub(crate) fn commit_id(mut self, commit_id: &str) -> Self {
        if let Some(last) = self.raw.revs.last_mut() {
            last.commit_id = Some(commit_id.into());
        }
        self
    }

    pub(crate) fn sym(mut self, name: &str, number: &str) -> Self {
        self.raw.symbols.push((name.into(), number.into()));
        self
    }

    pub(crate) fn build(self) -> RawFile {
        self.raw
    }

    fn push(mut self, number: &str, time: i64, author: &str, log: &str, dead: bool) -> Self {
        self.raw.revs.push(RawRevision {
            number: number.into(),
            author: author.into(),
            time,
            log: log.into(),
            dead,
            commit_id: None,
            content: format!("{} {number}\n", self.raw.path),
        });
        self
    }
}

const T0: i64 = 1_041_379_200;

/// A repository with a vendor import, tags and branches on mixed
/// revisions, and a branch created, abandoned and re-created on some files
/// (git's t9602 "pathological tags" fixture).
pub(crate) fn pathological_tags() -> Vec<RawFile> {
    const INIT: &str = "Initial revision";
    const IMPORT: &str = "Import (vendorbranch).";
    const ALL_CHANGE: &str = "Commit on trunk.";
    // Committed from a working copy with mixed sticky tags.
    const STRADDLE: &str = "Commit on trunk and branch B_MIXED.";

    let initial = |path: &str, all: bool| {
        let builder = file(path)
            .rev("1.1", T0, INIT)
            .rev("1.1.1.1", T0, IMPORT)
            .sym("vendorbranch", "1.1.1")
            .sym("vendortag", "1.1.1.1")
            .sym("T_ALL_INITIAL_FILES", "1.1")
            .sym("B_FROM_INITIALS", "1.1.0.2");
        if all {
            builder
                .sym("T_ALL_INITIAL_FILES_BUT_ONE", "1.1")
                .sym("B_FROM_INITIALS_BUT_ONE", "1.1.0.4")
        } else {
            builder
        }
    };

    vec![
        initial("default", true)
            .rev("1.2", T0 + 200, ALL_CHANGE)
            .rev("1.2.2.1", T0 + 400, "Commit on branch B_MIXED.")
            .rev("1.2.4.1", T0 + 600, "Commit on branch B_SPLIT.")
            .sym("T_MIXED", "1.2")
            .sym("B_MIXED", "1.2.0.2")
            .sym("B_SPLIT", "1.2.0.4")
            .build(),
        initial("sub1/default", true)
            .rev("1.2", T0 + 200, ALL_CHANGE)
            .rev("1.2.2.1", T0 + 400, "Commit on branch B_MIXED.")
            .rev("1.2.4.1", T0 + 600, "Commit on branch B_SPLIT.")
            .sym("T_MIXED", "1.2")
            .sym("B_MIXED", "1.2.0.2")
            .sym("B_SPLIT", "1.2.0.4")
            .build(),
        initial("sub1/subsubA/default", true)
            .rev("1.2", T0 + 100, "Change on trunk.")
            .rev("1.3", T0 + 200, ALL_CHANGE)
            .rev("1.3.4.1", T0 + 600, "Commit on branch B_SPLIT.")
            .sym("T_MIXED", "1.3")
            .sym("B_MIXED", "1.3.0.2")
            .sym("B_SPLIT", "1.3.0.4")
            .build(),
        initial("sub1/subsubB/default", false)
            .rev("1.2", T0 + 200, ALL_CHANGE)
            .rev("1.3", T0 + 4200, "Change on trunk after branch B_SPLIT.")
            .rev("1.3.2.1", T0 + 4300, "Commit on re-created branch B_SPLIT.")
            .sym("T_MIXED", "1.2")
            .sym("B_MIXED", "1.2.0.2")
            .sym("B_SPLIT", "1.3.0.2")
            .build(),
        file("sub2/branch_B_MIXED_only")
            .dead("1.1", T0 + 300, "file branch_B_MIXED_only was initially added on branch B_MIXED.")
            .rev("1.1.2.1", T0 + 300, "Add a file on branch B_MIXED.")
            .rev("1.1.2.2", T0 + 500, STRADDLE)
            .sym("B_MIXED", "1.1.0.2")
            .build(),
        initial("sub2/default", true)
            .rev("1.2", T0 + 200, ALL_CHANGE)
            .rev("1.3", T0 + 500, STRADDLE)
            .rev("1.3.2.1", T0 + 600, "Commit on branch B_SPLIT.")
            .sym("T_MIXED", "1.2")
            .sym("B_MIXED", "1.2.0.2")
            .sym("B_SPLIT", "1.3.0.2")
            .build(),
        initial("sub2/subsubA/default", true)
            .rev("1.2", T0 + 200, ALL_CHANGE)
            .rev("1.1.6.1", T0 + 400, "Commit on branch B_MIXED.")
            .rev("1.2.2.1", T0 + 600, "Commit on branch B_SPLIT.")
            .sym("T_MIXED", "1.1")
            .sym("B_MIXED", "1.1.0.6")
            .sym("B_SPLIT", "1.2.0.2")
            .build(),
        initial("sub3/default", true)
            .rev("1.2", T0 + 100, "Change on trunk.")
            .rev("1.3", T0 + 200, ALL_CHANGE)
            .rev("1.3.2.1", T0 + 4300, "Commit on re-created branch B_SPLIT.")
            .sym("T_MIXED", "1.2")
            .sym("B_MIXED", "1.2.0.2")
            .sym("B_SPLIT", "1.3.0.2")
            .build(),
    ]
}
