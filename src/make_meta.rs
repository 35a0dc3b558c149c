use crate::convert::{CommitSource, GitCommitMeta, GitSignature};
use crate::user_map::UserMap;

pub(crate) struct GitMetaMaker<'a> {
    user_map: &'a UserMap,
    jinja_env: minijinja::Environment<'a>,
}

impl<'a> GitMetaMaker<'a> {
    pub(crate) fn new(
        user_map: &'a UserMap,
        user_fallback_template: &'a str,
        commit_msg_template: &'a str,
    ) -> Result<Self, String> {
        let mut jinja_env = minijinja::Environment::empty();
        jinja_env.set_undefined_behavior(minijinja::UndefinedBehavior::Strict);

        jinja_env
            .add_template("user_fallback", user_fallback_template)
            .map_err(|e| format!("failed to parse user fallback template: {e}"))?;
        jinja_env
            .add_template("commit_msg", commit_msg_template)
            .map_err(|e| format!("failed to parse commit message template: {e}"))?;

        Ok(Self {
            user_map,
            jinja_env,
        })
    }

    fn render(&self, name: &str, ctx: &JinjaCtx, what: &str) -> Result<String, String> {
        let template = self
            .jinja_env
            .get_template(name)
            .map_err(|e| format!("missing {what} template: {e}"))?;
        template
            .render(ctx)
            .map_err(|e| format!("failed to render {what}: {e}"))
    }

    fn convert_author(
        &self,
        jinja_ctx: &JinjaCtx,
        cvs_author: Option<&str>,
    ) -> Result<(String, String), String> {
        if let Some((name, email)) = cvs_author.and_then(|author| self.user_map.get(author)) {
            return Ok((name.into(), email.into()));
        }

        let author = self.render("user_fallback", jinja_ctx, "fallback author")?;
        let Some((name, email)) = split_author_name_email(&author) else {
            return Err(format!(
                "author {author:?} is not in \"name <email>\" format"
            ));
        };
        Ok((name.into(), email.into()))
    }
}

impl crate::convert::GitMetaMaker for GitMetaMaker<'_> {
    fn make_git_commit_meta(&self, source: &CommitSource<'_>) -> Result<GitCommitMeta, String> {
        let jinja_ctx = JinjaCtx::new(source, self.user_map);

        let (name, email) = self.convert_author(&jinja_ctx, source.author)?;
        let message = self
            .render("commit_msg", &jinja_ctx, "git commit message")?
            .replace("\r\n", "\n");

        Ok(GitCommitMeta {
            author: GitSignature {
                name: name.clone(),
                email: email.clone(),
                time: source.time,
            },
            committer: GitSignature {
                name,
                email,
                time: source.time,
            },
            message,
        })
    }
}

#[derive(serde::Serialize)]
struct JinjaCtx {
    cvs_author: String,
    cvs_log: String,
    cvs_commitid: String,
    cvs_branch: String,
    synthetic: bool,
    mapped_author_name: String,
    mapped_author_email: String,
}

impl JinjaCtx {
    fn new(source: &CommitSource<'_>, user_map: &UserMap) -> Self {
        let (mapped_author_name, mapped_author_email) = source
            .author
            .and_then(|author| user_map.get(author))
            .map(|(name, email)| (String::from(name), String::from(email)))
            .unwrap_or_default();

        Self {
            cvs_author: source.author.unwrap_or_default().into(),
            cvs_log: source.log.into(),
            cvs_commitid: source.commit_id.unwrap_or_default().into(),
            cvs_branch: source.branch.into(),
            synthetic: source.author.is_none(),
            mapped_author_name,
            mapped_author_email,
        }
    }
}

fn split_author_name_email(raw: &str) -> Option<(&str, &str)> {
    if raw.contains('\n') {
        return None;
    }

    let i_lt = raw.find('<')?;

    let name = raw[..i_lt].trim_matches(' ');
    let email = raw[(i_lt + 1)..]
        .trim_end_matches(' ')
        .strip_suffix('>')?
        .trim_matches(' ');

    Some((name, email))
}

#[cfg(test)]
mod tests {
    use super::{GitMetaMaker, split_author_name_email};
    use crate::convert::{CommitSource, GitMetaMaker as _};
    use crate::user_map::UserMap;

    const FALLBACK: &str = r#"{{ cvs_author or "cvs2git" }} <{{ cvs_author or "cvs2git" }}@localhost>"#;
    const MSG: &str = "{{ cvs_log }}{% if cvs_commitid %}\n\n[[CVS commitid: {{ cvs_commitid }}]]{% endif %}";

    fn source<'a>(author: Option<&'a str>, commit_id: Option<&'a str>) -> CommitSource<'a> {
        CommitSource {
            author,
            log: "Fix the frobnicator.",
            commit_id,
            branch: "master",
            time: 1_041_379_200,
        }
    }

    #[test]
    fn test_commit_meta() {
        let mut src: &[u8] = b"joe = Joe User <joe@example.com>\n";
        let user_map = UserMap::parse(&mut src).unwrap_or_else(|e| panic!("{e}"));
        let maker = GitMetaMaker::new(&user_map, FALLBACK, MSG).unwrap();

        let meta = maker.make_git_commit_meta(&source(Some("joe"), None)).unwrap();
        assert_eq!(meta.author.name, "Joe User");
        assert_eq!(meta.author.email, "joe@example.com");
        assert_eq!(meta.committer.time, 1_041_379_200);
        assert_eq!(meta.message, "Fix the frobnicator.");

        let meta = maker
            .make_git_commit_meta(&source(Some("ann"), Some("abc123")))
            .unwrap();
        assert_eq!(meta.author.name, "ann");
        assert_eq!(meta.author.email, "ann@localhost");
        assert_eq!(
            meta.message,
            "Fix the frobnicator.\n\n[[CVS commitid: abc123]]",
        );

        let meta = maker.make_git_commit_meta(&source(None, None)).unwrap();
        assert_eq!(meta.author.name, "cvs2git");
    }

    #[test]
    fn test_bad_templates() {
        let user_map = UserMap::new();
        assert!(GitMetaMaker::new(&user_map, "{% if %}", MSG).is_err());

        let maker = GitMetaMaker::new(&user_map, "no email here", MSG).unwrap();
        assert!(maker.make_git_commit_meta(&source(Some("joe"), None)).is_err());
    }

    #[test]
    fn test_split_author() {
        assert_eq!(
            split_author_name_email("Joe User <joe@example.com>"),
            Some(("Joe User", "joe@example.com")),
        );
        assert_eq!(split_author_name_email("Joe User"), None);
        assert_eq!(split_author_name_email("Joe\n<joe@example.com>"), None);
    }
}
