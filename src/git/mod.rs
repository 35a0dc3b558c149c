pub(crate) mod fast_import;

/// Turns a CVS symbol into a name git accepts as a ref component path.
pub(crate) fn legalize_ref_name(raw_name: &str) -> String {
    fn legalize_component(name: &mut String) {
        if name.ends_with(".lock") {
            name.truncate(name.len() - 5);
            name.push_str("_lock");
        } else if name.ends_with('.') {
            name.truncate(name.len() - 1);
            name.push('_');
        } else if name == "refs" || name.ends_with("/refs") {
            name.push('_');
        }
    }

    let mut legal_name = String::with_capacity(raw_name.len());
    let mut prev = None::<char>;
    for chr in raw_name.chars() {
        if chr == '/' {
            if !legal_name.ends_with('/') && !legal_name.is_empty() {
                legalize_component(&mut legal_name);
                legal_name.push('/');
            }
        } else {
            let disallowed_chr = matches!(
                chr,
                '\0'..=' ' | '*' | ':' | '?' | '[' | '\\' | ']' | '^' | '{' | '}' | '~'..
            );
            let at_component_start = legal_name.is_empty() || legal_name.ends_with('/');
            if disallowed_chr
                || (chr == '.' && (at_component_start || prev == Some('.')))
                || (chr == '{' && prev == Some('@'))
                || (at_component_start && chr == '-')
            {
                legal_name.push('_');
            } else {
                legal_name.push(chr);
            }
        }
        prev = Some(chr);
    }

    if legal_name.ends_with('/') {
        legal_name.truncate(legal_name.len() - 1);
    }
    legalize_component(&mut legal_name);
    if legal_name.is_empty() || legal_name == "@" {
        legal_name = "_".into();
    }

    legal_name
}

/// Assigns each name a distinct legal ref name within one namespace
/// (`refs/heads` or `refs/tags`). The output keeps the input order.
pub(crate) fn assign_ref_names(kind: &str, names: &[String]) -> Vec<String> {
    let mut taken = std::collections::BTreeSet::<String>::new();
    let mut assigned = Vec::with_capacity(names.len());

    for name in names.iter() {
        let legal_name = legalize_ref_name(name);
        if legal_name != *name {
            tracing::warn!(
                "{kind} \"{}\" named \"{}\" due to invalid characters or sequences",
                name.escape_default(),
                legal_name.escape_default(),
            );
        }

        let mut git_name = legal_name.clone();
        let mut tries = 0;
        while taken.contains(&git_name) {
            tries += 1;
            git_name = format!("{legal_name}_{tries}");
        }
        if tries != 0 {
            tracing::warn!(
                "using {kind} name \"{}\" instead of \"{}\" to avoid repetition",
                git_name.escape_default(),
                legal_name.escape_default(),
            );
        }
        taken.insert(git_name.clone());
        assigned.push(git_name);
    }

    // git cannot have both "a" and "a/b".
    for i in 0..assigned.len() {
        let base = assigned[i].clone();
        let mut candidate = base.clone();
        let mut tries = 0;
        while assigned
            .iter()
            .enumerate()
            .any(|(j, other)| i != j && is_path_prefix(&candidate, other))
            || (tries != 0 && taken.contains(&candidate))
        {
            tries += 1;
            candidate = format!("{base}_{tries}");
        }
        if candidate != base {
            tracing::warn!(
                "using {kind} name \"{}\" instead of \"{}\" to avoid prefix collision",
                candidate.escape_default(),
                base.escape_default(),
            );
            taken.insert(candidate.clone());
            assigned[i] = candidate;
        }
    }

    assigned
}

fn is_path_prefix(prefix: &str, name: &str) -> bool {
    name.strip_prefix(prefix)
        .is_some_and(|rest| rest.starts_with('/'))
}
