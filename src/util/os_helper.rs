/// Display name of the current OS user, falling back to the login name.
pub fn get_name() -> String {
    let name = whoami::realname();
    if name.trim().is_empty() {
        return whoami::username();
    }
    name
}

/// The explicit author when given, otherwise the current user.
pub fn author_or_current_user(author: Option<&str>) -> String {
    match author.map(str::trim) {
        Some(author) if !author.is_empty() => author.to_string(),
        _ => get_name(),
    }
}
