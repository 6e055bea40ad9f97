//! `Link` header pagination.

/// Returns the `rel="next"` URL from a GitHub `Link` header, if any.
///
/// ```text
/// <https://api.github.com/repositories/1/actions/runs?page=2>; rel="next", <...?page=9>; rel="last"
/// ```
pub fn next_link(header: &str) -> Option<String> {
    header.split(',').find_map(|part| {
        let mut segments = part.split(';').map(str::trim);
        let target = segments.next()?;
        let url = target.strip_prefix('<')?.strip_suffix('>')?;
        segments
            .any(|param| {
                param
                    .strip_prefix("rel=")
                    .map(|rel| rel.trim_matches('"').split_whitespace().any(|r| r == "next"))
                    .unwrap_or(false)
            })
            .then(|| url.to_string())
    })
}
