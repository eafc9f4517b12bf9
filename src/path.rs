use crate::error::{Error, Result};

/// normalize an absolute repository path
///
/// collapses repeated slashes, strips a trailing slash (except for the root
/// itself) and rejects relative paths, empty components and `.`/`..`.
pub fn normalize(path: &str) -> Result<String> {
    if !path.starts_with('/') {
        return Err(Error::InvalidPath(format!("not absolute: {}", path)));
    }

    let mut components = Vec::new();
    for component in path.split('/').filter(|c| !c.is_empty()) {
        if component == "." || component == ".." {
            return Err(Error::InvalidPath(format!(
                "reserved component '{}' in {}",
                component, path
            )));
        }
        if component.contains('\0') {
            return Err(Error::InvalidPath(format!("null byte in {}", path)));
        }
        components.push(component);
    }

    if components.is_empty() {
        return Ok("/".to_string());
    }
    Ok(format!("/{}", components.join("/")))
}

/// true if `path` equals `root` or lies below it
pub fn is_under(path: &str, root: &str) -> bool {
    if root == "/" {
        return true;
    }
    path == root || path.starts_with(root) && path.as_bytes().get(root.len()) == Some(&b'/')
}

/// parent path, or None for the root
pub fn parent(path: &str) -> Option<&str> {
    if path == "/" {
        return None;
    }
    match path.rfind('/') {
        Some(0) => Some("/"),
        Some(idx) => Some(&path[..idx]),
        None => None,
    }
}

/// last path component (empty for the root)
pub fn name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or("")
}

/// join a parent path and a child name
pub fn join(parent: &str, name: &str) -> String {
    if parent == "/" {
        format!("/{}", name)
    } else {
        format!("{}/{}", parent, name)
    }
}

/// all ancestor paths of `path` from the root downward, excluding `path` itself
///
/// `/a/b/c` yields `/`, `/a`, `/a/b`.
pub fn ancestors(path: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = path;
    while let Some(p) = parent(current) {
        out.push(p.to_string());
        current = p;
    }
    out.reverse();
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_basic() {
        assert_eq!(normalize("/libs").unwrap(), "/libs");
        assert_eq!(normalize("/libs/sub").unwrap(), "/libs/sub");
        assert_eq!(normalize("/").unwrap(), "/");
    }

    #[test]
    fn test_normalize_collapses_slashes() {
        assert_eq!(normalize("//libs///sub/").unwrap(), "/libs/sub");
    }

    #[test]
    fn test_normalize_rejects_relative() {
        assert!(normalize("libs").is_err());
        assert!(normalize("").is_err());
    }

    #[test]
    fn test_normalize_rejects_dot_components() {
        assert!(normalize("/libs/./sub").is_err());
        assert!(normalize("/libs/../sub").is_err());
    }

    #[test]
    fn test_normalize_keeps_hidden_names() {
        // a leading dot in a name is an ordinary structural node
        assert_eq!(normalize("/libs/.sameLevel").unwrap(), "/libs/.sameLevel");
    }

    #[test]
    fn test_is_under() {
        assert!(is_under("/libs", "/libs"));
        assert!(is_under("/libs/sub", "/libs"));
        assert!(is_under("/libs", "/"));
        assert!(!is_under("/libsother", "/libs"));
        assert!(!is_under("/apps", "/libs"));
    }

    #[test]
    fn test_parent_and_name() {
        assert_eq!(parent("/libs/sub"), Some("/libs"));
        assert_eq!(parent("/libs"), Some("/"));
        assert_eq!(parent("/"), None);
        assert_eq!(name("/libs/sub"), "sub");
        assert_eq!(name("/libs/.sameLevel"), ".sameLevel");
    }

    #[test]
    fn test_join() {
        assert_eq!(join("/", "libs"), "/libs");
        assert_eq!(join("/libs", "sub"), "/libs/sub");
    }

    #[test]
    fn test_ancestors() {
        assert_eq!(ancestors("/a/b/c"), vec!["/", "/a", "/a/b"]);
        assert!(ancestors("/").is_empty());
    }
}
