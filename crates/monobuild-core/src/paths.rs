//! パス操作ヘルパー

use std::path::{Component, Path, PathBuf};

/// 絶対パスに変換して `.` / `..` を字句的に解決する
///
/// ファイルの存在は確認しない（シンボリックリンクも解決しない）。
pub fn absolute(path: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };
    normalize(&joined)
}

/// `.` と `..` を字句的に取り除く
pub fn normalize(path: &Path) -> PathBuf {
    let mut result = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !result.pop() {
                    result.push("..");
                }
            }
            other => result.push(other.as_os_str()),
        }
    }
    result
}

/// `base` からの相対パス（`base` 配下にない場合は None）
pub fn relative_to(path: &Path, base: &Path) -> Option<PathBuf> {
    normalize(path)
        .strip_prefix(normalize(base))
        .ok()
        .map(Path::to_path_buf)
}

/// `/` 区切りの文字列に変換（Dockerfile 内で使うため）
pub fn to_slash(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            Component::ParentDir => Some("..".to_string()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_parent_components() {
        let path = Path::new("/repo/src/Api/../Shared/./Shared.csproj");
        assert_eq!(normalize(path), PathBuf::from("/repo/src/Shared/Shared.csproj"));
    }

    #[test]
    fn test_relative_to() {
        let rel = relative_to(Path::new("/repo/src/Api/Api.csproj"), Path::new("/repo"));
        assert_eq!(rel, Some(PathBuf::from("src/Api/Api.csproj")));

        assert_eq!(relative_to(Path::new("/other/x"), Path::new("/repo")), None);
    }

    #[test]
    fn test_to_slash() {
        assert_eq!(to_slash(Path::new("src/Api/Api.csproj")), "src/Api/Api.csproj");
        assert_eq!(to_slash(Path::new("")), "");
    }

    #[test]
    fn test_absolute_keeps_absolute_paths() {
        assert_eq!(absolute(Path::new("/repo/./a/../b")), PathBuf::from("/repo/b"));
    }
}
