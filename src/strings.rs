//! Small string primitives shared by the loader and signature parser.

#[cfg(windows)]
const DIR_SEPARATORS: &[char] = &['\\', '/'];
#[cfg(not(windows))]
const DIR_SEPARATORS: &[char] = &['/'];

/// Strip every trailing `\r` and `\n`, accepting both DOS and Unix line endings.
pub fn chop_line(line: &str) -> &str {
    line.trim_end_matches(['\r', '\n'])
}

/// Final path component of `path`.
///
/// A path without separators is returned unchanged. A path ending in a separator
/// yields the empty string.
pub fn basename(path: &str) -> &str {
    match path.rfind(DIR_SEPARATORS) {
        Some(pos) => &path[pos + 1..],
        None => path,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chop_line_strips_mixed_endings() {
        assert_eq!(chop_line("abc\r\n"), "abc");
        assert_eq!(chop_line("abc\n"), "abc");
        assert_eq!(chop_line("abc\n\r\n"), "abc");
        assert_eq!(chop_line("abc"), "abc");
        assert_eq!(chop_line("\r\n"), "");
    }

    #[test]
    fn chop_line_keeps_interior_newlines() {
        assert_eq!(chop_line("a\nb\n"), "a\nb");
    }

    #[test]
    fn basename_strips_directories() {
        assert_eq!(basename("/usr/bin/ls"), "ls");
        assert_eq!(basename("ls"), "ls");
        assert_eq!(basename("dir/"), "");
        assert_eq!(basename(""), "");
    }
}
