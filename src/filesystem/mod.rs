use std::fs;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::{Component, Path, PathBuf, MAIN_SEPARATOR};
use std::time::UNIX_EPOCH;
use thiserror::Error;

use crate::environment::{self, Environment};
use crate::random::RandomSource;

/// Represents errors that can occur during filesystem operations.
#[derive(Debug, Error)]
pub enum FilesystemError {
    /// Wrapper for standard IO errors.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    /// Error for empty path input.
    #[error("Path is empty")]
    EmptyPath,
    /// Error when the home directory cannot be determined.
    #[error("Home directory not found")]
    HomeDirNotFound,
    /// Error for unsupported user expansion in paths (e.g., ~user).
    #[error("User expansion (~user) not supported")]
    UserExpansionNotSupported,
    /// The path cannot be represented as UTF-8.
    #[error("Path is not valid UTF-8: {0:?}")]
    NonUtf8Path(PathBuf),
    /// The file content is not valid UTF-8.
    #[error("File content is not valid UTF-8: {0:?}")]
    InvalidUtf8(PathBuf),
    /// The destination exists and overwriting was not allowed.
    #[error("Destination already exists: {0:?}")]
    AlreadyExists(PathBuf),
}

/// Options for writing files, such as whether to overwrite existing files.
pub struct WriteOptions {
    /// If true, allows overwriting an existing file.
    pub overwrite: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self { overwrite: true }
    }
}

/// Options for removing files or directories, such as recursive removal.
#[derive(Default)]
pub struct RemoveOptions {
    /// If true, removes directories recursively.
    pub recursive: bool,
}

/// Options for copying files.
pub struct CopyOptions {
    /// If false and the destination exists, the copy fails.
    pub overwrite: bool,
    /// Size of the chunks read between two progress reports.
    pub buffer_size: usize,
}

impl Default for CopyOptions {
    fn default() -> Self {
        Self {
            overwrite: true,
            buffer_size: 64 * 1024,
        }
    }
}

/// Returns the preferred path separator of the current platform.
pub fn path_separator() -> char {
    MAIN_SEPARATOR
}

/// Removes trailing `/` or `\` characters, keeping a lone root separator.
pub fn normalize_path(path: &str) -> String {
    let trimmed = path.trim_end_matches(['/', '\\']);
    if trimmed.is_empty() && !path.is_empty() {
        return path[..1].to_string();
    }
    trimmed.to_string()
}

/// Borrows `path` as UTF-8.
///
/// # Errors
///
/// Returns `FilesystemError::NonUtf8Path` if the path holds non UTF-8 data.
pub fn path_to_utf8(path: &Path) -> Result<&str, FilesystemError> {
    path.to_str()
        .ok_or_else(|| FilesystemError::NonUtf8Path(path.to_path_buf()))
}

/// Expands a path that starts with `~` to the user's home directory.
///
/// # Arguments
///
/// * `path` - Path string, possibly starting with `~`.
///
/// # Returns
///
/// The expanded `PathBuf`, or empty if expansion fails.
pub fn expand_home(path: &str) -> PathBuf {
    try_expand_home(path).unwrap_or_default()
}

/// Fallible form of [`expand_home`].
///
/// # Errors
///
/// Returns `FilesystemError` if the path is empty, the home directory is
/// unknown or the path uses the `~user` form.
pub fn try_expand_home(path: &str) -> Result<PathBuf, FilesystemError> {
    if path.is_empty() {
        return Err(FilesystemError::EmptyPath);
    }
    if !path.starts_with('~') {
        return Ok(PathBuf::from(path));
    }
    let home = dirs::home_dir().ok_or(FilesystemError::HomeDirNotFound)?;
    if path == "~" {
        return Ok(home);
    }
    if let Some(without_tilde) = path.strip_prefix("~/").or_else(|| path.strip_prefix("~\\")) {
        return Ok(home.join(without_tilde));
    }
    Err(FilesystemError::UserExpansionNotSupported)
}

/// Returns true if `path` is absolute on the current platform.
pub fn is_absolute_path<P: AsRef<Path>>(path: P) -> bool {
    path.as_ref().is_absolute()
}

/// Lexically removes `.` and `..` components from `path`.
///
/// The filesystem is not consulted, so symbolic links are not followed.
/// A `..` above the root is dropped.
pub fn resolve_path<P: AsRef<Path>>(path: P) -> PathBuf {
    let mut resolved = PathBuf::new();
    for component in path.as_ref().components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let can_pop = matches!(resolved.components().next_back(), Some(Component::Normal(_)));
                if can_pop {
                    resolved.pop();
                } else if !resolved.has_root() {
                    resolved.push("..");
                }
            }
            other => resolved.push(other.as_os_str()),
        }
    }
    resolved
}

/// Returns the current working directory.
///
/// # Errors
///
/// Returns `FilesystemError` if the directory is unavailable.
pub fn current_dir() -> Result<PathBuf, FilesystemError> {
    Ok(std::env::current_dir()?)
}

/// Makes a relative `path` absolute against the current directory.
///
/// # Errors
///
/// Returns `FilesystemError` if the current directory is unavailable.
pub fn path_based_on_current_dir<P: AsRef<Path>>(path: P) -> Result<PathBuf, FilesystemError> {
    let path = path.as_ref();
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    Ok(resolve_path(current_dir()?.join(path)))
}

/// Makes a relative `path` absolute against the directory of the running executable.
///
/// # Errors
///
/// Returns `FilesystemError` if the executable location is unavailable.
pub fn path_based_on_current_process<P: AsRef<Path>>(path: P) -> Result<PathBuf, FilesystemError> {
    let path = path.as_ref();
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let exe = std::env::current_exe()?;
    let dir = exe.parent().unwrap_or_else(|| Path::new(""));
    Ok(resolve_path(dir.join(path)))
}

/// Creates a directory if it does not exist.
///
/// # Arguments
///
/// * `dir` - Path to the directory to create.
/// * `recursive` - If true, creates parent directories as needed.
///
/// # Errors
///
/// Returns `FilesystemError` if the directory cannot be created.
pub fn create_if_not_exists<P: AsRef<Path>>(dir: P, recursive: bool) -> Result<(), FilesystemError> {
    let raw_path = path_to_utf8(dir.as_ref())?;
    let path = try_expand_home(raw_path)?;

    if path.exists() {
        return Ok(());
    }

    tracing::debug!(path = %path.display(), recursive, "creating directory");
    if recursive {
        fs::create_dir_all(&path)?;
    } else {
        fs::create_dir(&path)?;
    }

    Ok(())
}

/// Checks if a directory exists at the given path.
pub fn dir_exists<P: AsRef<Path>>(dir: P) -> bool {
    let p = dir.as_ref();
    !p.as_os_str().is_empty() && p.is_dir()
}

/// Checks if a file exists at the given path.
pub fn file_exists<P: AsRef<Path>>(file: P) -> bool {
    let p = file.as_ref();
    !p.as_os_str().is_empty() && p.is_file()
}

/// Returns true if the file at `path` can be opened for reading.
pub fn has_read_access<P: AsRef<Path>>(path: P) -> bool {
    let p = path.as_ref();
    if p.is_dir() {
        return fs::read_dir(p).is_ok();
    }
    fs::File::open(p).is_ok()
}

/// Returns true if `path` exists and is not marked read-only.
pub fn has_write_access<P: AsRef<Path>>(path: P) -> bool {
    fs::metadata(path)
        .map(|m| !m.permissions().readonly())
        .unwrap_or(false)
}

/// Returns the size of a file in bytes.
///
/// # Errors
///
/// Returns `FilesystemError` if the file metadata cannot be read.
pub fn file_size<P: AsRef<Path>>(path: P) -> Result<u64, FilesystemError> {
    Ok(fs::metadata(path)?.len())
}

/// Returns the last modification time of `path`, in seconds since the Unix epoch.
///
/// # Errors
///
/// Returns `FilesystemError` if the metadata cannot be read, the platform
/// does not record modification times, or the time predates the epoch.
pub fn modified_time<P: AsRef<Path>>(path: P) -> Result<u64, FilesystemError> {
    let modified = fs::metadata(path)?.modified()?;
    let since_epoch = modified
        .duration_since(UNIX_EPOCH)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    Ok(since_epoch.as_secs())
}

/// Moves a file or directory from `src` to `dst`.
///
/// # Errors
///
/// Returns `FilesystemError` if the move operation fails.
pub fn move_if_exists<P: AsRef<Path>, Q: AsRef<Path>>(src: P, dst: Q) -> Result<(), FilesystemError> {
    tracing::debug!(src = %src.as_ref().display(), dst = %dst.as_ref().display(), "moving");
    fs::rename(src, dst)?;
    Ok(())
}

/// Copies a file from `src` to `dst`.
///
/// # Errors
///
/// Returns `FilesystemError` if the copy fails or overwrite is not allowed.
///
/// # Returns
///
/// The number of bytes copied.
pub fn copy_file<P: AsRef<Path>, Q: AsRef<Path>>(
    src: P,
    dst: Q,
    options: CopyOptions,
) -> Result<u64, FilesystemError> {
    copy_file_with_progress(src, dst, options, |_| {})
}

/// Copies a file from `src` to `dst`, reporting progress to `on_progress`.
///
/// Progress values are in `[0.0, 1.0]` and the last reported value is `1.0`.
///
/// # Errors
///
/// Returns `FilesystemError` if the copy fails or overwrite is not allowed.
///
/// # Returns
///
/// The number of bytes copied.
pub fn copy_file_with_progress<P, Q, F>(
    src: P,
    dst: Q,
    options: CopyOptions,
    mut on_progress: F,
) -> Result<u64, FilesystemError>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
    F: FnMut(f64),
{
    let src = src.as_ref();
    let dst_path = dst.as_ref();
    if dst_path.exists() && !options.overwrite {
        return Err(FilesystemError::AlreadyExists(dst_path.to_path_buf()));
    }

    let mut input = fs::File::open(src)?;
    let total = input.metadata()?.len();
    let mut output = fs::File::create(dst_path)?;
    tracing::debug!(src = %src.display(), dst = %dst_path.display(), total, "copying file");

    let mut buffer = vec![0u8; options.buffer_size.max(1)];
    let mut copied: u64 = 0;
    on_progress(0.0);
    loop {
        let n = input.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        output.write_all(&buffer[..n])?;
        copied += n as u64;
        if copied < total {
            on_progress(copied as f64 / total as f64);
        }
    }
    output.flush()?;
    on_progress(1.0);
    Ok(copied)
}

/// Removes a file or directory at the given path, with options.
///
/// # Errors
///
/// Returns `FilesystemError` if the removal fails.
pub fn remove_if_exists<P: AsRef<Path>>(path: P, options: RemoveOptions) -> Result<(), FilesystemError> {
    let p = path.as_ref();
    if p.is_dir() {
        tracing::debug!(path = %p.display(), recursive = options.recursive, "removing directory");
        if options.recursive {
            fs::remove_dir_all(p)?;
        } else {
            fs::remove_dir(p)?;
        }
    } else if p.is_file() {
        tracing::debug!(path = %p.display(), "removing file");
        fs::remove_file(p)?;
    }
    Ok(())
}

/// Deletes a directory and everything below it.
///
/// A directory that does not exist is considered already deleted.
///
/// # Errors
///
/// Returns `FilesystemError` if an entry cannot be removed.
pub fn delete_directory<P: AsRef<Path>>(dir: P) -> Result<(), FilesystemError> {
    if !dir_exists(&dir) {
        return Ok(());
    }
    remove_if_exists(dir, RemoveOptions { recursive: true })
}

/// Deletes a single file.
///
/// # Errors
///
/// Returns `FilesystemError` if the file cannot be removed, including when
/// it does not exist.
pub fn delete_file<P: AsRef<Path>>(path: P) -> Result<(), FilesystemError> {
    tracing::debug!(path = %path.as_ref().display(), "deleting file");
    fs::remove_file(path)?;
    Ok(())
}

/// Reads the contents of a file into a string.
///
/// # Errors
///
/// Returns `FilesystemError::InvalidUtf8` if the content is not UTF-8, or
/// another `FilesystemError` if the file cannot be read.
pub fn read_file<P: AsRef<Path>>(path: P) -> Result<String, FilesystemError> {
    let p = path.as_ref();
    let bytes = fs::read(p)?;
    String::from_utf8(bytes).map_err(|_| FilesystemError::InvalidUtf8(p.to_path_buf()))
}

/// Reads a file into a string, replacing invalid UTF-8 sequences with `U+FFFD`.
///
/// # Errors
///
/// Returns `FilesystemError` if the file cannot be read.
pub fn read_file_lossy<P: AsRef<Path>>(path: P) -> Result<String, FilesystemError> {
    let p = path.as_ref();
    let bytes = fs::read(p)?;
    match String::from_utf8(bytes) {
        Ok(content) => Ok(content),
        Err(e) => {
            tracing::warn!(path = %p.display(), "file is not valid UTF-8, decoding lossily");
            Ok(String::from_utf8_lossy(e.as_bytes()).into_owned())
        }
    }
}

/// Reads the whole file as bytes.
///
/// # Errors
///
/// Returns `FilesystemError` if the file cannot be read.
pub fn read_bytes<P: AsRef<Path>>(path: P) -> Result<Vec<u8>, FilesystemError> {
    Ok(fs::read(path)?)
}

/// Reads at most `size` bytes from the beginning of a file.
///
/// # Errors
///
/// Returns `FilesystemError` if the file cannot be read.
pub fn peek_file<P: AsRef<Path>>(path: P, size: usize) -> Result<Vec<u8>, FilesystemError> {
    let file = fs::File::open(path)?;
    let mut data = Vec::with_capacity(size.min(64 * 1024));
    file.take(size as u64).read_to_end(&mut data)?;
    Ok(data)
}

/// Writes content to a file, with options for overwriting.
///
/// # Errors
///
/// Returns `FilesystemError` if the write fails or overwrite is not allowed.
pub fn write_file<P: AsRef<Path>>(path: P, content: &str, options: WriteOptions) -> Result<(), FilesystemError> {
    write_bytes(path, content.as_bytes(), options)
}

/// Writes raw bytes to a file, with options for overwriting.
///
/// # Errors
///
/// Returns `FilesystemError` if the write fails or overwrite is not allowed.
pub fn write_bytes<P: AsRef<Path>>(path: P, content: &[u8], options: WriteOptions) -> Result<(), FilesystemError> {
    let p = path.as_ref();
    if p.exists() && !options.overwrite {
        return Err(FilesystemError::AlreadyExists(p.to_path_buf()));
    }
    let mut file = fs::File::create(p)?;
    file.write_all(content)?;
    Ok(())
}

/// Reads a text file line by line.
///
/// When `trim_newlines` is false each line keeps its terminator.
///
/// # Errors
///
/// Returns `FilesystemError` if the file cannot be read or is not UTF-8.
pub fn read_text_lines<P: AsRef<Path>>(path: P, trim_newlines: bool) -> Result<Vec<String>, FilesystemError> {
    let p = path.as_ref();
    let mut reader = BufReader::new(fs::File::open(p)?);
    let mut lines = Vec::new();
    loop {
        let mut line = String::new();
        let n = reader.read_line(&mut line).map_err(|e| match e.kind() {
            io::ErrorKind::InvalidData => FilesystemError::InvalidUtf8(p.to_path_buf()),
            _ => FilesystemError::Io(e),
        })?;
        if n == 0 {
            break;
        }
        if trim_newlines {
            let end = line.trim_end_matches(['\r', '\n']).len();
            line.truncate(end);
        }
        lines.push(line);
    }
    Ok(lines)
}

/// Writes `lines` to a text file.
///
/// With `insert_newlines`, the platform line separator is written between
/// lines, not after the last one.
///
/// # Errors
///
/// Returns `FilesystemError` if the file cannot be written.
pub fn write_text_lines<P, S>(path: P, lines: &[S], insert_newlines: bool) -> Result<(), FilesystemError>
where
    P: AsRef<Path>,
    S: AsRef<str>,
{
    let separator = if insert_newlines { environment::line_separator() } else { "" };
    let content = lines
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<&str>>()
        .join(separator);
    write_file(path, &content, WriteOptions::default())
}

/// Replaces every occurrence of `old` with `new` in a text file.
///
/// The file is only rewritten when something was replaced.
///
/// # Errors
///
/// Returns `FilesystemError` if the file cannot be read or written.
///
/// # Returns
///
/// The number of replacements.
pub fn file_replace<P: AsRef<Path>>(path: P, old: &str, new: &str) -> Result<usize, FilesystemError> {
    let p = path.as_ref();
    let content = read_file(p)?;
    if old.is_empty() {
        return Ok(0);
    }
    let count = content.matches(old).count();
    if count > 0 {
        write_file(p, &content.replace(old, new), WriteOptions::default())?;
    }
    Ok(count)
}

/// Lists the files and directories below `dir`.
///
/// `depth` limits how many directory levels are descended: `Some(0)` lists
/// direct children only and `None` has no limit. Entries are sorted.
///
/// # Errors
///
/// Returns `FilesystemError` if `dir` cannot be read. Subdirectories that
/// cannot be read are skipped.
pub fn find_files<P: AsRef<Path>>(dir: P, depth: Option<usize>) -> Result<Vec<PathBuf>, FilesystemError> {
    let mut found = Vec::new();
    collect_entries(dir.as_ref(), depth, &mut found)?;
    found.sort();
    Ok(found)
}

fn collect_entries(dir: &Path, depth: Option<usize>, found: &mut Vec<PathBuf>) -> Result<(), FilesystemError> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let is_dir = entry.file_type()?.is_dir();
        found.push(path.clone());

        if !is_dir {
            continue;
        }
        let next_depth = match depth {
            Some(0) => continue,
            Some(d) => Some(d - 1),
            None => None,
        };
        if let Err(e) = collect_entries(&path, next_depth, found) {
            tracing::warn!(path = %path.display(), error = %e, "skipping unreadable directory");
        }
    }
    Ok(())
}

/// Returns every existing `dir/filename` for the directories listed in `PATH`.
///
/// Each `PATH` entry is expanded with [`environment::expand`] first.
pub fn find_file_from_paths<E: Environment + ?Sized>(env: &E, filename: &str) -> Vec<PathBuf> {
    let Some(path_var) = env.var("PATH") else {
        return Vec::new();
    };
    std::env::split_paths(&path_var)
        .filter_map(|dir| {
            let dir = dir.to_str()?;
            if dir.is_empty() {
                return None;
            }
            let expanded = normalize_path(&environment::expand(env, dir));
            let candidate = PathBuf::from(expanded).join(filename);
            file_exists(&candidate).then_some(candidate)
        })
        .collect()
}

/// Returns the first match of [`find_file_from_paths`].
pub fn find_first_file_from_paths<E: Environment + ?Sized>(env: &E, filename: &str) -> Option<PathBuf> {
    find_file_from_paths(env, filename).into_iter().next()
}

/// Returns the temporary directory of the current platform.
pub fn temp_dir() -> PathBuf {
    std::env::temp_dir()
}

/// Returns a path to a not yet existing file in the temporary directory.
///
/// The file itself is not created.
pub fn temp_file_path(rng: &mut RandomSource) -> PathBuf {
    let dir = temp_dir();
    loop {
        let candidate = dir.join(format!("{}.tmp", rng.string()));
        if !candidate.exists() {
            return candidate;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::MemoryEnvironment;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn expands_tilde_to_home() {
        let home = dirs::home_dir().unwrap();
        assert_eq!(expand_home("~"), home);
        assert_eq!(expand_home("~/x/y"), home.join("x/y"));
        assert_eq!(expand_home("relative/path"), PathBuf::from("relative/path"));
    }

    #[test]
    fn expand_home_rejects_user_form_and_empty() {
        assert_eq!(expand_home("~bob/x"), PathBuf::new());
        assert!(matches!(try_expand_home("~bob"), Err(FilesystemError::UserExpansionNotSupported)));
        assert!(matches!(try_expand_home(""), Err(FilesystemError::EmptyPath)));
    }

    #[test]
    fn normalize_path_strips_trailing_separators() {
        assert_eq!(normalize_path("/usr/bin/"), "/usr/bin");
        assert_eq!(normalize_path("C:\\Windows\\\\"), "C:\\Windows");
        assert_eq!(normalize_path("/"), "/");
        assert_eq!(normalize_path(""), "");
    }

    #[test]
    fn resolve_path_removes_dot_components() {
        assert_eq!(resolve_path("/a/b/../c/./d"), PathBuf::from("/a/c/d"));
        assert_eq!(resolve_path("/.."), PathBuf::from("/"));
        assert_eq!(resolve_path("../x"), PathBuf::from("../x"));
    }

    #[test]
    fn path_based_on_current_dir_is_absolute() {
        let p = path_based_on_current_dir("some/file.txt").unwrap();
        assert!(p.is_absolute());
        assert!(p.ends_with("some/file.txt"));
    }

    #[test]
    fn path_based_on_current_process_is_next_to_executable() {
        let p = path_based_on_current_process("some/../data/file.txt").unwrap();
        let exe_dir = std::env::current_exe().unwrap().parent().unwrap().to_path_buf();
        assert!(p.is_absolute());
        assert_eq!(p, resolve_path(exe_dir.join("data/file.txt")));
    }

    #[test]
    fn path_based_on_current_process_keeps_absolute_paths() {
        let absolute = temp_dir().join("x.txt");
        assert_eq!(path_based_on_current_process(&absolute).unwrap(), absolute);
    }

    #[test]
    fn modified_time_before_epoch_is_an_error() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("old.txt");
        write_file(&file, "x", WriteOptions::default()).unwrap();
        let before_epoch = UNIX_EPOCH - std::time::Duration::from_secs(3600);
        let handle = fs::File::options().write(true).open(&file).unwrap();
        if handle.set_modified(before_epoch).is_ok() && fs::metadata(&file).unwrap().modified().unwrap() < UNIX_EPOCH {
            assert!(modified_time(&file).is_err());
        }
    }

    #[test]
    fn existence_checks_distinguish_files_and_dirs() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("a.txt");
        write_file(&file, "x", WriteOptions::default()).unwrap();

        assert!(file_exists(&file));
        assert!(!dir_exists(&file));
        assert!(dir_exists(dir.path()));
        assert!(!file_exists(dir.path()));
        assert!(!file_exists(""));
        assert!(!dir_exists(""));
    }

    #[test]
    fn access_checks() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("a.txt");
        assert!(!has_read_access(&file));
        assert!(!has_write_access(&file));

        write_file(&file, "x", WriteOptions::default()).unwrap();
        assert!(has_read_access(&file));
        assert!(has_write_access(&file));

        let mut perms = fs::metadata(&file).unwrap().permissions();
        perms.set_readonly(true);
        fs::set_permissions(&file, perms).unwrap();
        assert!(!has_write_access(&file));
    }

    #[test]
    fn create_if_not_exists_recursive() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("a").join("b").join("c");
        assert!(create_if_not_exists(&nested, false).is_err());
        create_if_not_exists(&nested, true).unwrap();
        assert!(dir_exists(&nested));
        create_if_not_exists(&nested, true).unwrap();
    }

    #[test]
    fn delete_directory_removes_tree_and_accepts_missing() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("root");
        create_if_not_exists(root.join("sub"), true).unwrap();
        write_file(root.join("sub").join("f.txt"), "data", WriteOptions::default()).unwrap();

        delete_directory(&root).unwrap();
        assert!(!dir_exists(&root));
        delete_directory(&root).unwrap();
    }

    #[test]
    fn delete_file_fails_for_missing_file() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("f.txt");
        assert!(delete_file(&file).is_err());
        write_file(&file, "x", WriteOptions::default()).unwrap();
        delete_file(&file).unwrap();
        assert!(!file_exists(&file));
    }

    #[test]
    fn remove_if_exists_non_recursive_fails_on_non_empty_dir() {
        let dir = tempdir().unwrap();
        let sub = dir.path().join("sub");
        create_if_not_exists(&sub, false).unwrap();
        write_file(sub.join("f"), "x", WriteOptions::default()).unwrap();

        assert!(remove_if_exists(&sub, RemoveOptions::default()).is_err());
        remove_if_exists(&sub, RemoveOptions { recursive: true }).unwrap();
        assert!(!dir_exists(&sub));
        remove_if_exists(&sub, RemoveOptions::default()).unwrap();
    }

    #[test]
    fn move_if_exists_renames() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("src.txt");
        let dst = dir.path().join("dst.txt");
        write_file(&src, "moved", WriteOptions::default()).unwrap();
        move_if_exists(&src, &dst).unwrap();
        assert!(!file_exists(&src));
        assert_eq!(read_file(&dst).unwrap(), "moved");
    }

    #[test]
    fn copy_file_reports_progress_up_to_one() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("src.bin");
        let dst = dir.path().join("dst.bin");
        let data: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
        write_bytes(&src, &data, WriteOptions::default()).unwrap();

        let mut reports = Vec::new();
        let options = CopyOptions { buffer_size: 1024, ..Default::default() };
        let copied = copy_file_with_progress(&src, &dst, options, |p| reports.push(p)).unwrap();

        assert_eq!(copied, data.len() as u64);
        assert_eq!(read_bytes(&dst).unwrap(), data);
        assert!(reports.len() > 2);
        assert!(reports.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(*reports.first().unwrap(), 0.0);
        assert_eq!(*reports.last().unwrap(), 1.0);
    }

    #[test]
    fn copy_file_respects_overwrite_flag() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("src.txt");
        let dst = dir.path().join("dst.txt");
        write_file(&src, "new", WriteOptions::default()).unwrap();
        write_file(&dst, "old", WriteOptions::default()).unwrap();

        let options = CopyOptions { overwrite: false, ..Default::default() };
        assert!(matches!(copy_file(&src, &dst, options), Err(FilesystemError::AlreadyExists(_))));
        assert_eq!(read_file(&dst).unwrap(), "old");

        copy_file(&src, &dst, CopyOptions::default()).unwrap();
        assert_eq!(read_file(&dst).unwrap(), "new");
    }

    #[test]
    fn copy_empty_file() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("empty");
        let dst = dir.path().join("copy");
        write_file(&src, "", WriteOptions::default()).unwrap();
        assert_eq!(copy_file(&src, &dst, CopyOptions::default()).unwrap(), 0);
        assert!(file_exists(&dst));
    }

    #[test]
    fn write_file_respects_overwrite_flag() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("f.txt");
        write_file(&file, "first", WriteOptions::default()).unwrap();
        let result = write_file(&file, "second", WriteOptions { overwrite: false });
        assert!(matches!(result, Err(FilesystemError::AlreadyExists(_))));
        assert_eq!(read_file(&file).unwrap(), "first");
    }

    #[test]
    fn read_file_distinguishes_strict_and_lossy() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("latin1.txt");
        write_bytes(&file, b"caf\xe9", WriteOptions::default()).unwrap();

        assert!(matches!(read_file(&file), Err(FilesystemError::InvalidUtf8(_))));
        assert_eq!(read_file_lossy(&file).unwrap(), "caf\u{FFFD}");
    }

    #[test]
    fn reads_and_writes_utf8_file_names() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("psychédélique_файл.txt");
        write_file(&file, "ünïcödé", WriteOptions::default()).unwrap();
        assert!(file_exists(&file));
        assert_eq!(read_file(&file).unwrap(), "ünïcödé");
        assert!(path_to_utf8(&file).is_ok());
    }

    #[test]
    fn peek_file_reads_prefix() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("f.txt");
        write_file(&file, "0123456789", WriteOptions::default()).unwrap();
        assert_eq!(peek_file(&file, 4).unwrap(), b"0123");
        assert_eq!(peek_file(&file, 100).unwrap(), b"0123456789");
        assert!(peek_file(dir.path().join("missing"), 4).is_err());
    }

    #[test]
    fn file_size_and_modified_time() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("f.txt");
        write_file(&file, "12345", WriteOptions::default()).unwrap();
        assert_eq!(file_size(&file).unwrap(), 5);
        assert!(modified_time(&file).unwrap() > 0);
        assert!(file_size(dir.path().join("missing")).is_err());
    }

    #[test]
    fn text_lines_round_trip() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("lines.txt");
        let lines = vec!["first", "second", "third"];
        write_text_lines(&file, &lines, true).unwrap();

        assert_eq!(read_text_lines(&file, true).unwrap(), lines);
        let raw = read_text_lines(&file, false).unwrap();
        assert!(raw[0].ends_with('\n'));
        assert!(!raw[2].ends_with('\n'));
    }

    #[test]
    fn write_text_lines_without_newlines_concatenates() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("joined.txt");
        write_text_lines(&file, &["a", "b"], false).unwrap();
        assert_eq!(read_file(&file).unwrap(), "ab");
    }

    #[test]
    fn file_replace_counts_and_rewrites() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("f.txt");
        write_file(&file, "foo bar foo", WriteOptions::default()).unwrap();

        assert_eq!(file_replace(&file, "foo", "baz").unwrap(), 2);
        assert_eq!(read_file(&file).unwrap(), "baz bar baz");
        assert_eq!(file_replace(&file, "nothing", "x").unwrap(), 0);
        assert!(file_replace(dir.path().join("missing"), "a", "b").is_err());
    }

    #[test]
    fn find_files_honors_depth() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        create_if_not_exists(root.join("a").join("b"), true).unwrap();
        write_file(root.join("top.txt"), "", WriteOptions::default()).unwrap();
        write_file(root.join("a").join("mid.txt"), "", WriteOptions::default()).unwrap();
        write_file(root.join("a").join("b").join("deep.txt"), "", WriteOptions::default()).unwrap();

        let shallow = find_files(root, Some(0)).unwrap();
        assert_eq!(shallow, vec![root.join("a"), root.join("top.txt")]);

        let all = find_files(root, None).unwrap();
        assert_eq!(all.len(), 5);
        assert!(all.contains(&root.join("a").join("b").join("deep.txt")));

        let one_level = find_files(root, Some(1)).unwrap();
        assert_eq!(one_level.len(), 4);
        assert!(find_files(root.join("missing"), None).is_err());
    }

    #[test]
    fn find_file_from_paths_searches_every_entry() {
        let dir = tempdir().unwrap();
        let first = dir.path().join("first");
        let second = dir.path().join("second");
        create_if_not_exists(&first, false).unwrap();
        create_if_not_exists(&second, false).unwrap();
        write_file(second.join("tool"), "", WriteOptions::default()).unwrap();

        let path_var = std::env::join_paths([&first, &second]).unwrap();
        let env: MemoryEnvironment = [("PATH", path_var.to_str().unwrap())].into_iter().collect();

        assert_eq!(find_file_from_paths(&env, "tool"), vec![second.join("tool")]);
        assert_eq!(find_first_file_from_paths(&env, "tool"), Some(second.join("tool")));
        assert!(find_file_from_paths(&env, "absent").is_empty());
        assert!(find_file_from_paths(&MemoryEnvironment::new(), "tool").is_empty());
    }

    #[test]
    fn find_file_from_paths_expands_entries() {
        let dir = tempdir().unwrap();
        write_file(dir.path().join("tool"), "", WriteOptions::default()).unwrap();
        let env: MemoryEnvironment = [
            ("PATH", "${TOOLS_DIR}".to_string()),
            ("TOOLS_DIR", dir.path().to_str().unwrap().to_string()),
        ]
        .into_iter()
        .collect();

        assert_eq!(find_file_from_paths(&env, "tool"), vec![dir.path().join("tool")]);
    }

    #[test]
    fn temp_file_path_is_fresh() {
        let mut rng = RandomSource::from_seed(5);
        let path = temp_file_path(&mut rng);
        assert!(path.starts_with(temp_dir()));
        assert!(!path.exists());
    }
}
